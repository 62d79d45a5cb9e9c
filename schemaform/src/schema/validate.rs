//! Schema-conformance checks for form values.
//!
//! Validation never blocks editing: issues are collected and reported next to
//! the value they belong to.

use jsonschema::Validator;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::SchemaError;

/// One schema-conformance error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Location of the offending value, `root.a.b` style.
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Compiled validator for one editor's value.
pub struct FormValidator {
    validator: Validator,
}

impl std::fmt::Debug for FormValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormValidator").finish_non_exhaustive()
    }
}

impl FormValidator {
    /// Compile a validator from a normalized schema.
    ///
    /// Editor-only conventions are translated first: per-property boolean
    /// `required` flags become the parent's `required` list, button stubs are
    /// dropped and async selects lose their static `enum`, since their
    /// options are only known at runtime.
    pub fn new(normalized: &Value) -> Result<Self, SchemaError> {
        let mut schema = normalized.clone();
        if let Some(obj) = schema.as_object_mut() {
            prepare(obj);
        }
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(FormValidator { validator })
    }

    pub fn validate(&self, value: &Value) -> Vec<ValidationIssue> {
        self.validator
            .iter_errors(value)
            .map(|error| ValidationIssue {
                path: pointer_to_path(&error.instance_path.to_string()),
                message: error.to_string(),
            })
            .collect()
    }
}

fn prepare(obj: &mut Map<String, Value>) {
    let mut required: Vec<String> = Vec::new();

    if let Some(props) = obj.get_mut("properties").and_then(Value::as_object_mut) {
        let keys: Vec<String> = props.keys().cloned().collect();
        for key in keys {
            let Some(prop) = props.get_mut(&key).and_then(Value::as_object_mut) else {
                continue;
            };
            let options = prop.get("options").and_then(Value::as_object);
            let is_button = options
                .and_then(|o| o.get("isButton"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let has_async = options
                .and_then(|o| o.get("hasAsync"))
                .and_then(Value::as_bool)
                .unwrap_or(false);

            if is_button {
                props.remove(&key);
                continue;
            }
            if let Some(Value::Bool(flag)) = prop.get("required") {
                if *flag {
                    required.push(key.clone());
                }
                prop.remove("required");
            }
            if has_async {
                prop.remove("enum");
            }
            prepare(prop);
        }
    }

    if required.is_empty() {
        return;
    }
    let list = obj
        .entry("required")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !list.is_array() {
        *list = Value::Array(Vec::new());
    }
    if let Value::Array(items) = list {
        for key in required {
            let key = Value::String(key);
            if !items.contains(&key) {
                items.push(key);
            }
        }
    }
}

/// `/a/0/b` -> `root.a.0.b`.
fn pointer_to_path(pointer: &str) -> String {
    let mut path = String::from("root");
    for segment in pointer.split('/').filter(|s| !s.is_empty()) {
        path.push('.');
        path.push_str(&segment.replace("~1", "/").replace("~0", "~"));
    }
    path
}

/// Human-readable listing, one `path: message` line per issue.
pub fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
