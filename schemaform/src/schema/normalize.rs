//! Rewrites non-standard field declarations into plain JSON Schema.
//!
//! Component schemas use a handful of extensions a generic renderer does not
//! understand: `button` fields, async-populated selects and multi-select
//! arrays. [`normalize`] produces a renderer-compatible copy of the document
//! and keeps the original next to it, since the extension metadata elided
//! from the copy is needed later (button bindings, watch lists).

use std::sync::LazyLock;

use log::warn;
use regex::{Captures, Regex};
use serde_json::{Map, Value, json};

use crate::schema::{
    SchemaError,
    field::{Field, FieldKind, FieldRole, FieldTree, type_name},
};

static HYPHEN_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-([a-z])").expect("static regex"));

/// Non-fatal findings collected while normalizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaWarning {
    /// `enum` and its titles have different lengths.
    EnumTitlesMismatch {
        path: String,
        values: usize,
        titles: usize,
    },
    /// A field with a malformed extension was skipped or degraded.
    InvalidField { path: String, reason: String },
}

impl std::fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaWarning::EnumTitlesMismatch {
                path,
                values,
                titles,
            } => write!(
                f,
                "enum_titles length mismatch for {path}: {values} values, {titles} titles"
            ),
            SchemaWarning::InvalidField { path, reason } => {
                write!(f, "invalid field `{path}`: {reason}")
            }
        }
    }
}

/// A schema after preprocessing.
#[derive(Debug, Clone)]
pub struct NormalizedSchema {
    /// The document exactly as supplied.
    pub original: Value,
    /// Renderer-compatible rewrite.
    pub normalized: Value,
    /// Typed view of the fields.
    pub fields: FieldTree,
    pub warnings: Vec<SchemaWarning>,
}

impl NormalizedSchema {
    /// Top-level keys declared by the normalized document.
    pub fn declared_keys(&self) -> Vec<String> {
        self.normalized
            .get("properties")
            .and_then(Value::as_object)
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Normalize a raw schema document.
///
/// Applied at every nesting depth. Pure: the input is not modified, and
/// normalizing an already normalized document yields the same document.
pub fn normalize(raw: &Value) -> Result<NormalizedSchema, SchemaError> {
    if !raw.is_object() {
        return Err(SchemaError::NotAnObject {
            path: "root".to_string(),
            actual: type_name(raw).to_string(),
        });
    }

    let fields = FieldTree::parse(raw)?;
    let mut normalized = raw.clone();
    let mut warnings = fields.warnings.clone();

    if let Some(props) = normalized
        .get_mut("properties")
        .and_then(Value::as_object_mut)
    {
        rewrite_properties(props, &fields.fields, &mut warnings);
    }

    for w in &warnings {
        warn!("{w}");
    }

    Ok(NormalizedSchema {
        original: raw.clone(),
        normalized,
        fields,
        warnings,
    })
}

fn rewrite_properties(
    props: &mut Map<String, Value>,
    fields: &[Field],
    warnings: &mut Vec<SchemaWarning>,
) {
    for field in fields {
        let Some(prop) = props.get_mut(&field.key) else {
            continue;
        };

        if let FieldRole::Button(spec) = &field.role {
            *prop = button_stub(field, &spec.action, &spec.label, spec.format.as_deref());
            continue;
        }

        if let Some(obj) = prop.as_object_mut() {
            if matches!(field.role, FieldRole::AsyncSelect(_)) {
                set_option(obj, "hasAsync", Value::Bool(true));
            }

            if field.kind == FieldKind::Array && field.format.as_deref() == Some("select") {
                obj.insert("uniqueItems".to_string(), Value::Bool(true));
            }

            // Checked whenever `enum` is declared, even empty.
            if let Some(titles) = &field.enum_titles
                && obj.contains_key("enum")
                && titles.len() != field.enum_values.len()
            {
                warnings.push(SchemaWarning::EnumTitlesMismatch {
                    path: field.path.clone(),
                    values: field.enum_values.len(),
                    titles: titles.len(),
                });
            }

            if let Some(children) = obj.get_mut("properties").and_then(Value::as_object_mut) {
                rewrite_properties(children, &field.children, warnings);
            }
        }
    }
}

/// Hidden string field standing in for a button.
fn button_stub(field: &Field, action: &str, label: &str, format: Option<&str>) -> Value {
    let mut options = Map::new();
    options.insert("isButton".to_string(), Value::Bool(true));
    options.insert("action".to_string(), Value::from(action));
    options.insert("label".to_string(), Value::from(label));
    if let Some(format) = format {
        options.insert("format".to_string(), Value::from(format));
    }
    options.insert(
        "inputAttributes".to_string(),
        json!({"style": "display: none;"}),
    );

    let mut stub = Map::new();
    stub.insert("type".to_string(), Value::from("string"));
    stub.insert(
        "title".to_string(),
        Value::from(field.title.clone().unwrap_or_default()),
    );
    stub.insert("default".to_string(), Value::from(""));
    stub.insert("options".to_string(), Value::Object(options));
    if let Some(order) = field.property_order {
        stub.insert("propertyOrder".to_string(), Value::from(order));
    }
    Value::Object(stub)
}

fn set_option(obj: &mut Map<String, Value>, key: &str, value: Value) {
    if !matches!(obj.get("options"), Some(Value::Object(_))) {
        obj.insert("options".to_string(), Value::Object(Map::new()));
    }
    if let Some(Value::Object(options)) = obj.get_mut("options") {
        options.insert(key.to_string(), value);
    }
}

/// Action name derived from a button format: `test-connection` -> `testConnection`.
pub fn format_to_action(format: &str) -> String {
    HYPHEN_LETTER
        .replace_all(format, |caps: &Captures| caps[1].to_uppercase())
        .into_owned()
}

/// Button caption derived from a format: `test-connection` -> `Test Connection`.
pub fn format_to_label(format: &str) -> String {
    format
        .split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_from_format() {
        let raw = json!({
            "type": "object",
            "properties": {
                "test": {"type": "button", "format": "test-connection", "propertyOrder": 3}
            }
        });
        let schema = normalize(&raw).unwrap();
        let stub = &schema.normalized["properties"]["test"];
        assert_eq!(stub["type"], "string");
        assert_eq!(stub["default"], "");
        assert_eq!(stub["propertyOrder"], 3);
        assert_eq!(stub["options"]["isButton"], true);
        assert_eq!(stub["options"]["action"], "testConnection");
        assert_eq!(stub["options"]["label"], "Test Connection");
        assert_eq!(stub["options"]["inputAttributes"]["style"], "display: none;");
        // original is untouched
        assert_eq!(schema.original["properties"]["test"]["type"], "button");
    }

    #[test]
    fn test_button_from_async_descriptor() {
        let raw = json!({
            "type": "object",
            "properties": {
                "check": {
                    "type": "button",
                    "title": "Check",
                    "format": "sync-action",
                    "options": {"async": {"action": "validateCredentials", "label": "Validate"}}
                },
                "plain": {"type": "button", "title": "Do it"},
                "bare": {"type": "button"}
            }
        });
        let schema = normalize(&raw).unwrap();
        let props = &schema.normalized["properties"];
        assert_eq!(props["check"]["options"]["action"], "validateCredentials");
        assert_eq!(props["check"]["options"]["label"], "Validate");
        assert_eq!(props["plain"]["options"]["action"], "unknown");
        assert_eq!(props["plain"]["options"]["label"], "Do it");
        assert_eq!(props["bare"]["options"]["label"], "Button");
    }

    #[test]
    fn test_nested_buttons_at_any_depth() {
        let raw = json!({
            "type": "object",
            "properties": {
                "outer": {
                    "type": "object",
                    "properties": {
                        "inner": {
                            "type": "object",
                            "properties": {
                                "go": {"type": "button", "format": "run-sync"}
                            }
                        }
                    }
                }
            }
        });
        let schema = normalize(&raw).unwrap();
        let go = &schema.normalized["properties"]["outer"]["properties"]["inner"]["properties"]["go"];
        assert_eq!(go["options"]["action"], "runSync");
        assert_eq!(go["options"]["label"], "Run Sync");
    }

    #[test]
    fn test_async_and_multiselect_flags() {
        let raw = json!({
            "type": "object",
            "properties": {
                "table": {
                    "type": "string",
                    "format": "select",
                    "enum": [],
                    "options": {"async": {"action": "listTables"}}
                },
                "columns": {
                    "type": "array",
                    "format": "select",
                    "items": {"type": "string"}
                },
                "name": {"type": "string"}
            }
        });
        let schema = normalize(&raw).unwrap();
        let props = &schema.normalized["properties"];
        assert_eq!(props["table"]["options"]["hasAsync"], true);
        assert_eq!(props["columns"]["uniqueItems"], true);
        assert_eq!(props["name"], raw["properties"]["name"]);
    }

    #[test]
    fn test_enum_titles_mismatch_flagged() {
        let raw = json!({
            "type": "object",
            "properties": {
                "mode": {
                    "type": "string",
                    "enum": ["a", "b", "c"],
                    "options": {"enum_titles": ["A", "B"]}
                },
                "ok": {"type": "string", "enum": ["x"], "enumTitles": ["X"]}
            }
        });
        let schema = normalize(&raw).unwrap();
        assert_eq!(
            schema.warnings,
            vec![SchemaWarning::EnumTitlesMismatch {
                path: "mode".to_string(),
                values: 3,
                titles: 2
            }]
        );
        // not truncated
        assert_eq!(schema.normalized["properties"]["mode"]["enum"], json!(["a", "b", "c"]));
    }

    #[test]
    fn test_empty_enum_with_titles_flagged() {
        let raw = json!({
            "type": "object",
            "properties": {
                "empty": {"type": "string", "enum": [], "options": {"enum_titles": ["A"]}},
                "no_enum": {"type": "string", "options": {"enum_titles": ["A"]}}
            }
        });
        let schema = normalize(&raw).unwrap();
        assert_eq!(
            schema.warnings,
            vec![SchemaWarning::EnumTitlesMismatch {
                path: "empty".to_string(),
                values: 0,
                titles: 1
            }]
        );
    }

    #[test]
    fn test_malformed_fields_do_not_fail_normalization() {
        let raw = json!({
            "type": "object",
            "properties": {
                "table": {"type": "string", "format": "select", "options": {"async": {"label": "Load"}}},
                "flag": true,
                "name": {"type": "string"}
            }
        });
        let schema = normalize(&raw).unwrap();
        assert_eq!(schema.fields.walk().len(), 2);
        assert_eq!(schema.warnings.len(), 2);
        assert!(matches!(schema.warnings[0], SchemaWarning::InvalidField { .. }));
        // left as declared
        assert_eq!(schema.normalized["properties"]["flag"], json!(true));
        assert!(schema.normalized["properties"]["table"]["options"].get("hasAsync").is_none());
        assert_eq!(schema.declared_keys(), vec!["table", "flag", "name"]);
    }

    #[test]
    fn test_idempotent() {
        let raw = json!({
            "type": "object",
            "properties": {
                "b": {"type": "button", "format": "test-connection"},
                "s": {"type": "string", "format": "select", "options": {"async": {"action": "x"}}},
                "m": {"type": "array", "format": "select"}
            }
        });
        let once = normalize(&raw).unwrap();
        let twice = normalize(&once.normalized).unwrap();
        assert_eq!(once.normalized, twice.normalized);
        assert_eq!(once.fields.actions(), twice.fields.actions());
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_to_action("test-connection"), "testConnection");
        assert_eq!(format_to_action("list"), "list");
        assert_eq!(format_to_label("test-connection"), "Test Connection");
        assert_eq!(format_to_label("load_tables"), "Load Tables");
    }
}
