//! Combining and splitting the two editors' values.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::ValidationIssue;

/// `{...component, ...row}`: row values win on key collisions.
pub fn combine(component: &Map<String, Value>, row: &Map<String, Value>) -> Map<String, Value> {
    let mut combined = component.clone();
    for (key, value) in row {
        combined.insert(key.clone(), value.clone());
    }
    combined
}

/// Split a persisted parameter set by schema key membership.
///
/// A key declared by both schemas goes to both editors; keys declared by
/// neither are dropped.
pub fn split(
    persisted: &Map<String, Value>,
    component_keys: &[String],
    row_keys: &[String],
) -> (Map<String, Value>, Map<String, Value>) {
    let mut component = Map::new();
    let mut row = Map::new();
    for (key, value) in persisted {
        if component_keys.contains(key) {
            component.insert(key.clone(), value.clone());
        }
        if row_keys.contains(key) {
            row.insert(key.clone(), value.clone());
        }
    }
    (component, row)
}

/// One editor's serialized value and its validation errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EditorOutput {
    pub value: Value,
    pub errors: Vec<ValidationIssue>,
}

impl EditorOutput {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Pretty JSON, followed by an error block when invalid.
    pub fn render(&self) -> String {
        let value = serde_json::to_string_pretty(&self.value).unwrap_or_default();
        if self.errors.is_empty() {
            return value;
        }
        let errors = serde_json::to_string_pretty(&self.errors).unwrap_or_default();
        format!("{value}\n\n// ERRORS:\n{errors}")
    }
}

/// The final configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombinedOutput {
    pub parameters: Map<String, Value>,
}

/// Everything recomputed on a change in either editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionOutput {
    pub component: EditorOutput,
    pub row: EditorOutput,
    pub combined: CombinedOutput,
}
