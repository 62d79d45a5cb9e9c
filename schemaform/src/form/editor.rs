use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    form::{
        buttons::ActionButton,
        deps::DependencyGraph,
        loader::{AsyncFieldState, DebounceKey, LoadStatus, SelectOption},
        merge::EditorOutput,
        state::{FormState, path_touches},
    },
    schema::{
        Field, FieldGroups, FieldRole, FormValidator, NormalizedSchema, SchemaError, Section,
        ValidationIssue, normalize,
    },
};

/// Which of the two editors a field lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorRole {
    Component,
    Row,
}

impl std::fmt::Display for EditorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditorRole::Component => write!(f, "component"),
            EditorRole::Row => write!(f, "row"),
        }
    }
}

/// Effects of a single value change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Change {
    /// Whether the stored value actually changed.
    pub changed: bool,
    /// Fields whose visibility flipped, with their new visibility.
    pub visibility: Vec<(String, bool)>,
    /// Debounced reloads to schedule: (async field, watched field).
    pub triggers: Vec<DebounceKey>,
}

/// One schema-bound editor.
///
/// Owns the current value, the visibility of conditional fields, the state
/// of every async select and every action button.
#[derive(Debug)]
pub struct FormEditor {
    role: EditorRole,
    schema: NormalizedSchema,
    validator: Option<FormValidator>,
    graph: DependencyGraph,
    state: FormState,
    visibility: BTreeMap<String, bool>,
    async_fields: BTreeMap<String, AsyncFieldState>,
    buttons: BTreeMap<String, ActionButton>,
}

impl FormEditor {
    /// Build an editor from a raw schema document, starting from defaults.
    pub fn new(role: EditorRole, raw: &Value) -> Result<Self, SchemaError> {
        let schema = normalize(raw)?;
        let validator = match FormValidator::new(&schema.normalized) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("{role} schema: validation disabled: {e}");
                None
            }
        };
        let graph = DependencyGraph::build(&schema.fields);
        let state = FormState::new(schema.fields.defaults());

        let mut async_fields = BTreeMap::new();
        let mut buttons = BTreeMap::new();
        for field in schema.fields.walk() {
            match &field.role {
                FieldRole::AsyncSelect(_) => {
                    async_fields.insert(
                        field.path.clone(),
                        AsyncFieldState::new(&field.enum_values, field.enum_titles.as_deref()),
                    );
                }
                FieldRole::Button(spec) => {
                    buttons.insert(
                        field.path.clone(),
                        ActionButton {
                            path: field.path.clone(),
                            action: spec.action.clone(),
                            label: spec.label.clone(),
                            owner: role,
                            busy: false,
                        },
                    );
                }
                FieldRole::MultiSelect | FieldRole::Plain => {}
            }
        }

        let visibility = graph.evaluate_all(&state);
        Ok(FormEditor {
            role,
            schema,
            validator,
            graph,
            state,
            visibility,
            async_fields,
            buttons,
        })
    }

    pub fn role(&self) -> EditorRole {
        self.role
    }

    pub fn schema(&self) -> &NormalizedSchema {
        &self.schema
    }

    pub fn field(&self, path: &str) -> Option<&Field> {
        self.schema.fields.get(path)
    }

    /// Top-level keys this editor owns.
    pub fn declared_keys(&self) -> Vec<String> {
        self.schema.declared_keys()
    }

    /// Evaluate visibility once and list the async selects that load on
    /// mount.
    pub fn mount(&mut self) -> Vec<String> {
        self.visibility = self.graph.evaluate_all(&self.state);
        self.schema
            .fields
            .walk()
            .into_iter()
            .filter_map(|f| match &f.role {
                FieldRole::AsyncSelect(desc) if desc.autoload.on_mount() => Some(f.path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Store a value and work out what it affects.
    pub fn set_value(&mut self, path: &str, value: Value) -> Change {
        if self.buttons.contains_key(path) {
            debug!("{} editor: ignoring value for button `{path}`", self.role);
            return Change::default();
        }
        if !self.state.set(path, value) {
            return Change::default();
        }

        let mut visibility = Vec::new();
        for field in self.graph.affected_by(path) {
            let visible = self.graph.is_visible(&field, &self.state);
            if self.visibility.insert(field.clone(), visible) != Some(visible) {
                visibility.push((field, visible));
            }
        }

        let mut triggers = Vec::new();
        for field in self.schema.fields.walk() {
            if let FieldRole::AsyncSelect(desc) = &field.role {
                for watched in desc.autoload.watched_fields() {
                    if path_touches(&watched, path) {
                        triggers.push((field.path.clone(), watched));
                    }
                }
            }
        }

        Change {
            changed: true,
            visibility,
            triggers,
        }
    }

    /// Replace the value with defaults overlaid by `values`. Button keys are
    /// skipped.
    pub fn set_values(&mut self, values: &Map<String, Value>) {
        let mut merged = self.schema.fields.defaults();
        for (key, value) in values {
            if !self.buttons.contains_key(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
        self.state = FormState::new(merged);
        self.visibility = self.graph.evaluate_all(&self.state);
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.state.get(path)
    }

    /// Current value; hidden fields keep theirs.
    pub fn values(&self) -> &Map<String, Value> {
        self.state.as_map()
    }

    pub fn value(&self) -> Value {
        self.state.as_json()
    }

    pub fn validate(&self) -> Vec<ValidationIssue> {
        self.validator
            .as_ref()
            .map(|v| v.validate(&self.state.as_json()))
            .unwrap_or_default()
    }

    pub fn output(&self) -> EditorOutput {
        EditorOutput {
            value: self.value(),
            errors: self.validate(),
        }
    }

    pub fn is_visible(&self, path: &str) -> bool {
        self.visibility.get(path).copied().unwrap_or(true)
    }

    /// Visibility of every conditional field.
    pub fn visibility(&self) -> &BTreeMap<String, bool> {
        &self.visibility
    }

    pub fn groups(&self) -> FieldGroups {
        FieldGroups::classify(&self.schema.fields)
    }

    pub fn sections(&self) -> Option<Vec<Section>> {
        self.groups().organize_sections()
    }

    pub fn async_field(&self, path: &str) -> Option<&AsyncFieldState> {
        self.async_fields.get(path)
    }

    pub fn async_fields(&self) -> &BTreeMap<String, AsyncFieldState> {
        &self.async_fields
    }

    /// Enter `Loading` for an async select and return its action.
    pub fn begin_load(&mut self, path: &str) -> Option<String> {
        let action = match &self.schema.fields.get(path)?.role {
            FieldRole::AsyncSelect(desc) => desc.action.clone(),
            _ => return None,
        };
        self.async_fields.get_mut(path)?.begin();
        Some(action)
    }

    /// Leave `Loading` with the given outcome.
    pub fn finish_load(
        &mut self,
        path: &str,
        outcome: Result<Vec<SelectOption>, String>,
    ) -> Option<LoadStatus> {
        let required = self.schema.fields.get(path).is_some_and(|f| f.required);
        let state = self.async_fields.get_mut(path)?;
        state.finish(outcome, required);
        Some(state.status.clone())
    }

    pub fn button(&self, path: &str) -> Option<&ActionButton> {
        self.buttons.get(path)
    }

    pub fn buttons(&self) -> impl Iterator<Item = &ActionButton> {
        self.buttons.values()
    }

    pub(crate) fn set_busy(&mut self, path: &str, busy: bool) {
        if let Some(button) = self.buttons.get_mut(path) {
            button.busy = busy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn editor() -> FormEditor {
        let schema = json!({
            "type": "object",
            "required": ["api_key"],
            "properties": {
                "api_key": {"type": "string", "propertyOrder": 1},
                "base_id": {"type": "string", "propertyOrder": 2},
                "table": {
                    "type": "string",
                    "format": "select",
                    "enum": [],
                    "propertyOrder": 5,
                    "options": {
                        "async": {"action": "listTables", "autoload": ["parameters.base_id"]}
                    }
                },
                "incremental": {"type": "boolean", "propertyOrder": 8},
                "key_column": {
                    "type": "string",
                    "propertyOrder": 9,
                    "options": {"dependencies": {"incremental": true}}
                },
                "check": {"type": "button", "format": "test-connection", "propertyOrder": 3}
            }
        });
        FormEditor::new(EditorRole::Row, &schema).unwrap()
    }

    #[test]
    fn test_defaults_exclude_buttons() {
        let editor = editor();
        assert_eq!(
            editor.value(),
            json!({
                "api_key": "",
                "base_id": "",
                "table": "",
                "incremental": false,
                "key_column": ""
            })
        );
        assert!(editor.button("check").is_some());
        assert_eq!(editor.button("check").unwrap().action, "testConnection");
    }

    #[test]
    fn test_visibility_change_keeps_hidden_value() {
        let mut editor = editor();
        editor.mount();
        assert!(!editor.is_visible("key_column"));

        editor.set_value("incremental", json!(true));
        editor.set_value("key_column", json!("id"));
        assert!(editor.is_visible("key_column"));

        let change = editor.set_value("incremental", json!(false));
        assert_eq!(change.visibility, vec![("key_column".to_string(), false)]);
        assert_eq!(editor.get("key_column"), Some(&json!("id")));
    }

    #[test]
    fn test_watch_triggers() {
        let mut editor = editor();
        let change = editor.set_value("base_id", json!("app1"));
        assert_eq!(change.triggers, vec![("table".to_string(), "base_id".to_string())]);

        let unchanged = editor.set_value("base_id", json!("app1"));
        assert!(!unchanged.changed);
        assert!(unchanged.triggers.is_empty());
    }

    #[test]
    fn test_load_cycle() {
        let mut editor = editor();
        assert_eq!(editor.begin_load("table").as_deref(), Some("listTables"));
        assert!(!editor.async_field("table").unwrap().enabled);

        let status = editor.finish_load(
            "table",
            Ok(vec![SelectOption {
                value: json!("t1"),
                label: "T1".into(),
            }]),
        );
        assert_eq!(status, Some(LoadStatus::Populated));
        let field = editor.async_field("table").unwrap();
        assert!(field.enabled);
        // optional field: placeholder first
        assert_eq!(field.options.len(), 2);

        assert!(editor.begin_load("api_key").is_none());
    }

    #[test]
    fn test_sections_and_prefill() {
        let mut editor = editor();
        let sections = editor.sections().unwrap();
        let names: Vec<&str> = sections.iter().map(|s| s.group.name()).collect();
        assert_eq!(names, vec!["Connection", "Data Selection", "Destination"]);

        editor.set_values(json!({"api_key": "k"}).as_object().unwrap());
        assert_eq!(editor.get("api_key"), Some(&json!("k")));
        assert_eq!(editor.get("incremental"), Some(&json!(false)));
        assert!(editor.validate().is_empty());
    }

    #[test]
    fn test_validation_issues() {
        let schema = json!({
            "type": "object",
            "required": ["port"],
            "properties": {"port": {"type": "integer", "minimum": 1}}
        });
        let mut editor = FormEditor::new(EditorRole::Component, &schema).unwrap();
        editor.set_value("port", json!(0));
        let issues = editor.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "root.port");
    }

    #[test]
    fn test_malformed_field_keeps_form_editable() {
        let schema = json!({
            "type": "object",
            "properties": {
                "table": {"type": "string", "format": "select", "options": {"async": {"autoload": true}}},
                "b": true,
                "name": {"type": "string"}
            }
        });
        let mut editor = FormEditor::new(EditorRole::Row, &schema).unwrap();
        assert!(editor.async_field("table").is_none());
        assert!(editor.mount().is_empty());
        editor.set_value("name", json!("orders"));
        editor.set_value("table", json!("t1"));
        assert_eq!(editor.get("table"), Some(&json!("t1")));
        assert!(editor.validate().is_empty());
    }
}
