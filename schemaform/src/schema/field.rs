use serde_json::{Map, Value};

use crate::schema::{SchemaError, SchemaWarning};

/// Namespace prefix carried by async watch paths.
///
/// Watch lists are written against the persisted document
/// (`parameters.base_id`), while the live form is rooted at the parameters
/// object itself.
pub const PARAMETERS_PREFIX: &str = "parameters.";

/// Options key holding the explicit display group of a field.
pub const GROUP_TAG: &str = "x-kbc-group";

/// Declared value type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    /// Non-standard action trigger.
    Button,
    /// Anything else (`null`, missing type, vendor types).
    Other(String),
}

impl FieldKind {
    fn from_schema(prop: &Value) -> Self {
        let declared = match prop.get("type") {
            Some(Value::String(s)) => Some(s.as_str()),
            // `["string", "null"]` style unions: first non-null member wins
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .find(|t| *t != "null"),
            _ => None,
        };

        match declared {
            Some("string") => FieldKind::String,
            Some("number") => FieldKind::Number,
            Some("integer") => FieldKind::Integer,
            Some("boolean") => FieldKind::Boolean,
            Some("object") => FieldKind::Object,
            Some("array") => FieldKind::Array,
            Some("button") => FieldKind::Button,
            Some(other) => FieldKind::Other(other.to_string()),
            None if prop.get("properties").is_some() => FieldKind::Object,
            None => FieldKind::Other(String::new()),
        }
    }
}

/// When an async select populates itself without a click.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Autoload {
    /// Manual loading only.
    #[default]
    Off,
    /// Load once when the form mounts.
    OnMount,
    /// Load on mount and again whenever one of these fields changes.
    ///
    /// Paths are stored as declared, prefix included.
    Watch(Vec<String>),
}

impl Autoload {
    /// Interpret an `autoload` declaration; `Err` carries the reason it is malformed.
    fn parse(value: Option<&Value>) -> Result<Self, String> {
        match value {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(Autoload::Off),
            Some(Value::Bool(true)) => Ok(Autoload::OnMount),
            Some(Value::Array(items)) => {
                let mut paths = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => paths.push(s.clone()),
                        other => return Err(format!("autoload entries must be strings, got {other}")),
                    }
                }
                if paths.is_empty() {
                    Ok(Autoload::Off)
                } else {
                    Ok(Autoload::Watch(paths))
                }
            }
            Some(other) => Err(format!(
                "autoload must be a boolean or a list of paths, got {other}"
            )),
        }
    }

    /// Whether a load fires right after mount.
    pub fn on_mount(&self) -> bool {
        !matches!(self, Autoload::Off)
    }

    /// Watched field paths relative to the live form.
    pub fn watched_fields(&self) -> Vec<String> {
        match self {
            Autoload::Watch(paths) => paths
                .iter()
                .map(|p| p.strip_prefix(PARAMETERS_PREFIX).unwrap_or(p).to_string())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// `options.async` of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncDescriptor {
    pub action: String,
    pub autoload: Autoload,
    pub label: Option<String>,
}

impl AsyncDescriptor {
    /// `None` when the descriptor names no action. A malformed `autoload`
    /// falls back to manual loading.
    fn parse(value: &Value, path: &str, warnings: &mut Vec<SchemaWarning>) -> Option<Self> {
        let Some(action) = value
            .get("action")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
        else {
            warnings.push(SchemaWarning::InvalidField {
                path: path.to_string(),
                reason: "async descriptor has no action".to_string(),
            });
            return None;
        };

        let autoload = Autoload::parse(value.get("autoload")).unwrap_or_else(|reason| {
            warnings.push(SchemaWarning::InvalidField {
                path: path.to_string(),
                reason,
            });
            Autoload::Off
        });

        Some(AsyncDescriptor {
            action: action.to_string(),
            autoload,
            label: value.get("label").and_then(Value::as_str).map(str::to_string),
        })
    }

    /// Caption of the manual load trigger.
    pub fn trigger_label(&self) -> &str {
        self.label.as_deref().unwrap_or("Load Options")
    }
}

/// Resolved action binding of a button field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonSpec {
    pub action: String,
    pub label: String,
    pub format: Option<String>,
}

/// Closed set of behaviors a field can carry.
///
/// Decided once while parsing so later stages match on variants instead of
/// probing the `options` bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRole {
    Button(ButtonSpec),
    AsyncSelect(AsyncDescriptor),
    MultiSelect,
    Plain,
}

/// One field declaration of a schema, with its nested children.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Property name inside the parent object.
    pub key: String,
    /// Dot-separated path from the form root.
    pub path: String,
    pub kind: FieldKind,
    pub title: Option<String>,
    pub default: Option<Value>,
    pub property_order: Option<i64>,
    pub required: bool,
    pub format: Option<String>,
    pub enum_values: Vec<Value>,
    pub enum_titles: Option<Vec<String>>,
    /// Explicit display group.
    pub group_tag: Option<String>,
    pub role: FieldRole,
    /// Visibility conditions: path -> required value.
    pub dependencies: Option<Map<String, Value>>,
    pub children: Vec<Field>,
}

impl Field {
    /// Parse a property declaration.
    ///
    /// `required_by_parent` is whether the parent object lists this key in
    /// its `required` array. Returns `None` for a subschema that is not an
    /// object (`"b": true`); malformed extensions degrade the field's role.
    /// Both are reported through `warnings`.
    pub fn parse(
        key: &str,
        path: &str,
        prop: &Value,
        required_by_parent: bool,
        warnings: &mut Vec<SchemaWarning>,
    ) -> Option<Self> {
        let Some(obj) = prop.as_object() else {
            warnings.push(SchemaWarning::InvalidField {
                path: path.to_string(),
                reason: format!("subschema must be an object, got {}", type_name(prop)),
            });
            return None;
        };
        let options = obj.get("options").and_then(Value::as_object);

        let kind = FieldKind::from_schema(prop);
        let title = obj.get("title").and_then(Value::as_str).map(str::to_string);
        let format = obj.get("format").and_then(Value::as_str).map(str::to_string);

        let enum_values = obj
            .get("enum")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let enum_titles = options
            .and_then(|o| o.get("enum_titles"))
            .or_else(|| obj.get("enumTitles"))
            .and_then(Value::as_array)
            .map(|titles| titles.iter().map(display_string).collect());

        let group_tag = options
            .and_then(|o| o.get(GROUP_TAG))
            .or_else(|| obj.get(GROUP_TAG))
            .and_then(Value::as_str)
            .map(str::to_string);

        let dependencies = options
            .and_then(|o| o.get("dependencies"))
            .and_then(Value::as_object)
            .filter(|d| !d.is_empty())
            .cloned();

        let role = Self::parse_role(&kind, title.as_deref(), format.as_deref(), options, path, warnings);

        let mut children = Vec::new();
        if kind == FieldKind::Object
            && let Some(props) = obj.get("properties").and_then(Value::as_object)
        {
            let required = required_keys(prop);
            for (child_key, child) in props {
                let child_path = format!("{path}.{child_key}");
                children.extend(Field::parse(
                    child_key,
                    &child_path,
                    child,
                    required.iter().any(|r| r == child_key),
                    warnings,
                ));
            }
        }

        Some(Field {
            key: key.to_string(),
            path: path.to_string(),
            required: required_by_parent
                || obj.get("required").and_then(Value::as_bool).unwrap_or(false),
            property_order: obj.get("propertyOrder").and_then(Value::as_i64),
            default: obj.get("default").cloned(),
            kind,
            title,
            format,
            enum_values,
            enum_titles,
            group_tag,
            role,
            dependencies,
            children,
        })
    }

    fn parse_role(
        kind: &FieldKind,
        title: Option<&str>,
        format: Option<&str>,
        options: Option<&Map<String, Value>>,
        path: &str,
        warnings: &mut Vec<SchemaWarning>,
    ) -> FieldRole {
        let async_desc = options.and_then(|o| o.get("async")).filter(|a| a.is_object());

        // An already normalized button stub keeps its binding.
        if let Some(o) = options
            && o.get("isButton").and_then(Value::as_bool) == Some(true)
        {
            return FieldRole::Button(ButtonSpec {
                action: o
                    .get("action")
                    .and_then(Value::as_str)
                    .unwrap_or(UNKNOWN_ACTION)
                    .to_string(),
                label: o
                    .get("label")
                    .and_then(Value::as_str)
                    .or(title)
                    .unwrap_or(DEFAULT_BUTTON_LABEL)
                    .to_string(),
                format: o.get("format").and_then(Value::as_str).map(str::to_string),
            });
        }

        if *kind == FieldKind::Button {
            return FieldRole::Button(resolve_button(title, format, async_desc));
        }

        if format == Some("select")
            && let Some(desc) = async_desc
        {
            // Without an action the field still renders as a plain select.
            if let Some(desc) = AsyncDescriptor::parse(desc, path, warnings) {
                return FieldRole::AsyncSelect(desc);
            }
        }

        if *kind == FieldKind::Array && format == Some("select") {
            return FieldRole::MultiSelect;
        }

        FieldRole::Plain
    }

    /// Human label: the title, or the key when untitled.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.key)
    }

    /// Whether the field holds configuration data (buttons do not).
    pub fn carries_value(&self) -> bool {
        !matches!(self.role, FieldRole::Button(_))
    }

    /// Initial value of the field in a fresh form.
    ///
    /// Returns `None` for fields that hold no value.
    pub fn default_value(&self) -> Option<Value> {
        if !self.carries_value() {
            return None;
        }
        if let Some(default) = &self.default {
            return Some(default.clone());
        }
        let first_enum = || {
            if matches!(self.role, FieldRole::AsyncSelect(_)) {
                None
            } else {
                self.enum_values.first().cloned()
            }
        };
        match self.kind {
            FieldKind::Object => {
                let mut map = Map::new();
                for child in &self.children {
                    if let Some(v) = child.default_value() {
                        map.insert(child.key.clone(), v);
                    }
                }
                Some(Value::Object(map))
            }
            FieldKind::Array => Some(Value::Array(Vec::new())),
            FieldKind::Boolean => Some(Value::Bool(false)),
            FieldKind::String => Some(first_enum().unwrap_or_else(|| Value::String(String::new()))),
            FieldKind::Number | FieldKind::Integer => {
                Some(first_enum().unwrap_or_else(|| Value::from(0)))
            }
            FieldKind::Button | FieldKind::Other(_) => None,
        }
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Field>) {
        out.push(self);
        for child in &self.children {
            child.collect(out);
        }
    }
}

/// Parsed top-level fields of a schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTree {
    pub fields: Vec<Field>,
    /// Fields skipped or degraded while parsing.
    pub warnings: Vec<SchemaWarning>,
}

impl FieldTree {
    /// Parse the `properties` of a root object schema.
    pub fn parse(schema: &Value) -> Result<Self, SchemaError> {
        if !schema.is_object() {
            return Err(SchemaError::NotAnObject {
                path: "root".to_string(),
                actual: type_name(schema).to_string(),
            });
        }
        let required = required_keys(schema);
        let mut fields = Vec::new();
        let mut warnings = Vec::new();
        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for (key, prop) in props {
                let required = required.iter().any(|r| r == key);
                fields.extend(Field::parse(key, key, prop, required, &mut warnings));
            }
        }
        Ok(FieldTree { fields, warnings })
    }

    /// Every field, depth first, parents before children.
    pub fn walk(&self) -> Vec<&Field> {
        let mut out = Vec::new();
        for field in &self.fields {
            field.collect(&mut out);
        }
        out
    }

    /// Look a field up by its dot path.
    pub fn get(&self, path: &str) -> Option<&Field> {
        self.walk().into_iter().find(|f| f.path == path)
    }

    /// Distinct action names referenced by buttons and async selects.
    pub fn actions(&self) -> Vec<String> {
        let mut actions: Vec<String> = Vec::new();
        for field in self.walk() {
            let action = match &field.role {
                FieldRole::Button(spec) if spec.action != UNKNOWN_ACTION => &spec.action,
                FieldRole::AsyncSelect(desc) => &desc.action,
                _ => continue,
            };
            if !actions.contains(action) {
                actions.push(action.clone());
            }
        }
        actions
    }

    /// Default form value built from every field's default.
    pub fn defaults(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for field in &self.fields {
            if let Some(v) = field.default_value() {
                map.insert(field.key.clone(), v);
            }
        }
        map
    }
}

/// Action bound to buttons that declare neither async action nor format.
pub const UNKNOWN_ACTION: &str = "unknown";

const DEFAULT_BUTTON_LABEL: &str = "Button";

fn resolve_button(title: Option<&str>, format: Option<&str>, async_desc: Option<&Value>) -> ButtonSpec {
    if let Some(action) = async_desc
        .and_then(|a| a.get("action"))
        .and_then(Value::as_str)
    {
        let label = async_desc
            .and_then(|a| a.get("label"))
            .and_then(Value::as_str)
            .or(title)
            .unwrap_or(DEFAULT_BUTTON_LABEL);
        return ButtonSpec {
            action: action.to_string(),
            label: label.to_string(),
            format: format.map(str::to_string),
        };
    }

    if let Some(format) = format.filter(|f| !f.is_empty()) {
        return ButtonSpec {
            action: crate::schema::normalize::format_to_action(format),
            label: crate::schema::normalize::format_to_label(format),
            format: Some(format.to_string()),
        };
    }

    ButtonSpec {
        action: UNKNOWN_ACTION.to_string(),
        label: title.unwrap_or(DEFAULT_BUTTON_LABEL).to_string(),
        format: None,
    }
}

/// Keys listed in an object schema's `required` array.
pub(crate) fn required_keys(schema: &Value) -> Vec<String> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// String form of a JSON value, without quotes for strings.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_async_select_role() {
        let prop = json!({
            "type": "string",
            "format": "select",
            "options": {
                "async": {
                    "action": "listTables",
                    "autoload": ["parameters.base_id", "parameters.api_key"]
                }
            }
        });
        let field = Field::parse("table", "table", &prop, false, &mut Vec::new()).unwrap();
        let FieldRole::AsyncSelect(desc) = &field.role else {
            panic!("expected async select, got {:?}", field.role);
        };
        assert_eq!(desc.action, "listTables");
        assert!(desc.autoload.on_mount());
        assert_eq!(desc.autoload.watched_fields(), vec!["base_id", "api_key"]);
        assert_eq!(desc.trigger_label(), "Load Options");
    }

    #[test]
    fn test_async_without_action_degrades_to_plain() {
        let prop = json!({"type": "string", "format": "select", "options": {"async": {"autoload": true}}});
        let mut warnings = Vec::new();
        let field = Field::parse("table", "table", &prop, false, &mut warnings).unwrap();
        assert_eq!(field.role, FieldRole::Plain);
        assert_eq!(
            warnings,
            vec![SchemaWarning::InvalidField {
                path: "table".to_string(),
                reason: "async descriptor has no action".to_string(),
            }]
        );
    }

    #[test]
    fn test_malformed_autoload_falls_back_to_manual() {
        let prop = json!({
            "type": "string",
            "format": "select",
            "options": {"async": {"action": "listTables", "autoload": "yes"}}
        });
        let mut warnings = Vec::new();
        let field = Field::parse("table", "table", &prop, false, &mut warnings).unwrap();
        let FieldRole::AsyncSelect(desc) = &field.role else {
            panic!("expected async select, got {:?}", field.role);
        };
        assert_eq!(desc.action, "listTables");
        assert_eq!(desc.autoload, Autoload::Off);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_non_object_subschema_is_skipped() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": {"type": "string"},
                "b": true,
                "nested": {"type": "object", "properties": {"c": false, "d": {"type": "integer"}}}
            }
        });
        let tree = FieldTree::parse(&schema).unwrap();
        let paths: Vec<&str> = tree.walk().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "nested", "nested.d"]);
        assert_eq!(tree.warnings.len(), 2);
        assert!(tree.warnings[0].to_string().contains("got boolean"));
    }

    #[test]
    fn test_autoload_shapes() {
        assert_eq!(Autoload::parse(None).unwrap(), Autoload::Off);
        assert_eq!(Autoload::parse(Some(&json!(false))).unwrap(), Autoload::Off);
        assert_eq!(Autoload::parse(Some(&json!([]))).unwrap(), Autoload::Off);
        assert_eq!(Autoload::parse(Some(&json!(true))).unwrap(), Autoload::OnMount);
        assert!(Autoload::parse(Some(&json!("yes"))).is_err());
        assert!(Autoload::parse(Some(&json!([1]))).is_err());
    }

    #[test]
    fn test_required_from_parent_and_flag() {
        let schema = json!({
            "type": "object",
            "required": ["a"],
            "properties": {
                "a": {"type": "string"},
                "b": {"type": "string", "required": true},
                "c": {"type": "string"}
            }
        });
        let tree = FieldTree::parse(&schema).unwrap();
        let required: Vec<bool> = tree.fields.iter().map(|f| f.required).collect();
        assert_eq!(required, vec![true, true, false]);
    }

    #[test]
    fn test_nested_paths_and_actions() {
        let schema = json!({
            "type": "object",
            "properties": {
                "auth": {
                    "type": "object",
                    "properties": {
                        "token": {"type": "string"},
                        "check": {"type": "button", "format": "test-connection"}
                    }
                },
                "table": {
                    "type": "string",
                    "format": "select",
                    "options": {"async": {"action": "listTables"}}
                }
            }
        });
        let tree = FieldTree::parse(&schema).unwrap();
        let paths: Vec<&str> = tree.walk().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["auth", "auth.token", "auth.check", "table"]);
        assert_eq!(tree.actions(), vec!["testConnection", "listTables"]);
        assert!(tree.get("auth.check").is_some());
    }

    #[test]
    fn test_defaults_skip_buttons() {
        let schema = json!({
            "type": "object",
            "properties": {
                "mode": {"type": "string", "enum": ["full", "incremental"]},
                "limit": {"type": "integer", "default": 100},
                "debug": {"type": "boolean"},
                "run": {"type": "button", "format": "run"}
            }
        });
        let tree = FieldTree::parse(&schema).unwrap();
        assert_eq!(
            Value::Object(tree.defaults()),
            json!({"mode": "full", "limit": 100, "debug": false})
        );
    }

    #[test]
    fn test_non_object_root() {
        assert!(matches!(
            FieldTree::parse(&json!([1, 2])),
            Err(SchemaError::NotAnObject { .. })
        ));
    }
}
