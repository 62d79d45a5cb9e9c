use serde_json::{Map, Value};

/// Current values of one editor, addressed by dot paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    values: Map<String, Value>,
}

impl FormState {
    pub fn new(values: Map<String, Value>) -> Self {
        FormState { values }
    }

    /// Value at a dot path (`auth.token`), if present.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.values.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Store a value at a dot path, creating intermediate objects.
    ///
    /// Returns whether the stored value changed.
    pub fn set(&mut self, path: &str, value: Value) -> bool {
        let mut parts: Vec<&str> = path.split('.').collect();
        let Some(last) = parts.pop() else {
            return false;
        };

        let mut map = &mut self.values;
        for part in parts {
            let entry = map
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            map = match entry {
                Value::Object(inner) => inner,
                _ => return false,
            };
        }

        if map.get(last) == Some(&value) {
            return false;
        }
        map.insert(last.to_string(), value);
        true
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn as_json(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

/// Whether a change at `changed` affects the value watched at `watched`.
///
/// Changing a parent object changes its children and the other way round.
pub fn path_touches(watched: &str, changed: &str) -> bool {
    watched == changed
        || watched
            .strip_prefix(changed)
            .is_some_and(|rest| rest.starts_with('.'))
        || changed
            .strip_prefix(watched)
            .is_some_and(|rest| rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_get_set() {
        let mut state = FormState::default();
        assert!(state.set("auth.token", json!("abc")));
        assert!(!state.set("auth.token", json!("abc")));
        assert_eq!(state.get("auth.token"), Some(&json!("abc")));
        assert_eq!(state.as_json(), json!({"auth": {"token": "abc"}}));
        assert_eq!(state.get("auth.missing"), None);
        assert_eq!(state.get("auth.token.deeper"), None);
    }

    #[test]
    fn test_path_touches() {
        assert!(path_touches("a", "a"));
        assert!(path_touches("a.b", "a"));
        assert!(path_touches("a", "a.b"));
        assert!(!path_touches("ab", "a"));
        assert!(!path_touches("a.b", "a.c"));
    }
}
