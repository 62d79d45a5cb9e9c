//! Tester settings.
//!
//! Settings are read from `.schema-tester.toml` in the component root (or a
//! file given with `--config`). Every field is optional.
//!
//! ```toml
//! interpreter = "${componentRoot}/.venv/bin/python"
//! entry = "component.py"
//! debounce_ms = 1000
//! port = 8000
//! actions = ["testConnection"]
//!
//! [env]
//! KBC_STACKID = "connection.keboola.com"
//! ```

use std::{collections::HashMap, path::Path};

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default settings file name, looked up in the component root.
pub const SETTINGS_FILE: &str = ".schema-tester.toml";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TesterSettings {
    /// Program that runs the component entry file.
    pub interpreter: String,
    /// Entry file under `src/`.
    pub entry: String,
    /// Quiet period in milliseconds before a watched change reloads options.
    pub debounce_ms: u64,
    /// Address the server binds to.
    pub host: String,
    pub port: u16,
    /// Actions served in addition to those named by the schemas.
    pub actions: Vec<String>,
    /// Extra environment for action processes. `${componentRoot}` is expanded.
    pub env: HashMap<String, String>,
}

impl Default for TesterSettings {
    fn default() -> Self {
        TesterSettings {
            interpreter: "python3".to_string(),
            entry: schemaform::dispatch::DEFAULT_ENTRY_FILE.to_string(),
            debounce_ms: 1000,
            host: "0.0.0.0".to_string(),
            port: 8000,
            actions: Vec::new(),
            env: HashMap::new(),
        }
    }
}

impl TesterSettings {
    /// Read settings from `path`; defaults when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("can not read {}", path.display()))?;
        let settings = toml::from_str(&content)
            .with_context(|| format!("invalid settings file {}", path.display()))?;
        Ok(settings)
    }

    /// JSON schema of the settings file.
    pub fn json_schema() -> anyhow::Result<String> {
        let schema = schemars::schema_for!(TesterSettings);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "port = 9000\nactions = [\"listTables\"]\n").unwrap();

        let settings = TesterSettings::load(&path).unwrap();
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.interpreter, "python3");
        assert_eq!(settings.actions, vec!["listTables"]);
    }

    #[test]
    fn test_missing_file_is_default() {
        let settings = TesterSettings::load(Path::new("/no/such/.schema-tester.toml")).unwrap();
        assert_eq!(settings, TesterSettings::default());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "prot = 1\n").unwrap();
        assert!(TesterSettings::load(&path).is_err());
    }

    #[test]
    fn test_schema_mentions_fields() {
        let schema = TesterSettings::json_schema().unwrap();
        assert!(schema.contains("interpreter"));
        assert!(schema.contains("debounce_ms"));
    }
}
