//! Component directory layout and persisted configuration.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{dispatch::DispatchError, schema::SchemaPair};

pub const COMPONENT_CONFIG_DIR: &str = "component_config";
pub const COMPONENT_SCHEMA_FILE: &str = "configSchema.json";
pub const ROW_SCHEMA_FILE: &str = "configRowSchema.json";
pub const DATA_DIR: &str = "data";
pub const CONFIG_FILE: &str = "config.json";
pub const SRC_DIR: &str = "src";
/// Environment variable pointing backend processes at the data directory.
pub const DATA_DIR_ENV: &str = "KBC_DATADIR";

/// Parent directories inspected by [`ComponentRoot::discover`].
pub const MAX_DISCOVERY_DEPTH: usize = 10;

/// Persisted configuration document, `data/config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedConfig {
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// A component project: the directory holding `component_config/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentRoot {
    path: PathBuf,
}

impl std::fmt::Display for ComponentRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl ComponentRoot {
    /// Use `path` as a root without checking its layout.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ComponentRoot { path: path.into() }
    }

    /// Walk upward from `start` until a directory containing
    /// `component_config/` is found.
    pub fn discover(start: &Path) -> Option<Self> {
        let start = std::path::absolute(start).unwrap_or_else(|_| start.to_path_buf());
        let mut current = Some(start.as_path());
        for _ in 0..MAX_DISCOVERY_DEPTH {
            let dir = current?;
            if dir.join(COMPONENT_CONFIG_DIR).exists() {
                debug!("component root discovered at {}", dir.display());
                return Some(ComponentRoot::new(dir));
            }
            current = dir.parent();
        }
        None
    }

    /// Resolve a user-supplied path: the `component_config` folder itself,
    /// a root containing it, or anything below a root.
    pub fn resolve_arg(arg: &Path) -> Result<Self, DispatchError> {
        let path = std::path::absolute(arg)?;
        if path.file_name().is_some_and(|n| n == COMPONENT_CONFIG_DIR)
            && path.is_dir()
            && let Some(parent) = path.parent()
        {
            return Ok(ComponentRoot::new(parent));
        }
        if path.join(COMPONENT_CONFIG_DIR).exists() {
            return Ok(ComponentRoot::new(path));
        }
        Self::discover(&path).ok_or(DispatchError::PathResolution(path))
    }

    /// Root for a dispatch carrying an optional `componentPath`.
    ///
    /// A directory override is honored as given even without
    /// `component_config/`; anything else falls back to `default`.
    pub fn resolve_override(
        default: Option<&ComponentRoot>,
        component_path: Option<&str>,
    ) -> Result<Self, DispatchError> {
        if let Some(raw) = component_path.filter(|p| !p.is_empty()) {
            let path = PathBuf::from(raw);
            if path.is_dir() {
                if path.file_name().is_some_and(|n| n == COMPONENT_CONFIG_DIR)
                    && let Some(parent) = path.parent()
                {
                    return Ok(ComponentRoot::new(parent));
                }
                return Ok(ComponentRoot::new(path));
            }
            debug!("componentPath {raw} is not a directory, using the default root");
        }
        default
            .cloned()
            .ok_or_else(|| DispatchError::PathResolution(component_path.unwrap_or("").into()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config_dir(&self) -> PathBuf {
        self.path.join(COMPONENT_CONFIG_DIR)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.path.join(DATA_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir().join(CONFIG_FILE)
    }

    pub fn src_dir(&self) -> PathBuf {
        self.path.join(SRC_DIR)
    }

    /// `data/config.json`, if it exists.
    pub fn existing_config(&self) -> Option<PathBuf> {
        let path = self.config_path();
        path.exists().then_some(path)
    }

    /// Name of the component: the root directory's name.
    pub fn component_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Both schema files must exist.
    pub fn check_schemas(&self) -> Result<(), DispatchError> {
        let dir = self.config_dir();
        for file in [COMPONENT_SCHEMA_FILE, ROW_SCHEMA_FILE] {
            if !dir.join(file).exists() {
                return Err(DispatchError::SchemaMissing { file, dir });
            }
        }
        Ok(())
    }

    /// Overwrite `data/config.json` with `{parameters}`.
    pub async fn write_parameters(&self, parameters: &Map<String, Value>) -> Result<PathBuf, DispatchError> {
        let data_dir = self.data_dir();
        let path = self.config_path();
        let persist = |source| DispatchError::Persist {
            path: path.clone(),
            source,
        };
        tokio::fs::create_dir_all(&data_dir).await.map_err(persist)?;

        let document = PersistedConfig {
            parameters: parameters.clone(),
        };
        let content = serde_json::to_string_pretty(&document)?;
        tokio::fs::write(&path, content).await.map_err(persist)?;
        debug!("wrote {}", path.display());
        Ok(path)
    }
}

/// Load both schema documents from a `component_config/` folder.
pub async fn load_schemas(config_dir: &Path) -> Result<SchemaPair, DispatchError> {
    if !config_dir.is_dir() {
        return Err(DispatchError::NotFound(format!(
            "Component config folder not found: {}",
            config_dir.display()
        )));
    }
    let mut documents = Vec::with_capacity(2);
    for file in [COMPONENT_SCHEMA_FILE, ROW_SCHEMA_FILE] {
        let path = config_dir.join(file);
        if !path.exists() {
            return Err(DispatchError::SchemaMissing {
                file,
                dir: config_dir.to_path_buf(),
            });
        }
        let content = tokio::fs::read_to_string(&path).await?;
        documents.push(serde_json::from_str::<Value>(&content)?);
    }
    let row_schema = documents.pop().unwrap_or_default();
    let component_schema = documents.pop().unwrap_or_default();
    Ok(SchemaPair {
        component_schema,
        row_schema,
    })
}

/// Parameters of a persisted config file; empty when absent or unreadable.
pub async fn read_parameters(path: &Path) -> Map<String, Value> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(_) => return Map::new(),
    };
    match serde_json::from_str::<PersistedConfig>(&content) {
        Ok(config) => config.parameters,
        Err(e) => {
            warn!("Could not read {}: {e}", path.display());
            Map::new()
        }
    }
}
