use std::{collections::BTreeMap, future::Future, path::PathBuf, sync::Arc};

use futures::future::BoxFuture;
use serde_json::Value;

use crate::dispatch::{DispatchError, naming::name_variants};

/// Environment of one action invocation.
///
/// Handlers take no arguments beyond this: the parameters for the call have
/// already been written to `config_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionContext {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
    /// The action name as requested.
    pub action: String,
}

pub type ActionHandler = Arc<dyn Fn(ActionContext) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Named handlers exposed by a backend unit.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: BTreeMap<String, ActionHandler>,
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous one.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let handler: ActionHandler = Arc::new(move |ctx| Box::pin(handler(ctx)));
        self.handlers.insert(name.into(), handler);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Find the handler for `action`, trying every name variant in order.
    ///
    /// Returns the matched name along with the handler.
    pub fn resolve(&self, action: &str) -> Result<(String, ActionHandler), DispatchError> {
        let tried = name_variants(action);
        for name in &tried {
            if let Some(handler) = self.handlers.get(name) {
                return Ok((name.clone(), handler.clone()));
            }
        }
        Err(DispatchError::UnknownAction {
            action: action.to_string(),
            tried: tried.to_vec(),
        })
    }
}
