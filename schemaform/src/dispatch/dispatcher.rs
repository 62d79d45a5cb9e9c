use std::{
    any::Any,
    collections::HashMap,
    panic::AssertUnwindSafe,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use futures::FutureExt;
use log::{debug, error, info};
use serde_json::Value;

use crate::{
    dispatch::{
        ActionContext, ActionRegistry, BackendUnit, ComponentRoot, DispatchError, UnitLoader,
    },
    form::lock,
    transport::DispatchRequest,
};

struct LoadedUnit {
    unit: Box<dyn BackendUnit>,
    registry: ActionRegistry,
}

/// Loaded unit of one root; the async lock also serializes its dispatches.
type Slot = Arc<tokio::sync::Mutex<Option<LoadedUnit>>>;

/// Runs actions against component backends.
///
/// Each dispatch persists its parameters, then invokes the resolved handler
/// to completion. Dispatches to the same root run one at a time; different
/// roots proceed independently.
pub struct Dispatcher {
    default_root: Option<ComponentRoot>,
    loader: Arc<dyn UnitLoader>,
    slots: Mutex<HashMap<PathBuf, Slot>>,
}

impl Dispatcher {
    pub fn new(default_root: Option<ComponentRoot>, loader: impl UnitLoader + 'static) -> Self {
        Dispatcher {
            default_root,
            loader: Arc::new(loader),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_root(&self) -> Option<&ComponentRoot> {
        self.default_root.as_ref()
    }

    fn slot(&self, root: &ComponentRoot) -> Slot {
        lock(&self.slots)
            .entry(root.path().to_path_buf())
            .or_default()
            .clone()
    }

    pub async fn dispatch(&self, request: DispatchRequest) -> Result<Value, DispatchError> {
        let root = ComponentRoot::resolve_override(
            self.default_root.as_ref(),
            request.component_path.as_deref(),
        )?;
        let slot = self.slot(&root);
        let mut guard = slot.lock().await;

        root.write_parameters(&request.parameters).await?;

        let src = root.src_dir();
        if !src.is_dir() {
            return Err(DispatchError::NotFound(format!(
                "src/ directory not found in {root}"
            )));
        }
        let entry = self.loader.entry_file();
        if !src.join(entry).exists() {
            return Err(DispatchError::NotFound(format!(
                "{entry} not found in {}",
                src.display()
            )));
        }

        let loaded = match guard.take() {
            Some(loaded) => loaded,
            None => self.load(&root).await?,
        };
        let result = invoke(&loaded.registry, &root, &request.action).await;
        *guard = Some(loaded);

        match &result {
            Ok(_) => debug!("{} on {root}: ok", request.action),
            Err(e) => error!("{} on {root}: {e}", request.action),
        }
        result
    }

    async fn load(&self, root: &ComponentRoot) -> Result<LoadedUnit, DispatchError> {
        let mut unit = self
            .loader
            .load(root)
            .map_err(|e| DispatchError::fault(&e))?;
        unit.init(root).await.map_err(|e| DispatchError::fault(&e))?;

        let mut registry = ActionRegistry::new();
        unit.register(&mut registry);
        info!(
            "loaded backend unit {} for {root} ({} actions)",
            unit.name(),
            registry.len()
        );
        Ok(LoadedUnit { unit, registry })
    }

    /// Tear down every loaded unit.
    pub async fn shutdown(&self) {
        let slots: Vec<Slot> = lock(&self.slots).drain().map(|(_, slot)| slot).collect();
        for slot in slots {
            let Some(mut loaded) = slot.lock().await.take() else {
                continue;
            };
            match loaded.unit.teardown().await {
                Ok(()) => info!("backend unit {} stopped", loaded.unit.name()),
                Err(e) => error!("backend unit {} teardown failed: {e:?}", loaded.unit.name()),
            }
        }
    }
}

async fn invoke(
    registry: &ActionRegistry,
    root: &ComponentRoot,
    action: &str,
) -> Result<Value, DispatchError> {
    let (name, handler) = registry.resolve(action)?;
    debug!("action {action} resolved to {name}");
    let ctx = ActionContext {
        root: root.path().to_path_buf(),
        data_dir: root.data_dir(),
        config_path: root.config_path(),
        action: action.to_string(),
    };

    let future = std::panic::catch_unwind(AssertUnwindSafe(|| handler(ctx)))
        .map_err(|payload| panic_fault(&name, payload))?;
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result.map_err(|e| DispatchError::fault(&e)),
        Err(payload) => Err(panic_fault(&name, payload)),
    }
}

fn panic_fault(name: &str, payload: Box<dyn Any + Send>) -> DispatchError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    DispatchError::BackendFault {
        trace: format!("handler {name} panicked: {message}"),
        message,
    }
}
