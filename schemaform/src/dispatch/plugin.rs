//! Backend unit plugin interface.

use async_trait::async_trait;

use crate::dispatch::{ActionRegistry, ComponentRoot};

/// Entry file expected under `src/` unless a loader says otherwise.
pub const DEFAULT_ENTRY_FILE: &str = "component.py";

/// The object exposing a component's named actions.
///
/// Loaded once per component root, on the first dispatch that needs it, and
/// kept until the dispatcher shuts down.
#[async_trait]
pub trait BackendUnit: Send + Sync {
    fn name(&self) -> &str;

    /// Prepare the unit for `root`. Runs once, before [`register`](Self::register).
    async fn init(&mut self, _root: &ComponentRoot) -> anyhow::Result<()> {
        Ok(())
    }

    /// Add every action this unit serves.
    fn register(&self, registry: &mut ActionRegistry);

    async fn teardown(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Creates the backend unit for a component root.
pub trait UnitLoader: Send + Sync {
    /// File under `src/` that must exist before the unit is loaded.
    fn entry_file(&self) -> &str {
        DEFAULT_ENTRY_FILE
    }

    fn load(&self, root: &ComponentRoot) -> anyhow::Result<Box<dyn BackendUnit>>;
}

impl<F> UnitLoader for F
where
    F: Fn(&ComponentRoot) -> anyhow::Result<Box<dyn BackendUnit>> + Send + Sync,
{
    fn load(&self, root: &ComponentRoot) -> anyhow::Result<Box<dyn BackendUnit>> {
        self(root)
    }
}
