//! Server-side action dispatch.
//!
//! A [`Dispatcher`] takes a [`DispatchRequest`](crate::transport::DispatchRequest),
//! resolves the component root, persists the call's parameters to
//! `data/config.json` and runs the matching handler of the root's
//! [`BackendUnit`].

/// The dispatch pipeline.
pub mod dispatcher;

/// Dispatch failures and their wire form.
pub mod error;

/// Action name variants.
pub mod naming;

/// Backend unit plugin interface.
pub mod plugin;

/// Named action handlers.
pub mod registry;

/// Component directory layout.
pub mod root;

pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatchFailure};
pub use plugin::{BackendUnit, DEFAULT_ENTRY_FILE, UnitLoader};
pub use registry::{ActionContext, ActionHandler, ActionRegistry};
pub use root::{ComponentRoot, PersistedConfig};
