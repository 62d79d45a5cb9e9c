//! Headless form engine.
//!
//! A [`FormSession`] drives two [`FormEditor`]s (component and row) over an
//! [`ActionTransport`](crate::transport::ActionTransport). Everything a
//! browser front-end would render (visibility, option lists, button states,
//! serialized output) is kept here as plain data.

/// Action buttons.
pub mod buttons;

/// Visibility dependencies.
pub mod deps;

/// One editor bound to one schema.
pub mod editor;

/// Async option loading and debouncing.
pub mod loader;

/// Combining and splitting editor values.
pub mod merge;

/// User-facing notices.
pub mod notice;

/// The two-editor session.
pub mod session;

/// Dot-path value storage.
pub mod state;

use std::sync::{Mutex, MutexGuard};

pub use buttons::{ActionButton, ButtonOutcome};
pub use editor::{Change, EditorRole, FormEditor};
pub use loader::{AsyncFieldState, Debouncer, LoadStatus, SelectOption};
pub use merge::{CombinedOutput, EditorOutput, SessionOutput};
pub use notice::{Notice, NoticeLevel};
pub use session::{FormSession, SessionOptions};
pub use state::FormState;

/// Errors from driving the form engine.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// No field of the expected kind lives at `path`.
    #[error("no {kind} at `{path}` in the {role} editor")]
    NoSuchField {
        role: EditorRole,
        path: String,
        kind: &'static str,
    },
    #[error(transparent)]
    Schema(#[from] crate::schema::SchemaError),
}

/// Lock a mutex, recovering the data from a poisoned lock.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
