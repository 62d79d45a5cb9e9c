use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Why a dispatch (or a component lookup) failed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No component root could be located.
    #[error("could not find a component_config/ folder from {}", .0.display())]
    PathResolution(PathBuf),

    /// A required backend file or directory is absent.
    #[error("{0}")]
    NotFound(String),

    #[error("Unknown action: {action} (tried: {})", .tried.join(", "))]
    UnknownAction { action: String, tried: Vec<String> },

    /// The backend unit failed while loading or running an action.
    #[error("{message}")]
    BackendFault { message: String, trace: String },

    #[error("failed to write {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file} not found in {}", .dir.display())]
    SchemaMissing { file: &'static str, dir: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DispatchError {
    /// Fault carrying the full `anyhow` chain (and backtrace, when captured).
    pub fn fault(err: &anyhow::Error) -> Self {
        DispatchError::BackendFault {
            message: err.to_string(),
            trace: format!("{err:?}"),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PathResolution(_) => "pathResolutionFailed",
            Self::NotFound(_) => "notFound",
            Self::UnknownAction { .. } => "unknownAction",
            Self::BackendFault { .. } => "backendFault",
            Self::Persist { .. } => "persistFailed",
            Self::SchemaMissing { .. } => "schemaMissing",
            Self::Io(_) | Self::Json(_) => "internal",
        }
    }

    /// HTTP status used when the failure is returned over the wire.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnknownAction { .. } => 400,
            _ => 500,
        }
    }
}

/// Wire form of a failed dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchFailure {
    /// Always `"error"`.
    pub status: String,
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

impl From<&DispatchError> for DispatchFailure {
    fn from(err: &DispatchError) -> Self {
        DispatchFailure {
            status: "error".to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
            traceback: match err {
                DispatchError::BackendFault { trace, .. } => Some(trace.clone()),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_action_message() {
        let err = DispatchError::UnknownAction {
            action: "doesNotExist".into(),
            tried: vec!["doesNotExist".into(), "does_not_exist".into(), "doesNotExist".into()],
        };
        assert_eq!(
            err.to_string(),
            "Unknown action: doesNotExist (tried: doesNotExist, does_not_exist, doesNotExist)"
        );
        assert_eq!(err.status_code(), 400);

        let failure = DispatchFailure::from(&err);
        assert_eq!(failure.status, "error");
        assert_eq!(failure.kind, "unknownAction");
        assert!(failure.traceback.is_none());
    }

    #[test]
    fn test_fault_keeps_chain() {
        let err = anyhow::anyhow!("socket closed").context("listing tables");
        let fault = DispatchError::fault(&err);
        assert_eq!(fault.to_string(), "listing tables");
        let failure = DispatchFailure::from(&fault);
        assert!(failure.traceback.unwrap().contains("socket closed"));
        assert_eq!(fault.status_code(), 500);
    }
}
