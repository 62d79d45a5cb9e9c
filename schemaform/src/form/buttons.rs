//! Action buttons declared as `type: button` fields.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::form::{EditorRole, merge::combine, notice::Notice};

/// A bound action trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionButton {
    pub path: String,
    pub action: String,
    pub label: String,
    pub owner: EditorRole,
    pub busy: bool,
}

impl ActionButton {
    /// Caption shown on the trigger for the current state.
    pub fn caption(&self) -> String {
        if self.busy {
            format!("⏳ {}...", self.label)
        } else {
            format!("🔘 {}", self.label)
        }
    }
}

/// Parameters sent with a button press.
///
/// Buttons of the component editor only see component values; row buttons
/// see both, row values winning on collisions.
pub fn button_parameters(
    owner: EditorRole,
    component: &Map<String, Value>,
    row: &Map<String, Value>,
) -> Map<String, Value> {
    match owner {
        EditorRole::Component => component.clone(),
        EditorRole::Row => combine(component, row),
    }
}

/// What a press produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ButtonOutcome {
    /// The action answered with `status: success` or without a status.
    Succeeded { label: String, result: Value },
    /// The action answered with any other status.
    Failed { label: String, result: Value },
    /// The action could not be dispatched.
    Errored { label: String, reason: String },
}

impl ButtonOutcome {
    /// Classify an action result by its explicit status field.
    pub fn from_result(label: &str, result: Value) -> Self {
        match result.get("status").and_then(Value::as_str) {
            None | Some("success") => ButtonOutcome::Succeeded {
                label: label.to_string(),
                result,
            },
            Some(_) => ButtonOutcome::Failed {
                label: label.to_string(),
                result,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ButtonOutcome::Succeeded { .. })
    }

    /// Blocking notice reporting the outcome verbatim.
    pub fn notice(&self) -> Notice {
        match self {
            ButtonOutcome::Succeeded { label, result } => Notice::success(
                format!("{label} succeeded!"),
                serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string()),
            ),
            ButtonOutcome::Failed { label, result } => Notice::error(
                format!("{label} failed"),
                result
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string())
                    }),
            ),
            ButtonOutcome::Errored { label, reason } => {
                Notice::error(format!("{label} error"), reason.clone())
            }
        }
    }
}
