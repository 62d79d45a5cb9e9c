//! Asynchronously populated select fields.
//!
//! Each async field runs a small state machine: `Idle -> Loading ->
//! Populated | Error`, re-entered on every trigger. Triggers are a manual
//! click, mount-time autoload, or a debounced change of a watched field.
//! Loads are never cancelled and never sequenced: when two overlap, the one
//! resolving last decides the option set.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use log::debug;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::{form::lock, schema::field::display_string};

/// Quiet period after the last watched change before a reload fires.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

/// Caption of the empty choice offered by optional selects.
pub const PLACEHOLDER_LABEL: &str = "-- Select --";

/// One selectable choice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub value: Value,
    pub label: String,
}

impl SelectOption {
    fn placeholder() -> Self {
        SelectOption {
            value: Value::String(String::new()),
            label: PLACEHOLDER_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "camelCase")]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Error(String),
    Populated,
}

/// Live state of one async select.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncFieldState {
    pub status: LoadStatus,
    /// Control accepts input.
    pub enabled: bool,
    /// Control opacity; dimmed while loading.
    pub opacity: f32,
    pub options: Vec<SelectOption>,
    /// Loads currently awaiting a response.
    pub in_flight: usize,
}

impl AsyncFieldState {
    /// Initial state, seeded from the schema's static enum.
    pub fn new(enum_values: &[Value], enum_titles: Option<&[String]>) -> Self {
        let options = enum_values
            .iter()
            .enumerate()
            .map(|(i, v)| SelectOption {
                value: v.clone(),
                label: enum_titles
                    .and_then(|t| t.get(i).cloned())
                    .unwrap_or_else(|| display_string(v)),
            })
            .collect();
        AsyncFieldState {
            status: LoadStatus::Idle,
            enabled: true,
            opacity: 1.0,
            options,
            in_flight: 0,
        }
    }

    pub(crate) fn begin(&mut self) {
        self.status = LoadStatus::Loading;
        self.enabled = false;
        self.opacity = 0.6;
        self.in_flight += 1;
    }

    /// Apply a load outcome. The control is re-enabled either way.
    pub(crate) fn finish(&mut self, outcome: Result<Vec<SelectOption>, String>, required: bool) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.enabled = true;
        self.opacity = 1.0;
        match outcome {
            Ok(options) => {
                self.options = with_placeholder(options, required);
                self.status = LoadStatus::Populated;
            }
            Err(reason) => self.status = LoadStatus::Error(reason),
        }
    }
}

/// Extract options from an action result.
///
/// Accepts a bare array, `{"options": [...]}` or `{"data": [...]}`. Elements
/// are `{value, label}` objects or bare scalars labelled by their string
/// form. A result carrying `"status": "error"` is a failure.
pub fn parse_options(result: &Value) -> Result<Vec<SelectOption>, String> {
    if result.get("status").and_then(Value::as_str) == Some("error") {
        return Err(result
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| result.to_string()));
    }

    let items = match result {
        Value::Array(items) => items,
        Value::Object(obj) => match (obj.get("options"), obj.get("data")) {
            (Some(Value::Array(items)), _) | (_, Some(Value::Array(items))) => items,
            _ => return Err("response contains no options".to_string()),
        },
        other => return Err(format!("unexpected response: {other}")),
    };

    Ok(items
        .iter()
        .map(|item| match item {
            Value::Object(obj) => {
                let value = obj.get("value").cloned().unwrap_or(Value::Null);
                let label = obj
                    .get("label")
                    .map(display_string)
                    .unwrap_or_else(|| display_string(&value));
                SelectOption { value, label }
            }
            scalar => SelectOption {
                value: scalar.clone(),
                label: display_string(scalar),
            },
        })
        .collect())
}

/// Prepend the empty choice unless the field is required.
pub fn with_placeholder(options: Vec<SelectOption>, required: bool) -> Vec<SelectOption> {
    if required {
        return options;
    }
    let mut all = Vec::with_capacity(options.len() + 1);
    all.push(SelectOption::placeholder());
    all.extend(options);
    all
}

/// Debounce key: (async field, watched field).
pub type DebounceKey = (String, String);

/// Trailing-edge debouncer keyed by (field, watched field).
///
/// Every schedule supersedes the pending one for the same key; only the last
/// call in a window runs. Superseded timers are retired rather than aborted,
/// so a callback that already started is never cut short.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    generations: Arc<Mutex<HashMap<DebounceKey, u64>>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Debouncer {
            window,
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `callback` after the window unless rescheduled in the meantime.
    pub fn schedule<F>(&self, key: DebounceKey, callback: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = {
            let mut generations = lock(&self.generations);
            let counter = generations.entry(key.clone()).or_insert(0);
            *counter += 1;
            *counter
        };

        let generations = self.generations.clone();
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let latest = lock(&generations).get(&key).copied();
            if latest == Some(generation) {
                callback.await;
            } else {
                debug!("debounced callback for {key:?} superseded");
            }
        })
    }
}
