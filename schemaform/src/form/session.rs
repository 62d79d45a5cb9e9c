use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use log::{debug, info, warn};
use serde_json::{Map, Value};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    form::{
        ButtonOutcome, Change, EditorRole, FormEditor, FormError, LoadStatus,
        buttons::button_parameters,
        lock,
        loader::{DEBOUNCE_WINDOW, Debouncer, parse_options},
        merge::{CombinedOutput, SessionOutput, combine, split},
        notice::Notice,
    },
    schema::{SchemaPair, ValidationIssue},
    transport::{ActionTransport, DispatchRequest},
};

/// Tunables of a [`FormSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Quiet period before a watched change reloads options.
    pub debounce: Duration,
    /// Component location forwarded with every dispatch.
    pub component_path: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            debounce: DEBOUNCE_WINDOW,
            component_path: None,
        }
    }
}

struct Inner {
    component: Mutex<FormEditor>,
    row: Mutex<FormEditor>,
    transport: Arc<dyn ActionTransport>,
    debouncer: Debouncer,
    options: SessionOptions,
    notices: Mutex<Vec<Notice>>,
    output: watch::Sender<SessionOutput>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

/// The component editor and the row editor, wired to an action transport.
///
/// Cheap to clone; clones share the same editors.
#[derive(Clone)]
pub struct FormSession {
    inner: Arc<Inner>,
}

impl FormSession {
    pub fn new(
        schemas: &SchemaPair,
        transport: Arc<dyn ActionTransport>,
        options: SessionOptions,
    ) -> Result<Self, FormError> {
        let component = FormEditor::new(EditorRole::Component, &schemas.component_schema)?;
        let row = FormEditor::new(EditorRole::Row, &schemas.row_schema)?;
        for warning in component.schema().warnings.iter().chain(&row.schema().warnings) {
            debug!("schema warning: {warning}");
        }

        let (output, _) = watch::channel(SessionOutput::default());
        let session = FormSession {
            inner: Arc::new(Inner {
                component: Mutex::new(component),
                row: Mutex::new(row),
                transport,
                debouncer: Debouncer::new(options.debounce),
                options,
                notices: Mutex::new(Vec::new()),
                output,
                pending: Mutex::new(Vec::new()),
            }),
        };
        session.publish();
        Ok(session)
    }

    fn editor(&self, role: EditorRole) -> &Mutex<FormEditor> {
        match role {
            EditorRole::Component => &self.inner.component,
            EditorRole::Row => &self.inner.row,
        }
    }

    /// Read access to one editor.
    pub fn inspect<R>(&self, role: EditorRole, f: impl FnOnce(&FormEditor) -> R) -> R {
        f(&lock(self.editor(role)))
    }

    /// Evaluate initial visibility and fire mount-time autoloads.
    pub fn mount(&self) {
        for role in [EditorRole::Component, EditorRole::Row] {
            let autoload = lock(self.editor(role)).mount();
            for path in autoload {
                debug!("{role} editor: autoloading `{path}`");
                let session = self.clone();
                self.track(tokio::spawn(async move {
                    let _ = session.load_options(role, &path).await;
                }));
            }
        }
        self.publish();
    }

    /// Pre-fill both editors from a persisted parameter set.
    pub fn prefill(&self, persisted: &Map<String, Value>) {
        let component_keys = lock(&self.inner.component).declared_keys();
        let row_keys = lock(&self.inner.row).declared_keys();
        let (component, row) = split(persisted, &component_keys, &row_keys);
        lock(&self.inner.component).set_values(&component);
        lock(&self.inner.row).set_values(&row);
        self.publish();
    }

    /// Replace both schemas, then pre-fill.
    pub fn reload(
        &self,
        schemas: &SchemaPair,
        persisted: &Map<String, Value>,
    ) -> Result<(), FormError> {
        let component = FormEditor::new(EditorRole::Component, &schemas.component_schema)?;
        let row = FormEditor::new(EditorRole::Row, &schemas.row_schema)?;
        *lock(&self.inner.component) = component;
        *lock(&self.inner.row) = row;
        info!("form reloaded");
        self.notify(Notice::info("Form reloaded"));
        self.prefill(persisted);
        Ok(())
    }

    /// Change a value and schedule the reloads it triggers.
    pub fn set_value(&self, role: EditorRole, path: &str, value: Value) -> Change {
        let change = lock(self.editor(role)).set_value(path, value);
        if !change.changed {
            return change;
        }

        for (field, watched) in &change.triggers {
            let session = self.clone();
            let field_path = field.clone();
            let key = (format!("{role}:{field}"), watched.clone());
            self.track(self.inner.debouncer.schedule(key, async move {
                let _ = session.load_options(role, &field_path).await;
            }));
        }
        self.publish();
        change
    }

    /// Run one load cycle for an async select.
    ///
    /// Load failures are not errors of this call: they leave the field in
    /// [`LoadStatus::Error`] and raise a notice.
    pub async fn load_options(&self, role: EditorRole, path: &str) -> Result<LoadStatus, FormError> {
        let (action, label) = {
            let mut editor = lock(self.editor(role));
            let label = editor
                .field(path)
                .map(|f| f.label().to_string())
                .unwrap_or_else(|| path.to_string());
            let action = editor.begin_load(path).ok_or_else(|| FormError::NoSuchField {
                role,
                path: path.to_string(),
                kind: "async select",
            })?;
            (action, label)
        };

        let request = DispatchRequest {
            action,
            parameters: self.parameters_for(role),
            component_path: self.inner.options.component_path.clone(),
        };
        debug!("loading options for `{path}` via {}", request.action);
        let outcome = match self.inner.transport.dispatch(request).await {
            Ok(result) => parse_options(&result),
            Err(e) => Err(e.to_string()),
        };

        if let Err(reason) = &outcome {
            warn!("failed to load options for {label}: {reason}");
            self.notify(Notice::error(
                format!("Failed to load options for {label}"),
                reason.clone(),
            ));
        }
        let status = lock(self.editor(role))
            .finish_load(path, outcome)
            .unwrap_or_default();
        Ok(status)
    }

    /// Invoke the action bound to a button.
    pub async fn press_button(&self, role: EditorRole, path: &str) -> Result<ButtonOutcome, FormError> {
        let button = {
            let mut editor = lock(self.editor(role));
            let button = editor.button(path).cloned().ok_or_else(|| FormError::NoSuchField {
                role,
                path: path.to_string(),
                kind: "button",
            })?;
            editor.set_busy(path, true);
            button
        };

        let parameters = {
            let component = lock(&self.inner.component).values().clone();
            let row = lock(&self.inner.row).values().clone();
            button_parameters(button.owner, &component, &row)
        };
        let request = DispatchRequest {
            action: button.action.clone(),
            parameters,
            component_path: self.inner.options.component_path.clone(),
        };
        info!("button {} -> {}", button.label, button.action);
        let outcome = match self.inner.transport.dispatch(request).await {
            Ok(result) => ButtonOutcome::from_result(&button.label, result),
            Err(e) => ButtonOutcome::Errored {
                label: button.label.clone(),
                reason: e.to_string(),
            },
        };

        lock(self.editor(role)).set_busy(path, false);
        self.notify(outcome.notice());
        Ok(outcome)
    }

    /// Parameters sent with a load: component state under the editor's own.
    fn parameters_for(&self, role: EditorRole) -> Map<String, Value> {
        let component = lock(&self.inner.component).values().clone();
        match role {
            EditorRole::Component => component,
            EditorRole::Row => combine(&component, lock(&self.inner.row).values()),
        }
    }

    pub fn validate(&self, role: EditorRole) -> Vec<ValidationIssue> {
        lock(self.editor(role)).validate()
    }

    /// Current serialized output of both editors and the combined document.
    pub fn output(&self) -> SessionOutput {
        let component = lock(&self.inner.component).output();
        let row = lock(&self.inner.row).output();
        let parameters = match (&component.value, &row.value) {
            (Value::Object(c), Value::Object(r)) => combine(c, r),
            _ => Map::new(),
        };
        SessionOutput {
            component,
            row,
            combined: CombinedOutput { parameters },
        }
    }

    /// Receive the output every time it is recomputed.
    pub fn subscribe(&self) -> watch::Receiver<SessionOutput> {
        self.inner.output.subscribe()
    }

    fn publish(&self) {
        self.inner.output.send_replace(self.output());
    }

    fn notify(&self, notice: Notice) {
        lock(&self.inner.notices).push(notice);
    }

    /// Take the notices raised so far.
    pub fn drain_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut *lock(&self.inner.notices))
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut pending = lock(&self.inner.pending);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait for every scheduled load, including pending debounce timers.
    pub async fn settle(&self) {
        loop {
            let handles = std::mem::take(&mut *lock(&self.inner.pending));
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("background load task failed: {e}");
                }
            }
        }
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{form::NoticeLevel, transport::TransportError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use serde_json::json;

    type Responder = Box<dyn Fn(&DispatchRequest) -> Result<Value, TransportError> + Send + Sync>;

    struct FakeTransport {
        calls: Mutex<Vec<DispatchRequest>>,
        respond: Responder,
    }

    impl FakeTransport {
        fn new(
            respond: impl Fn(&DispatchRequest) -> Result<Value, TransportError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(FakeTransport {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        fn calls(&self) -> Vec<DispatchRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ActionTransport for FakeTransport {
        async fn dispatch(&self, request: DispatchRequest) -> Result<Value, TransportError> {
            let result = (self.respond)(&request);
            self.calls.lock().unwrap().push(request);
            result
        }
    }

    fn schemas() -> SchemaPair {
        SchemaPair {
            component_schema: json!({
                "type": "object",
                "properties": {
                    "token": {"type": "string"},
                    "check": {"type": "button", "format": "test-connection"}
                }
            }),
            row_schema: json!({
                "type": "object",
                "properties": {
                    "base_id": {"type": "string"},
                    "table": {
                        "type": "string",
                        "format": "select",
                        "required": true,
                        "options": {
                            "async": {"action": "listTables", "autoload": ["parameters.base_id"]}
                        }
                    },
                    "mode": {"type": "string", "enum": ["full", "incremental"]},
                    "key": {
                        "type": "string",
                        "options": {"dependencies": {"mode": "incremental"}}
                    },
                    "preview": {
                        "type": "button",
                        "options": {"async": {"action": "previewRows", "label": "Preview"}}
                    }
                }
            }),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_changes_debounce_to_one_load() {
        let transport = FakeTransport::new(|_| Ok(json!(["t1", "t2"])));
        let session = FormSession::new(&schemas(), transport.clone(), SessionOptions::default()).unwrap();

        for id in ["a", "ab", "abc", "abcd"] {
            session.set_value(EditorRole::Row, "base_id", json!(id));
            tokio::time::advance(Duration::from_millis(300)).await;
        }
        session.settle().await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].action, "listTables");
        assert_eq!(calls[0].parameters.get("base_id"), Some(&json!("abcd")));

        let status = session.inspect(EditorRole::Row, |e| e.async_field("table").cloned()).unwrap();
        assert_eq!(status.status, LoadStatus::Populated);
        // required: no placeholder
        assert_eq!(status.options.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_autoloads_immediately() {
        let transport = FakeTransport::new(|_| Ok(json!({"options": [{"value": 1, "label": "One"}]})));
        let session = FormSession::new(&schemas(), transport.clone(), SessionOptions::default()).unwrap();
        session.set_value(EditorRole::Component, "token", json!("secret"));
        session.mount();
        session.settle().await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].parameters.get("token"), Some(&json!("secret")));
    }

    #[tokio::test]
    async fn test_failed_load_raises_notice_and_reenables() {
        let transport = FakeTransport::new(|_| Err(TransportError::Request("connection refused".into())));
        let session = FormSession::new(&schemas(), transport, SessionOptions::default()).unwrap();

        let status = session.load_options(EditorRole::Row, "table").await.unwrap();
        assert_eq!(status, LoadStatus::Error("request failed: connection refused".into()));
        let field = session.inspect(EditorRole::Row, |e| e.async_field("table").cloned()).unwrap();
        assert!(field.enabled);

        let notices = session.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Failed to load options for table");
        assert!(session.drain_notices().is_empty());
    }

    #[tokio::test]
    async fn test_button_parameters_and_outcome() {
        let transport = FakeTransport::new(|req| match req.action.as_str() {
            "testConnection" => Ok(json!({"status": "success", "message": "ok"})),
            _ => Ok(json!({"status": "error", "message": "no rows"})),
        });
        let session = FormSession::new(&schemas(), transport.clone(), SessionOptions::default()).unwrap();
        session.set_value(EditorRole::Component, "token", json!("t"));
        session.set_value(EditorRole::Row, "base_id", json!("b"));

        let outcome = session.press_button(EditorRole::Component, "check").await.unwrap();
        assert!(outcome.is_success());
        let outcome = session.press_button(EditorRole::Row, "preview").await.unwrap();
        assert!(!outcome.is_success());

        let calls = transport.calls();
        assert!(!calls[0].parameters.contains_key("base_id"));
        assert_eq!(calls[1].action, "previewRows");
        assert_eq!(calls[1].parameters.get("token"), Some(&json!("t")));
        assert_eq!(calls[1].parameters.get("base_id"), Some(&json!("b")));

        let idle = session.inspect(EditorRole::Row, |e| e.button("preview").unwrap().busy);
        assert!(!idle);
        assert!(session.press_button(EditorRole::Row, "base_id").await.is_err());
    }

    #[tokio::test]
    async fn test_prefill_and_combined_output() {
        let transport = FakeTransport::new(|_| Ok(json!([])));
        let session = FormSession::new(&schemas(), transport, SessionOptions::default()).unwrap();
        let mut rx = session.subscribe();

        session.prefill(json!({"token": "x", "mode": "incremental", "key": "id", "other": 1}).as_object().unwrap());
        assert!(rx.has_changed().unwrap());
        let output = rx.borrow_and_update().clone();
        assert_eq!(output.combined.parameters.get("token"), Some(&json!("x")));
        assert_eq!(output.combined.parameters.get("key"), Some(&json!("id")));
        assert!(!output.combined.parameters.contains_key("other"));
        assert!(session.inspect(EditorRole::Row, |e| e.is_visible("key")));

        session.set_value(EditorRole::Row, "mode", json!("full"));
        assert!(!session.inspect(EditorRole::Row, |e| e.is_visible("key")));
        // hidden values stay in the output
        assert_eq!(session.output().combined.parameters.get("key"), Some(&json!("id")));
    }

    #[tokio::test]
    async fn test_reload_replaces_schemas_and_prefills() {
        let transport = FakeTransport::new(|_| Ok(json!([])));
        let session = FormSession::new(&schemas(), transport, SessionOptions::default()).unwrap();
        session.set_value(EditorRole::Row, "base_id", json!("stale"));

        let replacement = SchemaPair {
            component_schema: json!({"type": "object", "properties": {"api_key": {"type": "string"}}}),
            row_schema: json!({"type": "object", "properties": {"sheet": {"type": "string"}}}),
        };
        let mut persisted = Map::new();
        persisted.insert("api_key".to_string(), json!("k"));
        persisted.insert("sheet".to_string(), json!("s1"));
        session.reload(&replacement, &persisted).unwrap();

        assert_eq!(session.inspect(EditorRole::Row, |e| e.get("base_id").cloned()), None);
        let combined = session.output().combined.parameters;
        assert_eq!(combined.get("api_key"), Some(&json!("k")));
        assert_eq!(combined.get("sheet"), Some(&json!("s1")));

        let notices = session.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Info);
        assert_eq!(notices[0].message, "Form reloaded");
    }

    /// Answers each call after its own delay, in call order.
    struct DelayedTransport {
        replies: Mutex<VecDeque<(Duration, Value)>>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ActionTransport for DelayedTransport {
        async fn dispatch(&self, _request: DispatchRequest) -> Result<Value, TransportError> {
            *self.calls.lock().unwrap() += 1;
            let reply = self.replies.lock().unwrap().pop_front();
            let (delay, value) = reply.ok_or_else(|| TransportError::Request("no reply queued".into()))?;
            tokio::time::sleep(delay).await;
            Ok(value)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_loads_keep_last_response() {
        let transport = Arc::new(DelayedTransport {
            replies: Mutex::new(VecDeque::from([
                (Duration::from_secs(2), json!(["manual"])),
                (Duration::from_millis(100), json!(["watch"])),
            ])),
            calls: Mutex::new(0),
        });
        let session = FormSession::new(&schemas(), transport.clone(), SessionOptions::default()).unwrap();

        let manual = tokio::spawn({
            let session = session.clone();
            async move { session.load_options(EditorRole::Row, "table").await }
        });
        tokio::task::yield_now().await;

        // resolves before the manual load does
        session.set_value(EditorRole::Row, "base_id", json!("b1"));
        session.settle().await;
        let field = session.inspect(EditorRole::Row, |e| e.async_field("table").cloned()).unwrap();
        assert_eq!(field.options[0].value, json!("watch"));
        assert_eq!(field.in_flight, 1);

        let status = manual.await.unwrap().unwrap();
        assert_eq!(status, LoadStatus::Populated);
        assert_eq!(*transport.calls.lock().unwrap(), 2);

        let field = session.inspect(EditorRole::Row, |e| e.async_field("table").cloned()).unwrap();
        let values: Vec<&Value> = field.options.iter().map(|o| &o.value).collect();
        assert_eq!(values, [&json!("manual")]);
        assert!(field.enabled);
        assert_eq!(field.in_flight, 0);
        assert_eq!(field.status, LoadStatus::Populated);
    }
}
