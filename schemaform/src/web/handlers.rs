use std::path::PathBuf;

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    dispatch::{
        DispatchFailure,
        root::{COMPONENT_CONFIG_DIR, load_schemas as load_schemas_from, read_parameters},
    },
    schema::SchemaPair,
    transport::DispatchRequest,
    web::{DiscoveryInfo, WebState, session::SessionId},
};

#[derive(Debug, Default, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

/// Null, `false`, zero, and empty strings, arrays or objects.
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::Bool(true)) => false,
    }
}

pub async fn discovery_info(State(state): State<WebState>) -> Json<DiscoveryInfo> {
    Json(DiscoveryInfo::from_root(state.dispatcher.default_root()))
}

pub async fn load_schemas(
    State(state): State<WebState>,
    session: SessionId,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return error_body(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let component_schema = body.get("componentSchema");
    let row_schema = body.get("rowSchema");
    if is_blank(component_schema) || is_blank(row_schema) {
        return error_body(StatusCode::BAD_REQUEST, "Missing componentSchema or rowSchema");
    }
    let component_name = body
        .get("componentName")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();

    let pair = SchemaPair {
        component_schema: component_schema.cloned().unwrap_or_default(),
        row_schema: row_schema.cloned().unwrap_or_default(),
    };
    info!("session {}: schemas loaded for {component_name}", session.0);
    let message = format!("Schemas loaded for {component_name}");
    state.sessions.put(&session, pair, component_name).await;

    Json(json!({"status": "success", "message": message})).into_response()
}

pub async fn get_schemas(
    State(state): State<WebState>,
    session: SessionId,
    Query(query): Query<PathQuery>,
) -> Response {
    if let Some(uploaded) = state.sessions.get(&session).await {
        return Json(uploaded.schemas).into_response();
    }

    let config_dir = query
        .path
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            state
                .dispatcher
                .default_root()
                .map(|root| root.path().join(COMPONENT_CONFIG_DIR))
        });
    let config_dir = match config_dir {
        Some(dir) if dir.exists() => dir,
        other => {
            let shown = other
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| "None".to_string());
            return error_body(
                StatusCode::NOT_FOUND,
                format!("Component config folder not found: {shown}"),
            );
        }
    };

    match load_schemas_from(&config_dir).await {
        Ok(pair) => Json(pair).into_response(),
        Err(e) => {
            error!("failed to load schemas from {}: {e}", config_dir.display());
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub async fn get_config(
    State(state): State<WebState>,
    Query(query): Query<PathQuery>,
) -> Json<Value> {
    let path = query
        .path
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .or_else(|| state.dispatcher.default_root().and_then(|r| r.existing_config()));
    let parameters = match path {
        Some(path) if path.exists() => read_parameters(&path).await,
        _ => Default::default(),
    };
    Json(Value::Object(parameters))
}

pub async fn sync_action(
    State(state): State<WebState>,
    body: Result<Json<DispatchRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("malformed dispatch request: {}", rejection.body_text());
            let failure = DispatchFailure {
                status: "error".to_string(),
                kind: "badRequest".to_string(),
                message: rejection.body_text(),
                traceback: None,
            };
            return (StatusCode::BAD_REQUEST, Json(failure)).into_response();
        }
    };

    match state.dispatcher.dispatch(request).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(DispatchFailure::from(&e))).into_response()
        }
    }
}
