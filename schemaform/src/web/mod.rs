//! HTTP surface of the tester.
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/api/discovery-info` | discovered `component_config/` and `config.json` |
//! | POST | `/api/load-schemas` | upload a schema pair for the caller's session |
//! | GET | `/api/schemas` | uploaded pair, else the pair on disk |
//! | GET | `/api/config` | persisted parameters, `{}` when absent |
//! | POST | `/sync-action` | run a backend action |

/// Route handlers.
pub mod handlers;

/// Session-scoped schema uploads.
pub mod session;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use log::{error, info};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::dispatch::{ComponentRoot, Dispatcher};

pub use session::{SessionId, SessionStore};

/// Paths reported to front-ends for pre-filling manual inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryInfo {
    pub component_config: Option<String>,
    pub config_json: Option<String>,
}

impl DiscoveryInfo {
    pub fn from_root(root: Option<&ComponentRoot>) -> Self {
        let Some(root) = root else {
            return DiscoveryInfo::default();
        };
        DiscoveryInfo {
            component_config: Some(root.config_dir().display().to_string()),
            config_json: root.existing_config().map(|p| p.display().to_string()),
        }
    }
}

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct WebState {
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: SessionStore,
}

impl WebState {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        WebState {
            dispatcher,
            sessions: SessionStore::new(),
        }
    }
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/api/discovery-info", get(handlers::discovery_info))
        .route("/api/load-schemas", post(handlers::load_schemas))
        .route("/api/schemas", get(handlers::get_schemas))
        .route("/api/config", get(handlers::get_config))
        .route("/sync-action", post(handlers::sync_action))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until Ctrl-C, then tear down loaded backend units.
pub async fn serve(addr: SocketAddr, state: WebState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{addr}");

    let dispatcher = state.dispatcher.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl-C: {e}");
    }
    info!("shutting down");
}
