//! Browser-uploaded schemas, kept per session.

use std::{collections::HashMap, convert::Infallible, sync::Arc};

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::schema::SchemaPair;

/// Header naming the caller's session.
pub const SESSION_HEADER: &str = "x-session-id";

/// Session used by requests without a session header.
pub const DEFAULT_SESSION: &str = "default";

/// Session id taken from [`SESSION_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for SessionId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_SESSION);
        Ok(SessionId(id.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedSchemas {
    pub schemas: SchemaPair,
    pub component_name: String,
    pub loaded_at: DateTime<Utc>,
}

/// Most sessions kept at once; the oldest upload is evicted beyond this.
pub const MAX_SESSIONS: usize = 64;

/// Age after which an upload is forgotten.
pub const SESSION_TTL: TimeDelta = TimeDelta::hours(12);

/// Uploaded schema pairs by session id.
///
/// Session ids are chosen by clients, so the store is bounded by both count
/// and age.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, UploadedSchemas>>>,
    capacity: usize,
    ttl: TimeDelta,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(MAX_SESSIONS, SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(capacity: usize, ttl: TimeDelta) -> Self {
        SessionStore {
            inner: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub async fn put(&self, session: &SessionId, schemas: SchemaPair, component_name: String) {
        self.put_at(session, schemas, component_name, Utc::now()).await;
    }

    async fn put_at(
        &self,
        session: &SessionId,
        schemas: SchemaPair,
        component_name: String,
        loaded_at: DateTime<Utc>,
    ) {
        let mut sessions = self.inner.write().await;
        let cutoff = Utc::now() - self.ttl;
        sessions.retain(|_, upload| upload.loaded_at > cutoff);

        while sessions.len() >= self.capacity && !sessions.contains_key(&session.0) {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, upload)| upload.loaded_at)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            debug!("evicting uploaded schemas of session {oldest}");
            sessions.remove(&oldest);
        }

        sessions.insert(
            session.0.clone(),
            UploadedSchemas {
                schemas,
                component_name,
                loaded_at,
            },
        );
    }

    /// The session's upload, unless it has expired.
    pub async fn get(&self, session: &SessionId) -> Option<UploadedSchemas> {
        let cutoff = Utc::now() - self.ttl;
        self.inner
            .read()
            .await
            .get(&session.0)
            .filter(|upload| upload.loaded_at > cutoff)
            .cloned()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
