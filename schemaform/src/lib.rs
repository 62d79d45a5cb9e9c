//! # schemaform
//!
//! A headless, schema-driven form engine and the action dispatch protocol
//! that backs it.
//!
//! Schemaform reads a pair of JSON Schema documents (component-level and
//! row-level configuration), normalizes the non-standard extensions they use
//! and keeps a reactive model of the resulting forms: conditional
//! visibility, selects populated by backend actions, action buttons and the
//! combined configuration document.
//!
//! ## Features
//!
//! - Schema normalization for `type: button`, async selects and multiselects
//! - Display group classification (explicit tag or `propertyOrder` ranges)
//! - Visibility dependencies with strict equality
//! - Debounced option reloads on watched field changes
//! - Validation through [`jsonschema`](https://docs.rs/jsonschema)
//! - Action dispatch with name-variant lookup and per-root serialization
//! - Optional HTTP server (`web` feature) and HTTP client (`http-client`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use schemaform::{
//!     form::{EditorRole, FormSession, SessionOptions},
//!     schema::SchemaPair,
//!     transport::HttpTransport,
//! };
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let transport = HttpTransport::new("http://localhost:8000");
//! let schemas: SchemaPair = transport.fetch_schemas().await?;
//! let session = FormSession::new(&schemas, Arc::new(transport), SessionOptions::default())?;
//! session.mount();
//! session.set_value(EditorRole::Row, "base_id", serde_json::json!("app123"));
//! session.settle().await;
//! println!("{}", serde_json::to_string_pretty(&session.output().combined)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`schema`] - Schema parsing, normalization and validation
//! - [`form`] - The reactive two-editor form engine
//! - [`transport`] - How the engine reaches backend actions
//! - [`dispatch`] - Server-side action dispatch
//! - [`web`] - HTTP server (requires `web` feature)

/// Schema parsing, normalization and validation.
pub mod schema;

/// The reactive form engine.
pub mod form;

/// Action transports.
pub mod transport;

/// Server-side action dispatch.
pub mod dispatch;

/// HTTP server exposing schemas, persisted config and dispatch.
///
/// This module is only available when the `web` feature is enabled.
#[cfg(feature = "web")]
pub mod web;

pub use serde_json::Value;
