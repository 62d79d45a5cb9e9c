//! Schema parsing and preprocessing.
//!
//! This module turns the raw component/row schema documents into the shapes
//! the form engine works with:
//!
//! - [`field`] - typed field tree with closed extension roles
//! - [`normalize`] - renderer-compatible rewrite of non-standard fields
//! - [`groups`] - display group classification
//! - [`validate`] - JSON Schema validation of form values

/// Typed field declarations.
pub mod field;

/// Display group classification.
pub mod groups;

/// Schema normalization.
pub mod normalize;

/// Form value validation.
pub mod validate;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use field::{AsyncDescriptor, Autoload, ButtonSpec, Field, FieldKind, FieldRole, FieldTree};
pub use groups::{FieldGroup, FieldGroups, Section};
pub use normalize::{NormalizedSchema, SchemaWarning, normalize};
pub use validate::{FormValidator, ValidationIssue};

/// Errors raised while interpreting a schema document.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The document (or a nested field) is not a JSON object.
    #[error("schema at `{path}` must be an object, got {actual}")]
    NotAnObject { path: String, actual: String },
    /// The normalized document could not be compiled for validation.
    #[error("schema cannot be compiled for validation: {0}")]
    Compile(String),
}

/// The component-level and row-level schema documents of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaPair {
    pub component_schema: Value,
    pub row_schema: Value,
}
