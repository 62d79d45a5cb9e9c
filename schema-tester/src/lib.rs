//! # schema-tester
//!
//! A development tool for component configuration schemas.
//!
//! `schema-tester` serves a component's `component_config/` schemas, its
//! persisted `data/config.json` and its sync actions over HTTP, and can check
//! the form those schemas produce without a browser.
//!
//! ## Features
//!
//! - **Discovery**: finds the component root from any path inside it
//! - **Server**: the HTTP surface of [`schemaform::web`]
//! - **Script backend**: runs `src/component.py <action>` per sync action
//! - **Check**: a headless run of the form engine with a printed report
//! - **Settings**: `.schema-tester.toml` with a printable JSON schema
//!
//! ## Modules
//!
//! - [`backend`] - Script backend unit
//! - [`check`] - Headless form check
//! - [`ctx`] - Application context
//! - [`serve`] - The tester server
//! - [`settings`] - Tester settings file
//! - [`utils`] - Process helpers

/// Script backend unit running the component entry file.
pub mod backend;

/// Headless form check.
pub mod check;

/// Application context and component root resolution.
pub mod ctx;

/// The tester server.
pub mod serve;

/// Tester settings file.
pub mod settings;

/// Process helpers.
pub mod utils;

#[macro_use]
extern crate log;
