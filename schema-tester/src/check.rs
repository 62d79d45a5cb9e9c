//! Headless form check.
//!
//! Builds both editors from the component's schemas, pre-fills them from
//! `data/config.json`, runs the mount autoloads and prints what a person at
//! the form would see: sections, hidden fields, select states, notices,
//! validation problems and the combined configuration.

use std::sync::Arc;

use anyhow::bail;
use colored::Colorize;
use schemaform::{
    dispatch::{Dispatcher, root::{load_schemas, read_parameters}},
    form::{EditorRole, FormEditor, FormSession, LoadStatus, NoticeLevel, SessionOptions},
    schema::{SchemaPair, validate::summarize},
    transport::{ActionTransport, HttpTransport, LocalTransport},
};
use serde_json::{Map, Value};

use crate::{backend::ScriptLoader, ctx::AppContext};

/// Where the session gets schemas and action results from.
pub enum Source {
    /// Schemas from disk, actions run in-process.
    Local(AppContext),
    /// A running tester server.
    Server(String),
}

pub async fn run(source: Source, debounce_ms: u64) -> anyhow::Result<()> {
    let (schemas, persisted, transport, component_path) = open(source).await?;
    let options = SessionOptions {
        debounce: std::time::Duration::from_millis(debounce_ms),
        component_path,
    };
    let session = FormSession::new(&schemas, transport, options)?;
    session.prefill(&persisted);
    session.mount();
    session.settle().await;

    let mut problems = 0;
    for role in [EditorRole::Component, EditorRole::Row] {
        problems += session.inspect(role, report_editor);
    }

    let notices = session.drain_notices();
    if !notices.is_empty() {
        println!("{}", "Notices".bold());
        for notice in &notices {
            let line = notice.to_string();
            match notice.level {
                NoticeLevel::Error => println!("  {}", line.red()),
                NoticeLevel::Success => println!("  {}", line.green()),
                NoticeLevel::Info => println!("  {line}"),
            }
        }
    }

    let output = session.output();
    println!("{}", "Combined configuration".bold());
    println!("{}", serde_json::to_string_pretty(&output.combined)?);

    if problems > 0 {
        bail!("{problems} validation problem(s)");
    }
    Ok(())
}

type Opened = (SchemaPair, Map<String, Value>, Arc<dyn ActionTransport>, Option<String>);

async fn open(source: Source) -> anyhow::Result<Opened> {
    match source {
        Source::Local(ctx) => {
            let schemas = load_schemas(&ctx.root.config_dir()).await?;
            let persisted = match ctx.root.existing_config() {
                Some(path) => read_parameters(&path).await,
                None => Map::new(),
            };
            let loader = ScriptLoader::new(ctx.settings.clone());
            let dispatcher = Dispatcher::new(Some(ctx.root.clone()), loader);
            let transport: Arc<dyn ActionTransport> = Arc::new(LocalTransport::new(Arc::new(dispatcher)));
            let component_path = Some(ctx.root.path().display().to_string());
            Ok((schemas, persisted, transport, component_path))
        }
        Source::Server(url) => {
            let transport = HttpTransport::new(url);
            info!("fetching schemas from {}", transport.base_url());
            let schemas = transport.fetch_schemas().await?;
            let persisted = transport.fetch_config().await?;
            let transport: Arc<dyn ActionTransport> = Arc::new(transport);
            Ok((schemas, persisted, transport, None))
        }
    }
}

/// Print one editor; returns its number of validation issues.
fn report_editor(editor: &FormEditor) -> usize {
    let title = match editor.role() {
        EditorRole::Component => "Component configuration",
        EditorRole::Row => "Row configuration",
    };
    println!("{}", title.bold().cyan());

    match editor.sections() {
        Some(sections) => {
            for section in sections {
                println!("  [{}] {}", section.group.name(), section.keys.join(", "));
            }
        }
        None => println!("  {}", editor.declared_keys().join(", ")),
    }

    let hidden: Vec<&str> = editor
        .visibility()
        .iter()
        .filter(|(_, visible)| !**visible)
        .map(|(path, _)| path.as_str())
        .collect();
    if !hidden.is_empty() {
        println!("  hidden: {}", hidden.join(", ").dimmed());
    }

    for (path, state) in editor.async_fields() {
        let status = match &state.status {
            LoadStatus::Idle => "idle".normal(),
            LoadStatus::Loading => "loading".yellow(),
            LoadStatus::Populated => format!("{} option(s)", state.options.len()).green(),
            LoadStatus::Error(reason) => format!("error: {reason}").red(),
        };
        println!("  {path}: {status}");
    }

    for button in editor.buttons() {
        println!("  {} -> {}", button.caption(), button.action);
    }

    let issues = editor.validate();
    if issues.is_empty() {
        println!("  {}", "valid".green());
    } else {
        for line in summarize(&issues).lines() {
            println!("  {}", line.red());
        }
    }
    issues.len()
}
