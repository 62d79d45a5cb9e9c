//! Script backend unit.
//!
//! Runs the component's entry file once per action:
//! `<interpreter> src/<entry> <action>` in the component root, with
//! `KBC_DATADIR` pointing at `<root>/data`. The parameters of the call are
//! already in `data/config.json` when the process starts. Its stdout is the
//! action's JSON result.

use std::sync::Arc;

use anyhow::{Context, bail};
use async_trait::async_trait;
use schemaform::{
    dispatch::{ActionContext, ActionRegistry, BackendUnit, ComponentRoot, UnitLoader, root::load_schemas},
    schema::FieldTree,
};
use serde_json::Value;

use crate::{ctx::AppContext, settings::TesterSettings};

/// Creates a [`ScriptUnit`] for each component root.
#[derive(Debug, Clone, Default)]
pub struct ScriptLoader {
    settings: TesterSettings,
}

impl ScriptLoader {
    pub fn new(settings: TesterSettings) -> Self {
        ScriptLoader { settings }
    }
}

impl UnitLoader for ScriptLoader {
    fn entry_file(&self) -> &str {
        &self.settings.entry
    }

    fn load(&self, root: &ComponentRoot) -> anyhow::Result<Box<dyn BackendUnit>> {
        let ctx = AppContext::with_settings(root.clone(), self.settings.clone());
        Ok(Box::new(ScriptUnit::new(ctx)))
    }
}

pub struct ScriptUnit {
    ctx: Arc<AppContext>,
    actions: Vec<String>,
}

impl ScriptUnit {
    pub fn new(ctx: AppContext) -> Self {
        ScriptUnit {
            ctx: Arc::new(ctx),
            actions: Vec::new(),
        }
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }
}

#[async_trait]
impl BackendUnit for ScriptUnit {
    fn name(&self) -> &str {
        &self.ctx.settings.entry
    }

    /// Collect the actions named by both schemas plus the configured extras.
    async fn init(&mut self, root: &ComponentRoot) -> anyhow::Result<()> {
        let schemas = load_schemas(&root.config_dir()).await?;
        let mut actions = Vec::new();
        for schema in [&schemas.component_schema, &schemas.row_schema] {
            match FieldTree::parse(schema) {
                Ok(tree) => actions.extend(tree.actions()),
                Err(e) => warn!("skipping actions of an unparsable schema: {e}"),
            }
        }
        actions.extend(self.ctx.settings.actions.iter().cloned());

        let mut seen = Vec::new();
        actions.retain(|a| {
            let fresh = !seen.contains(a);
            if fresh {
                seen.push(a.clone());
            }
            fresh
        });
        info!("{}: serving actions {}", root.component_name(), actions.join(", "));
        self.actions = actions;
        Ok(())
    }

    fn register(&self, registry: &mut ActionRegistry) {
        for action in &self.actions {
            let ctx = self.ctx.clone();
            registry.register(action.clone(), move |call: ActionContext| {
                let ctx = ctx.clone();
                async move { run_action(&ctx, &call.action).await }
            });
        }
    }
}

async fn run_action(ctx: &AppContext, action: &str) -> anyhow::Result<Value> {
    let mut cmd = ctx.action_command(action);
    let output = cmd.output_checked().await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_stdout(&stdout).with_context(|| format!("action {action} printed no JSON result"))
}

/// The whole of stdout as JSON, or else its last non-empty line.
fn parse_stdout(stdout: &str) -> anyhow::Result<Value> {
    if let Ok(value) = serde_json::from_str(stdout.trim()) {
        return Ok(value);
    }
    let Some(last) = stdout.lines().rev().find(|l| !l.trim().is_empty()) else {
        bail!("empty output");
    };
    Ok(serde_json::from_str(last.trim())?)
}
