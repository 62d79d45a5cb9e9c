//! Application context.
//!
//! [`AppContext`] holds the resolved component root and the tester settings,
//! and builds the commands that run the component.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use anyhow::Context;
use schemaform::dispatch::{ComponentRoot, root::DATA_DIR_ENV};

use crate::{
    settings::{SETTINGS_FILE, TesterSettings},
    utils::{Command, replace_root_placeholder},
};

#[derive(Debug, Clone)]
pub struct AppContext {
    pub root: ComponentRoot,
    pub settings: TesterSettings,
}

impl AppContext {
    /// Resolve the component root from the CLI argument, or from the
    /// working directory when none was given, and load its settings.
    ///
    /// `settings_path` overrides `<root>/.schema-tester.toml`.
    pub fn resolve(arg: Option<&Path>, settings_path: Option<&Path>) -> anyhow::Result<Self> {
        let root = match arg {
            Some(arg) => ComponentRoot::resolve_arg(arg)?,
            None => {
                let cwd = std::env::current_dir()?;
                ComponentRoot::discover(&cwd)
                    .with_context(|| format!("no component_config folder above {}", cwd.display()))?
            }
        };
        root.check_schemas()?;

        let settings_path = settings_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.path().join(SETTINGS_FILE));
        let settings = TesterSettings::load(&settings_path)?;
        Ok(AppContext { root, settings })
    }

    pub fn with_settings(root: ComponentRoot, settings: TesterSettings) -> Self {
        AppContext { root, settings }
    }

    pub fn entry_path(&self) -> PathBuf {
        self.root.src_dir().join(&self.settings.entry)
    }

    pub fn value_replace_with_var<S>(&self, value: S) -> String
    where
        S: AsRef<OsStr>,
    {
        replace_root_placeholder(value.as_ref(), self.root.path())
    }

    /// A command in the component root with `KBC_DATADIR` and the
    /// configured environment applied.
    pub fn command(&self, program: &str) -> Command {
        let root = self.root.path().to_path_buf();
        let mut cmd = Command::new(program, self.root.path(), move |v| replace_root_placeholder(v, &root));
        cmd.env(DATA_DIR_ENV, self.root.data_dir());
        for (key, value) in &self.settings.env {
            cmd.env(key, value);
        }
        cmd
    }

    /// `<interpreter> src/<entry> <action>`.
    pub fn action_command(&self, action: &str) -> Command {
        let mut cmd = self.command(&self.settings.interpreter);
        cmd.arg(self.entry_path()).arg(action);
        cmd
    }
}
