//! Process helpers.

use std::{
    ffi::OsStr,
    ops::{Deref, DerefMut},
    path::Path,
    process::Output,
};

use anyhow::{Context, bail};

/// Placeholder expanded to the component root in commands and settings.
pub const ROOT_PLACEHOLDER: &str = "${componentRoot}";

/// An async command builder that expands placeholders in its program,
/// arguments and environment values.
pub struct Command {
    inner: tokio::process::Command,
    program: String,
    args: Vec<String>,
    value_replace: Box<dyn Fn(&OsStr) -> String + Send + Sync>,
}

impl Deref for Command {
    type Target = tokio::process::Command;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Command {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl Command {
    /// Create a command running in `workdir`.
    ///
    /// The child is killed if the returned value is dropped before it exits.
    pub fn new<S>(
        program: S,
        workdir: &Path,
        value_replace: impl Fn(&OsStr) -> String + Send + Sync + 'static,
    ) -> Command
    where
        S: AsRef<OsStr>,
    {
        let program = value_replace(program.as_ref());
        let mut cmd = tokio::process::Command::new(&program);
        cmd.current_dir(workdir).kill_on_drop(true);

        Self {
            inner: cmd,
            program,
            args: Vec::new(),
            value_replace: Box::new(value_replace),
        }
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Run to completion and capture stdout and stderr.
    ///
    /// A non-zero exit is an error carrying the process's stderr.
    pub async fn output_checked(&mut self) -> anyhow::Result<Output> {
        debug!("running {}", self.command_line());
        let output = self
            .inner
            .output()
            .await
            .with_context(|| format!("failed to start {}", self.program))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} failed with {}: {}", self.command_line(), output.status, stderr.trim());
        }
        Ok(output)
    }

    pub fn arg<S>(&mut self, arg: S) -> &mut Command
    where
        S: AsRef<OsStr>,
    {
        let value = (self.value_replace)(arg.as_ref());
        self.inner.arg(&value);
        self.args.push(value);
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg.as_ref());
        }
        self
    }

    /// Set an environment variable, expanding placeholders in the value.
    pub fn env<K, V>(&mut self, key: K, val: V) -> &mut Command
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        let value = (self.value_replace)(val.as_ref());
        self.inner.env(key, value);
        self
    }
}

/// Replace `${componentRoot}` in `value` with `root`.
pub fn replace_root_placeholder(value: &OsStr, root: &Path) -> String {
    value
        .to_string_lossy()
        .replace(ROOT_PLACEHOLDER, &root.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn command(program: &str, root: &Path) -> Command {
        let replace_root = root.to_path_buf();
        Command::new(program, root, move |v| replace_root_placeholder(v, &replace_root))
    }

    #[test]
    fn test_placeholder_expansion() {
        let root = PathBuf::from("/work/ex-airtable");
        assert_eq!(
            replace_root_placeholder(OsStr::new("${componentRoot}/.venv/bin/python"), &root),
            "/work/ex-airtable/.venv/bin/python"
        );
        assert_eq!(replace_root_placeholder(OsStr::new("python3"), &root), "python3");
    }

    #[test]
    fn test_command_line_is_expanded() {
        let root = PathBuf::from("/work/c");
        let mut cmd = command("${componentRoot}/bin/run", &root);
        cmd.args(["${componentRoot}/src/component.py", "testConnection"]);
        assert_eq!(
            cmd.command_line(),
            "/work/c/bin/run /work/c/src/component.py testConnection"
        );
    }

    #[tokio::test]
    async fn test_output_checked() {
        let dir = tempfile::tempdir().unwrap();
        let mut cmd = command("sh", dir.path());
        cmd.args(["-c", "echo ok"]);
        let output = cmd.output_checked().await.unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok");

        let mut cmd = command("sh", dir.path());
        cmd.args(["-c", "echo broken >&2; exit 3"]);
        let err = cmd.output_checked().await.unwrap_err().to_string();
        assert!(err.contains("broken"), "{err}");
    }
}
