use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use async_trait::async_trait;

use crate::error::HostError;

pub mod system;

pub use system::SystemHost;

/// A single external command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// `apt-get` that never stops to ask questions.
    pub fn apt_get<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("apt-get")
            .env("DEBIAN_FRONTEND", "noninteractive")
            .args(args)
    }

    pub fn kubectl<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("kubectl")
            .env("KUBECONFIG", ADMIN_KUBECONFIG)
            .args(args)
    }

    pub fn command_line(&self) -> String {
        self.to_string()
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;

        for arg in &self.args {
            f.write_str(" ")?;
            f.write_str(arg)?;
        }

        Ok(())
    }
}

pub const ADMIN_KUBECONFIG: &str = "/etc/kubernetes/admin.conf";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    fn status_description(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "no exit code (terminated by signal)".to_owned(),
        }
    }
}

/// Everything a step is allowed to do to the machine it runs on.
///
/// Every command line and its output ends up in the run log; file
/// operations address absolute host paths.
#[async_trait(?Send)]
pub trait Host {
    /// Runs the command to completion and hands back its output whatever the
    /// exit status was.
    async fn execute(&mut self, invocation: &Invocation) -> Result<CommandOutput, HostError>;

    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError>;

    /// Creates or fully overwrites the file, creating missing parent directories.
    fn write_file(&mut self, path: &Path, contents: &str) -> Result<(), HostError>;

    /// Returns `false` if there was nothing to remove.
    fn remove_file(&mut self, path: &Path) -> Result<bool, HostError>;

    fn create_dir_all(&mut self, path: &Path) -> Result<(), HostError>;

    fn exists(&self, path: &Path) -> bool;

    /// Home directory of the user running the tool.
    fn home_dir(&self) -> Option<PathBuf>;

    /// Free-form line for the run log.
    fn note(&mut self, line: &str) -> Result<(), HostError>;

    /// Like `execute`, but a non-zero exit status is an error.
    async fn run(&mut self, invocation: &Invocation) -> Result<CommandOutput, HostError> {
        let output = self.execute(invocation).await?;

        if !output.success {
            return Err(HostError::CommandFailed {
                command: invocation.command_line(),
                status: output.status_description(),
            });
        }

        Ok(output)
    }
}
