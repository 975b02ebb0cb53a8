use std::{io, path::PathBuf};

use thiserror::Error;

use crate::version::VersionError;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Couldn't start '{}'! Reason: {}", .command, .source)]
    Spawn { command: String, source: io::Error },
    #[error("'{}' failed with {}!", .command, .status)]
    CommandFailed { command: String, status: String },
    #[error("Couldn't access '{}'! Reason: {}", .path.display(), .source)]
    Io { path: PathBuf, source: io::Error },
    #[error("Couldn't write to the run log! Reason: {}", .0)]
    LogSink(io::Error),
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error("Precondition failed: {}", .0)]
    Precondition(String),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Version(#[from] VersionError),
    #[error("Timed out after {}s waiting for {}: {}", .waited_secs, .what, .pending.join(", "))]
    NotReady {
        what: &'static str,
        waited_secs: u64,
        pending: Vec<String>,
    },
    #[error("Couldn't understand the output of '{}'! Reason: {}", .command, .reason)]
    MalformedOutput { command: String, reason: String },
    #[error("Couldn't render '{}'! Reason: {}", .0, .1)]
    Template(&'static str, serde_yaml::Error),
}

impl StepError {
    pub fn malformed(command: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedOutput {
            command: command.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Error on step {} ({}): {}", .index + 1, .name, .source)]
    StepFailed {
        index: usize,
        name: &'static str,
        source: StepError,
    },
    #[error("Interrupted during step {} ({})!", .index + 1, .name)]
    Interrupted { index: usize, name: &'static str },
    #[error("Interrupted before the first step!")]
    InterruptedBeforeStart,
    #[error("Couldn't create the run log! Reason: {}", .0)]
    LogSink(io::Error),
}
