use std::{
    fs, io,
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use log::{debug, trace};
use tokio::process::Command;

use crate::{error::HostError, logsink::LogWriter};

use super::{CommandOutput, Host, Invocation};

/// The real machine. Command output is captured into the run log rather
/// than shown on the terminal.
pub struct SystemHost {
    writer: LogWriter,
}

impl SystemHost {
    pub fn new(writer: LogWriter) -> Self {
        Self { writer }
    }

    fn log(&mut self, bytes: &[u8]) -> Result<(), HostError> {
        self.writer.append(bytes).map_err(HostError::LogSink)
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> HostError + '_ {
    move |source| HostError::Io {
        path: path.to_owned(),
        source,
    }
}

#[async_trait(?Send)]
impl Host for SystemHost {
    async fn execute(&mut self, invocation: &Invocation) -> Result<CommandOutput, HostError> {
        let command_line = invocation.command_line();

        debug!("$ {command_line}");
        self.log(format!("$ {command_line}").as_bytes())?;

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| HostError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        self.log(&output.stdout)?;
        self.log(&output.stderr)?;

        let output = CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        trace!("{output:#?}");

        Ok(output)
    }

    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(io_error(path)(error)),
        }
    }

    fn write_file(&mut self, path: &Path, contents: &str) -> Result<(), HostError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        fs::write(path, contents).map_err(io_error(path))?;
        self.log(format!("# wrote {}", path.display()).as_bytes())
    }

    fn remove_file(&mut self, path: &Path) -> Result<bool, HostError> {
        match fs::remove_file(path) {
            Ok(()) => {
                self.log(format!("# removed {}", path.display()).as_bytes())?;
                Ok(true)
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(io_error(path)(error)),
        }
    }

    fn create_dir_all(&mut self, path: &Path) -> Result<(), HostError> {
        fs::create_dir_all(path).map_err(io_error(path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        home::home_dir()
    }

    fn note(&mut self, line: &str) -> Result<(), HostError> {
        self.log(line.as_bytes())
    }
}
