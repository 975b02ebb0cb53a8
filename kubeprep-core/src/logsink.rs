use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use tempfile::TempDir;

use crate::CLI_NAME;

pub const LOG_FILENAME: &str = "run.log";

/// Append-only run log backed by a file in a process-scoped temporary
/// directory. The directory is removed on `close` or on drop, whichever
/// comes first.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    dir: Option<TempDir>,
    file: Option<File>,
}

impl LogSink {
    pub fn open() -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{CLI_NAME}-"))
            .tempdir()?;

        Self::open_in(dir)
    }

    pub fn open_in(dir: TempDir) -> io::Result<Self> {
        let path = dir.path().join(LOG_FILENAME);
        let file = File::options().create_new(true).append(true).open(&path)?;

        debug!("Run log opened at '{}'", path.display());

        Ok(Self {
            path,
            dir: Some(dir),
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(|d| d.path())
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        write_entry(self.file.as_mut().ok_or_else(closed_error)?, bytes)
    }

    /// A second append handle on the same file, for whoever runs the commands.
    pub fn writer(&self) -> io::Result<LogWriter> {
        let file = self.file.as_ref().ok_or_else(closed_error)?.try_clone()?;

        Ok(LogWriter { file })
    }

    pub fn append_line(&mut self, line: &str) -> io::Result<()> {
        self.append(line.as_bytes())
    }

    /// Full contents of the log so far, invalid UTF-8 replaced.
    pub fn dump(&mut self) -> io::Result<String> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }

        let bytes = fs::read(&self.path).map_err(|error| match self.file {
            Some(_) => error,
            None => closed_error(),
        })?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Removes the backing file and directory. Safe to call repeatedly.
    pub fn close(&mut self) -> io::Result<()> {
        self.file.take();

        match self.dir.take() {
            Some(dir) => {
                debug!("Removing run log directory '{}'", dir.path().display());
                dir.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            warn!(
                "Couldn't remove the run log at '{}'! {error}",
                self.path.display()
            );
        }
    }
}

/// Appends to the run log without owning it. Once the sink is closed the
/// file is unlinked and further entries are discarded with it.
#[derive(Debug)]
pub struct LogWriter {
    file: File,
}

impl LogWriter {
    pub fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        write_entry(&mut self.file, bytes)
    }
}

fn write_entry(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;

    if !bytes.ends_with(b"\n") && !bytes.is_empty() {
        file.write_all(b"\n")?;
    }

    Ok(())
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "the run log is already closed")
}
