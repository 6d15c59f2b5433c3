//! PID marker file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const FALLBACK_NAME: &str = "metadata-proxy";

/// A file holding the decimal process id of the running daemon.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// File name derived from the running executable: `<exe>.pid`.
    pub fn default_name() -> String {
        let exe = std::env::args_os()
            .next()
            .and_then(|arg0| {
                Path::new(&arg0)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| FALLBACK_NAME.to_string());
        format!("{}.pid", exe)
    }

    /// Write the marker at `path`, replacing any stale one.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        fs::write(&path, std::process::id().to_string())?;
        tracing::debug!(path = %path.display(), "PID file written");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the marker.
    pub fn remove(self) -> io::Result<()> {
        fs::remove_file(&self.path)?;
        tracing::debug!(path = %self.path.display(), "PID file removed");
        Ok(())
    }
}
