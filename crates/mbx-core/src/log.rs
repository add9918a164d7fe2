//! Append-only diagnostic log kept inside the mailbox directory

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Timestamped log slot. Never read by the protocol itself.
#[derive(Debug, Clone)]
pub struct MailboxLog {
    path: PathBuf,
    eol: &'static str,
}

impl MailboxLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, eol: &'static str) -> Self {
        Self {
            path: path.into(),
            eol,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `[YYYY-MM-DD HH:MM:SS] message`. Failures are reported through
    /// tracing only.
    pub fn line(&self, message: &str) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let entry = format!("[{stamp}] {message}{}", self.eol);

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(entry.as_bytes()));

        if let Err(e) = written {
            tracing::warn!(path = ?self.path, os_error = e.raw_os_error(), "failed to append log line: {e}");
        }
    }
}
