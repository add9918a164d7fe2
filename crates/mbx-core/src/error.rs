//! Error types for mbx-core

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("transport error: {op} {path:?}: {source}")]
    Transport {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("timeout after {} ms waiting for output; is the guest server running?", .0.as_millis())]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("payload too large: {size} bytes (max {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("execution error: running {script:?}: {source}")]
    Execution {
        script: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl MailboxError {
    pub(crate) fn transport(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Transport {
            op,
            path: path.into(),
            source,
        }
    }

    /// Underlying OS error code, when the failure came from the filesystem
    #[must_use]
    pub fn os_error(&self) -> Option<i32> {
        match self {
            Self::Transport { source, .. } | Self::Execution { source, .. } | Self::Io(source) => {
                source.raw_os_error()
            }
            _ => None,
        }
    }
}
