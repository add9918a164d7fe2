//! Guest server configuration

use anyhow::Context;
use mbx_core::config::{MAX_IDLE_INTERVAL, MIN_IDLE_INTERVAL, SlotNames};
use mbx_core::interpreter::ShellInterpreter;
use mbx_core::wrapper::ScriptDialect;
use mbx_core::MailboxConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Idle interval used when the requested one is out of range
pub const DEFAULT_IDLE_MS: u64 = 100;

/// Configuration for the guest server, loadable from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuestConfig {
    /// Sleep between loop ticks in milliseconds
    pub idle_ms: u64,

    /// Largest command payload copied into the wrapper, in bytes
    pub max_payload: usize,

    /// Redirect interpreter stderr into the output slot
    pub capture_stderr: bool,

    /// Wrapper script dialect
    pub dialect: ScriptDialect,

    /// Interpreter program; the dialect default when unset
    pub interpreter: Option<PathBuf>,

    /// Arguments placed before the wrapper path
    pub interpreter_args: Vec<String>,

    /// Slot file names
    pub names: SlotNames,
}

impl Default for GuestConfig {
    fn default() -> Self {
        let mailbox = MailboxConfig::default();
        Self {
            idle_ms: DEFAULT_IDLE_MS,
            max_payload: mailbox.max_payload,
            capture_stderr: false,
            dialect: mailbox.dialect,
            interpreter: None,
            interpreter_args: Vec::new(),
            names: SlotNames::default(),
        }
    }
}

impl GuestConfig {
    /// Load from a JSON file; missing keys keep their defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Apply a command-line idle interval; out-of-range values fall back to
    /// the default rather than being clamped
    pub fn override_idle_ms(&mut self, ms: u64) {
        let requested = Duration::from_millis(ms);
        if (MIN_IDLE_INTERVAL..=MAX_IDLE_INTERVAL).contains(&requested) {
            self.idle_ms = ms;
        } else {
            tracing::warn!(requested = ms, default = DEFAULT_IDLE_MS, "idle interval out of range, using default");
            self.idle_ms = DEFAULT_IDLE_MS;
        }
    }

    /// Mailbox configuration rooted at `dir`
    #[must_use]
    pub fn mailbox(&self, dir: PathBuf) -> MailboxConfig {
        MailboxConfig::builder(dir)
            .names(self.names.clone())
            .idle_interval(Duration::from_millis(self.idle_ms))
            .max_payload(self.max_payload)
            .capture_stderr(self.capture_stderr)
            .dialect(self.dialect)
            .build()
    }

    #[must_use]
    pub fn interpreter(&self) -> ShellInterpreter {
        match &self.interpreter {
            Some(program) => self
                .interpreter_args
                .iter()
                .fold(ShellInterpreter::new(program), |sh, a| sh.arg(a.clone())),
            None => ShellInterpreter::for_dialect(self.dialect),
        }
    }
}
