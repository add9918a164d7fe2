//! Mailbox configuration

use crate::wrapper::ScriptDialect;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Shortest idle interval the guest loop accepts
pub const MIN_IDLE_INTERVAL: Duration = Duration::from_millis(10);

/// Longest idle interval the guest loop accepts
pub const MAX_IDLE_INTERVAL: Duration = Duration::from_millis(2000);

/// File names of every slot inside the mailbox directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotNames {
    pub cmd_new: String,
    pub cmd_txt: String,
    pub cmd_run: String,
    pub out_new: String,
    pub out_txt: String,
    pub rc_new: String,
    pub rc_txt: String,
    pub sta_new: String,
    pub sta_txt: String,
    pub log_txt: String,
    /// Wrapper script; the extension is chosen from the dialect when empty
    pub job: String,
}

impl Default for SlotNames {
    fn default() -> Self {
        Self {
            cmd_new: "CMD.NEW".into(),
            cmd_txt: "CMD.TXT".into(),
            cmd_run: "CMD.RUN".into(),
            out_new: "OUT.NEW".into(),
            out_txt: "OUT.TXT".into(),
            rc_new: "RC.NEW".into(),
            rc_txt: "RC.TXT".into(),
            sta_new: "STA.NEW".into(),
            sta_txt: "STA.TXT".into(),
            log_txt: "LOG.TXT".into(),
            job: String::new(),
        }
    }
}

/// Configuration shared by the host client and the guest server.
///
/// Built once and passed explicitly; nothing in the library reads the
/// environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// Shared directory holding every slot
    pub dir: PathBuf,

    /// Slot file names
    pub names: SlotNames,

    /// Host: how often the output slot is probed
    pub poll_interval: Duration,

    /// Host: how long to wait for output before giving up
    pub timeout: Duration,

    /// Host: extra wait for a lagging return code once output has changed
    pub rc_grace: Duration,

    /// Guest: sleep between loop ticks
    pub idle_interval: Duration,

    /// Guest: largest payload copied into the wrapper script, in bytes
    pub max_payload: usize,

    /// Guest: rename attempts when claiming a published command
    pub claim_retries: u32,

    /// Guest: pause between claim attempts
    pub claim_backoff: Duration,

    /// Guest: redirect the interpreter's stderr into the output slot too
    pub capture_stderr: bool,

    /// Guest: dialect of the synthesized wrapper script
    pub dialect: ScriptDialect,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            names: SlotNames::default(),
            poll_interval: Duration::from_millis(50),
            timeout: Duration::from_millis(5000),
            rc_grace: Duration::from_millis(200),
            idle_interval: Duration::from_millis(100),
            max_payload: 32 * 1024, // 32KB
            claim_retries: 20,
            claim_backoff: Duration::from_millis(50),
            capture_stderr: false,
            dialect: ScriptDialect::Posix,
        }
    }
}

impl MailboxConfig {
    /// Create a new config builder rooted at `dir`
    #[must_use]
    pub fn builder(dir: impl Into<PathBuf>) -> MailboxConfigBuilder {
        MailboxConfigBuilder {
            config: Self {
                dir: dir.into(),
                ..Self::default()
            },
        }
    }

    /// Path of a file inside the mailbox directory
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Wrapper script path for the configured dialect
    #[must_use]
    pub fn job_path(&self) -> PathBuf {
        if self.names.job.is_empty() {
            self.path(self.dialect.default_job_name())
        } else {
            self.path(&self.names.job)
        }
    }

    /// Idle interval forced into the accepted range
    #[must_use]
    pub fn clamped_idle_interval(&self) -> Duration {
        self.idle_interval.clamp(MIN_IDLE_INTERVAL, MAX_IDLE_INTERVAL)
    }
}

/// Builder for MailboxConfig
#[derive(Debug)]
pub struct MailboxConfigBuilder {
    config: MailboxConfig,
}

impl MailboxConfigBuilder {
    #[must_use]
    pub fn names(mut self, names: SlotNames) -> Self {
        self.config.names = names;
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    #[must_use]
    pub fn timeout_ms(self, ms: u64) -> Self {
        self.timeout(Duration::from_millis(ms))
    }

    #[must_use]
    pub fn rc_grace(mut self, grace: Duration) -> Self {
        self.config.rc_grace = grace;
        self
    }

    #[must_use]
    pub fn idle_interval(mut self, interval: Duration) -> Self {
        self.config.idle_interval = interval.clamp(MIN_IDLE_INTERVAL, MAX_IDLE_INTERVAL);
        self
    }

    #[must_use]
    pub fn max_payload(mut self, bytes: usize) -> Self {
        self.config.max_payload = bytes;
        self
    }

    #[must_use]
    pub fn claim_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.config.claim_retries = retries;
        self.config.claim_backoff = backoff;
        self
    }

    #[must_use]
    pub fn capture_stderr(mut self, capture: bool) -> Self {
        self.config.capture_stderr = capture;
        self
    }

    #[must_use]
    pub fn dialect(mut self, dialect: ScriptDialect) -> Self {
        self.config.dialect = dialect;
        self
    }

    #[must_use]
    pub fn build(self) -> MailboxConfig {
        self.config
    }
}
