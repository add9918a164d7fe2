//! Slot transport: stage-then-rename publishing and rename-based claiming
//!
//! Every protocol state transition goes through [`SlotTransport`]. Producers
//! only ever write a slot's staging name and then replace the published name
//! with a rename, so a reader sees either the old file or the new one.

use crate::{MailboxConfig, MailboxError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Observable identity of a published file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub modified: SystemTime,
    /// Length catches rewrites that land within one coarse timestamp tick
    pub len: u64,
}

/// State of the command slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Neither published nor claimed
    Absent,
    /// Published by the host and waiting for a claimant
    Published(Stamp),
    /// Renamed to the owned name by the guest
    Claimed,
}

/// A logical channel backed by a staging and a published file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub staging: PathBuf,
    pub published: PathBuf,
}

impl Slot {
    #[must_use]
    pub fn new(staging: PathBuf, published: PathBuf) -> Self {
        Self { staging, published }
    }
}

/// Every file of one mailbox directory
#[derive(Debug, Clone)]
pub struct Slots {
    pub command: Slot,
    /// Name a claimed command is renamed to
    pub owned: PathBuf,
    pub output: Slot,
    pub rc: Slot,
    pub status: Slot,
    pub log: PathBuf,
    pub job: PathBuf,
}

impl Slots {
    #[must_use]
    pub fn from_config(config: &MailboxConfig) -> Self {
        let n = &config.names;
        let slot = |staging: &str, published: &str| Slot::new(config.path(staging), config.path(published));

        Self {
            command: slot(&n.cmd_new, &n.cmd_txt),
            owned: config.path(&n.cmd_run),
            output: slot(&n.out_new, &n.out_txt),
            rc: slot(&n.rc_new, &n.rc_txt),
            status: slot(&n.sta_new, &n.sta_txt),
            log: config.path(&n.log_txt),
            job: config.job_path(),
        }
    }
}

/// Primitive operations the protocol is built from.
///
/// The shipped implementation relies on rename being atomic within one
/// directory. A target with a real lock primitive can supply its own.
pub trait SlotTransport {
    /// Write `content` to the staging name, then replace the published name
    fn publish(&self, slot: &Slot, content: &str) -> Result<()>;

    /// Replace the published name with an already written staging file
    fn publish_staged(&self, slot: &Slot) -> Result<()>;

    /// Existence and stamp of `path`; `None` when absent
    fn probe(&self, path: &Path) -> Result<Option<Stamp>>;

    /// Rename `published` to `owned`. `false` when there was nothing to take
    /// or another claimant got there first.
    fn claim(&self, published: &Path, owned: &Path) -> Result<bool>;

    /// Delete `path`; absence is not an error
    fn remove(&self, path: &Path) -> Result<()>;

    fn read(&self, path: &Path) -> Result<String>;

    /// Current state of the command slot
    fn command_state(&self, slots: &Slots) -> Result<SlotState> {
        if self.probe(&slots.owned)?.is_some() {
            return Ok(SlotState::Claimed);
        }
        Ok(self
            .probe(&slots.command.published)?
            .map_or(SlotState::Absent, SlotState::Published))
    }
}

/// Filesystem transport using stage-then-rename
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameTransport;

impl SlotTransport for RenameTransport {
    fn publish(&self, slot: &Slot, content: &str) -> Result<()> {
        self.remove(&slot.staging)?;
        fs::write(&slot.staging, content)
            .map_err(|e| MailboxError::transport("write", &slot.staging, e))?;
        self.publish_staged(slot)
    }

    fn publish_staged(&self, slot: &Slot) -> Result<()> {
        // Some shared-folder filesystems refuse to rename over an existing
        // file, so the destination goes first. Readers may briefly see it absent.
        self.remove(&slot.published)?;
        fs::rename(&slot.staging, &slot.published)
            .map_err(|e| MailboxError::transport("rename", &slot.staging, e))?;
        tracing::trace!(path = ?slot.published, "slot published");
        Ok(())
    }

    fn probe(&self, path: &Path) -> Result<Option<Stamp>> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MailboxError::transport("stat", path, e)),
        };
        let modified = meta
            .modified()
            .map_err(|e| MailboxError::transport("stat", path, e))?;

        Ok(Some(Stamp {
            modified,
            len: meta.len(),
        }))
    }

    fn claim(&self, published: &Path, owned: &Path) -> Result<bool> {
        match fs::rename(published, owned) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MailboxError::transport("claim", published, e)),
        }
    }

    fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MailboxError::transport("remove", path, e)),
        }
    }

    fn read(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| MailboxError::transport("read", path, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
