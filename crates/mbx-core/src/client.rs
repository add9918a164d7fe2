//! Host mailbox client

use crate::protocol::parse_return_code;
use crate::slot::{RenameTransport, SlotTransport, Slots, Stamp};
use crate::{MailboxConfig, MailboxError, Reply, Result};
use std::thread;
use std::time::{Duration, Instant};

/// Step used while waiting out the return-code grace window
const GRACE_STEP: Duration = Duration::from_millis(20);

/// Submits commands to the guest and waits for their results
#[derive(Debug)]
pub struct MailboxClient<T = RenameTransport> {
    config: MailboxConfig,
    slots: Slots,
    transport: T,
}

impl MailboxClient<RenameTransport> {
    #[must_use]
    pub fn new(config: MailboxConfig) -> Self {
        Self::with_transport(config, RenameTransport)
    }
}

impl<T: SlotTransport> MailboxClient<T> {
    pub fn with_transport(config: MailboxConfig, transport: T) -> Self {
        let slots = Slots::from_config(&config);
        Self {
            config,
            slots,
            transport,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &MailboxConfig {
        &self.config
    }

    /// Submit `command` using the configured timeout and poll interval
    pub fn submit(&self, command: &str) -> Result<Reply> {
        self.submit_with(command, self.config.timeout, self.config.poll_interval)
    }

    /// Publish `command` and wait for the output slot to change.
    ///
    /// Returns within roughly `timeout` plus the return-code grace window.
    /// The publish step is never retried.
    pub fn submit_with(&self, command: &str, timeout: Duration, poll_interval: Duration) -> Result<Reply> {
        let out_before = self.transport.probe(&self.slots.output.published)?;
        let rc_before = self.transport.probe(&self.slots.rc.published)?;

        self.transport.remove(&self.slots.command.staging)?;
        self.transport
            .publish(&self.slots.command, &self.config.dialect.terminated(command))?;

        tracing::debug!(command_len = command.len(), "command published");

        let start = Instant::now();
        loop {
            if changed(out_before, self.transport.probe(&self.slots.output.published)?) {
                let output = self.transport.read(&self.slots.output.published)?;
                let return_code = self.await_return_code(rc_before)?;

                tracing::debug!(
                    output_len = output.len(),
                    ?return_code,
                    elapsed_ms = start.elapsed().as_millis(),
                    "reply received"
                );
                return Ok(Reply { output, return_code });
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(MailboxError::Timeout(timeout));
            }
            thread::sleep(poll_interval.min(timeout - elapsed));
        }
    }

    /// Read the return code if it changed, giving it a short grace window to
    /// catch up with the output slot.
    fn await_return_code(&self, before: Option<Stamp>) -> Result<Option<i32>> {
        let deadline = Instant::now() + self.config.rc_grace;
        loop {
            if changed(before, self.transport.probe(&self.slots.rc.published)?) {
                return Ok(parse_return_code(&self.transport.read(&self.slots.rc.published)?));
            }
            let now = Instant::now();
            if now >= deadline {
                tracing::debug!("return code did not change within grace window");
                return Ok(None);
            }
            thread::sleep(GRACE_STEP.min(deadline - now));
        }
    }
}

/// Present now and either absent before or different from before
fn changed(before: Option<Stamp>, now: Option<Stamp>) -> bool {
    match (before, now) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(b), Some(n)) => b != n,
    }
}
