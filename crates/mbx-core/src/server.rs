//! Guest mailbox server
//!
//! A single-threaded poll loop. Each tick claims a published command if none
//! is held, runs it through the wrapper and interpreter, and publishes the
//! output and return-code slots. Slot I/O failures are logged and never stop
//! the loop; the job in hand degrades to a published error and READY.

use crate::interpreter::{Interpreter, Job};
use crate::log::MailboxLog;
use crate::protocol::{self, Status, BYE_OUTPUT};
use crate::slot::{RenameTransport, Slot, SlotState, SlotTransport, Slots};
use crate::wrapper;
use crate::{MailboxConfig, MailboxError, Result};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Outcome of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing was claimed
    Idle,
    /// A command was handled and the server is READY again
    Processed,
    /// The server reached BYE
    Stop,
}

pub struct MailboxServer<I, T = RenameTransport> {
    config: MailboxConfig,
    slots: Slots,
    transport: T,
    interpreter: I,
    log: MailboxLog,
    abort: Arc<AtomicBool>,
    status: Option<Status>,
}

impl<I: Interpreter> MailboxServer<I, RenameTransport> {
    pub fn new(config: MailboxConfig, interpreter: I) -> Self {
        Self::with_transport(config, interpreter, RenameTransport)
    }
}

impl<I: Interpreter, T: SlotTransport> MailboxServer<I, T> {
    pub fn with_transport(config: MailboxConfig, interpreter: I, transport: T) -> Self {
        let slots = Slots::from_config(&config);
        let log = MailboxLog::new(slots.log.clone(), config.dialect.line_ending());
        Self {
            config,
            slots,
            transport,
            interpreter,
            log,
            abort: Arc::new(AtomicBool::new(false)),
            status: None,
        }
    }

    /// Use an externally owned abort flag (e.g. one registered for SIGINT)
    #[must_use]
    pub fn with_abort(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = abort;
        self
    }

    /// Flag that stops the loop at the start of the next tick
    #[must_use]
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Last status this server published
    #[must_use]
    pub const fn status(&self) -> Option<Status> {
        self.status
    }

    /// Announce READY and report a claim left behind by a previous run.
    ///
    /// A stale claim is not touched; its content is intact, so the next tick
    /// processes it like any other claimed command.
    pub fn start(&mut self) {
        self.log.line("MBXSRV starting");
        tracing::info!(dir = ?self.config.dir, dialect = %self.config.dialect, "mailbox server starting");
        self.set_status(Status::Ready);

        match self.transport.probe(&self.slots.owned) {
            Ok(Some(_)) => {
                self.log.line(&format!("Found stale {}; will process it", self.config.names.cmd_run));
                tracing::warn!(path = ?self.slots.owned, "stale claimed command from a previous run");
            }
            Ok(None) => {}
            Err(e) => self.report("probe claimed command", &e),
        }
    }

    /// Run until EXIT/QUIT or the abort flag
    pub fn run(&mut self) {
        self.start();
        let idle = self.config.clamped_idle_interval();

        while self.tick() != Tick::Stop {
            thread::sleep(idle);
        }

        self.log.line("MBXSRV stopped");
        tracing::info!("mailbox server stopped");
    }

    /// One loop iteration without the idle sleep
    pub fn tick(&mut self) -> Tick {
        if self.abort.load(Ordering::Relaxed) {
            self.log.line("Abort requested; exiting");
            tracing::info!("abort requested");
            self.set_status(Status::Bye);
            return Tick::Stop;
        }

        let claimed = match self.transport.command_state(&self.slots) {
            Ok(SlotState::Claimed) => true,
            Ok(SlotState::Published(_)) => self.claim(),
            Ok(SlotState::Absent) => false,
            Err(e) => {
                self.report("probe command slot", &e);
                false
            }
        };

        if claimed { self.process() } else { Tick::Idle }
    }

    /// Rename the published command to the owned name, retrying while the
    /// host's own rename may still be in flight.
    fn claim(&self) -> bool {
        let published = &self.slots.command.published;
        let mut last_error = None;

        for attempt in 0..self.config.claim_retries {
            match self.transport.probe(published) {
                Ok(Some(_)) => {}
                Ok(None) => return false,
                Err(e) => {
                    self.report("probe command slot", &e);
                    return false;
                }
            }

            match self.transport.claim(published, &self.slots.owned) {
                Ok(true) => {
                    let n = &self.config.names;
                    self.log.line(&format!("Claimed {} -> {}", n.cmd_txt, n.cmd_run));
                    tracing::debug!(attempt, "command claimed");
                    return true;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(attempt, os_error = e.os_error(), "claim attempt failed: {e}");
                    last_error = Some(e);
                }
            }
            thread::sleep(self.config.claim_backoff);
        }

        if let Some(e) = last_error {
            self.report("claim command", &e);
        }
        self.log.line(&format!(
            "WARN: {} left unclaimed after {} attempts",
            self.config.names.cmd_txt, self.config.claim_retries
        ));
        tracing::warn!(retries = self.config.claim_retries, "command left unclaimed");
        false
    }

    fn process(&mut self) -> Tick {
        self.set_status(Status::Running);

        let content = match self.transport.read(&self.slots.owned) {
            Ok(content) => content,
            Err(e) => {
                self.report("read claimed command", &e);
                let what = format!("Failed to read {}", self.config.names.cmd_run);
                self.publish_failure(&what, e.os_error());
                return self.finish(Status::Ready);
            }
        };

        let Some(directive) = protocol::directive(&content) else {
            let err = MailboxError::Protocol(format!("{} is empty", self.config.names.cmd_run));
            self.report("parse command", &err);
            self.publish_failure("CMD file is empty", None);
            return self.finish(Status::Ready);
        };

        if protocol::is_exit(directive) {
            self.log.line("Received EXIT/QUIT");
            tracing::info!("exit directive received");
            self.publish_text(&self.slots.output, BYE_OUTPUT);
            self.publish_text(&self.slots.rc, "0");
            return self.finish(Status::Bye);
        }

        let script = match wrapper::synthesize(
            &content,
            self.config.dialect,
            &self.config.names.rc_new,
            self.config.max_payload,
        ) {
            Ok(script) => script,
            Err(e) => {
                self.log.line(&format!("ERROR: wrapper synthesis failed ({e})"));
                tracing::warn!(payload_bytes = content.len(), "wrapper synthesis failed: {e}");
                self.publish_failure(&format!("Failed to build job wrapper: {e}"), None);
                return self.finish(Status::Ready);
            }
        };

        if let Err(e) = self.execute(&script, content.len()) {
            self.report("execute job", &e);
            self.publish_failure("Failed to run job", e.os_error());
        }
        self.finish(Status::Ready)
    }

    fn execute(&self, script: &str, payload_bytes: usize) -> Result<()> {
        let s = &self.slots;

        self.transport.remove(&s.rc.staging)?;
        self.transport.remove(&s.output.staging)?;
        fs::write(&s.job, script).map_err(|e| MailboxError::transport("write", &s.job, e))?;

        self.log.line(&format!("Executing job (payload={payload_bytes} bytes)"));
        tracing::info!(payload_bytes, "executing job");

        // No stale result may be mistaken for this job's
        self.transport.remove(&s.output.published)?;
        self.transport.remove(&s.rc.published)?;

        let job = Job {
            script: &s.job,
            stdout: &s.output.staging,
            workdir: &self.config.dir,
            merge_stderr: self.config.capture_stderr,
        };

        let (reported, missing_output) = match self.interpreter.invoke(&job) {
            Ok(inv) => {
                let rc = inv.status.map_or_else(|| "none".to_owned(), |c| c.to_string());
                self.log.line(&format!("interpreter rc={rc}"));
                tracing::debug!(status = ?inv.status, "interpreter finished");
                let message = format!("ERROR: {} missing (interpreter rc={rc})", self.config.names.out_new);
                (inv.status, message)
            }
            Err(source) => {
                let err = MailboxError::Execution {
                    script: s.job.clone(),
                    source,
                };
                let message = format!("ERROR: interpreter failed: {err}");
                self.report("invoke interpreter", &err);
                self.transport.remove(&s.output.staging)?;
                (None, message)
            }
        };

        if self.transport.probe(&s.output.staging)?.is_none() {
            fs::write(&s.output.staging, self.config.dialect.terminated(&missing_output))
                .map_err(|e| MailboxError::transport("write", &s.output.staging, e))?;
        }
        self.transport.publish_staged(&s.output)?;

        if self.transport.probe(&s.rc.staging)?.is_some() {
            self.transport.publish_staged(&s.rc)?;
        } else {
            // the payload left before the wrapper recorded a code
            let rc = reported.unwrap_or(1);
            self.log.line(&format!("{} missing; publishing rc={rc}", self.config.names.rc_new));
            self.transport.publish(&s.rc, &self.config.dialect.terminated(&rc.to_string()))?;
        }
        Ok(())
    }

    /// Publish an error message and a forced return code of 1
    fn publish_failure(&self, what: &str, os_error: Option<i32>) {
        let mut text = format!("ERROR: {what}");
        if let Some(code) = os_error {
            text.push_str(self.config.dialect.line_ending());
            text.push_str(&format!("errno={code}"));
        }
        self.publish_text(&self.slots.output, &text);
        self.publish_text(&self.slots.rc, "1");
    }

    fn publish_text(&self, slot: &Slot, text: &str) {
        if let Err(e) = self.transport.publish(slot, &self.config.dialect.terminated(text)) {
            self.report("publish result", &e);
        }
    }

    /// Drop the claimed command and move to `status`
    fn finish(&mut self, status: Status) -> Tick {
        if let Err(e) = self.transport.remove(&self.slots.owned) {
            self.report("remove claimed command", &e);
        }
        self.set_status(status);
        if status == Status::Bye { Tick::Stop } else { Tick::Processed }
    }

    fn set_status(&mut self, status: Status) {
        let text = self.config.dialect.terminated(status.as_str());
        if let Err(e) = self.transport.publish(&self.slots.status, &text) {
            self.log.line(&format!("WARN: failed to write {}", self.config.names.sta_txt));
            tracing::warn!(%status, os_error = e.os_error(), "failed to publish status: {e}");
        }
        self.status = Some(status);
    }

    fn report(&self, context: &str, err: &MailboxError) {
        let errno = err.os_error().map_or_else(|| "-".to_owned(), |c| c.to_string());
        self.log.line(&format!("ERROR: {context}: {err} (errno={errno})"));
        tracing::error!(os_error = err.os_error(), "{context}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Invocation;
    use crate::wrapper::ScriptDialect;
    use crate::config::SlotNames;
    use crate::slot::Stamp;
    use std::cell::Cell;
    use std::io;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> MailboxConfig {
        MailboxConfig::builder(dir.path())
            .dialect(ScriptDialect::Batch)
            .claim_retries(3, Duration::from_millis(1))
            .build()
    }

    fn read(dir: &TempDir, name: &str) -> String {
        fs::read_to_string(dir.path().join(name)).unwrap()
    }

    fn publish_command(dir: &TempDir, text: &str) {
        let slots = Slots::from_config(&config(dir));
        RenameTransport.publish(&slots.command, text).unwrap();
    }

    /// Pins the closure signature the `Interpreter` blanket impl expects
    fn interpreter<F>(f: F) -> F
    where
        F: Fn(&Job<'_>) -> io::Result<Invocation>,
    {
        f
    }

    /// Checks the wrapper, prints `token` and writes `rc` like the wrapper would
    fn scripted(
        calls: Arc<AtomicUsize>,
        token: &'static str,
        rc: &'static str,
    ) -> impl Fn(&Job<'_>) -> io::Result<Invocation> {
        interpreter(move |job| {
            calls.fetch_add(1, Ordering::SeqCst);
            let script = fs::read_to_string(job.script)?;
            assert!(script.starts_with("@echo off\r\n"));
            assert!(script.contains("echo %errorlevel% > RC.NEW"));
            assert!(!job.workdir.join("OUT.TXT").exists(), "stale output still published");
            fs::write(job.stdout, format!("{token}\r\n"))?;
            fs::write(job.workdir.join("RC.NEW"), format!("{rc} \r\n"))?;
            Ok(Invocation { status: Some(0) })
        })
    }

    fn never_called() -> impl Fn(&Job<'_>) -> io::Result<Invocation> {
        interpreter(|_| panic!("interpreter must not run"))
    }

    #[test]
    fn job_output_and_code_are_published() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        fs::write(dir.path().join("OUT.TXT"), "previous\r\n").unwrap();
        publish_command(&dir, "dir\r\n");

        let mut server = MailboxServer::new(config(&dir), scripted(Arc::clone(&calls), "TOKEN-1", "7"));
        server.start();

        assert_eq!(server.tick(), Tick::Processed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(read(&dir, "OUT.TXT"), "TOKEN-1\r\n");
        assert_eq!(protocol::parse_return_code(&read(&dir, "RC.TXT")), Some(7));
        assert_eq!(read(&dir, "STA.TXT"), "READY\r\n");
        assert!(!dir.path().join("CMD.RUN").exists());
        assert!(!dir.path().join("OUT.NEW").exists());
        assert!(!dir.path().join("RC.NEW").exists());
        assert!(read(&dir, "LOG.TXT").contains("Claimed CMD.TXT -> CMD.RUN"));

        assert_eq!(server.tick(), Tick::Idle);
    }

    #[test]
    fn exit_and_quit_stop_in_any_case() {
        for command in ["EXIT\r\n", "quit\r\n", "\r\n  \r\n  Exit  \r\ndir\r\n", "QuIt"] {
            let dir = TempDir::new().unwrap();
            publish_command(&dir, command);
            let mut server = MailboxServer::new(config(&dir), never_called());
            server.start();

            assert_eq!(server.tick(), Tick::Stop, "{command:?}");
            assert_eq!(read(&dir, "OUT.TXT"), "MBXSRV BYE\r\n");
            assert_eq!(protocol::parse_return_code(&read(&dir, "RC.TXT")), Some(0));
            assert_eq!(read(&dir, "STA.TXT"), "BYE\r\n");
            assert_eq!(server.status(), Some(Status::Bye));
            assert!(!dir.path().join("CMD.RUN").exists());
        }
    }

    #[test]
    fn oversized_payload_never_executes() {
        let dir = TempDir::new().unwrap();
        let config = MailboxConfig {
            max_payload: 16,
            ..config(&dir)
        };
        publish_command(&dir, &"echo way too long for the bound\r\n".repeat(4));

        let mut server = MailboxServer::new(config, never_called());
        assert_eq!(server.tick(), Tick::Processed);

        assert!(read(&dir, "OUT.TXT").starts_with("ERROR: Failed to build job wrapper"));
        assert_eq!(protocol::parse_return_code(&read(&dir, "RC.TXT")), Some(1));
        assert_eq!(read(&dir, "STA.TXT"), "READY\r\n");
        assert!(!dir.path().join("MBXJOB.BAT").exists());
        assert!(!dir.path().join("CMD.RUN").exists());
    }

    #[test]
    fn empty_command_is_reported() {
        let dir = TempDir::new().unwrap();
        publish_command(&dir, " \r\n\r\n");
        let mut server = MailboxServer::new(config(&dir), never_called());

        assert_eq!(server.tick(), Tick::Processed);
        assert_eq!(read(&dir, "OUT.TXT"), "ERROR: CMD file is empty\r\n");
        assert_eq!(read(&dir, "RC.TXT"), "1\r\n");
        assert_eq!(server.status(), Some(Status::Ready));
        assert!(read(&dir, "LOG.TXT").contains("protocol error: CMD.RUN is empty"));
    }

    #[test]
    fn silent_interpreter_gets_diagnostic_output() {
        let dir = TempDir::new().unwrap();
        publish_command(&dir, "cls\r\n");
        let silent = interpreter(|_| Ok(Invocation { status: Some(3) }));

        let mut server = MailboxServer::new(config(&dir), silent);
        assert_eq!(server.tick(), Tick::Processed);

        assert_eq!(read(&dir, "OUT.TXT"), "ERROR: OUT.NEW missing (interpreter rc=3)\r\n");
        assert_eq!(read(&dir, "RC.TXT"), "3\r\n");
    }

    #[test]
    fn interpreter_status_stands_in_for_missing_code() {
        let dir = TempDir::new().unwrap();
        publish_command(&dir, "echo T\r\nexit 5\r\n");
        // output written, but the payload exited before the wrapper's echo
        let early_exit = interpreter(|job| {
            fs::write(job.stdout, "T\r\n")?;
            Ok(Invocation { status: Some(5) })
        });

        let mut server = MailboxServer::new(config(&dir), early_exit);
        assert_eq!(server.tick(), Tick::Processed);

        assert_eq!(read(&dir, "OUT.TXT"), "T\r\n");
        assert_eq!(protocol::parse_return_code(&read(&dir, "RC.TXT")), Some(5));
        assert!(read(&dir, "LOG.TXT").contains("RC.NEW missing; publishing rc=5"));

        // killed by a signal: no status to fall back on
        publish_command(&dir, "dir\r\n");
        let mut server = MailboxServer::new(config(&dir), interpreter(|_| Ok(Invocation { status: None })));
        assert_eq!(server.tick(), Tick::Processed);
        assert_eq!(read(&dir, "RC.TXT"), "1\r\n");
    }

    #[test]
    fn failed_invocation_is_published_and_loop_continues() {
        let dir = TempDir::new().unwrap();
        publish_command(&dir, "dir\r\n");
        let broken = interpreter(|_| Err(io::Error::from_raw_os_error(2)));

        let mut server = MailboxServer::new(config(&dir), broken);
        assert_eq!(server.tick(), Tick::Processed);

        let output = read(&dir, "OUT.TXT");
        assert!(output.starts_with("ERROR: interpreter failed: execution error"));
        assert!(output.contains("MBXJOB.BAT"));
        assert_eq!(read(&dir, "RC.TXT"), "1\r\n");
        assert_eq!(server.status(), Some(Status::Ready));
        assert!(read(&dir, "LOG.TXT").contains("errno=2"));

        publish_command(&dir, "ver\r\n");
        assert_eq!(server.tick(), Tick::Processed);
    }

    #[test]
    fn stale_claim_is_logged_then_processed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("CMD.RUN"), "mem\r\n").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut server = MailboxServer::new(config(&dir), scripted(Arc::clone(&calls), "MEM", "0"));
        server.start();

        assert!(read(&dir, "LOG.TXT").contains("Found stale CMD.RUN"));
        assert!(dir.path().join("CMD.RUN").exists());

        assert_eq!(server.tick(), Tick::Processed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(read(&dir, "OUT.TXT"), "MEM\r\n");
    }

    #[test]
    fn claimed_command_runs_before_new_claims() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("CMD.RUN"), "first\r\n").unwrap();
        publish_command(&dir, "second\r\n");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = {
            let seen = Arc::clone(&seen);
            interpreter(move |job| {
                let script = fs::read_to_string(job.script)?;
                let payload = script.lines().nth(2).unwrap_or_default().to_owned();
                seen.lock().unwrap().push(payload);
                fs::write(job.stdout, "ok\r\n")?;
                Ok(Invocation { status: Some(0) })
            })
        };

        let mut server = MailboxServer::new(config(&dir), recorder);
        assert_eq!(server.tick(), Tick::Processed);
        assert!(dir.path().join("CMD.TXT").exists());
        assert_eq!(server.tick(), Tick::Processed);

        assert_eq!(*seen.lock().unwrap(), vec!["first".to_owned(), "second".to_owned()]);
    }

    #[test]
    fn abort_flag_says_bye_without_output() {
        let dir = TempDir::new().unwrap();
        publish_command(&dir, "dir\r\n");
        let mut server = MailboxServer::new(config(&dir), never_called());
        server.abort_handle().store(true, Ordering::Relaxed);

        assert_eq!(server.tick(), Tick::Stop);
        assert_eq!(read(&dir, "STA.TXT"), "BYE\r\n");
        assert!(!dir.path().join("OUT.TXT").exists());
        assert!(dir.path().join("CMD.TXT").exists());
    }

    #[test]
    fn stderr_opt_in_reaches_interpreter() {
        let dir = TempDir::new().unwrap();
        publish_command(&dir, "dir\r\n");
        let config = MailboxConfig {
            capture_stderr: true,
            ..config(&dir)
        };
        let check = interpreter(|job| {
            assert!(job.merge_stderr);
            assert_eq!(job.script, job.workdir.join("MBXJOB.BAT"));
            fs::write(job.stdout, "x\r\n")?;
            Ok(Invocation { status: Some(0) })
        });

        let mut server = MailboxServer::new(config, check);
        assert_eq!(server.tick(), Tick::Processed);
        assert_eq!(read(&dir, "OUT.TXT"), "x\r\n");
    }

    #[test]
    fn run_returns_after_exit_command() {
        let dir = TempDir::new().unwrap();
        publish_command(&dir, "EXIT\r\n");
        let mut server = MailboxServer::new(config(&dir), never_called());

        server.run();

        let log = read(&dir, "LOG.TXT");
        assert!(log.contains("MBXSRV starting"));
        assert!(log.contains("Received EXIT/QUIT"));
        assert!(log.contains("MBXSRV stopped"));
    }

    /// Rename transport whose first `failures` claims hit a sharing violation
    struct FlakyClaims {
        failures: Cell<u32>,
        attempts: Cell<u32>,
    }

    impl FlakyClaims {
        fn failing(failures: u32) -> Self {
            Self {
                failures: Cell::new(failures),
                attempts: Cell::new(0),
            }
        }
    }

    impl SlotTransport for FlakyClaims {
        fn publish(&self, slot: &Slot, content: &str) -> Result<()> {
            RenameTransport.publish(slot, content)
        }

        fn publish_staged(&self, slot: &Slot) -> Result<()> {
            RenameTransport.publish_staged(slot)
        }

        fn probe(&self, path: &Path) -> Result<Option<Stamp>> {
            RenameTransport.probe(path)
        }

        fn claim(&self, published: &Path, owned: &Path) -> Result<bool> {
            self.attempts.set(self.attempts.get() + 1);
            let left = self.failures.get();
            if left > 0 {
                self.failures.set(left - 1);
                let sharing_violation = io::Error::from_raw_os_error(13);
                return Err(MailboxError::transport("rename", published, sharing_violation));
            }
            RenameTransport.claim(published, owned)
        }

        fn remove(&self, path: &Path) -> Result<()> {
            RenameTransport.remove(path)
        }

        fn read(&self, path: &Path) -> Result<String> {
            RenameTransport.read(path)
        }
    }

    #[test]
    fn transient_claim_failures_are_retried() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        publish_command(&dir, "dir\r\n");

        let handler = scripted(Arc::clone(&calls), "AFTER-RETRY", "0");
        let mut server = MailboxServer::with_transport(config(&dir), handler, FlakyClaims::failing(2));
        assert_eq!(server.tick(), Tick::Processed);

        assert_eq!(server.transport.attempts.get(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(read(&dir, "OUT.TXT"), "AFTER-RETRY\r\n");
        assert!(!read(&dir, "LOG.TXT").contains("claim command"));
    }

    #[test]
    fn exhausted_claim_is_logged_and_left_published() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        publish_command(&dir, "dir\r\n");

        // config() allows three attempts per tick
        let handler = scripted(Arc::clone(&calls), "NEXT-TICK", "0");
        let mut server = MailboxServer::with_transport(config(&dir), handler, FlakyClaims::failing(3));
        assert_eq!(server.tick(), Tick::Idle);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(dir.path().join("CMD.TXT").exists());
        assert!(!dir.path().join("CMD.RUN").exists());
        let log = read(&dir, "LOG.TXT");
        assert!(log.contains("ERROR: claim command"));
        assert!(log.contains("errno=13"));
        assert!(log.contains("CMD.TXT left unclaimed after 3 attempts"));

        // the sharing violation cleared; the next tick picks it up
        assert_eq!(server.tick(), Tick::Processed);
        assert_eq!(read(&dir, "OUT.TXT"), "NEXT-TICK\r\n");
    }

    #[test]
    fn diagnostics_use_configured_slot_names() {
        let dir = TempDir::new().unwrap();
        let names = SlotNames {
            cmd_txt: "JOB.TXT".into(),
            cmd_run: "JOB.RUN".into(),
            out_new: "RES.NEW".into(),
            out_txt: "RES.TXT".into(),
            ..SlotNames::default()
        };
        let config = MailboxConfig {
            names,
            ..config(&dir)
        };
        RenameTransport
            .publish(&Slots::from_config(&config).command, " \r\n")
            .unwrap();

        let silent = interpreter(|_| Ok(Invocation { status: Some(0) }));
        let mut server = MailboxServer::new(config.clone(), silent);
        assert_eq!(server.tick(), Tick::Processed);
        assert!(read(&dir, "LOG.TXT").contains("JOB.RUN is empty"));

        RenameTransport
            .publish(&Slots::from_config(&config).command, "cls\r\n")
            .unwrap();
        assert_eq!(server.tick(), Tick::Processed);
        assert_eq!(read(&dir, "RES.TXT"), "ERROR: RES.NEW missing (interpreter rc=0)\r\n");
        assert!(!read(&dir, "LOG.TXT").contains("CMD.RUN"));
    }
}
