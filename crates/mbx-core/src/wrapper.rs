//! Wrapper script synthesis

use crate::{MailboxError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Script language the guest interpreter understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptDialect {
    /// DOS batch run through `COMMAND.COM /C`
    Batch,
    /// POSIX shell
    Posix,
}

impl ScriptDialect {
    #[must_use]
    pub const fn line_ending(self) -> &'static str {
        match self {
            Self::Batch => "\r\n",
            Self::Posix => "\n",
        }
    }

    #[must_use]
    pub const fn default_job_name(self) -> &'static str {
        match self {
            Self::Batch => "MBXJOB.BAT",
            Self::Posix => "MBXJOB.SH",
        }
    }

    /// Interpreter program and leading arguments used when none is configured
    #[must_use]
    pub const fn default_interpreter(self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Batch => ("COMMAND.COM", &["/C"]),
            Self::Posix => ("sh", &[]),
        }
    }

    /// `text` with exactly one trailing line ending in this dialect
    #[must_use]
    pub fn terminated(self, text: &str) -> String {
        let mut out = text.trim_end_matches(['\r', '\n']).to_owned();
        out.push_str(self.line_ending());
        out
    }

    fn preamble(self) -> &'static [&'static str] {
        match self {
            Self::Batch => &["@echo off", "rem MBXSRV job wrapper"],
            Self::Posix => &["#!/bin/sh", "# mbxsrv job wrapper"],
        }
    }

    fn capture_status(self, rc_file: &str) -> [String; 2] {
        match self {
            Self::Batch => [
                "rem Capture ERRORLEVEL of last command".to_owned(),
                format!("echo %errorlevel% > {rc_file}"),
            ],
            Self::Posix => [
                "# capture exit status of last command".to_owned(),
                format!("echo $? > '{rc_file}'"),
            ],
        }
    }
}

impl fmt::Display for ScriptDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Batch => "batch",
            Self::Posix => "posix",
        })
    }
}

impl FromStr for ScriptDialect {
    type Err = MailboxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "batch" | "bat" | "dos" => Ok(Self::Batch),
            "posix" | "sh" => Ok(Self::Posix),
            other => Err(MailboxError::Config(format!("unknown script dialect {other:?}"))),
        }
    }
}

/// Build the wrapper around a command payload.
///
/// The payload is copied line by line and followed by a step that writes
/// the exit status of its last command to `rc_file` (a name relative to the
/// mailbox directory, which is the interpreter's working directory).
/// Payloads over `max_payload` bytes are rejected before anything is built.
pub fn synthesize(payload: &str, dialect: ScriptDialect, rc_file: &str, max_payload: usize) -> Result<String> {
    if payload.len() > max_payload {
        return Err(MailboxError::PayloadTooLarge {
            size: payload.len(),
            limit: max_payload,
        });
    }

    let eol = dialect.line_ending();
    let mut script = String::with_capacity(payload.len() + 128);

    for line in dialect.preamble() {
        script.push_str(line);
        script.push_str(eol);
    }
    for line in payload.lines() {
        script.push_str(line);
        script.push_str(eol);
    }
    script.push_str(eol);
    for line in dialect.capture_status(rc_file) {
        script.push_str(&line);
        script.push_str(eol);
    }

    Ok(script)
}
