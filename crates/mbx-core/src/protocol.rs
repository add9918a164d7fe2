//! Text conventions carried by the slots

use std::fmt;
use std::str::FromStr;

/// Output published when the guest is told to stop
pub const BYE_OUTPUT: &str = "MBXSRV BYE";

/// Coarse guest state published in the status slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Waiting for a command
    Ready,
    /// Executing a claimed command
    Running,
    /// Stopped; no further commands will be claimed
    Bye,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Bye => "BYE",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = crate::MailboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "READY" => Ok(Self::Ready),
            "RUNNING" => Ok(Self::Running),
            "BYE" => Ok(Self::Bye),
            other => Err(crate::MailboxError::Protocol(format!("unknown status {other:?}"))),
        }
    }
}

/// First non-blank line of a command, trimmed
#[must_use]
pub fn directive(command: &str) -> Option<&str> {
    command.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Whether a directive asks the guest server to stop
#[must_use]
pub fn is_exit(directive: &str) -> bool {
    directive.eq_ignore_ascii_case("EXIT") || directive.eq_ignore_ascii_case("QUIT")
}

/// Parse return-code slot content.
///
/// The first whitespace-separated token that parses as an integer wins; CR,
/// LF and tabs count as whitespace.
#[must_use]
pub fn parse_return_code(text: &str) -> Option<i32> {
    text.split_whitespace().find_map(|token| token.parse().ok())
}
