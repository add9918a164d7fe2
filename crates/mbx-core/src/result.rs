//! Host-side result of a submitted command

/// What the guest published for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Captured output slot content, lossy UTF-8
    pub output: String,

    /// Parsed return-code slot. `None` means the code never showed up within
    /// the grace window or was unparsable; that is not a failure.
    pub return_code: Option<i32>,
}

impl Reply {
    /// Check if the guest reported exit code 0
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.return_code == Some(0)
    }

    /// Process exit status a CLI should mirror; unknown maps to 0
    #[must_use]
    pub fn exit_status(&self) -> i32 {
        self.return_code.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_code_is_not_a_failure() {
        let unknown = Reply {
            output: "done\n".into(),
            return_code: None,
        };
        assert!(!unknown.is_success());
        assert_eq!(unknown.exit_status(), 0);

        let failed = Reply {
            return_code: Some(2),
            ..unknown
        };
        assert_eq!(failed.exit_status(), 2);
    }
}
