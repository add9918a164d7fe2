//! Interpreter capability used by the guest server

use crate::wrapper::ScriptDialect;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// One wrapper invocation
#[derive(Debug, Clone, Copy)]
pub struct Job<'a> {
    /// Synthesized wrapper script
    pub script: &'a Path,
    /// File that receives standard output (the output staging name)
    pub stdout: &'a Path,
    /// Working directory; the wrapper writes its return code relative to it
    pub workdir: &'a Path,
    /// Send standard error to `stdout` as well
    pub merge_stderr: bool,
}

/// What the invocation itself reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    /// Exit status of the interpreter process; `None` when it was killed
    pub status: Option<i32>,
}

/// Runs a wrapper script and captures its standard output.
///
/// Implemented for closures so the server state machine can be driven
/// without spawning a process.
pub trait Interpreter {
    fn invoke(&self, job: &Job<'_>) -> io::Result<Invocation>;
}

impl<F> Interpreter for F
where
    F: Fn(&Job<'_>) -> io::Result<Invocation>,
{
    fn invoke(&self, job: &Job<'_>) -> io::Result<Invocation> {
        self(job)
    }
}

/// Interpreter backed by an external program, e.g. `sh` or `COMMAND.COM /C`
#[derive(Debug, Clone)]
pub struct ShellInterpreter {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ShellInterpreter {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Default interpreter for a dialect
    #[must_use]
    pub fn for_dialect(dialect: ScriptDialect) -> Self {
        let (program, args) = dialect.default_interpreter();
        args.iter().fold(Self::new(program), |sh, a| sh.arg(*a))
    }
}

impl Interpreter for ShellInterpreter {
    fn invoke(&self, job: &Job<'_>) -> io::Result<Invocation> {
        let stdout = File::create(job.stdout)?;
        let stderr = if job.merge_stderr {
            Stdio::from(stdout.try_clone()?)
        } else {
            Stdio::inherit()
        };

        tracing::debug!(
            program = ?self.program,
            script = ?job.script,
            merge_stderr = job.merge_stderr,
            "invoking interpreter"
        );

        // the child runs inside workdir, so a relative script path would
        // resolve against the wrong directory
        let script = std::path::absolute(job.script)?;

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&script)
            .current_dir(job.workdir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()?;

        Ok(Invocation {
            status: status.code(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn shell_captures_stdout_and_status() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("job.sh");
        let out = dir.path().join("OUT.NEW");
        std::fs::write(&script, "echo token-123\necho oops >&2\nexit 4\n").unwrap();

        let job = Job {
            script: &script,
            stdout: &out,
            workdir: dir.path(),
            merge_stderr: true,
        };
        let inv = ShellInterpreter::for_dialect(ScriptDialect::Posix).invoke(&job).unwrap();

        assert_eq!(inv.status, Some(4));
        let captured = std::fs::read_to_string(&out).unwrap();
        assert!(captured.contains("token-123"));
        assert!(captured.contains("oops"));
    }

    #[test]
    fn relative_workdir_still_finds_the_script() {
        // created under the test's cwd so the path stays relative
        let dir = tempfile::Builder::new().prefix("mbx-rel").tempdir_in(".").unwrap();
        let rel = dir
            .path()
            .strip_prefix(std::env::current_dir().unwrap())
            .unwrap_or_else(|_| dir.path())
            .to_path_buf();
        assert!(rel.is_relative());

        let script = rel.join("MBXJOB.SH");
        let out = rel.join("OUT.NEW");
        std::fs::write(&script, "echo relative-ok\n").unwrap();

        let job = Job {
            script: &script,
            stdout: &out,
            workdir: &rel,
            merge_stderr: false,
        };
        let inv = ShellInterpreter::for_dialect(ScriptDialect::Posix).invoke(&job).unwrap();

        assert_eq!(inv.status, Some(0));
        assert!(std::fs::read_to_string(&out).unwrap().contains("relative-ok"));
    }

    #[test]
    fn missing_program_is_an_error() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("job.sh");
        let out = dir.path().join("OUT.NEW");
        let job = Job {
            script: &script,
            stdout: &out,
            workdir: dir.path(),
            merge_stderr: false,
        };
        assert!(ShellInterpreter::new("/nonexistent/mbx-shell").invoke(&job).is_err());
    }
}
