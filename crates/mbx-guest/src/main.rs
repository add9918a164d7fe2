//! mbxsrv - guest-side mailbox command server
//!
//! Polls the shared directory for a published command, claims it, runs it
//! through the configured interpreter and publishes output and return code.
//! SIGINT/SIGTERM stop the loop with status BYE.

use anyhow::{Result, bail};
use clap::Parser;
use mbx_core::MailboxServer;
use mbx_core::wrapper::ScriptDialect;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing_subscriber::EnvFilter;

mod config;

use config::GuestConfig;

#[derive(Parser, Debug)]
#[command(name = "mbxsrv")]
#[command(author, version, about = "Guest-side command server for a shared-folder mailbox")]
struct Cli {
    /// Shared mailbox directory
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Sleep between polls in milliseconds (10-2000)
    #[arg(long)]
    idle_ms: Option<u64>,

    /// Also capture the interpreter's stderr into the output slot
    #[arg(long, env = "MBX_STDERR")]
    capture_stderr: bool,

    /// Wrapper script dialect (batch or posix)
    #[arg(long)]
    dialect: Option<ScriptDialect>,

    /// Interpreter program, e.g. /bin/sh or COMMAND.COM
    #[arg(long)]
    interpreter: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mbx=info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut guest = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            GuestConfig::load(path)?
        }
        None => GuestConfig::default(),
    };

    if let Some(ms) = cli.idle_ms {
        guest.override_idle_ms(ms);
    }
    if cli.capture_stderr {
        guest.capture_stderr = true;
    }
    if let Some(dialect) = cli.dialect {
        guest.dialect = dialect;
    }
    if let Some(program) = cli.interpreter {
        guest.interpreter = Some(program);
        guest.interpreter_args.clear();
    }

    if !cli.dir.is_dir() {
        bail!("mailbox directory does not exist: {}", cli.dir.display());
    }

    let mailbox = guest.mailbox(cli.dir);
    let interpreter = guest.interpreter();
    tracing::info!(
        dir = ?mailbox.dir,
        idle_ms = guest.idle_ms,
        dialect = %mailbox.dialect,
        interpreter = ?interpreter.program,
        capture_stderr = mailbox.capture_stderr,
        "configuration loaded"
    );

    let abort = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&abort))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&abort))?;

    MailboxServer::new(mailbox, interpreter).with_abort(abort).run();

    Ok(())
}
