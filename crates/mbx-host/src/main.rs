//! mbxhost - host side of the shared-folder mailbox
//!
//! One-shot: `mbxhost <DIR> --cmd "ver" [--timeout 8000]`
//! Interactive: `mbxhost <DIR>`

use clap::Parser;
use mbx_core::{MailboxClient, MailboxConfig, Reply};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Typed locally to leave the interactive loop
const LOCAL_EXIT: &str = "exit";

/// Typed to stop the guest server and leave
const QUIT_GUEST: &str = "quit-guest";

#[derive(Parser)]
#[command(name = "mbxhost")]
#[command(author, version, about = "Send commands to a guest through a shared-folder mailbox")]
struct Cli {
    /// Shared mailbox directory
    dir: PathBuf,

    /// Send one command and exit with its return code
    #[arg(long)]
    cmd: Option<String>,

    /// Milliseconds to wait for output
    #[arg(short, long, default_value = "5000")]
    timeout: u64,

    /// Milliseconds between output probes
    #[arg(long, default_value = "50")]
    poll: u64,

    /// Wrapper dialect the guest uses; sets the command line ending
    #[arg(long, default_value = "posix")]
    dialect: mbx_core::wrapper::ScriptDialect,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mbx=warn".parse()?))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if !cli.dir.is_dir() {
        eprintln!("Shared folder does not exist: {}", cli.dir.display());
        return Ok(ExitCode::from(2));
    }

    let config = MailboxConfig::builder(&cli.dir)
        .timeout_ms(cli.timeout)
        .poll_interval(Duration::from_millis(cli.poll))
        .dialect(cli.dialect)
        .build();
    let client = MailboxClient::new(config);

    Ok(match cli.cmd {
        Some(command) => one_shot(&client, &command),
        None => repl(&client),
    })
}

fn one_shot(client: &MailboxClient, command: &str) -> ExitCode {
    match client.submit(command) {
        Ok(reply) => {
            print_reply(&reply);
            // Exit statuses are a byte wide; out-of-range codes report as 1
            ExitCode::from(u8::try_from(reply.exit_status()).unwrap_or(1))
        }
        Err(e) => {
            eprintln!("mbxhost error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn repl(client: &MailboxClient) -> ExitCode {
    println!(
        "mbxhost REPL. Shared folder: {}\n\
         Type guest commands. Use '{LOCAL_EXIT}' to quit, '{QUIT_GUEST}' to stop the guest and quit.",
        client.config().dir.display()
    );

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("guest> ");
        let _ = io::stdout().flush();

        let Some(Ok(line)) = lines.next() else { break };

        match Action::from_line(&line) {
            Action::Leave => break,
            Action::StopGuest => {
                match client.submit("EXIT") {
                    Ok(reply) => print!("{}", reply.output),
                    Err(e) => eprintln!("mbxhost error: {e}"),
                }
                break;
            }
            Action::Skip => {}
            Action::Submit(command) => match client.submit(command) {
                Ok(reply) => print_reply(&reply),
                Err(e) => eprintln!("mbxhost error: {e}"),
            },
        }
    }

    ExitCode::SUCCESS
}

/// What one interactive input line asks for
#[derive(Debug, PartialEq, Eq)]
enum Action<'a> {
    Leave,
    StopGuest,
    Skip,
    Submit(&'a str),
}

impl<'a> Action<'a> {
    fn from_line(line: &'a str) -> Self {
        match line.trim_end() {
            LOCAL_EXIT => Self::Leave,
            QUIT_GUEST => Self::StopGuest,
            "" => Self::Skip,
            command => Self::Submit(command),
        }
    }
}

fn print_reply(reply: &Reply) {
    print!("{}", reply.output);
    if !reply.output.ends_with('\n') {
        println!();
    }
    match reply.return_code {
        Some(rc) => println!("[RC] {rc}"),
        None => tracing::warn!("no return code published"),
    }
}
