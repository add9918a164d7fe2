//! # mbx-core
//!
//! Command exchange between a host and an isolated guest through a shared
//! directory, with files as the only transport.
//!
//! This crate provides:
//! - Slot transport: stage-then-rename publishing and rename-based claiming
//! - The host client that submits a command and waits for its output
//! - The guest server state machine (READY / RUNNING / BYE)
//! - Wrapper script synthesis with return-code capture
//! - An injectable interpreter capability

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod log;
pub mod protocol;
pub mod result;
pub mod server;
pub mod slot;
pub mod wrapper;

pub use client::MailboxClient;
pub use config::MailboxConfig;
pub use error::MailboxError;
pub use result::Reply;
pub use server::MailboxServer;

/// Crate-level result type
pub type Result<T> = std::result::Result<T, MailboxError>;
