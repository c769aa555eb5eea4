//! CLI module for redeliver
//!
//! Offline tools over a durable marker store:
//! - inspect: list pending markers and their deadlines
//! - compact: rewrite the marker log to its live entries

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{compact, inspect, run, run_command, PendingMarker};
pub use errors::{CliError, CliErrorCode, CliResult};
