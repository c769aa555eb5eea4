//! redeliver CLI entry point
//!
//! Parses arguments, installs logging and dispatches to the CLI module.
//! Errors go to stderr with a non-zero exit code.

use redeliver::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
