//! CLI argument definitions using clap
//!
//! Commands:
//! - redeliver inspect --config <path>
//! - redeliver compact --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inspect and maintain a redelivery marker store
#[derive(Parser, Debug)]
#[command(name = "redeliver")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every pending marker with its redelivery deadline
    Inspect {
        /// Path to configuration file
        #[arg(long, default_value = "./redeliver.json")]
        config: PathBuf,
    },

    /// Rewrite the marker log down to its live entries
    Compact {
        /// Path to configuration file
        #[arg(long, default_value = "./redeliver.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inspect() {
        let cli = Cli::try_parse_from(["redeliver", "inspect", "--config", "/etc/r.json"]).unwrap();
        assert!(!cli.json_logs);
        match cli.command {
            Command::Inspect { config } => assert_eq!(config, PathBuf::from("/etc/r.json")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_compact_default_config() {
        let cli = Cli::try_parse_from(["redeliver", "compact", "--json-logs"]).unwrap();
        assert!(cli.json_logs);
        assert!(matches!(
            cli.command,
            Command::Compact { config } if config == PathBuf::from("./redeliver.json")
        ));
    }
}
