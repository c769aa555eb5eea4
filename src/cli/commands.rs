//! CLI command implementations
//!
//! Both commands open the durable store directly and must not run while a
//! processor holds the same store directory.

use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::args::{Cli, Command};
use super::errors::CliResult;
use crate::clock::{Clock, SystemClock};
use crate::config::RedeliveryConfig;
use crate::marker::{MarkerValue, MessageRef};
use crate::observability::{init_logging, LogFormat};
use crate::store::{MarkerStore, OpenStats, WalMarkerStore};

/// One line of `inspect` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMarker {
    pub marker: String,
    pub message: MessageRef,
    pub started_at: DateTime<Utc>,
    /// When redelivery would fire if the processor started now
    pub deadline: DateTime<Utc>,
    pub overdue: bool,
}

/// Parse arguments, install logging and run the chosen command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_logging(format, "info");
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cmd {
        Command::Inspect { config } => inspect(&config, &SystemClock, &mut out).map(|_| ()),
        Command::Compact { config } => compact(&config, &mut out).map(|_| ()),
    }
}

/// List pending markers, earliest deadline first, one JSON object per line.
///
/// Deadlines follow startup recovery: `min(started_at, now) + timeout`.
/// Returns the listed markers.
pub fn inspect<W: Write>(
    config_path: &Path,
    clock: &dyn Clock,
    out: &mut W,
) -> CliResult<Vec<PendingMarker>> {
    let config = RedeliveryConfig::load(config_path)?;
    let store = WalMarkerStore::open(config.store_path())?;
    let now = clock.now_millis();

    let mut pending: Vec<(u64, PendingMarker)> = Vec::new();
    for (key, value) in store.iter_all()? {
        let start = match value {
            MarkerValue::Start(start) => start,
            MarkerValue::Complete => {
                warn!(marker = %key, "skipping non-start entry in marker store");
                continue;
            }
        };

        let deadline = start.started_at.min(now).saturating_add(config.message_timeout_ms);
        pending.push((
            deadline,
            PendingMarker {
                marker: key.to_string(),
                message: start.message,
                started_at: to_datetime(start.started_at),
                deadline: to_datetime(deadline),
                overdue: deadline <= now,
            },
        ));
    }
    store.close()?;

    pending.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.marker.cmp(&b.1.marker)));
    let pending: Vec<PendingMarker> = pending.into_iter().map(|(_, marker)| marker).collect();

    for marker in &pending {
        serde_json::to_writer(&mut *out, marker)?;
        writeln!(out)?;
    }
    out.flush()?;

    Ok(pending)
}

/// Open the store, compacting its log, and print what the open did.
pub fn compact<W: Write>(config_path: &Path, out: &mut W) -> CliResult<OpenStats> {
    let config = RedeliveryConfig::load(config_path)?;
    let store = WalMarkerStore::open(config.store_path())?;
    if !store.open_stats().compacted {
        store.compact()?;
    }
    let stats = store.open_stats().clone();
    store.close()?;

    serde_json::to_writer(&mut *out, &stats)?;
    writeln!(out)?;
    out.flush()?;

    Ok(stats)
}

fn to_datetime(millis: u64) -> DateTime<Utc> {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default()
}
