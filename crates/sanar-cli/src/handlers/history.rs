//! History command handler

use sanar::{AttemptStats, LocatorRecord};
use std::fmt::Write;

use super::open_existing_store;
use crate::commands::{HistoryArgs, OutputFormat};
use crate::error::{CliError, CliResult};
use crate::output::{Painter, Reporter};

/// Execute the history command
pub async fn execute_history(args: &HistoryArgs, out: &Reporter) -> CliResult<()> {
    let dir = &args.store.store;
    let unknown = || CliError::UnknownLocator {
        name: args.name.clone(),
        store: dir.display().to_string(),
    };
    let store = open_existing_store(dir)?.ok_or_else(unknown)?;
    let record = store.get(&args.name).await?.ok_or_else(unknown)?;

    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&record)?,
        OutputFormat::Text => render_record(&record, out.painter()),
    };
    out.print(&rendered);
    Ok(())
}

fn stats_line(stats: &AttemptStats, painter: Painter) -> String {
    let mut line = format!(
        "ok {}  fail {}  rate {:.0}%",
        painter.good(&stats.success_count.to_string()),
        painter.bad(&stats.failure_count.to_string()),
        stats.success_rate() * 100.0
    );
    if stats.consecutive_failures > 0 {
        let _ = write!(line, "  failing {}x", stats.consecutive_failures);
    }
    if let Some(at) = stats.last_success {
        let _ = write!(line, "  {}", painter.dim(&format!("last {}", at.to_rfc3339())));
    }
    line
}

/// Render a record as text
#[must_use]
pub fn render_record(record: &LocatorRecord, painter: Painter) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", painter.name(&record.logical_name));
    let _ = writeln!(
        out,
        "  primary  {}  {}",
        painter.locator(&record.primary_descriptor.to_string()),
        stats_line(&record.primary_stats, painter)
    );

    if record.fallback_history.is_empty() {
        let _ = writeln!(out, "  fallbacks  {}", painter.dim("none"));
    } else {
        let _ = writeln!(out, "  fallbacks");
        for (i, entry) in record.fallback_history.iter().enumerate() {
            let _ = writeln!(
                out,
                "    {}. {}  {}",
                i + 1,
                painter.locator(&entry.descriptor.to_string()),
                stats_line(&entry.stats, painter)
            );
        }
    }

    if !record.last_snapshot.is_empty() {
        let attrs: Vec<String> = record
            .last_snapshot
            .iter()
            .map(|(k, v)| format!("{k}={v:?}"))
            .collect();
        let _ = writeln!(out, "  snapshot  {}", attrs.join(" "));
    }
    let _ = writeln!(
        out,
        "  updated  {}",
        painter.dim(&record.updated_at.to_rfc3339())
    );
    out
}
