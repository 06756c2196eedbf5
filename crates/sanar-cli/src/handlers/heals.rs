//! Heals command handler

use sanar::{HealEvent, HealJournal};
use std::fmt::Write;

use crate::commands::{HealsArgs, OutputFormat};
use crate::error::CliResult;
use crate::output::{Painter, Reporter};

/// Execute the heals command
pub async fn execute_heals(args: &HealsArgs, out: &Reporter) -> CliResult<()> {
    let events = HealJournal::read(&args.log).await?;
    tracing::debug!(path = %args.log.display(), events = events.len(), "Read heal journal");
    let selected = select_heals(events, args.name.as_deref(), args.limit);

    match args.format {
        OutputFormat::Json => out.print(&serde_json::to_string_pretty(&selected)?),
        OutputFormat::Text if selected.is_empty() => {
            out.warning(&format!("No heals recorded in {}", args.log.display()));
        }
        OutputFormat::Text => out.print(&render_heals(&selected, out.painter())),
    }
    Ok(())
}

/// Filter by logical name and keep the last `limit` events
#[must_use]
pub fn select_heals(events: Vec<HealEvent>, name: Option<&str>, limit: Option<usize>) -> Vec<HealEvent> {
    let mut selected: Vec<HealEvent> = events
        .into_iter()
        .filter(|e| name.map_or(true, |n| e.logical_name.as_deref() == Some(n)))
        .collect();
    if let Some(limit) = limit {
        let skip = selected.len().saturating_sub(limit);
        selected.drain(..skip);
    }
    selected
}

/// Render heal events, one per line
#[must_use]
pub fn render_heals(events: &[HealEvent], painter: Painter) -> String {
    let mut out = String::new();
    for event in events {
        let _ = write!(
            out,
            "{}  {}  {} -> {}  via {}  confidence {:.2}",
            painter.dim(&event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            painter.name(event.logical_name.as_deref().unwrap_or("-")),
            painter.bad(&event.original.to_string()),
            painter.good(&event.healed.to_string()),
            event.source,
            event.confidence
        );
        if let Some(score) = event.score {
            let _ = write!(out, "  score {score:.2}");
        }
        out.push('\n');
    }
    out
}
