//! List command handler

use sanar::LocatorRecord;
use serde::Serialize;
use std::fmt::Write;

use super::open_existing_store;
use crate::commands::{ListArgs, OutputFormat};
use crate::error::CliResult;
use crate::output::{Painter, Reporter};

/// One row of the list output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListEntry {
    /// Logical name
    pub name: String,
    /// Primary descriptor in `strategy:value` form
    pub primary: String,
    /// Successful heals recorded
    pub heals: u64,
    /// Most reliable fallback, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_fallback: Option<String>,
}

impl From<&LocatorRecord> for ListEntry {
    fn from(record: &LocatorRecord) -> Self {
        Self {
            name: record.logical_name.clone(),
            primary: record.primary_descriptor.to_string(),
            heals: record.heal_count(),
            best_fallback: record
                .fallback_descriptors()
                .next()
                .map(ToString::to_string),
        }
    }
}

/// Execute the list command
pub async fn execute_list(args: &ListArgs, out: &Reporter) -> CliResult<()> {
    let mut entries = Vec::new();
    if let Some(store) = open_existing_store(&args.store.store)? {
        for name in store.list().await? {
            match store.get(&name).await? {
                Some(record) => entries.push(ListEntry::from(&record)),
                None => tracing::debug!(name, "Record disappeared while listing"),
            }
        }
    }
    if args.healed {
        entries.retain(|e| e.heals > 0);
    }

    match args.format {
        OutputFormat::Json => out.print(&serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text if entries.is_empty() => {
            out.warning(&format!("No locators in {}", args.store.store.display()));
        }
        OutputFormat::Text => out.print(&render_list(&entries, out.painter())),
    }
    Ok(())
}

/// Render list rows as aligned text
#[must_use]
pub fn render_list(entries: &[ListEntry], painter: Painter) -> String {
    let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for entry in entries {
        let padded = format!("{:width$}", entry.name);
        let _ = write!(
            out,
            "{}  {}",
            painter.name(&padded),
            painter.locator(&entry.primary)
        );
        if entry.heals > 0 {
            let _ = write!(out, "  healed {}x", entry.heals);
        }
        if let Some(best) = &entry.best_fallback {
            let _ = write!(out, "  {}", painter.dim(&format!("-> {best}")));
        }
        out.push('\n');
    }
    out
}
