//! Command handlers
//!
//! Each handler renders to a string so the rendering can be tested without
//! a terminal; `execute_*` prints the result.

pub mod config;
pub mod heals;
pub mod history;
pub mod list;

pub use config::{execute_config, render_defaults};
pub use heals::{execute_heals, render_heals, select_heals};
pub use history::{execute_history, render_record};
pub use list::{execute_list, render_list, ListEntry};

use sanar::LocatorStore;
use std::path::Path;

use crate::error::CliResult;

/// Open an existing store directory without creating it
pub(crate) fn open_existing_store(dir: &Path) -> CliResult<Option<LocatorStore>> {
    if !dir.is_dir() {
        tracing::debug!(store = %dir.display(), "Store directory does not exist");
        return Ok(None);
    }
    Ok(Some(LocatorStore::open_dir(dir)?))
}
