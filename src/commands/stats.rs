//! Stats command implementation.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::stats::{display_stats, ResolutionState};

/// Run the stats command
pub fn run(config_path: &Path) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let state = ResolutionState::load(&config.data_dir)?;
    display_stats(&state);
    Ok(())
}
