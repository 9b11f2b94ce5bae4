//! `mlmeta run` - process one DataCite dump into chunk files

use std::path::Path;

use anyhow::Result;
use mlmeta_core::ProgressContext;

use crate::config::ConfigSource;

pub fn run(
    source: ConfigSource,
    global_config: Option<&Path>,
    progress: &ProgressContext,
) -> Result<()> {
    let config = source.resolve(global_config)?;

    log::info!("Config fingerprint {}", config.fingerprint()?);

    let summary = mlmeta_datacite::run(&config, progress)?;

    if progress.is_tty() {
        progress.println(format!("\n{}", summary.format_table()));
    } else {
        summary.log();
    }
    Ok(())
}
