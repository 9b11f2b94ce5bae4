//! Configuration loading from JSON or TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use mlmeta_datacite::Config;

/// Command-line overrides; each one replaces the file value when given
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Input `.tar.gz` DataCite dump
    #[arg(long)]
    pub archive: Option<PathBuf>,

    /// Number of normalization workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Output directory for chunk files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum documents per chunk file
    #[arg(long)]
    pub chunk_size: Option<usize>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(archive) = &self.archive {
            config.archive_path = archive.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
    }
}

/// Where a subcommand takes its configuration from
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigSource {
    /// Config file (JSON, or TOML with a .toml extension)
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,
}

impl ConfigSource {
    /// Positional file first, then the global `--config`, then the default
    /// search; overrides applied last.
    pub fn resolve(&self, global_config: Option<&Path>) -> Result<Config> {
        let path = self.config_file.as_deref().or(global_config);
        let mut config = load(path)?;
        self.overrides.apply(&mut config);
        Ok(config)
    }
}

/// Load configuration from `path`, or from default locations
///
/// Search order without a path:
/// 1. ./mlmeta.toml (current directory)
/// 2. ~/.config/mlmeta/config.toml
///
/// If no config file found, returns default config.
pub fn load(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return from_file(path);
    }

    let local_config = PathBuf::from("mlmeta.toml");
    if local_config.exists() {
        return from_file(&local_config);
    }

    if let Some(config_dir) = directories::ProjectDirs::from("", "", "mlmeta") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            return from_file(&user_config);
        }
    }

    log::debug!("No config file found, using defaults");
    Ok(Config::default())
}

/// Load configuration from a specific file: TOML for `.toml`, JSON otherwise
pub fn from_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let config: Config = if is_toml {
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?
    };

    log::info!("Loaded config from {}", path.display());
    Ok(config)
}
