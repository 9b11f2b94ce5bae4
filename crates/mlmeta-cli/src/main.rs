//! mlmeta - metadata dump pipelines
//!
//! Turns a DataCite `.tar.gz` dump into bounded JSON chunk files of
//! normalized, classified records.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mlmeta_core::{LogFormat, ProgressContext};

mod cmd;
mod config;

#[derive(Parser)]
#[command(name = "mlmeta")]
#[command(about = "Normalize DataCite metadata dumps into JSON chunks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log line format when stderr is not a terminal (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    /// Config file path (default: ./mlmeta.toml or ~/.config/mlmeta/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the DataCite pipeline
    Run(config::ConfigSource),
    /// Show resolved configuration and its fingerprint
    Config(config::ConfigSource),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = ProgressContext::new();
    let multi = progress.is_tty().then(|| progress.multi());
    mlmeta_core::init_logging(cli.quiet, cli.debug, cli.log_format, multi);

    match cli.command {
        Command::Run(source) => cmd::run::run(source, cli.config.as_deref(), &progress),
        Command::Config(source) => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let config = source.resolve(cli.config.as_deref())?;

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec![
                "Archive",
                &config.archive_path.display().to_string(),
            ]);
            table.add_row(vec!["Workers", &config.workers.to_string()]);
            table.add_row(vec![
                "Output directory",
                &config.output_dir.display().to_string(),
            ]);
            table.add_row(vec!["Chunk size", &config.chunk_size.to_string()]);
            table.add_row(vec!["Fingerprint", &config.fingerprint()?]);

            progress.println(format!("\n{table}"));
            config.validate()
        }
    }
}
