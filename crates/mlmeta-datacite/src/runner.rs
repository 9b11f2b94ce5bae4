//! Pipeline orchestration: one extractor thread, N workers, one status stream

use std::fs;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use mlmeta_core::{
    ArchiveReader, ChunkWriter, EventKind, ProgressContext, SharedIds, StatusEvent, UuidIds,
    cleanup_tmp_files, fmt_num,
};

use crate::config::Config;
use crate::worker::run_worker;

/// Run the pipeline with random (UUIDv4) identifiers and chunk tokens
pub fn run(config: &Config, progress: &ProgressContext) -> anyhow::Result<RunSummary> {
    run_with_ids(config, progress, Arc::new(UuidIds))
}

/// Run the pipeline, drawing synthetic identifiers and chunk tokens from `ids`.
///
/// Fails before any thread starts when the config is invalid, the output
/// directory cannot be created or the archive cannot be opened. Everything
/// after that is reported on the status stream and counted in the summary.
pub fn run_with_ids(
    config: &Config,
    progress: &ProgressContext,
    ids: SharedIds,
) -> anyhow::Result<RunSummary> {
    let start = Instant::now();
    config.validate()?;

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "could not create output directory {}",
            config.output_dir.display()
        )
    })?;
    let stale = cleanup_tmp_files(&config.output_dir).with_context(|| {
        format!("could not scan output directory {}", config.output_dir.display())
    })?;
    if stale > 0 {
        log::warn!("Removed {stale} stale temp files from an earlier run");
    }

    let archive = ArchiveReader::open(&config.archive_path)?;
    log::info!(
        "Processing {} ({}) with {} workers, {} documents per chunk",
        archive.path().display(),
        indicatif::HumanBytes(archive.compressed_size()),
        config.workers,
        fmt_num(config.chunk_size)
    );

    let name = config
        .archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let pb = progress.archive_bar(&name, archive.compressed_size());

    // Rendezvous channel: the extractor blocks until a worker takes the line
    let (line_tx, line_rx) = crossbeam_channel::bounded(0);
    let (status_tx, status_rx) = mpsc::channel::<StatusEvent>();

    let mut summary = RunSummary::default();

    thread::scope(|s| -> anyhow::Result<()> {
        for id in 0..config.workers {
            let worker_status = status_tx.clone();
            let writer = ChunkWriter::new(&config.output_dir, config.chunk_size, ids.clone());
            let ids = ids.clone();
            let lines = line_rx.clone();
            thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn_scoped(s, move || {
                    run_worker(id, lines, worker_status, writer, &*ids)
                })
                .with_context(|| format!("could not spawn worker-{id}"))?;
        }

        drop(line_rx);

        // Spawned last: if it fails, `line_tx` drops and the workers wind down
        let extractor_status = status_tx.clone();
        let pb = &pb;
        thread::Builder::new()
            .name("extractor".into())
            .spawn_scoped(s, move || archive.stream_lines(line_tx, extractor_status, pb))
            .context("could not spawn extractor thread")?;

        // Only producers hold senders now; the stream ends when all have exited
        drop(status_tx);
        for event in status_rx {
            event.log();
            summary.record(&event);
        }
        Ok(())
    })?;

    pb.finish_and_clear();
    summary.elapsed = start.elapsed();
    Ok(summary)
}

/// Totals of one pipeline run, aggregated from the status stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub entries: usize,
    pub lines: usize,
    pub seen: usize,
    pub retained: usize,
    pub parse_errors: usize,
    pub chunks_written: usize,
    pub chunks_dropped: usize,
    pub workers_finished: usize,
    /// All error events, including parse errors
    pub errors: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Fold one status event into the totals
    pub fn record(&mut self, event: &StatusEvent) {
        match &event.kind {
            EventKind::EntryStarted { .. } => {}
            EventKind::ExtractionFinished { entries, lines } => {
                self.entries = *entries;
                self.lines = *lines;
            }
            EventKind::WorkerFinished(c) => {
                self.workers_finished += 1;
                self.seen += c.seen;
                self.retained += c.retained;
                self.parse_errors += c.parse_errors;
                self.chunks_written += c.chunks_written;
                self.chunks_dropped += c.chunks_dropped;
            }
            EventKind::Failed(_) => self.errors += 1,
        }
    }

    pub fn log(&self) {
        log::info!("=== Pipeline Summary ===");
        log::info!(
            "Lines: {} from {} entries ({} parse errors)",
            fmt_num(self.lines),
            fmt_num(self.entries),
            fmt_num(self.parse_errors)
        );
        log::info!(
            "Records: {} retained of {} seen",
            fmt_num(self.retained),
            fmt_num(self.seen)
        );
        log::info!(
            "Chunks: {} written ({} dropped)",
            self.chunks_written,
            self.chunks_dropped
        );
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        if self.seen > 0 && !self.elapsed.is_zero() {
            let per_sec = self.seen as f64 / self.elapsed.as_secs_f64();
            log::info!("Throughput: {per_sec:.0} lines/sec");
        }
    }

    /// Summary table for terminal output
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("DataCite Pipeline")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
                Cell::new("%").fg(Color::Cyan),
            ]);

        table.add_row(vec![
            Cell::new("Archive entries"),
            Cell::new(fmt_num(self.entries)),
            Cell::new(""),
        ]);
        table.add_row(vec![
            Cell::new("Lines seen"),
            Cell::new(fmt_num(self.seen)),
            Cell::new(""),
        ]);
        table.add_row(vec![
            Cell::new("Parse errors"),
            Cell::new(fmt_num(self.parse_errors)),
            Cell::new(format!("{:.1}", pct(self.parse_errors, self.seen))),
        ]);
        table.add_row(vec![
            Cell::new("Retained"),
            Cell::new(fmt_num(self.retained)),
            Cell::new(format!("{:.1}", pct(self.retained, self.seen))),
        ]);
        table.add_row(vec![
            Cell::new("Chunks written"),
            Cell::new(fmt_num(self.chunks_written)),
            Cell::new(""),
        ]);
        if self.chunks_dropped > 0 {
            table.add_row(vec![
                Cell::new("Chunks dropped").fg(Color::Red),
                Cell::new(fmt_num(self.chunks_dropped)).fg(Color::Red),
                Cell::new(""),
            ]);
        }
        table.add_row(vec![
            Cell::new("Errors"),
            Cell::new(fmt_num(self.errors)),
            Cell::new(""),
        ]);
        table.add_row(vec![
            Cell::new("Elapsed"),
            Cell::new(format!("{:.1}s", self.elapsed.as_secs_f64())),
            Cell::new(""),
        ]);

        table.to_string()
    }
}

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
