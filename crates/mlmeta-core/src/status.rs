//! Status events converging from the extractor and workers onto one stream

use std::fmt;
use std::sync::mpsc::Sender;

/// Type-erased error carried by a status event
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Producer side of the status stream. Cloned once per component.
pub type StatusSender = Sender<StatusEvent>;

/// Component that emitted an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Extractor,
    Worker(usize),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extractor => f.write_str("extractor"),
            Self::Worker(id) => write!(f, "worker-{id}"),
        }
    }
}

/// Final counters of one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerCounts {
    /// Lines dequeued, including ones that failed to parse
    pub seen: usize,
    /// Records that passed the filter and were handed to the chunk writer
    pub retained: usize,
    pub parse_errors: usize,
    pub chunks_written: usize,
    /// Chunks lost to a failed flush
    pub chunks_dropped: usize,
}

#[derive(Debug)]
pub enum EventKind {
    /// About to stream the lines of a regular-file entry
    EntryStarted { name: String, size: u64 },
    /// Extractor is done; no more lines will be dispatched
    ExtractionFinished { entries: usize, lines: usize },
    /// Terminal event of a worker; nothing follows from the same origin
    WorkerFinished(WorkerCounts),
    Failed(BoxError),
}

/// One message on the status stream. Never mutated after emission.
#[derive(Debug)]
pub struct StatusEvent {
    pub origin: Origin,
    pub kind: EventKind,
}

impl StatusEvent {
    pub fn new(origin: Origin, kind: EventKind) -> Self {
        Self { origin, kind }
    }

    pub fn failed(origin: Origin, err: impl Into<BoxError>) -> Self {
        Self::new(origin, EventKind::Failed(err.into()))
    }

    pub fn error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match &self.kind {
            EventKind::Failed(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    /// Human-readable message, without the origin tag
    pub fn message(&self) -> String {
        match &self.kind {
            EventKind::EntryStarted { name, size } => format!("Processing {name} (size {size})"),
            EventKind::ExtractionFinished { entries, lines } => {
                format!("Extraction finished: {lines} lines from {entries} entries")
            }
            EventKind::WorkerFinished(c) => format!(
                "{} finished: {} seen, {} retained, {} chunks",
                self.origin, c.seen, c.retained, c.chunks_written
            ),
            EventKind::Failed(e) => format!("Error: {e}"),
        }
    }

    /// Log at a level matching the event kind
    pub fn log(&self) {
        match &self.kind {
            EventKind::Failed(e) => log::error!("[{}] {e}", self.origin),
            _ => log::info!("[{}] {}", self.origin, self.message()),
        }
    }
}

/// Send, ignoring a closed stream (the orchestrator is gone, nobody listens)
pub fn emit(tx: &StatusSender, origin: Origin, kind: EventKind) {
    let _ = tx.send(StatusEvent::new(origin, kind));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_display() {
        assert_eq!(Origin::Extractor.to_string(), "extractor");
        assert_eq!(Origin::Worker(3).to_string(), "worker-3");
    }

    #[test]
    fn entry_started_message() {
        let ev = StatusEvent::new(
            Origin::Extractor,
            EventKind::EntryStarted {
                name: "dois/part-0001.ndjson".into(),
                size: 1024,
            },
        );
        assert_eq!(ev.message(), "Processing dois/part-0001.ndjson (size 1024)");
        assert!(ev.error().is_none());
    }

    #[test]
    fn worker_finished_message() {
        let ev = StatusEvent::new(
            Origin::Worker(0),
            EventKind::WorkerFinished(WorkerCounts {
                seen: 10,
                retained: 4,
                chunks_written: 1,
                ..Default::default()
            }),
        );
        assert_eq!(
            ev.message(),
            "worker-0 finished: 10 seen, 4 retained, 1 chunks"
        );
    }

    #[test]
    fn failed_exposes_error() {
        let ev = StatusEvent::failed(Origin::Worker(1), "boom");
        assert_eq!(ev.error().map(|e| e.to_string()), Some("boom".to_string()));
        assert_eq!(ev.message(), "Error: boom");
    }

    #[test]
    fn emit_on_closed_stream_is_silent() {
        let (tx, rx) = std::sync::mpsc::channel();
        drop(rx);
        emit(&tx, Origin::Extractor, EventKind::Failed("late".into()));
    }
}
