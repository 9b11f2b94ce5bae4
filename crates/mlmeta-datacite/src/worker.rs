//! Worker loop: normalize, filter and chunk lines off the shared line stream

use crossbeam_channel::Receiver;
use mlmeta_core::{
    ChunkWriter, EventKind, IdGenerator, Origin, RawLine, StatusEvent, StatusSender,
    WorkerCounts, emit,
};

use crate::filter::is_usable;
use crate::normalize::normalize;
use crate::record::NormalizedRecord;

/// Process lines until the stream closes, then flush the partial chunk and
/// emit `WorkerFinished`.
///
/// Parse and flush failures are reported on the status stream and never stop
/// the worker.
pub fn run_worker(
    id: usize,
    lines: Receiver<RawLine>,
    status: StatusSender,
    mut writer: ChunkWriter<NormalizedRecord>,
    ids: &dyn IdGenerator,
) -> WorkerCounts {
    let origin = Origin::Worker(id);
    let mut counts = WorkerCounts::default();

    // Each line is delivered to exactly one of the receiver clones
    for line in lines {
        counts.seen += 1;
        let record = match normalize(&line, ids) {
            Ok(record) => record,
            Err(e) => {
                counts.parse_errors += 1;
                let _ = status.send(StatusEvent::failed(origin, e));
                continue;
            }
        };
        if !is_usable(&record) {
            continue;
        }
        counts.retained += 1;
        if let Err(e) = writer.append(record) {
            counts.chunks_dropped += 1;
            let _ = status.send(StatusEvent::failed(origin, e));
        }
    }

    // Stream closed: drain
    if !writer.is_empty() {
        if let Err(e) = writer.flush() {
            counts.chunks_dropped += 1;
            let _ = status.send(StatusEvent::failed(origin, e));
        }
    }

    counts.chunks_written = writer.chunks_written();
    log::debug!("{origin} done: {counts:?}");
    emit(&status, origin, EventKind::WorkerFinished(counts));
    counts
}
