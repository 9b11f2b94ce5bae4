//! Streaming line extraction from a local `.tar.gz` archive.
//!
//! The archive is read once, front to back: gzip → tar → regular-file entries →
//! newline-delimited lines. Lines are pushed onto a bounded channel so a slow
//! consumer pool throttles decompression.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::Sender;
use flate2::bufread::GzDecoder;
use indicatif::ProgressBar;

use crate::error::ArchiveError;
use crate::progress::fmt_num;
use crate::status::{EventKind, Origin, StatusEvent, StatusSender, emit};

/// One line of one archive entry, without its line terminator
pub type RawLine = Vec<u8>;

/// Shared byte counter for progress tracking
type ByteCounter = Arc<AtomicU64>;

/// Buffer size for the compressed file reader (256KB)
const GZIP_BUF_SIZE: usize = 256 * 1024;

/// Initial line buffer per entry. Lines grow past this without limit;
/// DataCite records with long abstracts reach several MB.
const LINE_BUF_CAPACITY: usize = 4 * 1024 * 1024;

/// Progress update interval (every N lines to avoid overhead)
const UPDATE_INTERVAL: usize = 10_000;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Reader wrapper that tracks bytes read
struct CountingReader<R> {
    inner: R,
    count: ByteCounter,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

type Decoder = GzDecoder<BufReader<CountingReader<File>>>;

/// Counters from one extraction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub entries: usize,
    pub lines: usize,
}

/// An opened, gzip-validated archive ready to stream.
///
/// Owns the file handle; [`stream_lines`](ArchiveReader::stream_lines)
/// consumes the reader, so the handle is released exactly once when
/// streaming returns, on every exit path.
pub struct ArchiveReader {
    path: PathBuf,
    archive: tar::Archive<Decoder>,
    counter: ByteCounter,
    compressed_size: u64,
}

impl std::fmt::Debug for ArchiveReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("path", &self.path)
            .field("compressed_size", &self.compressed_size)
            .finish_non_exhaustive()
    }
}

impl ArchiveReader {
    /// Open the archive and check the gzip header.
    ///
    /// Errors here are setup failures: nothing has been dispatched yet.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let open_err = |source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(open_err)?;
        let compressed_size = file.metadata().map_err(open_err)?.len();

        let counter: ByteCounter = Arc::new(AtomicU64::new(0));
        let mut reader = BufReader::with_capacity(
            GZIP_BUF_SIZE,
            CountingReader {
                inner: file,
                count: counter.clone(),
            },
        );

        // Peek without consuming; the decoder re-reads the header
        if !reader.fill_buf().map_err(open_err)?.starts_with(&GZIP_MAGIC) {
            return Err(ArchiveError::NotGzip {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            archive: tar::Archive::new(GzDecoder::new(reader)),
            counter,
            compressed_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the compressed file on disk
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Compressed bytes consumed so far
    pub fn bytes_read(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Stream every line of every regular-file entry onto `lines`, in archive order.
    ///
    /// Emits an `EntryStarted` event before each entry and an
    /// `ExtractionFinished` event last. A read failure inside one entry is
    /// reported and extraction moves on; a corrupt tar stream is reported and
    /// ends extraction. Dropping `lines` on return closes the line stream.
    pub fn stream_lines(
        mut self,
        lines: Sender<RawLine>,
        status: StatusSender,
        pb: &ProgressBar,
    ) -> ExtractStats {
        let mut stats = ExtractStats::default();
        if let Err(e) = self.stream_entries(&lines, &status, pb, &mut stats) {
            let _ = status.send(StatusEvent::failed(Origin::Extractor, e));
        }
        pb.set_position(self.bytes_read());
        emit(
            &status,
            Origin::Extractor,
            EventKind::ExtractionFinished {
                entries: stats.entries,
                lines: stats.lines,
            },
        );
        log::debug!("Releasing archive {}", self.path.display());
        stats
    }

    fn stream_entries(
        &mut self,
        lines: &Sender<RawLine>,
        status: &StatusSender,
        pb: &ProgressBar,
        stats: &mut ExtractStats,
    ) -> Result<(), ArchiveError> {
        let counter = self.counter.clone();
        for entry in self.archive.entries().map_err(ArchiveError::Entries)? {
            let mut entry = entry.map_err(ArchiveError::NextEntry)?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let size = entry.size();
            emit(
                status,
                Origin::Extractor,
                EventKind::EntryStarted {
                    name: name.clone(),
                    size,
                },
            );
            stats.entries += 1;
            pb.set_message(name.clone());

            match stream_entry(&mut entry, lines, &counter, pb, stats) {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => {
                    log::warn!("All line consumers gone, stopping extraction at {name}");
                    return Ok(());
                }
                Err(source) => {
                    let _ = status.send(StatusEvent::failed(
                        Origin::Extractor,
                        ArchiveError::EntryRead {
                            entry: name,
                            source,
                        },
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Send each line of one entry. `Break` when the receiving side has hung up.
fn stream_entry<R: Read>(
    entry: R,
    lines: &Sender<RawLine>,
    counter: &ByteCounter,
    pb: &ProgressBar,
    stats: &mut ExtractStats,
) -> io::Result<ControlFlow<()>> {
    let mut reader = BufReader::with_capacity(LINE_BUF_CAPACITY, entry);
    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(ControlFlow::Continue(()));
        }
        trim_line_ending(&mut line);
        if lines.send(line).is_err() {
            return Ok(ControlFlow::Break(()));
        }
        stats.lines += 1;

        if stats.lines % UPDATE_INTERVAL == 0 {
            pb.set_position(counter.load(Ordering::Relaxed));
            pb.set_message(format!("{} lines", fmt_num(stats.lines)));
        }
    }
}

/// Strip a trailing `\n` or `\r\n`
fn trim_line_ending(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    fn write_archive(path: &Path, entries: &[(&str, &[u8])], with_dir: bool) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        if with_dir {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            builder
                .append_data(&mut header, "records/", io::empty())
                .unwrap();
        }
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    /// Run extraction with a channel large enough to never block
    fn extract(path: &Path) -> (ExtractStats, Vec<RawLine>, Vec<StatusEvent>) {
        let reader = ArchiveReader::open(path).unwrap();
        let (line_tx, line_rx) = crossbeam_channel::bounded(100_000);
        let (status_tx, status_rx) = mpsc::channel();
        let stats = reader.stream_lines(line_tx, status_tx, &ProgressBar::hidden());
        (stats, line_rx.iter().collect(), status_rx.iter().collect())
    }

    #[test]
    fn trims_lf_and_crlf() {
        let mut a = b"abc\n".to_vec();
        trim_line_ending(&mut a);
        assert_eq!(a, b"abc");

        let mut b = b"abc\r\n".to_vec();
        trim_line_ending(&mut b);
        assert_eq!(b, b"abc");

        let mut c = b"abc".to_vec();
        trim_line_ending(&mut c);
        assert_eq!(c, b"abc");
    }

    #[test]
    fn lines_in_archive_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.tar.gz");
        write_archive(
            &path,
            &[("a.ndjson", b"a1\na2\n"), ("b.ndjson", b"b1\r\nb2")],
            true,
        );

        let (stats, lines, events) = extract(&path);

        assert_eq!(stats, ExtractStats { entries: 2, lines: 4 });
        assert_eq!(lines, vec![b"a1".to_vec(), b"a2".to_vec(), b"b1".to_vec(), b"b2".to_vec()]);

        let messages: Vec<String> = events.iter().map(StatusEvent::message).collect();
        assert_eq!(
            messages,
            vec![
                "Processing a.ndjson (size 6)",
                "Processing b.ndjson (size 6)",
                "Extraction finished: 4 lines from 2 entries",
            ]
        );
    }

    #[test]
    fn keeps_blank_lines_between_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.tar.gz");
        write_archive(&path, &[("a.ndjson", b"x\n\ny\n")], false);

        let (_, lines, _) = extract(&path);
        assert_eq!(lines, vec![b"x".to_vec(), Vec::new(), b"y".to_vec()]);
    }

    #[test]
    fn tolerates_multi_megabyte_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.tar.gz");
        let mut data = vec![b'x'; 6 * 1024 * 1024];
        data.extend_from_slice(b"\nshort\n");
        write_archive(&path, &[("big.ndjson", &data)], false);

        let (stats, lines, _) = extract(&path);
        assert_eq!(stats.lines, 2);
        assert_eq!(lines[0].len(), 6 * 1024 * 1024);
        assert_eq!(lines[1], b"short");
    }

    #[test]
    fn open_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ArchiveReader::open(&dir.path().join("nope.tar.gz")).unwrap_err();
        assert!(matches!(err, ArchiveError::Open { .. }));
    }

    #[test]
    fn open_rejects_plain_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.tar.gz");
        std::fs::write(&path, b"{\"id\":\"1\"}\n").unwrap();
        let err = ArchiveReader::open(&path).unwrap_err();
        assert!(matches!(err, ArchiveError::NotGzip { .. }));
    }

    #[test]
    fn open_rejects_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.tar.gz");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            ArchiveReader::open(&path).unwrap_err(),
            ArchiveError::NotGzip { .. }
        ));
    }

    #[test]
    fn truncated_archive_terminates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cut.tar.gz");
        let data: Vec<u8> = (0..20_000)
            .flat_map(|i| format!("{{\"id\":\"10.1234/{i:x}-{}\"}}\n", i * 7919).into_bytes())
            .collect();
        write_archive(&path, &[("a.ndjson", &data)], false);

        let full = std::fs::read(&path).unwrap();
        std::fs::write(&path, &full[..full.len() / 2]).unwrap();

        let (stats, lines, events) = extract(&path);
        assert!(stats.lines < 20_000);
        assert_eq!(lines.len(), stats.lines);
        assert!(matches!(
            events.last().map(|e| &e.kind),
            Some(EventKind::ExtractionFinished { .. })
        ));
    }

    #[test]
    fn stops_when_receivers_gone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.tar.gz");
        write_archive(&path, &[("a.ndjson", b"1\n2\n3\n")], false);

        let reader = ArchiveReader::open(&path).unwrap();
        let (line_tx, line_rx) = crossbeam_channel::bounded(0);
        drop(line_rx);
        let (status_tx, status_rx) = mpsc::channel();
        let stats = reader.stream_lines(line_tx, status_tx, &ProgressBar::hidden());

        assert_eq!(stats.lines, 0);
        assert_eq!(status_rx.iter().count(), 2);
    }

    #[test]
    fn counts_compressed_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.tar.gz");
        write_archive(&path, &[("a.ndjson", b"hello\n")], false);

        let reader = ArchiveReader::open(&path).unwrap();
        let size = reader.compressed_size();
        assert_eq!(size, std::fs::metadata(&path).unwrap().len());
        assert!(reader.bytes_read() > 0);
    }
}
