//! Bounded JSON chunk writer with atomic tmp→rename flush

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{FlushError, FlushErrorKind};
use crate::ids::SharedIds;

/// Buffer size for chunk file writes (1MB)
const WRITE_BUF_SIZE: usize = 1024 * 1024;

/// On-disk layout of one chunk file
#[derive(Serialize)]
struct ChunkPayload<'a, T> {
    documents: &'a [T],
}

/// Accumulates documents and writes them as `{"documents": [...]}` files.
///
/// Owned by exactly one worker. Every file gets a fresh token from the
/// injected generator, so writers sharing an output directory never collide.
pub struct ChunkWriter<T> {
    documents: Vec<T>,
    chunk_size: usize,
    output_dir: PathBuf,
    ids: SharedIds,
    chunks_written: usize,
}

impl<T> std::fmt::Debug for ChunkWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkWriter")
            .field("pending", &self.documents.len())
            .field("chunk_size", &self.chunk_size)
            .field("output_dir", &self.output_dir)
            .field("chunks_written", &self.chunks_written)
            .finish_non_exhaustive()
    }
}

impl<T: Serialize> ChunkWriter<T> {
    /// `chunk_size` must be at least 1
    pub fn new(output_dir: impl Into<PathBuf>, chunk_size: usize, ids: SharedIds) -> Self {
        debug_assert!(chunk_size > 0, "chunk_size must be positive");
        Self {
            documents: Vec::with_capacity(chunk_size.min(8192)),
            chunk_size,
            output_dir: output_dir.into(),
            ids,
            chunks_written: 0,
        }
    }

    /// Add a document; flushes right away once the chunk is full.
    ///
    /// Returns the written path when this append triggered a flush.
    pub fn append(&mut self, document: T) -> Result<Option<PathBuf>, FlushError> {
        self.documents.push(document);
        if self.documents.len() >= self.chunk_size {
            return self.flush().map(Some);
        }
        Ok(None)
    }

    /// Write all pending documents to a new file and clear the buffer.
    ///
    /// The buffer is cleared on failure too: a failed chunk is lost.
    pub fn flush(&mut self) -> Result<PathBuf, FlushError> {
        let token = self.ids.next_id();
        let final_path = self.output_dir.join(format!("{token}.json"));
        let tmp_path = self.output_dir.join(format!("{token}.json.tmp"));

        let result = write_chunk(&self.documents, &tmp_path, &final_path);
        let documents = self.documents.len();
        self.documents.clear();

        match result {
            Ok(()) => {
                self.chunks_written += 1;
                log::debug!("Wrote {documents} documents to {}", final_path.display());
                Ok(final_path)
            }
            Err(kind) => {
                let _ = fs::remove_file(&tmp_path);
                Err(FlushError {
                    path: tmp_path,
                    documents,
                    kind,
                })
            }
        }
    }

    /// Documents waiting for the next flush
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn chunks_written(&self) -> usize {
        self.chunks_written
    }
}

fn write_chunk<T: Serialize>(
    documents: &[T],
    tmp_path: &Path,
    final_path: &Path,
) -> Result<(), FlushErrorKind> {
    let file = File::create(tmp_path).map_err(FlushErrorKind::Create)?;
    let mut writer = BufWriter::with_capacity(WRITE_BUF_SIZE, file);

    serde_json::to_writer(&mut writer, &ChunkPayload { documents }).map_err(|e| {
        if e.is_io() {
            FlushErrorKind::Write(io::Error::from(e))
        } else {
            FlushErrorKind::Serialize(e)
        }
    })?;
    writer.flush().map_err(FlushErrorKind::Write)?;
    drop(writer);

    fs::rename(tmp_path, final_path).map_err(FlushErrorKind::Rename)
}

/// Remove stale `.json.tmp` files left by an interrupted run
pub fn cleanup_tmp_files(output_dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(output_dir)? {
        let path = entry?.path();
        let is_chunk_tmp = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".json.tmp"));
        if is_chunk_tmp {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn writer(dir: &Path, chunk_size: usize) -> ChunkWriter<serde_json::Value> {
        ChunkWriter::new(dir, chunk_size, Arc::new(SequentialIds::new("chunk")))
    }

    fn read_documents(path: &Path) -> Vec<serde_json::Value> {
        let v: serde_json::Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        v["documents"].as_array().unwrap().clone()
    }

    fn json_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|e| e == "json"))
            .collect();
        files.sort();
        files
    }

    #[test]
    fn flush_writes_all_pending_and_resets() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(dir.path(), 100);
        for i in 0..3 {
            assert!(w.append(serde_json::json!({ "n": i })).unwrap().is_none());
        }
        assert_eq!(w.len(), 3);

        let path = w.flush().unwrap();
        assert_eq!(path, dir.path().join("chunk-000000.json"));
        assert_eq!(read_documents(&path).len(), 3);
        assert!(w.is_empty());
        assert_eq!(w.chunks_written(), 1);
        assert_eq!(json_files(dir.path()).len(), 1);
    }

    #[test]
    fn append_auto_flushes_at_chunk_size() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(dir.path(), 4);
        let mut flushed = Vec::new();
        for i in 0..4 {
            if let Some(p) = w.append(serde_json::json!(i)).unwrap() {
                flushed.push(p);
            }
        }

        assert_eq!(flushed.len(), 1);
        assert_eq!(read_documents(&flushed[0]), (0..4).map(|i| serde_json::json!(i)).collect::<Vec<_>>());
        assert!(w.is_empty());
    }

    #[test]
    fn writer_is_reused_after_flush() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(dir.path(), 2);
        for i in 0..5 {
            w.append(serde_json::json!(i)).unwrap();
        }
        assert_eq!(w.chunks_written(), 2);
        assert_eq!(w.len(), 1);
        w.flush().unwrap();

        let sizes: Vec<usize> = json_files(dir.path())
            .iter()
            .map(|p| read_documents(p).len())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn no_tmp_left_after_flush() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(dir.path(), 10);
        w.append(serde_json::json!({})).unwrap();
        w.flush().unwrap();
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .path()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn failed_flush_drops_chunk_and_continues() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");
        let mut w = writer(&missing, 2);

        w.append(serde_json::json!(1)).unwrap();
        let err = w.append(serde_json::json!(2)).unwrap_err();
        assert_eq!(err.documents, 2);
        assert!(matches!(err.kind, FlushErrorKind::Create(_)));
        assert!(w.is_empty());
        assert_eq!(w.chunks_written(), 0);

        // Directory appears later: writer keeps working
        fs::create_dir(&missing).unwrap();
        w.append(serde_json::json!(3)).unwrap();
        w.flush().unwrap();
        assert_eq!(json_files(&missing).len(), 1);
    }

    #[test]
    fn cleanup_tmp_files_removes_only_chunk_tmp() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.json.tmp"), b"stale").unwrap();
        fs::write(dir.path().join("b.json"), b"keep").unwrap();
        fs::write(dir.path().join("c.tmp"), b"not ours").unwrap();

        assert_eq!(cleanup_tmp_files(dir.path()).unwrap(), 1);
        assert!(!dir.path().join("a.json.tmp").exists());
        assert!(dir.path().join("b.json").exists());
        assert!(dir.path().join("c.tmp").exists());
    }
}
