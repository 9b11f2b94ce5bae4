//! Error types for archive extraction and chunk output

use std::io;
use std::path::PathBuf;

/// Error from opening or walking a `.tar.gz` archive.
///
/// `Open` and `NotGzip` happen before any line is dispatched and abort the
/// run. `Entries` and `NextEntry` end extraction early; `EntryRead` only
/// loses the rest of one entry.
#[derive(Debug)]
pub enum ArchiveError {
    Open { path: PathBuf, source: io::Error },
    NotGzip { path: PathBuf },
    Entries(io::Error),
    NextEntry(io::Error),
    EntryRead { entry: String, source: io::Error },
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "cannot open archive {}: {source}", path.display())
            }
            Self::NotGzip { path } => {
                write!(f, "{} is not a gzip stream", path.display())
            }
            Self::Entries(e) => write!(f, "cannot read tar stream: {e}"),
            Self::NextEntry(e) => write!(f, "corrupt tar stream between entries: {e}"),
            Self::EntryRead { entry, source } => {
                write!(f, "cannot read lines of entry {entry}: {source}")
            }
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } | Self::EntryRead { source, .. } => Some(source),
            Self::Entries(e) | Self::NextEntry(e) => Some(e),
            Self::NotGzip { .. } => None,
        }
    }
}

/// Error from writing one chunk file. The chunk's documents are gone.
#[derive(Debug)]
pub struct FlushError {
    pub path: PathBuf,
    pub documents: usize,
    pub kind: FlushErrorKind,
}

#[derive(Debug)]
pub enum FlushErrorKind {
    Create(io::Error),
    Serialize(serde_json::Error),
    Write(io::Error),
    Rename(io::Error),
}

impl std::fmt::Display for FlushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = match &self.kind {
            FlushErrorKind::Create(_) => "create",
            FlushErrorKind::Serialize(_) => "serialize",
            FlushErrorKind::Write(_) => "write",
            FlushErrorKind::Rename(_) => "rename",
        };
        write!(
            f,
            "could not flush {} documents ({what} {}): ",
            self.documents,
            self.path.display()
        )?;
        match &self.kind {
            FlushErrorKind::Create(e) | FlushErrorKind::Write(e) | FlushErrorKind::Rename(e) => {
                write!(f, "{e}")
            }
            FlushErrorKind::Serialize(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for FlushError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            FlushErrorKind::Create(e) | FlushErrorKind::Write(e) | FlushErrorKind::Rename(e) => {
                Some(e)
            }
            FlushErrorKind::Serialize(e) => Some(e),
        }
    }
}
