//! mlmeta Core - Common infrastructure for metadata dump pipelines
//!
//! Domain-agnostic pieces: streaming lines out of `.tar.gz` dumps, bounded
//! JSON chunk output, the status event stream, and logging/progress setup.

pub mod archive;
pub mod chunk;
pub mod error;
pub mod ids;
pub mod logging;
pub mod progress;
pub mod status;

// Re-exports for convenience
pub use archive::{ArchiveReader, ExtractStats, RawLine};
pub use chunk::{ChunkWriter, cleanup_tmp_files};
pub use error::{ArchiveError, FlushError, FlushErrorKind};
pub use ids::{IdGenerator, SequentialIds, SharedIds, UuidIds};
pub use logging::{IndicatifLogger, LogFormat, init_logging};
pub use progress::{ProgressContext, fmt_num};
pub use status::{BoxError, EventKind, Origin, StatusEvent, StatusSender, WorkerCounts, emit};
