//! mlmeta DataCite - DataCite metadata dump pipeline
//!
//! Streams newline-delimited records out of a DataCite `.tar.gz` dump,
//! normalizes them to a compact shape, keeps the ones with a classified
//! subject and writes them as bounded JSON chunk files.
//!
//! # Example
//!
//! ```no_run
//! use mlmeta_core::ProgressContext;
//! use mlmeta_datacite::{Config, run};
//!
//! let config = Config {
//!     archive_path: "/data/datacite.tar.gz".into(),
//!     workers: 8,
//!     ..Default::default()
//! };
//!
//! let summary = run(&config, &ProgressContext::hidden()).expect("Pipeline failed");
//! println!("Retained {} records", summary.retained);
//! ```

pub mod config;
pub mod filter;
pub mod inbound;
pub mod normalize;
pub mod record;
pub mod runner;
pub mod worker;

// Re-exports for convenience
pub use config::Config;
pub use filter::is_usable;
pub use normalize::{ParseError, normalize};
pub use record::{Description, NormalizedRecord, Subject, Title};
pub use runner::{RunSummary, run, run_with_ids};
pub use worker::run_worker;
