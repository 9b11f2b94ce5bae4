//! DataCite pipeline configuration

use std::path::PathBuf;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Runtime configuration for the DataCite pipeline.
///
/// Serialized keys match the JSON config files of earlier runs; the short
/// and snake_case names are accepted as aliases. Field order is part of the
/// [`fingerprint`](Config::fingerprint) and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input `.tar.gz` dump
    #[serde(
        rename = "dataciteRecordArchivePath",
        alias = "archivePath",
        alias = "archive_path"
    )]
    pub archive_path: PathBuf,

    /// Number of normalization workers
    #[serde(
        rename = "dataciteRecordWorkerNumber",
        alias = "workerCount",
        alias = "workers"
    )]
    pub workers: usize,

    /// Directory for chunk files (created if absent)
    #[serde(rename = "outputDir", alias = "output_dir")]
    pub output_dir: PathBuf,

    /// Maximum documents per chunk file
    #[serde(
        rename = "sizeOfPayloadChunk",
        alias = "chunkSize",
        alias = "chunk_size"
    )]
    pub chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            archive_path: PathBuf::from("/tmp/data.tar.gz"),
            workers: 4,
            output_dir: PathBuf::from("/tmp/out"),
            chunk_size: 4096,
        }
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            bail!("worker count must be at least 1");
        }
        if self.chunk_size == 0 {
            bail!("chunk size must be at least 1");
        }
        Ok(())
    }

    /// Deterministic provenance hash: hex SHA-256 of the config JSON with
    /// Python `json.dumps` separators (`", "` and `": "`), so hashes match
    /// the ones computed by the downstream Python tooling.
    pub fn fingerprint(&self) -> anyhow::Result<String> {
        let compact = serde_json::to_string(self).context("config is not serializable")?;
        let pythonic = compact.replace("\":", "\": ").replace(",\"", ", \"");
        Ok(format!("{:x}", Sha256::digest(pythonic.as_bytes())))
    }
}
