//! Unique token generation for synthetic identifiers and output file names

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of globally unique string tokens.
///
/// Injected wherever the pipeline needs a fresh name (placeholder record
/// identifiers, chunk file names) so tests can swap in a deterministic one.
pub trait IdGenerator: Send + Sync {
    /// Produce a token never returned before by this generator.
    fn next_id(&self) -> String;
}

/// Shared handle to a generator, cloned into every worker.
pub type SharedIds = Arc<dyn IdGenerator>;

/// Random v4 UUIDs (production default)
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Monotonic counter with a fixed prefix: `prefix-000000`, `prefix-000001`, ...
///
/// Unique for the lifetime of the generator, including across threads.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }

    /// Number of tokens handed out so far
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n:06}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uuid_ids_are_distinct() {
        let ids = UuidIds;
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn sequential_ids_format() {
        let ids = SequentialIds::new("rec");
        assert_eq!(ids.next_id(), "rec-000000");
        assert_eq!(ids.next_id(), "rec-000001");
        assert_eq!(ids.issued(), 2);
    }

    #[test]
    fn sequential_ids_unique_across_threads() {
        let ids = Arc::new(SequentialIds::new("t"));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..100).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "duplicate token");
            }
        }
        assert_eq!(seen.len(), 400);
    }
}
