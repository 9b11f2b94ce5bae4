//! Usability predicate for normalized records

use crate::record::NormalizedRecord;

/// A record is usable when at least one subject carries a scheme URI or
/// scheme name: only those can serve as classification labels.
pub fn is_usable(record: &NormalizedRecord) -> bool {
    record.subjects.iter().any(|s| s.has_scheme())
}
