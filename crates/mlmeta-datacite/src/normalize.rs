//! Raw line → `NormalizedRecord`, with identifier resolution and
//! top-level/`attributes` fallback for content fields.

use mlmeta_core::IdGenerator;

use crate::inbound::{IdentifierValue, InboundIdentifier, InboundRecord};
use crate::record::NormalizedRecord;

/// Bytes of the offending line kept in a parse error
pub const SNIPPET_LIMIT: usize = 512;

/// A line that is not a DataCite record
#[derive(Debug)]
pub struct ParseError {
    snippet: String,
    truncated: bool,
    source: serde_json::Error,
}

impl ParseError {
    fn new(line: &[u8], source: serde_json::Error) -> Self {
        let end = line.len().min(SNIPPET_LIMIT);
        Self {
            snippet: String::from_utf8_lossy(&line[..end]).into_owned(),
            truncated: line.len() > SNIPPET_LIMIT,
            source,
        }
    }

    /// Leading part of the offending line
    pub fn snippet(&self) -> &str {
        &self.snippet
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ellipsis = if self.truncated { "..." } else { "" };
        write!(
            f,
            "could not parse record: {}; payload: {}{ellipsis}",
            self.source, self.snippet
        )
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Parse and normalize one line.
///
/// `null`, `""` and blank lines are valid but empty: they yield
/// `NormalizedRecord::default()` (no identifier is assigned).
pub fn normalize(line: &[u8], ids: &dyn IdGenerator) -> Result<NormalizedRecord, ParseError> {
    if is_empty_record(line) {
        return Ok(NormalizedRecord::default());
    }
    let inbound: InboundRecord =
        serde_json::from_slice(line).map_err(|e| ParseError::new(line, e))?;
    Ok(inbound.normalize(ids))
}

fn is_empty_record(line: &[u8]) -> bool {
    matches!(line.trim_ascii(), b"" | b"null" | b"\"\"")
}

impl InboundRecord {
    pub fn normalize(self, ids: &dyn IdGenerator) -> NormalizedRecord {
        let attrs = self.attributes.unwrap_or_default();

        let identifier = match self.id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => {
                let placeholder = ids.next_id();
                let identifiers = attrs.identifiers.unwrap_or_default();
                last_doi(&identifiers).unwrap_or(placeholder)
            }
        };

        NormalizedRecord {
            identifier,
            titles: non_empty_or(self.titles, attrs.titles),
            descriptions: non_empty_or(self.descriptions, attrs.descriptions),
            subjects: non_empty_or(self.subjects, attrs.subjects),
        }
    }
}

/// Resolved value of the last decodable DOI entry, in input order
fn last_doi(identifiers: &[InboundIdentifier]) -> Option<String> {
    identifiers
        .iter()
        .filter(|id| id.is_doi())
        .filter_map(|id| id.identifier.as_deref())
        .filter_map(IdentifierValue::decode)
        .filter_map(IdentifierValue::resolve)
        .last()
}

fn non_empty_or<T>(primary: Option<Vec<T>>, fallback: Option<Vec<T>>) -> Vec<T> {
    match primary {
        Some(values) if !values.is_empty() => values,
        _ => fallback.unwrap_or_default(),
    }
}
