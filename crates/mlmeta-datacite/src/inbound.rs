//! Inbound record shapes as they appear in DataCite dumps.
//!
//! Records either carry content at the top level or nest it under
//! `attributes` (JSON:API style). Only the fields normalization looks at are
//! modelled; everything else is ignored.

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::record::{Description, Subject, Title};

/// Identifier type that may stand in for a missing top-level id
pub const DOI_TYPE: &str = "DOI";

#[derive(Debug, Default, Deserialize)]
pub struct InboundRecord {
    /// JSON:API `id`; our own output calls it `identifier`
    #[serde(default, alias = "identifier")]
    pub id: Option<String>,
    #[serde(default)]
    pub titles: Option<Vec<Title>>,
    #[serde(default)]
    pub descriptions: Option<Vec<Description>>,
    #[serde(default)]
    pub subjects: Option<Vec<Subject>>,
    #[serde(default)]
    pub attributes: Option<Attributes>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Attributes {
    #[serde(default)]
    pub identifiers: Option<Vec<InboundIdentifier>>,
    #[serde(default)]
    pub titles: Option<Vec<Title>>,
    #[serde(default)]
    pub descriptions: Option<Vec<Description>>,
    #[serde(default)]
    pub subjects: Option<Vec<Subject>>,
}

/// Alternate identifier entry. The value stays undecoded until its type
/// says it matters.
#[derive(Debug, Default, Deserialize)]
pub struct InboundIdentifier {
    #[serde(default)]
    pub identifier: Option<Box<RawValue>>,
    #[serde(default, rename = "identifierType")]
    pub identifier_type: Option<String>,
}

impl InboundIdentifier {
    pub fn is_doi(&self) -> bool {
        self.identifier_type.as_deref() == Some(DOI_TYPE)
    }
}

/// Decoded identifier value: producers emit either a string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IdentifierValue {
    Scalar(String),
    List(Vec<String>),
}

impl IdentifierValue {
    /// `None` when the raw value is neither a string nor a list of strings
    pub fn decode(raw: &RawValue) -> Option<Self> {
        serde_json::from_str(raw.get()).ok()
    }

    /// The scalar itself, or the first list element; never empty
    pub fn resolve(self) -> Option<String> {
        let value = match self {
            Self::Scalar(s) => Some(s),
            Self::List(values) => values.into_iter().next(),
        };
        value.filter(|v| !v.is_empty())
    }
}
