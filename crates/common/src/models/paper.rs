//! Paper record produced by the response parsers

use serde::{Deserialize, Serialize};

/// A normalized paper as returned by one provider query.
///
/// `external_id` is the provider's stable identifier and is the only thing the
/// primary dedup strategy looks at, so parsers never emit a record without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperRecord {
    #[serde(rename = "id")]
    pub external_id: String,

    pub title: String,

    /// Display names joined with ", " in provider order
    pub authors: String,

    #[serde(rename = "abstract")]
    pub abstract_text: String,

    /// Provider-supplied date text, empty when unknown
    #[serde(default)]
    pub published_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PaperRecord {
    /// Case-insensitive title key used by the title-based dedup strategy
    pub fn title_key(&self) -> String {
        self.title.to_lowercase()
    }
}

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
