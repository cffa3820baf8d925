//! Persisted discovery records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::paper::PaperRecord;

/// Which provider produced a batch of candidates.
///
/// Each kind has its own dedup key and its own last-scan timestamp. The
/// `arxiv` / `google_scholar` aliases read records written by the first
/// version of the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    #[serde(alias = "arxiv")]
    Primary,
    #[serde(alias = "google_scholar")]
    Secondary,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Primary => "primary",
            SourceKind::Secondary => "secondary",
        }
    }

    /// Human readable provider name used in logs and errors
    pub fn provider(&self) -> &'static str {
        match self {
            SourceKind::Primary => "arXiv",
            SourceKind::Secondary => "Google Scholar",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A paper that a scan found and persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRecord {
    #[serde(rename = "id")]
    pub external_id: String,

    pub title: String,

    #[serde(default)]
    pub authors: String,

    #[serde(rename = "abstract", default)]
    pub abstract_text: String,

    #[serde(default)]
    pub published_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Set once when the record is first persisted
    pub discovered_at: DateTime<Utc>,

    /// Owned by the reviewer workflow; scans only ever write `false`
    #[serde(default)]
    pub reviewed: bool,

    #[serde(default)]
    pub source: SourceKind,

    /// Fields this version does not model (`arxivId`, reviewer notes, ...),
    /// carried through rewrites untouched
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl DiscoveryRecord {
    /// Stamp a freshly discovered paper.
    pub fn discovered(paper: PaperRecord, source: SourceKind, at: DateTime<Utc>) -> Self {
        Self {
            external_id: paper.external_id,
            title: paper.title,
            authors: paper.authors,
            abstract_text: paper.abstract_text,
            published_at: paper.published_at,
            url: paper.url,
            discovered_at: at,
            reviewed: false,
            source,
            extra: Map::new(),
        }
    }

    pub fn title_key(&self) -> String {
        self.title.to_lowercase()
    }
}

/// Read-side view of the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveriesView {
    pub discoveries: Vec<DiscoveryRecord>,
    pub last_scan: Option<DateTime<Utc>>,
    pub last_scholar_scan: Option<DateTime<Utc>>,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_first_generation_records() {
        // arxivId/no source, as written by the original cron job
        let json = r#"{
            "id": "2410.00037",
            "title": "Moshi: a speech-text foundation model",
            "authors": "Alexandre Défossez",
            "abstract": "",
            "arxivId": "2410.00037",
            "discoveredAt": "2025-01-15T08:00:00.000Z",
            "reviewed": true
        }"#;
        let record: DiscoveryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.external_id, "2410.00037");
        assert_eq!(record.source, SourceKind::Primary);
        assert!(record.reviewed);
        assert_eq!(record.published_at, "");
        assert_eq!(record.extra["arxivId"], "2410.00037");

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["arxivId"], "2410.00037");
        assert_eq!(back["reviewed"], true);
    }

    #[test]
    fn test_scholar_alias() {
        let json = r#"{
            "id": "scholar_1",
            "title": "SpeechGPT",
            "authors": "",
            "abstract": "",
            "url": "https://example.org/speechgpt",
            "source": "google_scholar",
            "discoveredAt": "2025-01-15T08:00:00Z",
            "reviewed": false
        }"#;
        let record: DiscoveryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.source, SourceKind::Secondary);

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["source"], "secondary");
    }

    #[test]
    fn test_discovered_defaults_unreviewed() {
        let paper = PaperRecord {
            external_id: "1111.11111".into(),
            title: "T".into(),
            authors: String::new(),
            abstract_text: String::new(),
            published_at: "2024-01-01T00:00:00Z".into(),
            url: Some("http://arxiv.org/abs/1111.11111".into()),
        };
        let now = Utc::now();
        let record = DiscoveryRecord::discovered(paper, SourceKind::Primary, now);
        assert!(!record.reviewed);
        assert!(record.extra.is_empty());
        assert!(serde_json::to_value(&record).unwrap().get("extra").is_none());
        assert_eq!(record.discovered_at, now);
        assert_eq!(record.url.as_deref(), Some("http://arxiv.org/abs/1111.11111"));
    }
}
