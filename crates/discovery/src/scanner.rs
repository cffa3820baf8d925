//! Scan orchestration
//!
//! A scan searches every keyword in order, then runs the collected batch
//! through dedup and a single store merge. Nothing is written before the
//! merge, so a failed search or a failed load leaves the store as it was.

use chrono::Utc;
use paperscout_common::metrics::{record_scan, set_discoveries_stored};
use paperscout_common::{
    AppConfig, AppError, DateRange, DiscoveryRecord, DiscoveryStore, PaperRecord, Result, ScanSummary,
    SourceKind,
};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};

use crate::dedup;
use crate::parser;
use crate::scholar::ScholarRunner;
use crate::source::{create_source, PaperSource};

/// Where a running scan is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Searching { index: usize, keyword: String },
    Deduplicating,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanPhase::Idle => f.write_str("idle"),
            ScanPhase::Searching { index, .. } => write!(f, "searching[{}]", index),
            ScanPhase::Deduplicating => f.write_str("deduplicating"),
            ScanPhase::Persisting => f.write_str("persisting"),
            ScanPhase::Done => f.write_str("done"),
            ScanPhase::Failed => f.write_str("failed"),
        }
    }
}

/// Scan tuning
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub keywords: Vec<String>,
    /// Pause between consecutive provider requests
    pub request_delay: Duration,
    pub default_lookback_days: u32,
    pub max_results_per_keyword: u32,
    pub sample_size: usize,
}

impl ScanSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            keywords: config.scan.keywords.clone(),
            request_delay: config.request_delay(),
            default_lookback_days: config.scan.default_lookback_days,
            max_results_per_keyword: config
                .scan
                .max_results_per_keyword
                .min(config.arxiv.max_results_cap),
            sample_size: config.scan.sample_size,
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Parameters of one primary scan; unset fields fall back to [`ScanSettings`]
#[derive(Debug, Clone, Default)]
pub struct PrimaryScanRequest {
    pub date_range: Option<DateRange>,
    pub max_results_per_keyword: Option<u32>,
}

/// Scan orchestrator
pub struct Scanner {
    source: Arc<dyn PaperSource>,
    store: Arc<dyn DiscoveryStore>,
    scholar: Option<ScholarRunner>,
    settings: ScanSettings,
}

impl Scanner {
    pub fn new(source: Arc<dyn PaperSource>, store: Arc<dyn DiscoveryStore>, settings: ScanSettings) -> Self {
        Self {
            source,
            store,
            scholar: None,
            settings,
        }
    }

    /// Enable the secondary source
    pub fn with_scholar(mut self, runner: ScholarRunner) -> Self {
        self.scholar = Some(runner);
        self
    }

    /// Wire the arXiv client and, when enabled, the Scholar runner
    pub fn from_config(config: &AppConfig, store: Arc<dyn DiscoveryStore>) -> Result<Self> {
        let source = create_source(&config.arxiv)?;
        let mut scanner = Self::new(source, store, ScanSettings::from_config(config));
        scanner.scholar = ScholarRunner::from_config(&config.scholar);
        Ok(scanner)
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn DiscoveryStore> {
        &self.store
    }

    pub fn scholar_enabled(&self) -> bool {
        self.scholar.is_some()
    }

    fn enter(&self, kind: SourceKind, phase: &ScanPhase) {
        match phase {
            ScanPhase::Searching { keyword, .. } => {
                debug!(source = %kind, phase = %phase, keyword = %keyword, "Scan phase")
            }
            _ => debug!(source = %kind, phase = %phase, "Scan phase"),
        }
    }

    /// Search every configured keyword on the primary source and persist new papers.
    #[instrument(skip(self, request), fields(source = "primary"))]
    pub async fn scan_primary(&self, request: PrimaryScanRequest) -> Result<ScanSummary> {
        let start = Instant::now();
        let result = self.run_primary(request).await;
        self.finish(SourceKind::Primary, start, result)
    }

    /// Run the Scholar script and persist papers with unseen titles.
    #[instrument(skip(self), fields(source = "secondary"))]
    pub async fn scan_secondary(&self, year_from: Option<i32>) -> Result<ScanSummary> {
        let start = Instant::now();
        let result = self.run_secondary(year_from).await;
        self.finish(SourceKind::Secondary, start, result)
    }

    fn finish(&self, kind: SourceKind, start: Instant, result: Result<ScanSummary>) -> Result<ScanSummary> {
        record_scan(kind, start.elapsed(), result.as_ref().ok().map(|s| s.new_discoveries));

        match &result {
            Ok(summary) => info!(
                source = %kind,
                total_found = summary.total_found,
                new_discoveries = summary.new_discoveries,
                total_stored = summary.total_stored,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Scan complete"
            ),
            Err(e) => {
                self.enter(kind, &ScanPhase::Failed);
                error!(source = %kind, error = %e, code = ?e.code(), "Scan failed");
            }
        }
        result
    }

    async fn run_primary(&self, request: PrimaryScanRequest) -> Result<ScanSummary> {
        let kind = SourceKind::Primary;
        let range = request.date_range.unwrap_or_else(|| {
            DateRange::last_days(Utc::now().date_naive(), self.settings.default_lookback_days)
        });
        let max_results = request
            .max_results_per_keyword
            .unwrap_or(self.settings.max_results_per_keyword);

        self.enter(kind, &ScanPhase::Idle);
        info!(
            from = %range.from_compact(),
            to = %range.to_compact(),
            keywords = self.settings.keywords.len(),
            max_results,
            provider = self.source.provider(),
            "Starting primary scan"
        );

        let mut batch: Vec<PaperRecord> = Vec::new();
        for (index, keyword) in self.settings.keywords.iter().enumerate() {
            if index > 0 && !self.settings.request_delay.is_zero() {
                tokio::time::sleep(self.settings.request_delay).await;
            }
            self.enter(
                kind,
                &ScanPhase::Searching {
                    index,
                    keyword: keyword.clone(),
                },
            );

            let payload = self.source.search(keyword, Some(&range), max_results).await?;
            let papers = parser::parse(&payload);
            info!(keyword = %keyword, found = papers.len(), "Keyword searched");
            batch.extend(papers);
        }

        let mut summary = self.persist(kind, batch).await?;
        summary.date_range = Some(range);
        summary.keywords_searched = Some(self.settings.keywords.len());
        Ok(summary)
    }

    async fn run_secondary(&self, year_from: Option<i32>) -> Result<ScanSummary> {
        let kind = SourceKind::Secondary;
        let runner = self.scholar.as_ref().ok_or_else(|| AppError::SourceDisabled {
            provider: kind.provider().to_string(),
        })?;
        let year_from = year_from.unwrap_or_else(|| runner.default_year_from());

        self.enter(kind, &ScanPhase::Idle);
        info!(year_from, "Starting secondary scan");
        self.enter(
            kind,
            &ScanPhase::Searching {
                index: 0,
                keyword: format!("year>={}", year_from),
            },
        );

        let papers = runner.search(year_from).await?;
        info!(found = papers.len(), "Scholar search returned");
        self.persist(kind, papers).await
    }

    /// Dedup against the store, merge, stamp the scan time.
    async fn persist(&self, kind: SourceKind, batch: Vec<PaperRecord>) -> Result<ScanSummary> {
        self.enter(kind, &ScanPhase::Deduplicating);
        let unique = dedup::collapse_batch(batch, kind);
        let total_found = unique.len();

        let existing = self.store.load().await?;
        let fresh = dedup::exclude_existing(unique, &existing, kind);

        let now = Utc::now();
        let records: Vec<DiscoveryRecord> = fresh
            .into_iter()
            .map(|paper| DiscoveryRecord::discovered(paper, kind, now))
            .collect();
        let new_discoveries = records.len();
        let sample_titles = records
            .iter()
            .take(self.settings.sample_size)
            .map(|record| record.title.clone())
            .collect();

        self.enter(kind, &ScanPhase::Persisting);
        let total_stored = self.store.merge(records).await?;
        self.store.record_scan_time(kind, now).await?;
        set_discoveries_stored(total_stored);
        self.enter(kind, &ScanPhase::Done);

        Ok(ScanSummary {
            success: true,
            timestamp: now,
            source: kind,
            date_range: None,
            keywords_searched: None,
            total_found,
            new_discoveries,
            total_stored,
            sample_titles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockSource;
    use paperscout_common::config::ScholarConfig;
    use paperscout_common::store::MemoryStore;

    fn feed(entries: &[(&str, &str)]) -> String {
        let mut xml = String::from(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#);
        for (id, title) in entries {
            xml.push_str(&format!(
                "<entry><id>http://arxiv.org/abs/{}</id><title>{}</title><summary>s</summary>\
                 <author><name>Ada</name></author></entry>",
                id, title
            ));
        }
        xml.push_str("</feed>");
        xml
    }

    fn settings(keywords: &[&str]) -> ScanSettings {
        ScanSettings {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            request_delay: Duration::ZERO,
            default_lookback_days: 7,
            max_results_per_keyword: 50,
            sample_size: 5,
        }
    }

    fn window() -> PrimaryScanRequest {
        PrimaryScanRequest {
            date_range: Some(DateRange::parse("20250101", "20250107").unwrap()),
            max_results_per_keyword: Some(10),
        }
    }

    #[test]
    fn test_default_results_stay_within_cap() {
        let mut config = AppConfig::default();
        config.arxiv.max_results_cap = 20;
        assert_eq!(ScanSettings::from_config(&config).max_results_per_keyword, 20);

        config.arxiv.max_results_cap = 100;
        assert_eq!(ScanSettings::from_config(&config).max_results_per_keyword, 50);
    }

    #[tokio::test]
    async fn test_single_keyword_scenario() {
        let source = Arc::new(MockSource::new(feed(&[("1111.11111", "First"), ("2222.22222", "Second")])));
        let store = Arc::new(MemoryStore::new());
        let scanner = Scanner::new(source, store.clone(), settings(&["voice agent"]));

        let summary = scanner.scan_primary(window()).await.unwrap();

        assert!(summary.success);
        assert_eq!(summary.keywords_searched, Some(1));
        assert_eq!(summary.total_found, 2);
        assert_eq!(summary.new_discoveries, 2);
        assert_eq!(summary.total_stored, 2);
        assert_eq!(summary.sample_titles, vec!["First", "Second"]);

        let stored = store.load().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|r| !r.reviewed && r.source == SourceKind::Primary));
        assert_eq!(
            store.last_scan_time(SourceKind::Primary).await.unwrap(),
            Some(summary.timestamp)
        );
    }

    #[tokio::test]
    async fn test_second_run_adds_nothing() {
        let source = Arc::new(MockSource::new(feed(&[("1", "A"), ("2", "B")])));
        let store = Arc::new(MemoryStore::new());
        let scanner = Scanner::new(source, store.clone(), settings(&["voice agent", "ASR benchmark"]));

        let first = scanner.scan_primary(window()).await.unwrap();
        let second = scanner.scan_primary(window()).await.unwrap();

        assert_eq!(first.new_discoveries, 2);
        assert_eq!(second.new_discoveries, 0);
        assert_eq!(second.total_stored, first.total_stored);
        assert!(second.sample_titles.is_empty());
        assert_eq!(store.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_later_keyword_wins_and_order_is_kept() {
        let source = Arc::new(
            MockSource::new(feed(&[]))
                .with_response("voice agent", feed(&[("A", "T1"), ("B", "Other")]))
                .with_response("speech dialogue", feed(&[("A", "T2")])),
        );
        let store = Arc::new(MemoryStore::new());
        let scanner = Scanner::new(source.clone(), store.clone(), settings(&["voice agent", "speech dialogue"]));

        let summary = scanner.scan_primary(window()).await.unwrap();
        assert_eq!(summary.total_found, 2);

        let stored = store.load().await.unwrap();
        assert_eq!(stored[0].external_id, "A");
        assert_eq!(stored[0].title, "T2");
        assert_eq!(stored[1].external_id, "B");
        assert_eq!(source.calls().await, vec!["voice agent", "speech dialogue"]);
    }

    #[tokio::test]
    async fn test_source_failure_writes_nothing() {
        let source = Arc::new(MockSource::new(feed(&[("1", "A")])).failing_on("speech dialogue"));
        let store = Arc::new(MemoryStore::new());
        let scanner = Scanner::new(
            source.clone(),
            store.clone(),
            settings(&["voice agent", "speech dialogue", "neural codec"]),
        );

        let err = scanner.scan_primary(window()).await.unwrap_err();

        assert!(matches!(err, AppError::SourceUnavailable { .. }));
        assert!(store.load().await.unwrap().is_empty());
        assert!(store.last_scan_time(SourceKind::Primary).await.unwrap().is_none());
        // Stops at the failing keyword
        assert_eq!(source.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_keeps_prior_state() {
        let source = Arc::new(MockSource::new(feed(&[("1", "A")])));
        let store = Arc::new(MemoryStore::new());
        let scanner = Scanner::new(source, store.clone(), settings(&["voice agent"]));
        scanner.scan_primary(window()).await.unwrap();
        let before = store.last_scan_time(SourceKind::Primary).await.unwrap();

        let scanner = Scanner::new(
            Arc::new(MockSource::new(feed(&[("2", "B")]))),
            store.clone(),
            settings(&["voice agent"]),
        );
        store.set_fail_writes(true);
        let err = scanner.scan_primary(window()).await.unwrap_err();

        assert!(matches!(err, AppError::StoreUnavailable { .. }));
        let stored = store.load().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].external_id, "1");
        assert_eq!(store.last_scan_time(SourceKind::Primary).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_default_window_is_lookback() {
        let source = Arc::new(MockSource::new(feed(&[])));
        let scanner = Scanner::new(source, Arc::new(MemoryStore::new()), settings(&["voice agent"]));

        let summary = scanner.scan_primary(PrimaryScanRequest::default()).await.unwrap();

        let range = summary.date_range.unwrap();
        assert_eq!((range.to() - range.from()).num_days(), 7);
        assert_eq!(summary.new_discoveries, 0);
        assert_eq!(summary.total_stored, 0);
    }

    #[tokio::test]
    async fn test_secondary_disabled() {
        let scanner = Scanner::new(
            Arc::new(MockSource::new("")),
            Arc::new(MemoryStore::new()),
            settings(&[]),
        );
        assert!(!scanner.scholar_enabled());
        let err = scanner.scan_secondary(None).await.unwrap_err();
        assert!(matches!(err, AppError::SourceDisabled { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_secondary_dedupes_on_title() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("scholar.sh");
        std::fs::write(
            &script,
            r#"printf '[{"id":"s1","title":"FIRST"},{"id":"s2","title":"Fresh"},{"title":"fresh"}]'"#,
        )
        .unwrap();

        let store = Arc::new(MemoryStore::new());
        let primary = Scanner::new(
            Arc::new(MockSource::new(feed(&[("1", "First")]))),
            store.clone(),
            settings(&["voice agent"]),
        );
        primary.scan_primary(window()).await.unwrap();

        let runner = ScholarRunner::new(&ScholarConfig {
            program: "sh".to_string(),
            script_path: script,
            timeout_secs: 10,
            ..ScholarConfig::default()
        });
        let scanner = Scanner::new(Arc::new(MockSource::new("")), store.clone(), settings(&[])).with_scholar(runner);

        let summary = scanner.scan_secondary(Some(2025)).await.unwrap();

        assert_eq!(summary.source, SourceKind::Secondary);
        assert_eq!(summary.total_found, 2);
        assert_eq!(summary.new_discoveries, 1);
        assert_eq!(summary.total_stored, 2);
        assert_eq!(summary.sample_titles, vec!["fresh"]);

        let stored = store.load().await.unwrap();
        assert_eq!(stored[0].source, SourceKind::Secondary);
        assert!(store.last_scan_time(SourceKind::Secondary).await.unwrap().is_some());
    }
}
