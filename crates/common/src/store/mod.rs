//! Discovery store
//!
//! Persists the discovery list and per-source scan timestamps behind the
//! [`DiscoveryStore`] trait so scans and the read API never touch a global.
//! Backends:
//! - [`FileStore`]: one file per logical key, atomic replace on write
//! - [`RedisStore`]: the same logical keys in Redis
//! - [`MemoryStore`]: process-local, for tests and dry runs

mod file;
mod memory;
mod redis_store;

pub use self::file::FileStore;
pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::errors::{AppError, Result};
use crate::models::{DiscoveryRecord, SourceKind};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;

/// Storage for discoveries and scan metadata.
///
/// `merge` is a read-modify-write of the whole list. Implementations make
/// the write all-or-nothing; callers serialize scans of the same source kind.
#[async_trait]
pub trait DiscoveryStore: Send + Sync {
    /// All stored discoveries, newest first. Empty when nothing was persisted yet.
    async fn load(&self) -> Result<Vec<DiscoveryRecord>>;

    /// Prepend `new_records` and persist. Returns the number of records now stored.
    async fn merge(&self, new_records: Vec<DiscoveryRecord>) -> Result<usize>;

    /// Overwrite the scan-time marker for `kind`.
    async fn record_scan_time(&self, kind: SourceKind, at: DateTime<Utc>) -> Result<()>;

    /// Last successful scan of `kind`, if any.
    async fn last_scan_time(&self, kind: SourceKind) -> Result<Option<DateTime<Utc>>>;

    /// Name used in logs and readiness output
    fn backend_name(&self) -> &'static str;

    /// Check the medium is reachable
    async fn ping(&self) -> Result<()> {
        self.load().await.map(|_| ())
    }
}

/// Logical key names shared by every backend
pub mod keys {
    use crate::models::SourceKind;

    /// JSON array of discovery records, newest first
    pub const DISCOVERIES: &str = "discoveries";

    /// RFC 3339 timestamp of the last scan for `kind`
    pub fn scan_time(kind: SourceKind) -> &'static str {
        match kind {
            SourceKind::Primary => "discoveries:lastScan",
            SourceKind::Secondary => "discoveries:lastScholarScan",
        }
    }

    /// Apply an optional namespace
    pub fn prefixed(prefix: Option<&str>, key: &str) -> String {
        match prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, key),
            _ => key.to_string(),
        }
    }
}

/// Render a scan timestamp the way it is persisted (`2025-01-15T08:00:00.000Z`)
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a persisted RFC 3339 timestamp
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::store(format!("corrupt scan timestamp '{}': {}", raw.trim(), e)))
}

/// Decode the persisted discovery list
fn decode_discoveries(raw: &str) -> Result<Vec<DiscoveryRecord>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|e| AppError::store(format!("corrupt discovery list: {}", e)))
}

/// Create a store based on configuration
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn DiscoveryStore>> {
    let store: Arc<dyn DiscoveryStore> = match config.backend {
        StoreBackend::File => Arc::new(FileStore::new(&config.data_dir, config.key_prefix.clone())),
        StoreBackend::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| AppError::Configuration {
                message: "store.redis_url is required for the redis backend".to_string(),
            })?;
            Arc::new(RedisStore::connect(url, config.key_prefix.clone()).await?)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory discovery store, nothing will survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    tracing::info!(backend = store.backend_name(), "Discovery store ready");
    Ok(store)
}
