//! Redis-backed store
//!
//! The discovery list lives in a single string key holding a JSON array, so a
//! merge is one `SET` and either lands whole or not at all. Merges from this
//! process are serialized; separate processes sharing a key are not.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use tokio::sync::Mutex;
use tracing::debug;

use super::{decode_discoveries, format_timestamp, keys, parse_timestamp, DiscoveryStore};
use crate::errors::{AppError, Result};
use crate::models::{DiscoveryRecord, SourceKind};

/// Raw string commands the store needs from Redis
#[async_trait]
trait KeyValue: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn ping(&self) -> Result<()>;
}

struct RedisConnection(Mutex<MultiplexedConnection>);

#[async_trait]
impl KeyValue for RedisConnection {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.0.lock().await;
        conn.get(key)
            .await
            .map_err(|e| AppError::store(format!("Failed to get key '{}': {}", key, e)))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.0.lock().await;
        conn.set(key, value)
            .await
            .map_err(|e| AppError::store(format!("Failed to set key '{}': {}", key, e)))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.0.lock().await;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(())
    }
}

/// Redis discovery store
pub struct RedisStore {
    kv: Box<dyn KeyValue>,
    key_prefix: Option<String>,
    write_lock: Mutex<()>,
}

impl RedisStore {
    /// Connect to `url` (redis://host:port)
    pub async fn connect(url: &str, key_prefix: Option<String>) -> Result<Self> {
        let client = Client::open(url).map_err(|e| AppError::Configuration {
            message: format!("Invalid Redis URL: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::store(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self::with_backend(RedisConnection(Mutex::new(connection)), key_prefix))
    }

    fn with_backend(kv: impl KeyValue + 'static, key_prefix: Option<String>) -> Self {
        Self {
            kv: Box::new(kv),
            key_prefix,
            write_lock: Mutex::new(()),
        }
    }

    fn key(&self, key: &str) -> String {
        keys::prefixed(self.key_prefix.as_deref(), key)
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let full_key = self.key(key);
        let value = self.kv.get(&full_key).await?;
        debug!(key = %full_key, hit = value.is_some(), "Store read");
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let full_key = self.key(key);
        self.kv.set(&full_key, value).await?;
        debug!(key = %full_key, bytes = value.len(), "Store write");
        Ok(())
    }
}

#[async_trait]
impl DiscoveryStore for RedisStore {
    async fn load(&self) -> Result<Vec<DiscoveryRecord>> {
        match self.get_raw(keys::DISCOVERIES).await? {
            Some(raw) => decode_discoveries(&raw),
            None => Ok(Vec::new()),
        }
    }

    async fn merge(&self, new_records: Vec<DiscoveryRecord>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let existing = self.load().await?;
        let mut merged = new_records;
        merged.extend(existing);

        let encoded = serde_json::to_string(&merged)?;
        self.set_raw(keys::DISCOVERIES, &encoded).await?;
        Ok(merged.len())
    }

    async fn record_scan_time(&self, kind: SourceKind, at: DateTime<Utc>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.set_raw(keys::scan_time(kind), &format_timestamp(at)).await
    }

    async fn last_scan_time(&self, kind: SourceKind) -> Result<Option<DateTime<Utc>>> {
        match self.get_raw(keys::scan_time(kind)).await? {
            // Older writers stored the timestamp JSON-encoded
            Some(raw) => parse_timestamp(raw.trim_matches('"')).map(Some),
            None => Ok(None),
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<()> {
        self.kv.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperRecord;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// In-process stand-in for Redis whose reads are slow enough to interleave
    #[derive(Default)]
    struct SlowKv {
        values: StdMutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl KeyValue for std::sync::Arc<SlowKv> {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            let value = self.values.lock().unwrap().get(key).cloned();
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(value)
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.values.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn record(id: &str, source: SourceKind) -> DiscoveryRecord {
        let paper = PaperRecord {
            external_id: id.to_string(),
            title: format!("Paper {}", id),
            authors: "A. Author".to_string(),
            abstract_text: String::new(),
            published_at: "2025-01-10T00:00:00Z".to_string(),
            url: None,
        };
        DiscoveryRecord::discovered(paper, source, Utc::now())
    }

    #[tokio::test]
    async fn test_rejects_malformed_url() {
        let err = RedisStore::connect("not a url", None).await.err().unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_merges_keep_both_batches() {
        let kv = std::sync::Arc::new(SlowKv::default());
        let store = RedisStore::with_backend(kv.clone(), Some("voicebench".to_string()));
        store.merge(vec![record("existing", SourceKind::Primary)]).await.unwrap();

        let (primary, secondary) = tokio::join!(
            store.merge(vec![record("p1", SourceKind::Primary)]),
            store.merge(vec![record("s1", SourceKind::Secondary)]),
        );
        primary.unwrap();
        assert_eq!(secondary.unwrap(), 3);

        let mut ids: Vec<String> = store.load().await.unwrap().into_iter().map(|r| r.external_id).collect();
        ids.sort();
        assert_eq!(ids, vec!["existing", "p1", "s1"]);
        assert!(kv.values.lock().unwrap().contains_key("voicebench:discoveries"));
    }

    #[tokio::test]
    async fn test_scan_time_accepts_quoted_value() {
        let kv = std::sync::Arc::new(SlowKv::default());
        kv.values
            .lock()
            .unwrap()
            .insert("discoveries:lastScholarScan".to_string(), "\"2025-01-15T08:00:00.000Z\"".to_string());
        let store = RedisStore::with_backend(kv, None);

        let at = store.last_scan_time(SourceKind::Secondary).await.unwrap().unwrap();
        assert_eq!(format_timestamp(at), "2025-01-15T08:00:00.000Z");
        assert!(store.last_scan_time(SourceKind::Primary).await.unwrap().is_none());
    }
}
