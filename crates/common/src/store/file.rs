//! Directory-backed store: one JSON file per logical key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{decode_discoveries, format_timestamp, keys, parse_timestamp, DiscoveryStore};
use crate::errors::{AppError, Result};
use crate::models::{DiscoveryRecord, SourceKind};

/// File-backed discovery store
pub struct FileStore {
    dir: PathBuf,
    key_prefix: Option<String>,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>, key_prefix: Option<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            key_prefix,
            write_lock: Mutex::new(()),
        }
    }

    /// `voicebench:discoveries:lastScan` -> `<dir>/voicebench.discoveries.lastScan.json`
    fn path_for(&self, key: &str) -> PathBuf {
        let name = keys::prefixed(self.key_prefix.as_deref(), key).replace(':', ".");
        self.dir.join(format!("{}.json", name))
    }

    async fn read_key(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::store(format!("failed to read {}: {}", path.display(), e))),
        }
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn write_key(&self, key: &str, contents: &str) -> Result<()> {
        let path = self.path_for(key);
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::store(format!("failed to create {}: {}", self.dir.display(), e)))?;

        let written = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(contents.as_bytes()).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(AppError::store(format!("failed to write {}: {}", path.display(), e)));
        }
        Ok(())
    }
}

#[async_trait]
impl DiscoveryStore for FileStore {
    async fn load(&self) -> Result<Vec<DiscoveryRecord>> {
        match self.read_key(keys::DISCOVERIES).await? {
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
        self.write_key(keys::DISCOVERIES, &encoded).await?;
        Ok(merged.len())
    }

    async fn record_scan_time(&self, kind: SourceKind, at: DateTime<Utc>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let encoded = serde_json::to_string(&format_timestamp(at))?;
        self.write_key(keys::scan_time(kind), &encoded).await
    }

    async fn last_scan_time(&self, kind: SourceKind) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.read_key(keys::scan_time(kind)).await? else {
            return Ok(None);
        };
        // Accept both a JSON string and a bare timestamp
        let text: String = serde_json::from_str(&raw).unwrap_or(raw);
        parse_timestamp(&text).map(Some)
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
