use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::DiscoveryStore;
use crate::errors::{AppError, Result};
use crate::models::{DiscoveryRecord, SourceKind};

#[derive(Default)]
struct State {
    discoveries: Vec<DiscoveryRecord>,
    scan_times: HashMap<SourceKind, DateTime<Utc>>,
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing records, newest first
    pub fn with_discoveries(discoveries: Vec<DiscoveryRecord>) -> Self {
        Self {
            state: RwLock::new(State {
                discoveries,
                scan_times: HashMap::new(),
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail with `StoreUnavailable`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::store("writes disabled"));
        }
        Ok(())
    }
}

#[async_trait]
impl DiscoveryStore for MemoryStore {
    async fn load(&self) -> Result<Vec<DiscoveryRecord>> {
        Ok(self.state.read().await.discoveries.clone())
    }

    async fn merge(&self, new_records: Vec<DiscoveryRecord>) -> Result<usize> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let mut merged = new_records;
        merged.append(&mut state.discoveries);
        state.discoveries = merged;
        Ok(state.discoveries.len())
    }

    async fn record_scan_time(&self, kind: SourceKind, at: DateTime<Utc>) -> Result<()> {
        self.check_writable()?;
        self.state.write().await.scan_times.insert(kind, at);
        Ok(())
    }

    async fn last_scan_time(&self, kind: SourceKind) -> Result<Option<DateTime<Utc>>> {
        Ok(self.state.read().await.scan_times.get(&kind).copied())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
