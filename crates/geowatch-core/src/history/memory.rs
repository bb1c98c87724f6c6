// # Memory History Store
//
// In-memory implementation of HistoryStore.
//
// ## Purpose
//
// Provides a fast history that doesn't persist across restarts. Useful for
// tests and dry runs.
//
// ## Crash Behavior
//
// - All history is lost on restart/crash
// - The first cycle after a restart has no baseline and is reported as a change

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::HistoryConfig;
use crate::model::{ChangeSet, GeoRecord, ProviderResult};
use crate::traits::history_store::{
    ChangeEvent, CheckEntry, HistoryStore, HistoryStoreFactory, now_timestamp,
};

/// In-memory history store implementation
///
/// Checks and events live in two vectors behind one RwLock, so ids are
/// assigned under the same write guard as the append.
///
/// # Example
///
/// ```rust,no_run
/// use geowatch_core::history::MemoryHistoryStore;
/// use geowatch_core::model::GeoRecord;
/// use geowatch_core::traits::HistoryStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryHistoryStore::new();
///     store.record_check("1.2.3.4", &GeoRecord::default()).await?;
///     assert!(store.last_check("1.2.3.4").await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryHistoryStore {
    inner: Arc<RwLock<MemoryHistory>>,
}

#[derive(Debug, Default)]
struct MemoryHistory {
    checks: Vec<CheckEntry>,
    events: Vec<ChangeEvent>,
}

impl MemoryHistoryStore {
    /// Create a new empty memory history store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored checks across all IPs
    pub async fn check_count(&self) -> usize {
        self.inner.read().await.checks.len()
    }

    /// Number of stored events across all IPs
    pub async fn event_count(&self) -> usize {
        self.inner.read().await.events.len()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn record_check(&self, ip: &str, record: &GeoRecord) -> Result<CheckEntry, Error> {
        let mut guard = self.inner.write().await;
        let entry = CheckEntry {
            id: guard.checks.len() as i64 + 1,
            timestamp: now_timestamp(),
            ip: ip.to_string(),
            record: record.clone(),
        };
        guard.checks.push(entry.clone());
        Ok(entry)
    }

    async fn record_event(
        &self,
        ip: &str,
        changes: &ChangeSet,
        raw_results: &[ProviderResult],
    ) -> Result<ChangeEvent, Error> {
        let mut guard = self.inner.write().await;
        let event = ChangeEvent {
            id: guard.events.len() as i64 + 1,
            timestamp: now_timestamp(),
            ip: ip.to_string(),
            changes: changes.clone(),
            raw_results: raw_results.to_vec(),
        };
        guard.events.push(event.clone());
        Ok(event)
    }

    async fn last_check(&self, ip: &str) -> Result<Option<CheckEntry>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.checks.iter().rev().find(|c| c.ip == ip).cloned())
    }

    async fn recent_checks(&self, ip: &str, limit: usize) -> Result<Vec<CheckEntry>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .checks
            .iter()
            .rev()
            .filter(|c| c.ip == ip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent_events(&self, ip: &str, limit: usize) -> Result<Vec<ChangeEvent>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .events
            .iter()
            .rev()
            .filter(|e| e.ip == ip)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Factory for creating memory history stores
pub struct MemoryHistoryStoreFactory;

#[async_trait]
impl HistoryStoreFactory for MemoryHistoryStoreFactory {
    async fn create(&self, config: &HistoryConfig) -> Result<Box<dyn HistoryStore>, Error> {
        match config {
            HistoryConfig::Memory => Ok(Box::new(MemoryHistoryStore::new())),
            _ => Err(Error::config("Invalid config for memory history store")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldValue, TrackedField};

    #[tokio::test]
    async fn test_memory_store_checks() {
        let store = MemoryHistoryStore::new();
        assert!(store.last_check("1.2.3.4").await.unwrap().is_none());

        let first = GeoRecord {
            city: Some("Rosario".into()),
            ..Default::default()
        };
        let second = GeoRecord {
            city: Some("Mendoza".into()),
            ..Default::default()
        };

        store.record_check("1.2.3.4", &first).await.unwrap();
        store.record_check("5.6.7.8", &first).await.unwrap();
        let latest = store.record_check("1.2.3.4", &second).await.unwrap();

        assert_eq!(latest.id, 3);
        assert_eq!(store.check_count().await, 3);

        let last = store.last_check("1.2.3.4").await.unwrap().unwrap();
        assert_eq!(last.record.city.as_deref(), Some("Mendoza"));

        let recent = store.recent_checks("1.2.3.4", 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].id > recent[1].id);
    }

    #[tokio::test]
    async fn test_memory_store_events() {
        let store = MemoryHistoryStore::new();

        let mut changes = ChangeSet::new();
        changes.insert(TrackedField::Country, None, Some(FieldValue::Text("AR".into())));

        let event = store.record_event("1.2.3.4", &changes, &[]).await.unwrap();
        assert_eq!(event.id, 1);

        let events = store.recent_events("1.2.3.4", 5).await.unwrap();
        assert_eq!(events, vec![event]);
        assert!(store.recent_events("5.6.7.8", 5).await.unwrap().is_empty());
    }
}
