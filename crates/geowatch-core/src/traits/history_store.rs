// # History Store Trait
//
// Defines the interface for the durable, append-only monitoring history.
//
// ## Purpose
//
// The history store keeps:
// - One check row per cycle that produced data
// - One event row per detected change, with the raw provider answers
//
// The most recent check seeds the comparison baseline at startup.
//
// ## Implementations
//
// - SQLite: `SqliteHistoryStore`
// - In-memory: `MemoryHistoryStore` (tests, dry runs)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::HistoryConfig;
use crate::model::{ChangeSet, FieldChange, FieldValue, GeoRecord, ProviderResult, TrackedField};

/// One persisted monitoring check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckEntry {
    pub id: i64,
    /// ISO-8601 UTC with trailing "Z"
    pub timestamp: String,
    pub ip: String,
    pub record: GeoRecord,
}

/// One persisted change event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: i64,
    /// ISO-8601 UTC with trailing "Z"
    pub timestamp: String,
    pub ip: String,
    pub changes: ChangeSet,
    /// Per-provider answers of the cycle that produced the change
    pub raw_results: Vec<ProviderResult>,
}

/// Serialized form of a change event's payload column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EventPayload {
    pub ip: String,
    pub time: String,
    #[serde(deserialize_with = "stored_changes")]
    pub changes: ChangeSet,
    #[serde(default)]
    pub raw_results: Vec<ProviderResult>,
}

/// Decode the `changes` object of a stored payload
///
/// Besides `{"old", "new"}` pairs, older databases hold a first-cycle event
/// whose changes are the bare consensus values (`{"city": "Salta", ...}`).
/// Those are read as changes from nothing. Null values and keys that are not
/// tracked fields are skipped.
fn stored_changes<'de, D>(deserializer: D) -> Result<ChangeSet, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;

    let raw = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    let mut changes = ChangeSet::new();

    for (key, value) in raw {
        let Ok(field) = serde_json::from_value::<TrackedField>(serde_json::Value::String(key))
        else {
            continue;
        };

        if value.is_null() {
            continue;
        }
        let is_pair = value
            .as_object()
            .is_some_and(|map| map.contains_key("old") || map.contains_key("new"));

        if is_pair {
            let change: FieldChange = serde_json::from_value(value).map_err(D::Error::custom)?;
            changes.insert(field, change.old, change.new);
        } else {
            let new: FieldValue = serde_json::from_value(value).map_err(D::Error::custom)?;
            changes.insert(field, None, Some(new));
        }
    }

    Ok(changes)
}

/// Current UTC time as ISO-8601 with a trailing "Z"
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Trait for history store implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage
/// - ✅ Serialize writes internally
///
/// ## Forbidden Capabilities
/// - ❌ Decide whether something changed (owned by the change detector)
/// - ❌ Send notifications (owned by `NotificationChain`)
///
/// ## Implementation Guidelines
///
/// - **Durable on return**: an append is committed before the future resolves,
///   so the monitor can notify only about rows that already exist
/// - **Atomic appends**: a row is either fully written or not at all
/// - **Append-only**: rows are never updated or deleted
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a check row for this cycle's consensus
    async fn record_check(&self, ip: &str, record: &GeoRecord) -> Result<CheckEntry, crate::Error>;

    /// Append a change event with the diff and the raw provider results
    async fn record_event(
        &self,
        ip: &str,
        changes: &ChangeSet,
        raw_results: &[ProviderResult],
    ) -> Result<ChangeEvent, crate::Error>;

    /// Most recent check for an IP
    ///
    /// # Returns
    ///
    /// - `Ok(Some(CheckEntry))`: The newest check
    /// - `Ok(None)`: The IP was never checked
    async fn last_check(&self, ip: &str) -> Result<Option<CheckEntry>, crate::Error>;

    /// Up to `limit` checks for an IP, newest first
    async fn recent_checks(&self, ip: &str, limit: usize) -> Result<Vec<CheckEntry>, crate::Error>;

    /// Up to `limit` change events for an IP, newest first
    async fn recent_events(&self, ip: &str, limit: usize) -> Result<Vec<ChangeEvent>, crate::Error>;
}

/// Helper trait for constructing history stores from configuration
#[async_trait]
pub trait HistoryStoreFactory: Send + Sync {
    async fn create(&self, config: &HistoryConfig) -> Result<Box<dyn HistoryStore>, crate::Error>;
}
