// # SQLite History Store
//
// SQLite-backed implementation of HistoryStore.
//
// ## Purpose
//
// Durable, append-only history of checks and change events across daemon
// restarts and crashes. The newest check hydrates the monitor baseline.
//
// ## Durability
//
// - WAL journal with `synchronous = FULL`: a committed append survives a crash
// - Each append is one INSERT statement, atomic by itself
// - A single pooled connection serializes writes within the process
//
// ## Schema
//
// ```sql
// checks (id, ts, ip, country, region, city, lat, lon, isp, asn)
// events (id, ts, ip, change_json)
// ```
//
// Column names match databases written by earlier deployments of the
// monitoring script, so an existing `monitor_ip.db` can be reused. Their
// event payloads use the short keys `lat`, `lon` and `as`, and a first-cycle
// event stores bare values instead of old/new pairs; both are read. An event
// row that cannot be decoded is skipped with a warning.

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::Error;
use crate::config::HistoryConfig;
use crate::model::{ChangeSet, GeoRecord, ProviderResult};
use crate::traits::history_store::{
    ChangeEvent, CheckEntry, EventPayload, HistoryStore, HistoryStoreFactory, now_timestamp,
};

const CREATE_CHECKS: &str = "CREATE TABLE IF NOT EXISTS checks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL,
    ip TEXT NOT NULL,
    country TEXT,
    region TEXT,
    city TEXT,
    lat REAL,
    lon REAL,
    isp TEXT,
    asn TEXT
)";

const CREATE_EVENTS: &str = "CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL,
    ip TEXT NOT NULL,
    change_json TEXT NOT NULL
)";

const CREATE_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_checks_ip ON checks (ip, id)",
    "CREATE INDEX IF NOT EXISTS idx_events_ip ON events (ip, id)",
];

const CHECK_COLUMNS: &str = "id, ts, ip, country, region, city, lat, lon, isp, asn";

/// SQLite history store
///
/// # Example
///
/// ```rust,no_run
/// use geowatch_core::history::SqliteHistoryStore;
/// use geowatch_core::traits::HistoryStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SqliteHistoryStore::open("/var/lib/geowatch/monitor_ip.db").await?;
///     let last = store.last_check("190.130.109.115").await?;
///     println!("{:?}", last);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    /// Open (or create) a database file and ensure the schema exists
    ///
    /// Parent directories are created when missing.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create history directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!("Opened history database: {}", path.display());
        Ok(store)
    }

    /// Open a private in-memory database
    ///
    /// The single connection is never recycled, since dropping it would
    /// discard the database.
    pub async fn in_memory() -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create tables and indexes if they don't exist
    async fn migrate(&self) -> Result<(), Error> {
        sqlx::query(CREATE_CHECKS).execute(&self.pool).await?;
        sqlx::query(CREATE_EVENTS).execute(&self.pool).await?;
        for statement in CREATE_INDEXES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Close the pool, waiting for in-flight statements
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn check_from_row(row: &SqliteRow) -> Result<CheckEntry, Error> {
        let ip: String = row.try_get("ip")?;
        Ok(CheckEntry {
            id: row.try_get("id")?,
            timestamp: row.try_get("ts")?,
            record: GeoRecord {
                // query is not persisted; the monitored IP stands in for it
                query: ip.clone(),
                country: row.try_get("country")?,
                region: row.try_get("region")?,
                city: row.try_get("city")?,
                isp: row.try_get("isp")?,
                as_number: row.try_get("asn")?,
                latitude: row.try_get("lat")?,
                longitude: row.try_get("lon")?,
            },
            ip,
        })
    }

    fn event_from_row(row: &SqliteRow) -> Result<ChangeEvent, Error> {
        let change_json: String = row.try_get("change_json")?;
        let payload: EventPayload = serde_json::from_str(&change_json).map_err(|e| {
            Error::history(format!("Corrupted change payload in event row: {}", e))
        })?;

        Ok(ChangeEvent {
            id: row.try_get("id")?,
            timestamp: row.try_get("ts")?,
            ip: row.try_get("ip")?,
            changes: payload.changes,
            raw_results: payload.raw_results,
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn record_check(&self, ip: &str, record: &GeoRecord) -> Result<CheckEntry, Error> {
        let timestamp = now_timestamp();

        let result = sqlx::query(
            "INSERT INTO checks (ts, ip, country, region, city, lat, lon, isp, asn) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&timestamp)
        .bind(ip)
        .bind(&record.country)
        .bind(&record.region)
        .bind(&record.city)
        .bind(record.latitude)
        .bind(record.longitude)
        .bind(&record.isp)
        .bind(&record.as_number)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to record check for {}: {}", ip, e);
            Error::from(e)
        })?;

        Ok(CheckEntry {
            id: result.last_insert_rowid(),
            timestamp,
            ip: ip.to_string(),
            record: record.clone(),
        })
    }

    async fn record_event(
        &self,
        ip: &str,
        changes: &ChangeSet,
        raw_results: &[ProviderResult],
    ) -> Result<ChangeEvent, Error> {
        let timestamp = now_timestamp();
        let payload = EventPayload {
            ip: ip.to_string(),
            time: timestamp.clone(),
            changes: changes.clone(),
            raw_results: raw_results.to_vec(),
        };
        let change_json = serde_json::to_string(&payload)?;

        let result = sqlx::query("INSERT INTO events (ts, ip, change_json) VALUES (?, ?, ?)")
            .bind(&timestamp)
            .bind(ip)
            .bind(&change_json)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to record change event for {}: {}", ip, e);
                Error::from(e)
            })?;

        Ok(ChangeEvent {
            id: result.last_insert_rowid(),
            timestamp,
            ip: ip.to_string(),
            changes: payload.changes,
            raw_results: payload.raw_results,
        })
    }

    async fn last_check(&self, ip: &str) -> Result<Option<CheckEntry>, Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM checks WHERE ip = ? ORDER BY id DESC LIMIT 1",
            CHECK_COLUMNS
        ))
        .bind(ip)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::check_from_row).transpose()
    }

    async fn recent_checks(&self, ip: &str, limit: usize) -> Result<Vec<CheckEntry>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM checks WHERE ip = ? ORDER BY id DESC LIMIT ?",
            CHECK_COLUMNS
        ))
        .bind(ip)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::check_from_row).collect()
    }

    async fn recent_events(&self, ip: &str, limit: usize) -> Result<Vec<ChangeEvent>, Error> {
        let rows = sqlx::query(
            "SELECT id, ts, ip, change_json FROM events WHERE ip = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(ip)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::event_from_row(row) {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!("Skipping unreadable event row for {}: {}", ip, e),
            }
        }
        Ok(events)
    }
}

/// Factory for creating SQLite history stores
pub struct SqliteHistoryStoreFactory;

#[async_trait]
impl HistoryStoreFactory for SqliteHistoryStoreFactory {
    async fn create(&self, config: &HistoryConfig) -> Result<Box<dyn HistoryStore>, Error> {
        match config {
            HistoryConfig::Sqlite { path } => Ok(Box::new(SqliteHistoryStore::open(path).await?)),
            _ => Err(Error::config("Invalid config for SQLite history store")),
        }
    }
}
