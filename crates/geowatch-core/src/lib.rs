// # geowatch-core
//
// Core library for the IP geolocation monitor.
//
// ## Architecture Overview
//
// This library provides the core functionality for watching where an IP
// address is located and reporting when that changes:
// - **GeoProvider**: Trait for querying a geolocation service
// - **normalize / consensus / detect**: Pure pipeline from raw payloads to a diff
// - **HistoryStore**: Trait for the durable check/event log (SQLite, memory)
// - **Notifier / NotificationChain**: Alert delivery with ordered fallback
// - **Monitor**: Engine that orchestrates the poll → reconcile → diff → alert loop
// - **ProviderRegistry**: Plugin-based registry for providers, channels and stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from HTTP/SMTP implementations
// 2. **Persist First**: A change is on disk before anyone is notified
// 3. **Plugin-Based**: Components are registered by name, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod consensus;
pub mod detect;
pub mod engine;
pub mod error;
pub mod history;
pub mod model;
pub mod normalize;
pub mod notify;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use config::{HistoryConfig, MonitorConfig, NotifyConfig, ProvidersConfig};
pub use engine::{CycleOutcome, Monitor, MonitorEvent, MonitorState};
pub use error::{Error, Result};
pub use history::{MemoryHistoryStore, SqliteHistoryStore};
pub use model::{ChangeSet, FieldChange, FieldValue, GeoRecord, ProviderResult, TrackedField};
pub use notify::{DeliveryReport, NotificationChain};
pub use registry::ProviderRegistry;
pub use traits::{Alert, GeoProvider, HistoryStore, Notifier};
