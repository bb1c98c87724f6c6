//! Core traits for the geowatch system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`GeoProvider`]: Fetch raw geolocation payloads from one source
//! - [`HistoryStore`]: Durable append-only check and event log
//! - [`Notifier`]: Deliver change alerts through one channel

pub mod geo_provider;
pub mod history_store;
pub mod notifier;

pub use geo_provider::{GeoProvider, GeoProviderFactory, RawPayload};
pub use history_store::{ChangeEvent, CheckEntry, HistoryStore, HistoryStoreFactory, now_timestamp};
pub use notifier::{Alert, Notifier, NotifierFactory};
