//! Plugin-based component registry
//!
//! The registry allows geolocation providers, notification channels and
//! history stores to be registered dynamically at runtime, avoiding
//! hardcoded if-else chains in the daemon.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geowatch_core::registry::ProviderRegistry;
//! use geowatch_core::config::MonitorConfig;
//!
//! let registry = ProviderRegistry::with_builtin_history();
//! geowatch_providers::register(&registry);
//! geowatch_notify::register(&registry);
//!
//! let config = MonitorConfig::default();
//! let providers = registry.create_providers(&config.providers)?;
//! let chain = registry.create_notification_chain(&config.notify)?;
//! let history = registry.create_history_store(&config.history).await?;
//! ```
//!
//! ## Registration
//!
//! Implementation crates expose a `register` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("ip-api", Box::new(IpApiFactory));
//! }
//! ```

use crate::config::{HistoryConfig, NotifyConfig, ProvidersConfig};
use crate::error::{Error, Result};
use crate::history::{MemoryHistoryStoreFactory, SqliteHistoryStoreFactory};
use crate::notify::NotificationChain;
use crate::traits::{GeoProvider, HistoryStore, Notifier};
use crate::traits::{GeoProviderFactory, HistoryStoreFactory, NotifierFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type FactoryMap<F> = RwLock<HashMap<String, F>>;

/// Registry for plugin-based component creation
///
/// Maps component names to factory objects.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered geolocation provider factories
    providers: FactoryMap<Box<dyn GeoProviderFactory>>,

    /// Registered notification channel factories
    notifiers: FactoryMap<Box<dyn NotifierFactory>>,

    /// Registered history store factories
    history_stores: FactoryMap<Arc<dyn HistoryStoreFactory>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `sqlite` and `memory` history stores registered
    pub fn with_builtin_history() -> Self {
        let registry = Self::new();
        registry.register_history_store("sqlite", Box::new(SqliteHistoryStoreFactory));
        registry.register_history_store("memory", Box::new(MemoryHistoryStoreFactory));
        registry
    }

    /// Register a geolocation provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider name as listed in `ProvidersConfig::enabled` (e.g. "ip-api")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn GeoProviderFactory>) {
        write(&self.providers).insert(name.into(), factory);
    }

    /// Register a notification channel factory
    pub fn register_notifier(&self, name: impl Into<String>, factory: Box<dyn NotifierFactory>) {
        write(&self.notifiers).insert(name.into(), factory);
    }

    /// Register a history store factory
    pub fn register_history_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn HistoryStoreFactory>,
    ) {
        write(&self.history_stores).insert(name.into(), Arc::from(factory));
    }

    /// Create one provider by name
    pub fn create_provider(
        &self,
        name: &str,
        config: &ProvidersConfig,
    ) -> Result<Box<dyn GeoProvider>> {
        let providers = read(&self.providers);
        let factory = providers
            .get(name)
            .ok_or_else(|| Error::config(format!("Unknown provider: {}", name)))?;

        factory.create(config)
    }

    /// Create every enabled provider, in the configured order
    ///
    /// The order matters: it breaks consensus ties.
    pub fn create_providers(&self, config: &ProvidersConfig) -> Result<Vec<Box<dyn GeoProvider>>> {
        config
            .enabled
            .iter()
            .map(|name| self.create_provider(name, config))
            .collect()
    }

    /// Create one notification channel by name
    pub fn create_notifier(&self, name: &str, config: &NotifyConfig) -> Result<Box<dyn Notifier>> {
        let notifiers = read(&self.notifiers);
        let factory = notifiers
            .get(name)
            .ok_or_else(|| Error::config(format!("Unknown notification channel: {}", name)))?;

        factory.create(config)
    }

    /// Create the notification chain in the configured priority order
    pub fn create_notification_chain(&self, config: &NotifyConfig) -> Result<NotificationChain> {
        let channels = config
            .order
            .iter()
            .map(|name| self.create_notifier(name, config))
            .collect::<Result<Vec<_>>>()?;

        Ok(NotificationChain::new(channels))
    }

    /// Create a history store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn HistoryStore>)`: Created store, schema ready
    /// - `Err(Error)`: If the store type is not registered or opening fails
    pub async fn create_history_store(&self, config: &HistoryConfig) -> Result<Box<dyn HistoryStore>> {
        let store_type = config.type_name();

        let factory = read(&self.history_stores)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown history store type: {}", store_type)))?;

        // Lock guard is released before the async create
        factory.create(config).await
    }

    /// List all registered provider names
    pub fn list_providers(&self) -> Vec<String> {
        sorted_keys(&read(&self.providers))
    }

    /// List all registered notification channel names
    pub fn list_notifiers(&self) -> Vec<String> {
        sorted_keys(&read(&self.notifiers))
    }

    /// List all registered history store types
    pub fn list_history_stores(&self) -> Vec<String> {
        sorted_keys(&read(&self.history_stores))
    }

    /// Check if a provider is registered
    pub fn has_provider(&self, name: &str) -> bool {
        read(&self.providers).contains_key(name)
    }

    /// Check if a notification channel is registered
    pub fn has_notifier(&self, name: &str) -> bool {
        read(&self.notifiers).contains_key(name)
    }
}

// A poisoned lock only means a registration panicked; the map itself is intact.
fn read<F>(lock: &FactoryMap<F>) -> RwLockReadGuard<'_, HashMap<String, F>> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<F>(lock: &FactoryMap<F>) -> RwLockWriteGuard<'_, HashMap<String, F>> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn sorted_keys<F>(map: &HashMap<String, F>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}
