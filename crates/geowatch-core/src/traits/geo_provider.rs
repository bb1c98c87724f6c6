// # Geo Provider Trait
//
// Defines the interface for fetching geolocation data from one external source.
//
// ## Implementations
//
// - `ip-api`, `ipinfo`, `db-ip`: `geowatch-providers` crate
//
// ## Usage
//
// ```rust,ignore
// use geowatch_core::GeoProvider;
//
// let provider = /* GeoProvider implementation */;
// if let Some(payload) = provider.fetch("190.130.109.115").await? {
//     let record = geowatch_core::normalize::normalize(&payload)?;
// }
// ```

use async_trait::async_trait;

use crate::config::ProvidersConfig;

/// Raw provider response, keyed as the provider returned it
pub type RawPayload = serde_json::Map<String, serde_json::Value>;

/// Trait for geolocation provider clients
///
/// A provider issues one request per call and hands back the raw payload.
/// Normalization, voting and retries are owned by the monitor.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS calls to their own endpoint only
/// - ✅ Inject provider-specific credentials
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Retry or sleep (owned by `Monitor`)
/// - ❌ Touch the history store or other providers
#[async_trait]
pub trait GeoProvider: Send + Sync {
    /// Fetch the raw payload for an IP
    ///
    /// # Returns
    ///
    /// - `Ok(Some(payload))`: The provider answered
    /// - `Ok(None)`: No data (e.g. a required credential is not configured)
    /// - `Err(Error)`: Network error, non-success status or malformed body
    async fn fetch(&self, ip: &str) -> Result<Option<RawPayload>, crate::Error>;

    /// Stable provider name used in logs, events and audit payloads
    fn name(&self) -> &'static str;
}

/// Helper trait for constructing providers from configuration
pub trait GeoProviderFactory: Send + Sync {
    /// Create a provider instance from the shared providers configuration
    fn create(&self, config: &ProvidersConfig) -> Result<Box<dyn GeoProvider>, crate::Error>;
}
