// # Geolocation Providers
//
// This crate provides the HTTP geolocation providers for geowatch:
//
// - `ip-api`: ip-api.com JSON endpoint (no key)
// - `ipinfo`: ipinfo.io, bearer token required
// - `db-ip`: api.db-ip.com free endpoint, or the keyed one with a token
//
// ## Trust Level: Untrusted
//
// Providers are isolated and single-shot:
// - One HTTP request per `fetch()` call
// - No retry, no caching, no background tasks
// - Failures are returned to the monitor, which drops that provider's
//   contribution for the cycle
//
// ## Security
//
// Tokens never appear in logs or Debug output. The db-ip token is part of
// the request path, so request URLs are never logged either.

use geowatch_core::traits::RawPayload;
use geowatch_core::{Error, ProviderRegistry, Result};
use serde_json::Value;
use std::time::Duration;

pub mod dbip;
pub mod ip_api;
pub mod ipinfo;

pub use dbip::{DbIpFactory, DbIpProvider};
pub use ip_api::{IpApiFactory, IpApiProvider};
pub use ipinfo::{IpInfoFactory, IpInfoProvider};

/// Register every provider in this crate
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider(ip_api::NAME, Box::new(IpApiFactory));
    registry.register_provider(ipinfo::NAME, Box::new(IpInfoFactory));
    registry.register_provider(dbip::NAME, Box::new(DbIpFactory));
}

/// Build an HTTP client with a whole-request timeout
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("geowatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))
}

/// Send a request and read its body as text
///
/// Network errors and non-success status are provider errors.
pub(crate) async fn get_text(provider: &'static str, request: reqwest::RequestBuilder) -> Result<String> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::provider(provider, format!("HTTP request failed: {}", e.without_url())))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::provider(provider, format!("HTTP error: {}", status)));
    }

    response
        .text()
        .await
        .map_err(|e| Error::provider(provider, format!("Failed to read body: {}", e.without_url())))
}

/// Send a request and decode its JSON body
///
/// Non-JSON bodies are provider errors as well.
pub(crate) async fn get_json(provider: &'static str, request: reqwest::RequestBuilder) -> Result<Value> {
    let body = get_text(provider, request).await?;
    serde_json::from_str(&body)
        .map_err(|e| Error::provider(provider, format!("Invalid JSON body: {}", e)))
}

/// Require a JSON object body
pub(crate) fn into_object(provider: &'static str, body: Value) -> Result<RawPayload> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(Error::provider(
            provider,
            format!("Expected a JSON object, got {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Base URL override or default, without trailing slash
pub(crate) fn base_url(config: &geowatch_core::ProvidersConfig, name: &str, default: &str) -> String {
    config
        .base_url(name)
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}
