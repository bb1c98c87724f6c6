// # ip-api.com Provider
//
// ## API Reference
//
// - `GET /json/{ip}?fields=...` (free tier is plain HTTP)
// - Body carries `"status": "success" | "fail"`; on fail, `message` says why
//   (e.g. "private range", "reserved range", "invalid query")

use async_trait::async_trait;
use geowatch_core::traits::{GeoProvider, GeoProviderFactory, RawPayload};
use geowatch_core::{Error, ProvidersConfig, Result};
use serde_json::Value;

/// Registry name
pub const NAME: &str = "ip-api";

const DEFAULT_BASE_URL: &str = "http://ip-api.com";

/// Fields requested from ip-api
const FIELDS: &str = "status,message,country,regionName,city,lat,lon,isp,as,query";

/// ip-api.com provider
#[derive(Debug)]
pub struct IpApiProvider {
    base_url: String,
    client: reqwest::Client,
}

impl IpApiProvider {
    /// Create a provider against `base_url` with a request timeout
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            client: crate::http_client(timeout_secs)?,
        })
    }

    fn url(&self, ip: &str) -> String {
        format!("{}/json/{}?fields={}", self.base_url, ip, FIELDS)
    }
}

#[async_trait]
impl GeoProvider for IpApiProvider {
    async fn fetch(&self, ip: &str) -> Result<Option<RawPayload>> {
        tracing::debug!("Querying ip-api for {}", ip);

        let body = crate::get_json(NAME, self.client.get(self.url(ip))).await?;
        let payload = crate::into_object(NAME, body)?;

        if payload.get("status").and_then(Value::as_str) == Some("fail") {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown failure");
            return Err(Error::provider(NAME, format!("Lookup failed: {}", message)));
        }

        Ok(Some(payload))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

/// Factory for ip-api providers
pub struct IpApiFactory;

impl GeoProviderFactory for IpApiFactory {
    fn create(&self, config: &ProvidersConfig) -> Result<Box<dyn GeoProvider>> {
        let base_url = crate::base_url(config, NAME, DEFAULT_BASE_URL);
        Ok(Box::new(IpApiProvider::new(base_url, config.http_timeout_secs)?))
    }
}
