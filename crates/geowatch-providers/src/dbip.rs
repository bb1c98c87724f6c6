// # db-ip Provider
//
// - Free: `GET /v2/free/{ip}`
// - Keyed: `GET /v2/{token}/{ip}`
//
// Errors come back as 200 with `{"error": "..."}`. A body that is not a JSON
// object, including one that is not JSON at all, is "no data".

use async_trait::async_trait;
use geowatch_core::traits::{GeoProvider, GeoProviderFactory, RawPayload};
use geowatch_core::{Error, ProvidersConfig, Result};
use serde_json::Value;

/// Registry name
pub const NAME: &str = "db-ip";

const DEFAULT_BASE_URL: &str = "https://api.db-ip.com";

/// db-ip provider
pub struct DbIpProvider {
    base_url: String,
    /// Part of the request path; ⚠️ NEVER log request URLs
    token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for DbIpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbIpProvider")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl DbIpProvider {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            token: token.filter(|t| !t.trim().is_empty()),
            client: crate::http_client(timeout_secs)?,
        })
    }

    fn url(&self, ip: &str) -> String {
        let key = self.token.as_deref().unwrap_or("free");
        format!("{}/v2/{}/{}", self.base_url, key, ip)
    }
}

#[async_trait]
impl GeoProvider for DbIpProvider {
    async fn fetch(&self, ip: &str) -> Result<Option<RawPayload>> {
        tracing::debug!(
            "Querying db-ip for {} ({} endpoint)",
            ip,
            if self.token.is_some() { "keyed" } else { "free" }
        );

        let body = crate::get_text(NAME, self.client.get(self.url(ip))).await?;
        let payload = match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                tracing::debug!("db-ip returned a non-object body");
                return Ok(None);
            }
            Err(e) => {
                tracing::debug!("db-ip returned a non-JSON body: {}", e);
                return Ok(None);
            }
        };

        if let Some(error) = payload.get("error") {
            let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            return Err(Error::provider(NAME, message));
        }

        Ok(Some(payload))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

/// Factory for db-ip providers
pub struct DbIpFactory;

impl GeoProviderFactory for DbIpFactory {
    fn create(&self, config: &ProvidersConfig) -> Result<Box<dyn GeoProvider>> {
        let base_url = crate::base_url(config, NAME, DEFAULT_BASE_URL);
        Ok(Box::new(DbIpProvider::new(
            base_url,
            config.dbip_token.clone(),
            config.http_timeout_secs,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_and_keyed_urls() {
        let free = DbIpProvider::new(DEFAULT_BASE_URL, None, 15).unwrap();
        assert_eq!(free.url("8.8.8.8"), "https://api.db-ip.com/v2/free/8.8.8.8");

        let keyed = DbIpProvider::new(DEFAULT_BASE_URL, Some("k3y".into()), 15).unwrap();
        assert_eq!(keyed.url("8.8.8.8"), "https://api.db-ip.com/v2/k3y/8.8.8.8");
        assert!(!format!("{:?}", keyed).contains("k3y"));
    }
}
