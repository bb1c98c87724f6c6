// # ipinfo.io Provider
//
// `GET /{ip}/json` with `Authorization: Bearer <token>`. Without a token the
// provider contributes nothing and makes no request.
//
// The free plan returns `org` ("AS7303 Telecom Argentina S.A.") and a combined
// `loc` ("-34.6037,-58.3816"); both are understood by the normalizer.

use async_trait::async_trait;
use geowatch_core::traits::{GeoProvider, GeoProviderFactory, RawPayload};
use geowatch_core::{ProvidersConfig, Result};

/// Registry name
pub const NAME: &str = "ipinfo";

const DEFAULT_BASE_URL: &str = "https://ipinfo.io";

/// ipinfo.io provider
pub struct IpInfoProvider {
    base_url: String,
    /// ⚠️ NEVER log this value
    token: Option<String>,
    client: reqwest::Client,
}

// Custom Debug implementation that hides the token
impl std::fmt::Debug for IpInfoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpInfoProvider")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl IpInfoProvider {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            token: token.filter(|t| !t.trim().is_empty()),
            client: crate::http_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl GeoProvider for IpInfoProvider {
    async fn fetch(&self, ip: &str) -> Result<Option<RawPayload>> {
        let Some(token) = &self.token else {
            tracing::debug!("ipinfo token not set, skipping");
            return Ok(None);
        };

        tracing::debug!("Querying ipinfo for {}", ip);
        let request = self
            .client
            .get(format!("{}/{}/json", self.base_url, ip))
            .bearer_auth(token);

        let body = crate::get_json(NAME, request).await?;
        crate::into_object(NAME, body).map(Some)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

/// Factory for ipinfo providers
pub struct IpInfoFactory;

impl GeoProviderFactory for IpInfoFactory {
    fn create(&self, config: &ProvidersConfig) -> Result<Box<dyn geowatch_core::GeoProvider>> {
        let base_url = crate::base_url(config, NAME, DEFAULT_BASE_URL);
        Ok(Box::new(IpInfoProvider::new(
            base_url,
            config.ipinfo_token.clone(),
            config.http_timeout_secs,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_returns_none_without_request() {
        // Unroutable base URL: any request would fail
        let provider = IpInfoProvider::new("http://127.0.0.1:9", None, 1).unwrap();
        assert!(provider.fetch("1.2.3.4").await.unwrap().is_none());

        let provider = IpInfoProvider::new("http://127.0.0.1:9", Some("  ".into()), 1).unwrap();
        assert!(provider.fetch("1.2.3.4").await.unwrap().is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let provider = IpInfoProvider::new(DEFAULT_BASE_URL, Some("secret-token".into()), 15).unwrap();
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<REDACTED>"));
    }
}
