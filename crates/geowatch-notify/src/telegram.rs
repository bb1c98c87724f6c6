// # Telegram Channel
//
// `POST {api}/bot{token}/sendMessage` with form fields `chat_id` and `text`.
// Delivery counts as successful only on HTTP 200.

use async_trait::async_trait;
use geowatch_core::config::TelegramConfig;
use geowatch_core::traits::{Alert, Notifier, NotifierFactory};
use geowatch_core::{Error, NotifyConfig, Result};
use std::time::Duration;

/// Registry name
pub const NAME: &str = "telegram";

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram bot notifier
pub struct TelegramNotifier {
    /// ⚠️ NEVER log this value; it is part of the request path
    bot_token: Option<String>,
    chat_id: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<REDACTED>"))
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            api_base: DEFAULT_API_BASE.to_string(),
            client,
        })
    }

    /// Point the notifier at another Bot API server
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let (Some(token), Some(chat_id)) = (&self.bot_token, &self.chat_id) else {
            return Err(Error::notify(NAME, "bot token or chat id not set"));
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        let response = self
            .client
            .post(url)
            .form(&[("chat_id", chat_id.as_str()), ("text", alert.body().as_str())])
            .send()
            .await
            // The token is in the URL
            .map_err(|e| Error::notify(NAME, format!("HTTP request failed: {}", e.without_url())))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::notify(NAME, format!("HTTP status {}", status)));
        }

        tracing::debug!("Telegram accepted alert for {}", alert.ip);
        Ok(())
    }

    fn is_configured(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.bot_token) && set(&self.chat_id)
    }

    fn channel(&self) -> &'static str {
        NAME
    }
}

/// Factory for Telegram notifiers
pub struct TelegramFactory;

impl NotifierFactory for TelegramFactory {
    fn create(&self, config: &NotifyConfig) -> Result<Box<dyn Notifier>> {
        Ok(Box::new(TelegramNotifier::new(
            &config.telegram,
            config.http_timeout_secs,
        )?))
    }
}
