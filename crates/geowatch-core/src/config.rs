//! Configuration types for the geowatch system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// Main monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// IP address to monitor
    #[serde(default = "default_ip")]
    pub ip: String,

    /// Poll interval in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Provider configuration
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// History store configuration
    #[serde(default)]
    pub history: HistoryConfig,

    /// Notification configuration
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Optional loop timing settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl MonitorConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            ip: default_ip(),
            interval_secs: default_interval_secs(),
            providers: ProvidersConfig::default(),
            history: HistoryConfig::default(),
            notify: NotifyConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ip.trim().is_empty() {
            return Err(crate::Error::config("Monitored IP cannot be empty"));
        }
        if self.ip.parse::<IpAddr>().is_err() {
            return Err(crate::Error::config(format!(
                "Monitored IP is not a valid address: {}",
                self.ip
            )));
        }
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Check interval must be > 0"));
        }

        self.providers.validate()?;
        self.history.validate()?;
        self.notify.validate()?;

        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Provider configuration shared by all provider factories
#[derive(Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Provider names to query; also the order used to break consensus ties
    #[serde(default = "default_enabled_providers")]
    pub enabled: Vec<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Reserved for provider-level retry; not applied by the monitor loop
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// ipinfo.io bearer token (provider skipped without it)
    #[serde(default)]
    pub ipinfo_token: Option<String>,

    /// db-ip API key (free endpoint used without it)
    #[serde(default)]
    pub dbip_token: Option<String>,

    /// Base URL overrides keyed by provider name
    #[serde(default)]
    pub base_urls: HashMap<String, String>,
}

impl ProvidersConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.enabled.is_empty() {
            return Err(crate::Error::config("At least one provider must be enabled"));
        }
        if self.http_timeout_secs == 0 {
            return Err(crate::Error::config("HTTP timeout must be > 0"));
        }
        Ok(())
    }

    /// Base URL override for a provider
    pub fn base_url(&self, provider: &str) -> Option<&str> {
        self.base_urls.get(provider).map(String::as_str)
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_providers(),
            http_timeout_secs: default_http_timeout_secs(),
            max_retries: default_max_retries(),
            ipinfo_token: None,
            dbip_token: None,
            base_urls: HashMap::new(),
        }
    }
}

// Custom Debug implementation that hides provider tokens
impl std::fmt::Debug for ProvidersConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvidersConfig")
            .field("enabled", &self.enabled)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("ipinfo_token", &redacted(&self.ipinfo_token))
            .field("dbip_token", &redacted(&self.dbip_token))
            .field("base_urls", &self.base_urls)
            .finish()
    }
}

/// History store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryConfig {
    /// SQLite database file
    Sqlite {
        /// Path to the database file
        path: String,
    },

    /// In-memory store (not persistent)
    Memory,
}

impl HistoryConfig {
    /// Validate the history configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            HistoryConfig::Sqlite { path } if path.trim().is_empty() => {
                Err(crate::Error::config("SQLite history path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the history store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            HistoryConfig::Sqlite { .. } => "sqlite",
            HistoryConfig::Memory => "memory",
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig::Sqlite {
            path: default_db_path(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Channel names in priority order; later channels are fallbacks
    #[serde(default = "default_notify_order")]
    pub order: Vec<String>,

    /// Telegram bot settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// SMTP email settings
    #[serde(default)]
    pub email: EmailConfig,

    /// Per-request timeout for chat deliveries, in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl NotifyConfig {
    /// Validate the notification configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        let mut seen = std::collections::HashSet::new();
        for channel in &self.order {
            if !seen.insert(channel.as_str()) {
                return Err(crate::Error::config(format!(
                    "Notification channel listed twice: {}",
                    channel
                )));
            }
        }
        Ok(())
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            order: default_notify_order(),
            telegram: TelegramConfig::default(),
            email: EmailConfig::default(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// Telegram bot configuration
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl TelegramConfig {
    /// Both token and destination chat are set
    pub fn is_complete(&self) -> bool {
        is_set(&self.bot_token) && is_set(&self.chat_id)
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &redacted(&self.bot_token))
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// SMTP relay configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Destination address
    pub to: Option<String>,
}

impl EmailConfig {
    /// Relay, credentials and destination are all set
    pub fn is_complete(&self) -> bool {
        is_set(&self.host) && is_set(&self.username) && is_set(&self.password) && is_set(&self.to)
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_smtp_port(),
            username: None,
            password: None,
            to: None,
        }
    }
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("to", &self.to)
            .finish()
    }
}

/// Monitor loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound of the wait after a cycle where no provider answered
    #[serde(default = "default_no_data_retry_secs")]
    pub no_data_retry_secs: u64,

    /// Wait after a cycle that failed unexpectedly
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// Absolute cap on the random jitter added to the interval
    #[serde(default = "default_max_jitter_secs")]
    pub max_jitter_secs: u64,

    /// Jitter cap as a fraction of the interval
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,

    /// Capacity of the monitor event channel
    ///
    /// When full, events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            no_data_retry_secs: default_no_data_retry_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            max_jitter_secs: default_max_jitter_secs(),
            jitter_ratio: default_jitter_ratio(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn redacted(value: &Option<String>) -> &'static str {
    if value.is_some() { "<REDACTED>" } else { "<unset>" }
}

fn default_ip() -> String {
    "190.130.109.115".to_string()
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_db_path() -> String {
    "monitor_ip.db".to_string()
}

fn default_enabled_providers() -> Vec<String> {
    vec!["ip-api".to_string(), "ipinfo".to_string(), "db-ip".to_string()]
}

fn default_http_timeout_secs() -> u64 {
    15
}

fn default_max_retries() -> usize {
    3
}

fn default_notify_order() -> Vec<String> {
    vec!["telegram".to_string(), "email".to_string()]
}

fn default_smtp_port() -> u16 {
    587
}

fn default_no_data_retry_secs() -> u64 {
    60
}

fn default_error_backoff_secs() -> u64 {
    30
}

fn default_max_jitter_secs() -> u64 {
    60
}

fn default_jitter_ratio() -> f64 {
    0.05
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.ip, "190.130.109.115");
        assert_eq!(config.interval_secs, 3600);
        assert_eq!(config.providers.http_timeout_secs, 15);
        assert_eq!(config.providers.max_retries, 3);
        assert_eq!(config.notify.order, vec!["telegram", "email"]);
        assert_eq!(config.notify.email.port, 587);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: MonitorConfig =
            serde_json::from_str(r#"{"ip": "8.8.8.8", "history": {"type": "memory"}}"#).unwrap();
        assert_eq!(config.ip, "8.8.8.8");
        assert_eq!(config.interval_secs, 3600);
        assert_eq!(config.history.type_name(), "memory");
        assert_eq!(config.providers.enabled.len(), 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = MonitorConfig::default();
        config.ip = "not-an-ip".to_string();
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.providers.enabled.clear();
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.notify.order = vec!["email".to_string(), "email".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_completeness() {
        let mut telegram = TelegramConfig::default();
        assert!(!telegram.is_complete());
        telegram.bot_token = Some("123:abc".into());
        assert!(!telegram.is_complete());
        telegram.chat_id = Some("42".into());
        assert!(telegram.is_complete());

        let email = EmailConfig {
            host: Some("smtp.example.org".into()),
            username: Some("bot@example.org".into()),
            password: Some("  ".into()),
            to: Some("ops@example.org".into()),
            ..Default::default()
        };
        assert!(!email.is_complete());
    }

    #[test]
    fn test_secrets_not_exposed_in_debug() {
        let mut config = MonitorConfig::default();
        config.providers.ipinfo_token = Some("ipinfo_secret_1".into());
        config.notify.telegram.bot_token = Some("tg_secret_2".into());
        config.notify.email.password = Some("smtp_secret_3".into());

        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("ipinfo_secret_1"));
        assert!(!debug_str.contains("tg_secret_2"));
        assert!(!debug_str.contains("smtp_secret_3"));
        assert!(debug_str.contains("<REDACTED>"));
    }
}
