// # geowatchd - IP Geolocation Monitor Daemon
//
// This is a thin integration layer. All monitoring logic lives in
// geowatch-core; providers and channels live in their own crates.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering providers, channels and history stores
// 4. Running the monitor until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Target
// - `MONITOR_IP`: IP address to watch (default 190.130.109.115)
// - `CHECK_INTERVAL_SEC`: Seconds between checks (default 3600)
//
// ### Providers
// - `GEOWATCH_PROVIDERS`: Comma-separated providers in vote order (default ip-api,ipinfo,db-ip)
// - `IPINFO_TOKEN`: ipinfo.io token (ipinfo is skipped without it)
// - `DBIP_TOKEN`: db-ip key (free endpoint without it)
// - `HTTP_TIMEOUT_SEC`: Per-request timeout (default 15)
// - `MAX_RETRIES`: Reserved (default 3)
//
// ### History
// - `DB_PATH`: SQLite file (default monitor_ip.db, `:memory:` for a non-durable store)
//
// ### Notifications
// - `GEOWATCH_NOTIFY_ORDER`: Channel priority (default telegram,email)
// - `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`
// - `SMTP_HOST`, `SMTP_PORT` (default 587), `SMTP_USER`, `SMTP_PASS`, `ALERT_EMAIL`
//
// ### Logging
// - `GEOWATCH_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export MONITOR_IP=190.130.109.115
// export CHECK_INTERVAL_SEC=1800
// export TELEGRAM_BOT_TOKEN=123456:ABC
// export TELEGRAM_CHAT_ID=4242
// export DB_PATH=/var/lib/geowatch/monitor_ip.db
//
// geowatchd
// ```

use anyhow::{Context, Result};
use geowatch_core::config::{EmailConfig, HistoryConfig, TelegramConfig};
use geowatch_core::{Monitor, MonitorConfig, MonitorEvent, NotifyConfig, ProviderRegistry, ProvidersConfig};
use std::env;
use std::process::ExitCode;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum GeowatchExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<GeowatchExitCode> for ExitCode {
    fn from(code: GeowatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// `DB_PATH` value that selects the in-memory store
const MEMORY_DB_PATH: &str = ":memory:";

/// Application configuration
struct Config {
    monitor: MonitorConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Unset and empty are the same thing
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let list = |key: &str, default: &str| -> Vec<String> {
            var(key)
                .unwrap_or_else(|| default.to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };

        let mut monitor = MonitorConfig::new();

        if let Some(ip) = var("MONITOR_IP") {
            monitor.ip = ip;
        }
        if let Some(interval) = parse(&var, "CHECK_INTERVAL_SEC")? {
            monitor.interval_secs = interval;
        }

        monitor.providers = ProvidersConfig {
            enabled: list("GEOWATCH_PROVIDERS", "ip-api,ipinfo,db-ip"),
            ipinfo_token: var("IPINFO_TOKEN"),
            dbip_token: var("DBIP_TOKEN"),
            ..ProvidersConfig::default()
        };
        if let Some(timeout) = parse(&var, "HTTP_TIMEOUT_SEC")? {
            monitor.providers.http_timeout_secs = timeout;
        }
        if let Some(retries) = parse(&var, "MAX_RETRIES")? {
            monitor.providers.max_retries = retries;
        }

        monitor.history = match var("DB_PATH") {
            Some(path) if path == MEMORY_DB_PATH => HistoryConfig::Memory,
            Some(path) => HistoryConfig::Sqlite { path },
            None => HistoryConfig::default(),
        };

        let mut email = EmailConfig {
            host: var("SMTP_HOST"),
            username: var("SMTP_USER"),
            password: var("SMTP_PASS"),
            to: var("ALERT_EMAIL"),
            ..EmailConfig::default()
        };
        if let Some(port) = parse(&var, "SMTP_PORT")? {
            email.port = port;
        }

        monitor.notify = NotifyConfig {
            order: list("GEOWATCH_NOTIFY_ORDER", "telegram,email"),
            telegram: TelegramConfig {
                bot_token: var("TELEGRAM_BOT_TOKEN"),
                chat_id: var("TELEGRAM_CHAT_ID"),
            },
            email,
            http_timeout_secs: monitor.providers.http_timeout_secs,
        };

        Ok(Self {
            monitor,
            log_level: var("GEOWATCH_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Structural checks are delegated to `MonitorConfig::validate`; this adds
    /// the ranges that only make sense for a long-running daemon.
    fn validate(&self) -> Result<()> {
        self.monitor.validate().context("Invalid monitor configuration")?;

        let timeout = self.monitor.providers.http_timeout_secs;
        if !(1..=300).contains(&timeout) {
            anyhow::bail!("HTTP_TIMEOUT_SEC must be between 1 and 300 seconds. Got: {}", timeout);
        }

        if self.monitor.providers.max_retries > 10 {
            anyhow::bail!(
                "MAX_RETRIES must be between 0 and 10. Got: {}",
                self.monitor.providers.max_retries
            );
        }

        if self.monitor.notify.email.port == 0 {
            anyhow::bail!("SMTP_PORT must be between 1 and 65535");
        }

        log_level(&self.log_level)?;

        Ok(())
    }
}

/// Parse an optional numeric variable; garbage is an error, not a default
fn parse<T, V>(var: &V, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} must be a number, got '{}': {}", key, raw, e))
        })
        .transpose()
}

fn log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "GEOWATCH_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return GeowatchExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return GeowatchExitCode::ConfigError.into();
    }

    // Initialize tracing
    let level = log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return GeowatchExitCode::ConfigError.into();
    }

    info!("Starting geowatchd");
    debug!("Configuration: {:?}", config.monitor);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return GeowatchExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            GeowatchExitCode::RuntimeError
        } else {
            GeowatchExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let registry = ProviderRegistry::with_builtin_history();
    geowatch_providers::register(&registry);
    geowatch_notify::register(&registry);

    let monitor_config = config.monitor;

    let providers = registry
        .create_providers(&monitor_config.providers)
        .context("Failed to create providers")?;
    let chain = registry
        .create_notification_chain(&monitor_config.notify)
        .context("Failed to create notification channels")?;
    let history = registry
        .create_history_store(&monitor_config.history)
        .await
        .context("Failed to open history store")?;

    info!(
        "Providers: {}; notification order: {}; history: {}",
        monitor_config.providers.enabled.join(", "),
        chain.channel_names().join(", "),
        monitor_config.history.type_name()
    );
    if !monitor_config.notify.telegram.is_complete() && !monitor_config.notify.email.is_complete() {
        warn!("No notification channel is configured; changes will only be recorded");
    }

    let (monitor, events) = Monitor::new(providers, history, chain, monitor_config)?;
    let events_task = tokio::spawn(log_events(events));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Signal handling error: {:#}", e),
        }
        let _ = shutdown_tx.send(());
    });

    let result = monitor.run_with_shutdown(Some(shutdown_rx)).await;

    // Dropping the monitor closes the event channel
    drop(monitor);
    let _ = events_task.await;

    result?;
    info!("Shutting down daemon");
    Ok(())
}

/// Surface monitor events the logs would not otherwise show
async fn log_events(mut events: mpsc::Receiver<MonitorEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Monitor event: {:?}", event);
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.monitor.ip, "190.130.109.115");
        assert_eq!(config.monitor.interval_secs, 3600);
        assert_eq!(config.monitor.providers.http_timeout_secs, 15);
        assert_eq!(config.monitor.providers.enabled, vec!["ip-api", "ipinfo", "db-ip"]);
        assert_eq!(config.monitor.notify.order, vec!["telegram", "email"]);
        assert_eq!(config.monitor.notify.email.port, 587);
        assert!(matches!(
            config.monitor.history,
            HistoryConfig::Sqlite { ref path } if path == "monitor_ip.db"
        ));
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("MONITOR_IP", "8.8.8.8"),
            ("CHECK_INTERVAL_SEC", "600"),
            ("DB_PATH", ":memory:"),
            ("GEOWATCH_PROVIDERS", "db-ip, ip-api"),
            ("GEOWATCH_NOTIFY_ORDER", "email"),
            ("SMTP_PORT", "2525"),
            ("IPINFO_TOKEN", ""),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ])
        .unwrap();

        assert_eq!(config.monitor.ip, "8.8.8.8");
        assert_eq!(config.monitor.interval_secs, 600);
        assert!(matches!(config.monitor.history, HistoryConfig::Memory));
        assert_eq!(config.monitor.providers.enabled, vec!["db-ip", "ip-api"]);
        assert_eq!(config.monitor.providers.ipinfo_token, None);
        assert_eq!(config.monitor.notify.order, vec!["email"]);
        assert_eq!(config.monitor.notify.email.port, 2525);
        assert!(!config.monitor.notify.telegram.is_complete());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config_from(&[("CHECK_INTERVAL_SEC", "hourly")]).is_err());

        let config = config_from(&[("CHECK_INTERVAL_SEC", "0")]).unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[("MONITOR_IP", "not-an-ip")]).unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[("HTTP_TIMEOUT_SEC", "900")]).unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[("GEOWATCH_LOG_LEVEL", "loud")]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_db_path_in_missing_directory_is_accepted() {
        // the SQLite store creates missing parent directories when it opens
        let config = config_from(&[("DB_PATH", "/var/lib/geowatch-not-yet-created/monitor_ip.db")]).unwrap();
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.monitor.history,
            HistoryConfig::Sqlite { ref path } if path == "/var/lib/geowatch-not-yet-created/monitor_ip.db"
        ));
    }
}
