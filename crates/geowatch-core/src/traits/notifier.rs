// # Notifier Trait
//
// Defines the interface for delivering change alerts.
//
// ## Implementations
//
// - Telegram bot API, SMTP email: `geowatch-notify` crate
//
// Channels are tried in priority order by `NotificationChain`.

use async_trait::async_trait;

use crate::config::NotifyConfig;
use crate::model::{ChangeSet, GeoRecord};

/// A change alert ready to be rendered by any channel
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub ip: String,
    /// ISO-8601 UTC detection time
    pub detected_at: String,
    pub changes: ChangeSet,
    pub consensus: GeoRecord,
}

impl Alert {
    pub fn new(
        ip: impl Into<String>,
        detected_at: impl Into<String>,
        changes: ChangeSet,
        consensus: GeoRecord,
    ) -> Self {
        Self {
            ip: ip.into(),
            detected_at: detected_at.into(),
            changes,
            consensus,
        }
    }

    /// Short subject line (email subject)
    pub fn subject(&self) -> String {
        format!("IP alert {}", self.ip)
    }

    /// Full text body: header, one line per changed field, consensus JSON
    pub fn body(&self) -> String {
        let mut lines = vec![format!(
            "Alert: changes detected for IP {} ({})",
            self.ip, self.detected_at
        )];

        for (field, change) in self.changes.iter() {
            lines.push(format!(
                "- {}: {} -> {}",
                field,
                display_value(&change.old),
                display_value(&change.new)
            ));
        }

        lines.push(String::new());
        lines.push("Consensus record:".to_string());
        lines.push(
            serde_json::to_string_pretty(&self.consensus)
                .unwrap_or_else(|_| format!("{:?}", self.consensus)),
        );

        lines.join("\n")
    }
}

fn display_value(value: &Option<crate::model::FieldValue>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "None".to_string())
}

/// Trait for notification channels
///
/// # Trust Level: Untrusted
///
/// A channel makes one delivery attempt per call. Fallback across channels is
/// owned by `NotificationChain`; channels never retry on their own.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an alert
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The channel accepted the message
    /// - `Err(Error)`: Delivery failed; the chain moves on to the next channel
    async fn send(&self, alert: &Alert) -> Result<(), crate::Error>;

    /// Whether the channel has everything it needs to attempt a delivery
    fn is_configured(&self) -> bool;

    /// Channel name used in logs and configuration
    fn channel(&self) -> &'static str;
}

/// Helper trait for constructing notifiers from configuration
pub trait NotifierFactory: Send + Sync {
    fn create(&self, config: &NotifyConfig) -> Result<Box<dyn Notifier>, crate::Error>;
}
