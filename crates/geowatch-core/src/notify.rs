//! Notification chain with fallback
//!
//! Channels are tried in priority order. A channel that is not configured is
//! skipped; a configured channel whose send fails falls through to the next
//! one. The first successful send ends the chain.

use crate::traits::{Alert, Notifier};
use tracing::{debug, info, warn};

/// Outcome of one delivery attempt across the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReport {
    /// A channel accepted the alert
    Delivered {
        channel: String,
        /// Channels that failed before this one
        failures: Vec<(String, String)>,
    },

    /// Every configured channel failed
    Undelivered { failures: Vec<(String, String)> },

    /// No channel is configured
    NoChannels,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryReport::Delivered { .. })
    }
}

/// Ordered list of notification channels
#[derive(Default)]
pub struct NotificationChain {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotificationChain {
    /// Create a chain; earlier channels take priority
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Create a chain with no channels
    pub fn empty() -> Self {
        Self::default()
    }

    /// Names of the channels in priority order
    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.channel()).collect()
    }

    /// Deliver an alert through the first channel that succeeds
    ///
    /// Never fails: delivery problems are logged and reported.
    pub async fn deliver(&self, alert: &Alert) -> DeliveryReport {
        let mut failures = Vec::new();
        let mut attempted = false;

        for channel in &self.channels {
            if !channel.is_configured() {
                debug!("Notification channel {} not configured, skipping", channel.channel());
                continue;
            }

            attempted = true;
            match channel.send(alert).await {
                Ok(()) => {
                    info!("Alert for {} delivered via {}", alert.ip, channel.channel());
                    return DeliveryReport::Delivered {
                        channel: channel.channel().to_string(),
                        failures,
                    };
                }
                Err(e) => {
                    warn!("Notification via {} failed: {}", channel.channel(), e);
                    failures.push((channel.channel().to_string(), e.to_string()));
                }
            }
        }

        if attempted {
            warn!("Alert for {} could not be delivered by any channel", alert.ip);
            DeliveryReport::Undelivered { failures }
        } else {
            warn!("No notification channel configured, alert for {} not sent", alert.ip);
            DeliveryReport::NoChannels
        }
    }
}
