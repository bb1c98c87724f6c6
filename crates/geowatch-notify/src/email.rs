// # Email Channel
//
// Plain-text alert over an SMTP relay: STARTTLS on the configured port
// (587 by default), authenticated login, from the SMTP user to the alert
// address.

use async_trait::async_trait;
use geowatch_core::config::EmailConfig;
use geowatch_core::traits::{Alert, Notifier, NotifierFactory};
use geowatch_core::{Error, NotifyConfig, Result};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// Registry name
pub const NAME: &str = "email";

/// SMTP email notifier
pub struct EmailNotifier {
    config: EmailConfig,
    timeout: Duration,
}

impl std::fmt::Debug for EmailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // EmailConfig's Debug already hides the password
        f.debug_struct("EmailNotifier")
            .field("config", &self.config)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl EmailNotifier {
    pub fn new(config: &EmailConfig, timeout_secs: u64) -> Self {
        Self {
            config: config.clone(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Build the RFC 5322 message for an alert
    pub fn build_message(&self, alert: &Alert) -> Result<Message> {
        let from = self.required(&self.config.username, "SMTP user")?;
        let to = self.required(&self.config.to, "alert address")?;

        Message::builder()
            .from(from.parse().map_err(|e| Error::notify(NAME, format!("Invalid sender {}: {}", from, e)))?)
            .to(to.parse().map_err(|e| Error::notify(NAME, format!("Invalid recipient {}: {}", to, e)))?)
            .subject(alert.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(alert.body())
            .map_err(|e| Error::notify(NAME, format!("Failed to build message: {}", e)))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let host = self.required(&self.config.host, "SMTP host")?;
        let user = self.required(&self.config.username, "SMTP user")?;
        let pass = self.required(&self.config.password, "SMTP password")?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| Error::notify(NAME, format!("Invalid SMTP relay {}: {}", host, e)))?
            .port(self.config.port)
            .credentials(Credentials::new(user.to_string(), pass.to_string()))
            .timeout(Some(self.timeout))
            .build();

        Ok(transport)
    }

    fn required<'a>(&self, value: &'a Option<String>, what: &str) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::notify(NAME, format!("{} not set", what)))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let message = self.build_message(alert)?;
        let transport = self.transport()?;

        transport
            .send(message)
            .await
            .map_err(|e| Error::notify(NAME, format!("SMTP delivery failed: {}", e)))?;

        tracing::debug!("SMTP relay accepted alert for {}", alert.ip);
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.config.is_complete()
    }

    fn channel(&self) -> &'static str {
        NAME
    }
}

/// Factory for email notifiers
pub struct EmailFactory;

impl NotifierFactory for EmailFactory {
    fn create(&self, config: &NotifyConfig) -> Result<Box<dyn Notifier>> {
        Ok(Box::new(EmailNotifier::new(&config.email, config.http_timeout_secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geowatch_core::model::{ChangeSet, FieldValue, GeoRecord, TrackedField};

    fn email_config(host: &str, port: u16) -> EmailConfig {
        EmailConfig {
            host: Some(host.to_string()),
            port,
            username: Some("monitor@example.com".into()),
            password: Some("hunter2".into()),
            to: Some("ops@example.com".into()),
        }
    }

    fn alert() -> Alert {
        let mut changes = ChangeSet::new();
        changes.insert(
            TrackedField::City,
            Some(FieldValue::Text("Rosario".into())),
            Some(FieldValue::Text("Mendoza".into())),
        );
        Alert::new("190.130.109.115", "2026-01-01T00:00:00Z", changes, GeoRecord::default())
    }

    #[test]
    fn test_configured_requires_all_settings() {
        assert!(EmailNotifier::new(&email_config("smtp.example.com", 587), 5).is_configured());

        let mut partial = email_config("smtp.example.com", 587);
        partial.password = None;
        assert!(!EmailNotifier::new(&partial, 5).is_configured());
    }

    #[test]
    fn test_message_headers_and_body() {
        let notifier = EmailNotifier::new(&email_config("smtp.example.com", 587), 5);
        let message = notifier.build_message(&alert()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("From: monitor@example.com"));
        assert!(raw.contains("To: ops@example.com"));
        assert!(raw.contains("Subject: IP alert 190.130.109.115"));
        assert!(raw.contains("- city: Rosario -> Mendoza"));
    }

    #[test]
    fn test_invalid_sender_is_notify_error() {
        let mut config = email_config("smtp.example.com", 587);
        config.username = Some("not an address".into());
        let err = EmailNotifier::new(&config, 5).build_message(&alert()).unwrap_err();
        assert!(matches!(err, Error::Notify { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_relay_fails() {
        // Nothing listens on the discard port
        let notifier = EmailNotifier::new(&email_config("127.0.0.1", 9), 2);
        assert!(notifier.send(&alert()).await.is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let notifier = EmailNotifier::new(&email_config("smtp.example.com", 587), 5);
        assert!(!format!("{:?}", notifier).contains("hunter2"));
    }
}
