// # Notification Channels
//
// Concrete `Notifier` implementations for geowatch:
//
// - `telegram`: Bot API `sendMessage`
// - `email`: SMTP relay with STARTTLS and login
//
// A channel missing any of its settings reports `is_configured() == false`
// and is skipped by the notification chain.
//
// ## Security
//
// Bot tokens and SMTP passwords never appear in logs or Debug output.

use geowatch_core::ProviderRegistry;

pub mod email;
pub mod telegram;

pub use email::{EmailFactory, EmailNotifier};
pub use telegram::{TelegramFactory, TelegramNotifier};

/// Register every channel in this crate
pub fn register(registry: &ProviderRegistry) {
    registry.register_notifier(telegram::NAME, Box::new(TelegramFactory));
    registry.register_notifier(email::NAME, Box::new(EmailFactory));
}
