//! Telegram notification delivery.
//!
//! Sends validation results, new insights and degraded-run alerts to one
//! chat through a background worker.

mod format;

pub mod notifier;

pub use notifier::{TelegramNotifier, TelegramSettings};
