//! Notification adapters.
//!
//! Implements the `port::Notifier` trait for remote notification backends.
//! The log notifier lives with the port since every build has it.

#[cfg(feature = "telegram")]
pub mod telegram;
