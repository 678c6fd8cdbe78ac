//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe infrastructure dependencies: durable storage,
//! historical market data and notifications.

pub mod market_data;
pub mod notifier;
pub mod store;
