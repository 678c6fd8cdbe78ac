//! CoinGecko market data adapter.
//!
//! Serves historical price series from the `market_chart/range` endpoint.

pub mod client;
pub mod dto;
pub mod settings;

pub use client::CoinGeckoClient;
pub use settings::CoinGeckoConfig;
