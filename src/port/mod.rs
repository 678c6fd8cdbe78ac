//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports define the extension points in the hexagonal architecture.
//! Adapters implement them to integrate storage, market data and
//! notification services.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!     generator ────▶│      Application        │
//!                    │  Domain + Port          │
//!                    └─────────────────────────┘
//!                          │      │      │
//!                          ▼      ▼      ▼
//!                      Store  Market  Notifier
//!                             Data
//! ```

pub mod inbound;
pub mod outbound;

pub use inbound::intake::{PredictionIntake, PredictionRequest};
pub use outbound::market_data::MarketData;
pub use outbound::notifier::{Event, LogNotifier, Notifier, NotifierRegistry, Stage};
pub use outbound::store::{
    BucketFilter, InsightFilter, PredictionFilter, RecordStore, StoredBucket,
};
