//! Inbound (driving) ports consumed by external drivers.
//!
//! - [`intake`]: prediction submission and insight lookup for the generator

pub mod intake;
