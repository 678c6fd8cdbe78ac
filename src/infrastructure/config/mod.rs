//! Infrastructure configuration modules.

pub mod engine;
pub mod logging;
pub mod settings;
pub mod store;
pub mod telegram;
