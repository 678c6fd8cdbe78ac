//! Application orchestration.
//!
//! Runtime lifecycle and health reporting for a wired [`App`](crate::infrastructure::bootstrap::App).

pub mod health;
pub mod runtime;
