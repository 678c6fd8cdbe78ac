//! File-backed persistence adapter, used as the fallback store.

pub mod store;

pub use store::JsonFileStore;
