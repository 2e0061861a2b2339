//! Durable local state
//!
//! Everything the client persists lives in the single `kv_store` table.

pub mod keys;
pub mod store;

pub use store::LocalStore;
