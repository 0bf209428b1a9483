//! Storage layer.
//!
//! # Modules
//!
//! - [`memory`] - In-memory series store with tombstones and snapshots
//!
//! The API only sees storage through the `Queryable` and `TsdbAdmin`
//! traits, so any store implementing both can be plugged in at startup.

pub mod memory;

pub use memory::{MemoryStorage, SNAPSHOT_FILE};
