//! Nullable infrastructure for deterministic testing.
//!
//! Storage and the chain node sit behind traits. This crate provides
//! in-memory implementations that:
//! - Return deterministic values
//! - Can be scripted and made to fail on demand
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests and replays.

pub mod chain;
pub mod store;

pub use chain::NullChainClient;
pub use store::NullStore;
