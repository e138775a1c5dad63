//! Abstract chain-node client for the block scanner.
//!
//! The RPC transport lives elsewhere; the collector depends only on the
//! [`ChainClient`] trait.

pub mod client;
pub mod error;

pub use client::{ChainClient, SlashEvidence, VirtualCall};
pub use error::ClientError;
