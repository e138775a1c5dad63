//! Abstract storage traits for the block scanner.
//!
//! Every storage backend (relational, in-memory for testing) implements
//! these traits. The rest of the codebase depends only on the traits.

pub mod address;
pub mod batch;
pub mod error;
pub mod node;
pub mod token;
pub mod transaction;

pub use address::{AddressEntry, AddressStore};
pub use batch::{BatchStore, CommitBatch};
pub use error::StoreError;
pub use node::{NodeReputation, NodeStore};
pub use token::{TokenRecord, TokenStore};
pub use transaction::TransactionStore;

/// Every store the collector needs, behind one object.
pub trait ScanStore:
    AddressStore + TokenStore + TransactionStore + NodeStore + BatchStore + Send + Sync
{
}

impl<T> ScanStore for T where
    T: AddressStore + TokenStore + TransactionStore + NodeStore + BatchStore + Send + Sync
{
}
