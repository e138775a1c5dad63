//! Atomic per-block commit.

use crate::address::AddressEntry;
use crate::StoreError;
use scan_types::{Address, AddressKind, BlockStats, ClassifiedTransaction, NodeOperation};

/// Everything a block contributes to storage, committed as one unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitBatch {
    pub block_height: u64,
    /// Persisted transaction count the sequence range was allocated from.
    pub tx_count_before: u64,
    pub transactions: Vec<ClassifiedTransaction>,
    pub node_operations: Vec<NodeOperation>,
    /// Address rows already merged with their persisted values.
    pub addresses: Vec<AddressEntry>,
    /// Contract kinds decided by this block, applied after `addresses`.
    /// A kind never lowers the rank of an existing row.
    pub kind_updates: Vec<(Address, AddressKind)>,
    pub stats: BlockStats,
}

impl CommitBatch {
    /// Persisted transaction count once this batch is applied.
    pub fn tx_count_after(&self) -> u64 {
        self.tx_count_before + self.transactions.len() as u64
    }
}

/// Trait for the atomic block commit.
pub trait BatchStore {
    /// Apply the whole batch or nothing.
    ///
    /// Must fail with [`StoreError::Conflict`] when `tx_count_before` differs
    /// from the currently persisted transaction count.
    fn commit_block(&self, batch: &CommitBatch) -> Result<(), StoreError>;
}
