//! Validator node snapshot trait.

use crate::StoreError;
use serde::{Deserialize, Serialize};

/// Persisted view of a validator node used by the business analyzers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReputation {
    pub node_id: String,
    pub node_name: String,
    pub staking_block: u64,
    pub total_stake: u128,
    pub slashed: bool,
}

pub trait NodeStore {
    /// Current persisted node list.
    fn node_reputation_snapshot(&self) -> Result<Vec<NodeReputation>, StoreError>;
}
