//! Records produced by the business analyzers.

use serde::{Deserialize, Serialize};

use crate::{Address, TxHash};

/// What happened to a validator node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeOperationKind {
    Create,
    Modify,
    Increase,
    Exit,
    Report,
    Slash,
}

/// One entry in a validator node's operation history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOperation {
    pub node_id: String,
    pub node_name: Option<String>,
    pub kind: NodeOperationKind,
    pub block_height: u64,
    /// Absent for operations that are not caused by a transaction (slashes).
    pub tx_hash: Option<TxHash>,
    pub description: String,
}

/// Delegation reward claimed by an address in this block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardClaim {
    pub address: Address,
    pub amount: u128,
}
