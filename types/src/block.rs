//! Raw chain data as supplied by the chain-node client.
//!
//! These values are read-only inside the collector: a block event holds an
//! immutable `RawBlock`, and every processing attempt borrows it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::bytes::hex_bytes;
use crate::{Address, Timestamp, Topic, TxHash};

/// Execution outcome of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    Success,
    Failure,
}

impl TxStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// A transaction exactly as returned by the node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub hash: TxHash,
    /// Position inside the block.
    pub index: u32,
    pub from: Address,
    /// Absent for contract creation.
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: u128,
    #[serde(default, with = "hex_bytes")]
    pub input: Vec<u8>,
    pub gas_limit: u64,
    pub gas_price: u128,
    #[serde(default)]
    pub nonce: u64,
}

/// A receipt log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default, with = "hex_bytes")]
    pub data: Vec<u8>,
}

/// A value movement performed by contract execution, as reported in the
/// receipt. Fields are optional because the node may report partial records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedTransfer {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub value: Option<u128>,
}

/// Transaction receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub status: TxStatus,
    /// Outcome encoded in the system-contract logs. For inner-contract calls
    /// the top-level status may be success while the state transition was
    /// rejected; this field carries the real result.
    #[serde(default)]
    pub log_status: Option<TxStatus>,
    pub gas_used: u64,
    #[serde(default)]
    pub logs: Vec<Log>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub embedded_transfers: Vec<EmbeddedTransfer>,
    #[serde(default)]
    pub fail_reason: Option<String>,
}

/// An immutable snapshot of one block with its receipts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    pub height: u64,
    pub timestamp: Timestamp,
    pub miner: Address,
    #[serde(default)]
    pub transactions: Vec<RawTransaction>,
    #[serde(default)]
    pub receipts: HashMap<TxHash, Receipt>,
}

impl RawBlock {
    pub fn receipt(&self, hash: &TxHash) -> Option<&Receipt> {
        self.receipts.get(hash)
    }
}
