//! Chain-node client trait.

use crate::ClientError;
use scan_types::bytes::hex_bytes;
use scan_types::{Address, RawBlock, TokenStandard, TxHash, TxStatus};
use serde::{Deserialize, Serialize};

/// An inner-contract call made on behalf of a general contract invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualCall {
    pub from: Address,
    pub to: Address,
    #[serde(with = "hex_bytes")]
    pub input: Vec<u8>,
    pub status: TxStatus,
}

/// A slash applied to a validator at some height.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashEvidence {
    pub node_id: String,
    pub amount: u128,
    pub reason: String,
}

/// Everything the collector asks of a chain node.
///
/// Calls block the caller; the collector issues them from its single
/// consumer so classification order stays deterministic.
pub trait ChainClient: Send + Sync {
    /// A block with all of its receipts.
    fn fetch_block(&self, height: u64) -> Result<RawBlock, ClientError>;

    /// Contract code at `address` as of `height`. Empty for destroyed contracts.
    fn fetch_code(&self, address: &Address, height: u64) -> Result<Vec<u8>, ClientError>;

    /// Query live contract state for a supported token standard.
    fn probe_contract_interface(
        &self,
        address: &Address,
        height: u64,
    ) -> Result<Option<TokenStandard>, ClientError>;

    /// Inner-contract calls triggered by the transaction `tx_hash`.
    fn fetch_virtual_transactions(
        &self,
        height: u64,
        tx_hash: &TxHash,
    ) -> Result<Vec<VirtualCall>, ClientError>;

    /// Slashes recorded at `height`.
    fn fetch_historical_slash_evidence(&self, height: u64) -> Result<Vec<SlashEvidence>, ClientError>;
}
