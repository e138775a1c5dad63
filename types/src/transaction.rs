//! Semantic transaction types and the classified transaction record.

use serde::{Deserialize, Serialize};

use crate::block::TxStatus;
use crate::bytes::{hex_bytes, opt_hex_bytes};
use crate::{Address, AddressKind, ContractKind, Timestamp, TokenStandard, TxHash};

/// Multiplier used for block-derived ordering keys (`height * SEQ_BLOCK_FACTOR + n`).
pub const SEQ_BLOCK_FACTOR: u64 = 100_000;

/// Ordering key `height * SEQ_BLOCK_FACTOR + offset`. `None` when `offset`
/// would spill into the next block's range or the key overflows.
pub fn block_seq(height: u64, offset: u64) -> Option<u64> {
    if offset >= SEQ_BLOCK_FACTOR {
        return None;
    }
    height.checked_mul(SEQ_BLOCK_FACTOR)?.checked_add(offset)
}

/// Semantic type of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    Transfer,
    StakeCreate,
    StakeIncrease,
    StakeModify,
    StakeExit,
    Report,
    DelegateCreate,
    DelegateExit,
    ClaimRewards,
    ProposalText,
    ProposalUpgrade,
    ProposalParameter,
    ProposalVote,
    ProposalCancel,
    VersionDeclare,
    ContractCreate,
    ContractInvoke,
}

/// Which per-address / per-block counter a transaction type feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TxCategory {
    Transfer,
    Staking,
    Delegate,
    Proposal,
    Other,
}

impl TxType {
    pub fn category(&self) -> TxCategory {
        match self {
            Self::Transfer => TxCategory::Transfer,
            Self::StakeCreate
            | Self::StakeIncrease
            | Self::StakeModify
            | Self::StakeExit
            | Self::Report => TxCategory::Staking,
            Self::DelegateCreate | Self::DelegateExit | Self::ClaimRewards => TxCategory::Delegate,
            Self::ProposalText
            | Self::ProposalUpgrade
            | Self::ProposalParameter
            | Self::ProposalVote
            | Self::ProposalCancel
            | Self::VersionDeclare => TxCategory::Proposal,
            Self::ContractCreate | Self::ContractInvoke => TxCategory::Other,
        }
    }

    /// Map a system-contract function code to its transaction type.
    pub fn from_function_code(code: u16) -> Option<Self> {
        let ty = match code {
            1000 => Self::StakeCreate,
            1001 => Self::StakeModify,
            1002 => Self::StakeIncrease,
            1003 => Self::StakeExit,
            1004 => Self::DelegateCreate,
            1005 => Self::DelegateExit,
            2000 => Self::ProposalText,
            2001 => Self::ProposalUpgrade,
            2002 => Self::ProposalParameter,
            2003 => Self::ProposalVote,
            2004 => Self::VersionDeclare,
            2005 => Self::ProposalCancel,
            3000 => Self::Report,
            5000 => Self::ClaimRewards,
            _ => return None,
        };
        Some(ty)
    }
}

/// A value movement caused by contract execution, derived from a receipt's
/// embedded transfers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedTransferRecord {
    pub seq: u64,
    pub parent_hash: TxHash,
    pub block_height: u64,
    pub block_time: Timestamp,
    pub from: Address,
    pub from_type: AddressKind,
    pub to: Address,
    pub to_type: AddressKind,
    pub value: u128,
}

/// A token movement decoded from a `Transfer` or `TransferSingle` log of a
/// registered token contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransferRecord {
    pub seq: u64,
    pub parent_hash: TxHash,
    pub block_height: u64,
    pub block_time: Timestamp,
    pub contract: Address,
    pub standard: TokenStandard,
    /// ERC1155 only.
    pub operator: Option<Address>,
    pub from: Address,
    pub to: Address,
    /// Amount moved; 1 for ERC721.
    pub value: u128,
    /// Hex token id for ERC721 and ERC1155.
    pub token_id: Option<String>,
}

/// A fully classified transaction.
///
/// `tx_type` and `to_type` are not optional: a transaction that cannot be
/// given both is a classification failure and never becomes a record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedTransaction {
    /// Dense global sequence id; zero until the sequence range is allocated.
    pub id: u64,
    pub hash: TxHash,
    /// Set on virtual child transactions.
    pub parent_hash: Option<TxHash>,
    pub block_height: u64,
    pub block_time: Timestamp,
    pub index: u32,
    /// Block-derived ordering key: `height * 100_000 + index`.
    pub seq: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub value: u128,
    #[serde(with = "hex_bytes")]
    pub input: Vec<u8>,
    pub tx_type: TxType,
    pub to_type: AddressKind,
    /// Decoded business parameters.
    pub info: serde_json::Value,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub gas_used: u64,
    pub fee: u128,
    pub status: TxStatus,
    pub fail_reason: Option<String>,
    pub contract_address: Option<Address>,
    pub contract_kind: Option<ContractKind>,
    /// Contract code observed while classifying.
    #[serde(with = "opt_hex_bytes")]
    pub bin: Option<Vec<u8>>,
    /// Four-byte selector of a general contract invocation, hex encoded.
    pub method: Option<String>,
    pub virtual_transactions: Vec<ClassifiedTransaction>,
    pub embedded_transfers: Vec<EmbeddedTransferRecord>,
    #[serde(default)]
    pub token_transfers: Vec<TokenTransferRecord>,
}

impl ClassifiedTransaction {
    pub fn category(&self) -> TxCategory {
        self.tx_type.category()
    }

    /// Code fetched for the target was empty: the contract has been destroyed.
    pub fn is_destroy_marker(&self) -> bool {
        matches!(&self.bin, Some(code) if code.is_empty())
    }
}
