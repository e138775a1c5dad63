//! Fundamental types for the block scanner.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! addresses, hashes, the raw block/receipt model supplied by the chain node,
//! contract and address kinds, and the classified transaction record.

pub mod address;
pub mod block;
pub mod bytes;
pub mod error;
pub mod hash;
pub mod inner;
pub mod kind;
pub mod operation;
pub mod stats;
pub mod time;
pub mod transaction;

pub use address::Address;
pub use block::{EmbeddedTransfer, Log, RawBlock, RawTransaction, Receipt, TxStatus};
pub use error::TypeError;
pub use hash::{Topic, TxHash};
pub use inner::{is_inner_contract, InnerContract};
pub use kind::{AddressKind, ContractKind, TokenStandard};
pub use operation::{NodeOperation, NodeOperationKind, RewardClaim};
pub use stats::BlockStats;
pub use time::Timestamp;
pub use transaction::{
    block_seq, ClassifiedTransaction, EmbeddedTransferRecord, TokenTransferRecord, TxCategory,
    TxType, SEQ_BLOCK_FACTOR,
};
