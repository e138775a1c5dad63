//! Transaction classification for the block scanner.
//!
//! - [`ContractTypeRegistry`]: kinds of all known general contracts
//! - [`AddressStatsCache`]: per-cycle address counters and metadata, merged
//!   with persisted rows at commit time
//! - [`TransactionAnalyzer`]: raw transaction + receipt to classified record
//! - [`Reclassifier`]: the one path that changes a contract's kind
//! - [`SequenceAssigner`]: dense global ids from the persisted count

pub mod analyzer;
pub mod decoder;
pub mod error;
pub mod reclassify;
pub mod registry;
pub mod sequence;
pub mod stats;
pub mod token;

pub use analyzer::{AnalyzerOptions, CycleScratch, TransactionAnalyzer};
pub use decoder::{decode_inner_call, DecodeError, DefaultParamDecoder, InnerCall, ParamDecoder};
pub use error::AnalyzeError;
pub use reclassify::Reclassifier;
pub use registry::{ContractTypeRegistry, RegistryError};
pub use sequence::{SequenceAssigner, SequenceRange};
pub use stats::{merge_entry, merge_with_storage, AddressStatsCache, ContractMeta};
