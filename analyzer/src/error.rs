use scan_chain::ClientError;
use scan_store::StoreError;
use scan_types::TxHash;
use thiserror::Error;

use crate::decoder::DecodeError;
use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// Neither a semantic type nor a to-type could be determined. Never
    /// defaulted.
    #[error("cannot classify transaction {hash} in block {height}: {reason}")]
    Classification {
        height: u64,
        hash: TxHash,
        reason: String,
    },

    #[error("chain client error: {0}")]
    Client(#[from] ClientError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Business parameters of an already typed call could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A write would decrease a counter or demote a kind.
    #[error("consistency violation: {0}")]
    Consistency(String),
}

impl From<RegistryError> for AnalyzeError {
    fn from(e: RegistryError) -> Self {
        Self::Consistency(e.to_string())
    }
}
