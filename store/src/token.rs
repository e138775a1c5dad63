//! Token contract storage trait.

use crate::StoreError;
use scan_types::{Address, TokenStandard};
use serde::{Deserialize, Serialize};

/// A contract recognised as implementing a token standard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub address: Address,
    pub standard: TokenStandard,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

/// Trait for token storage.
pub trait TokenStore {
    /// All known token contracts.
    fn iter_tokens(&self) -> Result<Vec<TokenRecord>, StoreError>;
}
