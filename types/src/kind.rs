//! Contract and address classification.
//!
//! A contract's kind only ever escalates: a generic EVM/WASM contract may later
//! be recognised as a token, never the other way round. [`ContractKind::confidence`]
//! encodes that ordering.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token interface standards detectable by probing a contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenStandard {
    Erc20,
    Erc721,
    Erc1155,
}

/// Kind of a user-deployed (general) contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractKind {
    EvmGeneric,
    WasmGeneric,
    Erc20Evm,
    Erc721Evm,
    Erc1155Evm,
}

impl ContractKind {
    /// Relative confidence of the classification. Registry writes with a
    /// lower confidence than the stored kind are rejected.
    pub fn confidence(&self) -> u8 {
        match self {
            Self::EvmGeneric | Self::WasmGeneric => 0,
            Self::Erc20Evm | Self::Erc721Evm | Self::Erc1155Evm => 1,
        }
    }

    pub fn is_token(&self) -> bool {
        self.confidence() > 0
    }

    /// The EVM token kind for a detected standard.
    pub fn from_standard(standard: TokenStandard) -> Self {
        match standard {
            TokenStandard::Erc20 => Self::Erc20Evm,
            TokenStandard::Erc721 => Self::Erc721Evm,
            TokenStandard::Erc1155 => Self::Erc1155Evm,
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EvmGeneric => "evm",
            Self::WasmGeneric => "wasm",
            Self::Erc20Evm => "erc20",
            Self::Erc721Evm => "erc721",
            Self::Erc1155Evm => "erc1155",
        };
        f.write_str(s)
    }
}

/// Classification of an address as stored in the address table and used as
/// the "to-type" of a classified transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    Account,
    InnerContract,
    EvmContract,
    WasmContract,
    Erc20Contract,
    Erc721Contract,
    Erc1155Contract,
}

impl AddressKind {
    /// Escalation rank; a stored kind must never be replaced by a lower rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Account => 0,
            Self::EvmContract | Self::WasmContract => 1,
            Self::InnerContract | Self::Erc20Contract | Self::Erc721Contract | Self::Erc1155Contract => 2,
        }
    }

    pub fn is_contract(&self) -> bool {
        !matches!(self, Self::Account)
    }
}

impl From<ContractKind> for AddressKind {
    fn from(kind: ContractKind) -> Self {
        match kind {
            ContractKind::EvmGeneric => Self::EvmContract,
            ContractKind::WasmGeneric => Self::WasmContract,
            ContractKind::Erc20Evm => Self::Erc20Contract,
            ContractKind::Erc721Evm => Self::Erc721Contract,
            ContractKind::Erc1155Evm => Self::Erc1155Contract,
        }
    }
}

impl AddressKind {
    /// The contract kind behind a stored general-contract address kind.
    pub fn contract_kind(&self) -> Option<ContractKind> {
        match self {
            Self::EvmContract => Some(ContractKind::EvmGeneric),
            Self::WasmContract => Some(ContractKind::WasmGeneric),
            Self::Erc20Contract => Some(ContractKind::Erc20Evm),
            Self::Erc721Contract => Some(ContractKind::Erc721Evm),
            Self::Erc1155Contract => Some(ContractKind::Erc1155Evm),
            Self::Account | Self::InnerContract => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_outrank_generic() {
        assert!(ContractKind::Erc20Evm.confidence() > ContractKind::EvmGeneric.confidence());
        assert_eq!(
            ContractKind::EvmGeneric.confidence(),
            ContractKind::WasmGeneric.confidence()
        );
        assert!(!ContractKind::WasmGeneric.is_token());
    }

    #[test]
    fn address_kind_round_trips_through_contract_kind() {
        for kind in [
            ContractKind::EvmGeneric,
            ContractKind::WasmGeneric,
            ContractKind::Erc20Evm,
            ContractKind::Erc721Evm,
            ContractKind::Erc1155Evm,
        ] {
            assert_eq!(AddressKind::from(kind).contract_kind(), Some(kind));
        }
        assert_eq!(AddressKind::Account.contract_kind(), None);
    }

    #[test]
    fn account_is_lowest_rank() {
        assert!(AddressKind::Account.rank() < AddressKind::EvmContract.rank());
        assert!(AddressKind::EvmContract.rank() < AddressKind::Erc721Contract.rank());
    }
}
