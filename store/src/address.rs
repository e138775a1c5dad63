//! Address statistics storage trait.

use crate::StoreError;
use scan_types::bytes::opt_hex_bytes;
use scan_types::{is_inner_contract, Address, AddressKind, TxHash};
use serde::{Deserialize, Serialize};

/// Per-address statistics row.
///
/// Counters only ever increase. Contract metadata is set once: the first
/// non-blank value wins. `kind` changes only through reclassification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub address: Address,
    pub kind: AddressKind,
    pub tx_qty: u64,
    pub transfer_qty: u64,
    pub staking_qty: u64,
    pub delegate_qty: u64,
    pub proposal_qty: u64,
    /// Total delegation reward claimed by this address.
    pub have_reward: u128,
    pub contract_name: Option<String>,
    pub contract_creator: Option<Address>,
    pub contract_create_hash: Option<TxHash>,
    pub contract_destroy_hash: Option<TxHash>,
    #[serde(default, with = "opt_hex_bytes")]
    pub contract_bin: Option<Vec<u8>>,
}

impl AddressEntry {
    /// A zero-counter entry for a newly sighted address.
    pub fn new(address: Address, kind: AddressKind) -> Self {
        Self {
            address,
            kind,
            tx_qty: 0,
            transfer_qty: 0,
            staking_qty: 0,
            delegate_qty: 0,
            proposal_qty: 0,
            have_reward: 0,
            contract_name: None,
            contract_creator: None,
            contract_create_hash: None,
            contract_destroy_hash: None,
            contract_bin: None,
        }
    }

    /// Default kind for a first sighting: inner contracts are known up front,
    /// everything else starts as an account until proven otherwise.
    pub fn default_kind(address: &Address) -> AddressKind {
        if is_inner_contract(address) {
            AddressKind::InnerContract
        } else {
            AddressKind::Account
        }
    }
}

/// Trait for address statistics storage.
pub trait AddressStore {
    /// Load a persisted address row, if any.
    fn get_address(&self, address: &Address) -> Result<Option<AddressEntry>, StoreError>;

    /// All rows whose kind is a general (user-deployed) contract.
    fn iter_contract_addresses(&self) -> Result<Vec<AddressEntry>, StoreError>;

    /// Load several rows at once. Missing addresses are omitted.
    fn get_addresses(&self, addresses: &[Address]) -> Result<Vec<AddressEntry>, StoreError> {
        let mut out = Vec::with_capacity(addresses.len());
        for address in addresses {
            if let Some(entry) = self.get_address(address)? {
                out.push(entry);
            }
        }
        Ok(out)
    }
}
