//! Per-cycle address statistics and the merge with persisted rows.

use scan_store::{AddressEntry, AddressStore};
use scan_types::{Address, AddressKind, ClassifiedTransaction, TxCategory, TxHash};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::registry::ContractTypeRegistry;
use crate::AnalyzeError;

/// A set-once contract metadata field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractMeta {
    Name(String),
    Creator(Address),
    CreateHash(TxHash),
    DestroyHash(TxHash),
    Bin(Vec<u8>),
}

/// Counter deltas and metadata for every address touched in one cycle.
///
/// Owned by a single cycle attempt and dropped with it, so the next attempt
/// always starts empty.
#[derive(Debug, Default)]
pub struct AddressStatsCache {
    entries: HashMap<Address, AddressEntry>,
    /// Contract kinds decided this cycle, written to the persisted rows at
    /// commit.
    kind_updates: BTreeMap<Address, AddressKind>,
}

impl AddressStatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, address: Address, kind: AddressKind) -> &mut AddressEntry {
        self.entries
            .entry(address)
            .or_insert_with(|| AddressEntry::new(address, kind))
    }

    /// Count one transaction for `address`: the total plus the counter of
    /// `category`. Creates a zeroed entry of `kind` on first touch.
    pub fn touch(&mut self, address: Address, kind: AddressKind, category: TxCategory) {
        let entry = self.entry(address, kind);
        entry.tx_qty += 1;
        match category {
            TxCategory::Transfer => entry.transfer_qty += 1,
            TxCategory::Staking => entry.staking_qty += 1,
            TxCategory::Delegate => entry.delegate_qty += 1,
            TxCategory::Proposal => entry.proposal_qty += 1,
            TxCategory::Other => {}
        }
    }

    /// Touch every distinct address a transaction involves: sender,
    /// receiver and created contract.
    pub fn record_transaction(&mut self, tx: &ClassifiedTransaction, registry: &ContractTypeRegistry) {
        let mut seen: Vec<Address> = Vec::with_capacity(3);
        let candidates = [Some(tx.from), tx.to, tx.contract_address];
        for address in candidates.into_iter().flatten() {
            if address.is_zero() || seen.contains(&address) {
                continue;
            }
            seen.push(address);
            let kind = registry
                .lookup(&address)
                .map(AddressKind::from)
                .unwrap_or_else(|| AddressEntry::default_kind(&address));
            self.touch(address, kind, tx.category());
        }
    }

    /// Set a metadata field unless it already holds a non-blank value.
    pub fn record_contract_meta(&mut self, address: Address, meta: ContractMeta) {
        let entry = self.entry(address, AddressEntry::default_kind(&address));
        match meta {
            ContractMeta::Name(name) => {
                if is_blank_str(&entry.contract_name) && !name.trim().is_empty() {
                    entry.contract_name = Some(name);
                }
            }
            ContractMeta::Creator(creator) => {
                if entry.contract_creator.is_none() {
                    entry.contract_creator = Some(creator);
                }
            }
            ContractMeta::CreateHash(hash) => {
                if entry.contract_create_hash.is_none() {
                    entry.contract_create_hash = Some(hash);
                }
            }
            ContractMeta::DestroyHash(hash) => {
                if entry.contract_destroy_hash.is_none() {
                    entry.contract_destroy_hash = Some(hash);
                }
            }
            ContractMeta::Bin(code) => {
                if is_blank_bin(&entry.contract_bin) && !code.is_empty() {
                    entry.contract_bin = Some(code);
                }
            }
        }
    }

    /// Add a claimed delegation reward to `address`.
    pub fn record_reward(&mut self, address: Address, amount: u128) -> Result<(), AnalyzeError> {
        let entry = self.entry(address, AddressEntry::default_kind(&address));
        entry.have_reward = entry.have_reward.checked_add(amount).ok_or_else(|| {
            AnalyzeError::Consistency(format!("reward overflow for {address}"))
        })?;
        Ok(())
    }

    /// Stage `kind` for the persisted row of `address` and raise the cached
    /// kind if the address was already touched. Returns whether the cached
    /// entry changed.
    pub fn escalate_kind(&mut self, address: &Address, kind: AddressKind) -> bool {
        let staged = self.kind_updates.entry(*address).or_insert(kind);
        if kind.rank() > staged.rank() {
            *staged = kind;
        }
        match self.entries.get_mut(address) {
            Some(entry) if kind.rank() > entry.kind.rank() => {
                entry.kind = kind;
                true
            }
            _ => false,
        }
    }

    /// Take the staged kinds, ordered by address.
    pub fn take_kind_updates(&mut self) -> Vec<(Address, AddressKind)> {
        std::mem::take(&mut self.kind_updates).into_iter().collect()
    }

    pub fn kind_of(&self, address: &Address) -> Option<AddressKind> {
        self.entries.get(address).map(|e| e.kind)
    }

    pub fn get(&self, address: &Address) -> Option<&AddressEntry> {
        self.entries.get(address)
    }

    /// Take every entry, ordered by address, leaving the cache empty.
    pub fn drain(&mut self) -> Vec<AddressEntry> {
        let mut out: Vec<AddressEntry> = self.entries.drain().map(|(_, e)| e).collect();
        out.sort_by(|a, b| a.address.cmp(&b.address));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_blank_str(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

fn is_blank_bin(value: &Option<Vec<u8>>) -> bool {
    value.as_ref().map_or(true, |b| b.is_empty())
}

fn add_counter(address: &Address, field: &str, persisted: u64, delta: u64) -> Result<u64, AnalyzeError> {
    persisted.checked_add(delta).ok_or_else(|| {
        AnalyzeError::Consistency(format!("{field} overflow for {address}"))
    })
}

/// Combine a cycle delta with the persisted row for the same address.
///
/// Counters and reward are summed. Metadata keeps the persisted non-blank
/// value. The kind of an existing row is never taken from the delta.
pub fn merge_entry(
    delta: &AddressEntry,
    persisted: Option<&AddressEntry>,
) -> Result<AddressEntry, AnalyzeError> {
    let Some(row) = persisted else {
        return Ok(delta.clone());
    };
    if row.address != delta.address {
        return Err(AnalyzeError::Consistency(format!(
            "merging {} into row of {}",
            delta.address, row.address
        )));
    }
    let address = &row.address;
    let have_reward = row.have_reward.checked_add(delta.have_reward).ok_or_else(|| {
        AnalyzeError::Consistency(format!("reward overflow for {address}"))
    })?;

    Ok(AddressEntry {
        address: row.address,
        kind: row.kind,
        tx_qty: add_counter(address, "tx_qty", row.tx_qty, delta.tx_qty)?,
        transfer_qty: add_counter(address, "transfer_qty", row.transfer_qty, delta.transfer_qty)?,
        staking_qty: add_counter(address, "staking_qty", row.staking_qty, delta.staking_qty)?,
        delegate_qty: add_counter(address, "delegate_qty", row.delegate_qty, delta.delegate_qty)?,
        proposal_qty: add_counter(address, "proposal_qty", row.proposal_qty, delta.proposal_qty)?,
        have_reward,
        contract_name: if is_blank_str(&row.contract_name) {
            delta.contract_name.clone()
        } else {
            row.contract_name.clone()
        },
        contract_creator: row.contract_creator.or(delta.contract_creator),
        contract_create_hash: row.contract_create_hash.or(delta.contract_create_hash),
        contract_destroy_hash: row.contract_destroy_hash.or(delta.contract_destroy_hash),
        contract_bin: if is_blank_bin(&row.contract_bin) {
            delta.contract_bin.clone()
        } else {
            row.contract_bin.clone()
        },
    })
}

/// Merge drained entries with storage, raise kinds staged this cycle and
/// apply destroy markers from the block's transactions. The result is
/// ordered like `entries`.
pub fn merge_with_storage(
    entries: Vec<AddressEntry>,
    kind_updates: &[(Address, AddressKind)],
    transactions: &[ClassifiedTransaction],
    store: &dyn AddressStore,
) -> Result<Vec<AddressEntry>, AnalyzeError> {
    let mut merged = Vec::with_capacity(entries.len());
    for delta in &entries {
        let persisted = store.get_address(&delta.address)?;
        let mut entry = merge_entry(delta, persisted.as_ref())?;
        if let Some((_, kind)) = kind_updates.iter().find(|(a, _)| *a == entry.address) {
            if kind.rank() > entry.kind.rank() {
                entry.kind = *kind;
            }
        }
        merged.push(entry);
    }

    for tx in transactions.iter().filter(|tx| tx.is_destroy_marker()) {
        let Some(to) = tx.to else { continue };
        match merged.iter_mut().find(|e| e.address == to) {
            Some(entry) if entry.contract_destroy_hash.is_none() => {
                debug!(address = %to, hash = %tx.hash, "contract destroyed");
                entry.contract_destroy_hash = Some(tx.hash);
            }
            Some(_) => {}
            None => warn!(address = %to, hash = %tx.hash, "destroyed contract was not touched"),
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_nullables::NullStore;
    use scan_types::ContractKind;

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    #[test]
    fn touch_creates_and_counts() {
        let mut cache = AddressStatsCache::new();
        cache.touch(addr(1), AddressKind::Account, TxCategory::Transfer);
        cache.touch(addr(1), AddressKind::Account, TxCategory::Staking);
        cache.touch(addr(1), AddressKind::Account, TxCategory::Other);
        let e = cache.get(&addr(1)).unwrap();
        assert_eq!(e.tx_qty, 3);
        assert_eq!(e.transfer_qty, 1);
        assert_eq!(e.staking_qty, 1);
        assert_eq!(e.delegate_qty + e.proposal_qty, 0);
    }

    #[test]
    fn contract_meta_is_set_once() {
        let mut cache = AddressStatsCache::new();
        cache.record_contract_meta(addr(1), ContractMeta::Name("   ".into()));
        cache.record_contract_meta(addr(1), ContractMeta::Name("first".into()));
        cache.record_contract_meta(addr(1), ContractMeta::Name("second".into()));
        cache.record_contract_meta(addr(1), ContractMeta::Creator(addr(7)));
        cache.record_contract_meta(addr(1), ContractMeta::Creator(addr(8)));
        cache.record_contract_meta(addr(1), ContractMeta::Bin(vec![]));
        cache.record_contract_meta(addr(1), ContractMeta::Bin(vec![0x60]));
        let e = cache.get(&addr(1)).unwrap();
        assert_eq!(e.contract_name.as_deref(), Some("first"));
        assert_eq!(e.contract_creator, Some(addr(7)));
        assert_eq!(e.contract_bin, Some(vec![0x60]));
    }

    #[test]
    fn drain_is_sorted_and_empties() {
        let mut cache = AddressStatsCache::new();
        cache.touch(addr(3), AddressKind::Account, TxCategory::Other);
        cache.touch(addr(1), AddressKind::Account, TxCategory::Other);
        let drained = cache.drain();
        assert_eq!(drained[0].address, addr(1));
        assert_eq!(drained[1].address, addr(3));
        assert!(cache.is_empty());
    }

    #[test]
    fn escalate_only_raises() {
        let mut cache = AddressStatsCache::new();
        cache.touch(addr(1), AddressKind::EvmContract, TxCategory::Other);
        assert!(!cache.escalate_kind(&addr(1), AddressKind::Account));
        assert!(cache.escalate_kind(&addr(1), AddressKind::Erc20Contract));
        assert!(!cache.escalate_kind(&addr(2), AddressKind::Erc20Contract));
        assert_eq!(cache.kind_of(&addr(1)), Some(AddressKind::Erc20Contract));
        assert_eq!(cache.kind_of(&addr(2)), None);
        assert_eq!(
            cache.take_kind_updates(),
            vec![
                (addr(1), AddressKind::Erc20Contract),
                (addr(2), AddressKind::Erc20Contract),
            ]
        );
        assert!(cache.take_kind_updates().is_empty());
    }

    #[test]
    fn merge_raises_row_kind_to_staged_kind() {
        let store = NullStore::default();
        store.insert_address(AddressEntry::new(addr(1), AddressKind::EvmContract));
        let mut cache = AddressStatsCache::new();
        cache.touch(addr(1), AddressKind::EvmContract, TxCategory::Other);
        cache.escalate_kind(&addr(1), AddressKind::Erc721Contract);
        let updates = cache.take_kind_updates();
        let merged = merge_with_storage(cache.drain(), &updates, &[], &store).unwrap();
        assert_eq!(merged[0].kind, AddressKind::Erc721Contract);
        assert_eq!(merged[0].tx_qty, 1);
    }

    #[test]
    fn merge_sums_counters_and_keeps_persisted_kind_and_meta() {
        let mut row = AddressEntry::new(addr(1), AddressKind::Erc721Contract);
        row.tx_qty = 10;
        row.transfer_qty = 4;
        row.have_reward = 100;
        row.contract_name = Some("Punks".into());

        let mut delta = AddressEntry::new(addr(1), AddressKind::Account);
        delta.tx_qty = 2;
        delta.transfer_qty = 1;
        delta.have_reward = 5;
        delta.contract_name = Some("Other".into());
        delta.contract_creator = Some(addr(9));

        let merged = merge_entry(&delta, Some(&row)).unwrap();
        assert_eq!(merged.kind, AddressKind::Erc721Contract);
        assert_eq!(merged.tx_qty, 12);
        assert_eq!(merged.transfer_qty, 5);
        assert_eq!(merged.have_reward, 105);
        assert_eq!(merged.contract_name.as_deref(), Some("Punks"));
        assert_eq!(merged.contract_creator, Some(addr(9)));
    }

    #[test]
    fn merge_overflow_is_a_consistency_violation() {
        let mut row = AddressEntry::new(addr(1), AddressKind::Account);
        row.tx_qty = u64::MAX;
        let mut delta = AddressEntry::new(addr(1), AddressKind::Account);
        delta.tx_qty = 1;
        assert!(matches!(
            merge_entry(&delta, Some(&row)),
            Err(AnalyzeError::Consistency(_))
        ));
    }

    #[test]
    fn record_transaction_uses_registry_kind() {
        let mut registry = ContractTypeRegistry::new();
        registry.register(addr(2), ContractKind::Erc20Evm).unwrap();
        let tx = crate::tests::sample_tx(addr(1), Some(addr(2)));
        let mut cache = AddressStatsCache::new();
        cache.record_transaction(&tx, &registry);
        assert_eq!(cache.kind_of(&addr(1)), Some(AddressKind::Account));
        assert_eq!(cache.kind_of(&addr(2)), Some(AddressKind::Erc20Contract));
    }

    #[test]
    fn self_transfer_counts_once() {
        let registry = ContractTypeRegistry::new();
        let tx = crate::tests::sample_tx(addr(1), Some(addr(1)));
        let mut cache = AddressStatsCache::new();
        cache.record_transaction(&tx, &registry);
        assert_eq!(cache.get(&addr(1)).unwrap().tx_qty, 1);
    }

    #[test]
    fn destroy_marker_sets_hash_after_merge() {
        let store = NullStore::default();
        let mut tx = crate::tests::sample_tx(addr(1), Some(addr(2)));
        tx.bin = Some(Vec::new());
        let registry = ContractTypeRegistry::new();
        let mut cache = AddressStatsCache::new();
        cache.record_transaction(&tx, &registry);
        let merged = merge_with_storage(cache.drain(), &[], &[tx.clone()], &store).unwrap();
        let to = merged.iter().find(|e| e.address == addr(2)).unwrap();
        assert_eq!(to.contract_destroy_hash, Some(tx.hash));
    }
}
