use proptest::prelude::*;

use scan_analyzer::{merge_entry, ContractTypeRegistry};
use scan_store::AddressEntry;
use scan_types::{Address, AddressKind, ContractKind};

const ADDRESS: Address = Address::new([0x42; 20]);

fn address_kind() -> impl Strategy<Value = AddressKind> {
    prop_oneof![
        Just(AddressKind::Account),
        Just(AddressKind::InnerContract),
        Just(AddressKind::EvmContract),
        Just(AddressKind::WasmContract),
        Just(AddressKind::Erc20Contract),
        Just(AddressKind::Erc721Contract),
        Just(AddressKind::Erc1155Contract),
    ]
}

fn contract_kind() -> impl Strategy<Value = ContractKind> {
    prop_oneof![
        Just(ContractKind::EvmGeneric),
        Just(ContractKind::WasmGeneric),
        Just(ContractKind::Erc20Evm),
        Just(ContractKind::Erc721Evm),
        Just(ContractKind::Erc1155Evm),
    ]
}

fn delta() -> impl Strategy<Value = AddressEntry> {
    (address_kind(), prop::array::uniform5(0u64..1_000), 0u128..1_000_000).prop_map(
        |(kind, counters, reward)| {
            let mut e = AddressEntry::new(ADDRESS, kind);
            e.tx_qty = counters[0];
            e.transfer_qty = counters[1];
            e.staking_qty = counters[2];
            e.delegate_qty = counters[3];
            e.proposal_qty = counters[4];
            e.have_reward = reward;
            e
        },
    )
}

fn counters(e: &AddressEntry) -> [u128; 6] {
    [
        e.tx_qty.into(),
        e.transfer_qty.into(),
        e.staking_qty.into(),
        e.delegate_qty.into(),
        e.proposal_qty.into(),
        e.have_reward,
    ]
}

proptest! {
    /// Every counter and the reward total are non-decreasing over any
    /// sequence of merges, and the stored kind never changes.
    #[test]
    fn merges_are_monotonic(initial in address_kind(), deltas in prop::collection::vec(delta(), 1..20)) {
        let mut stored = AddressEntry::new(ADDRESS, initial);
        for d in &deltas {
            let merged = merge_entry(d, Some(&stored)).unwrap();
            for (before, after) in counters(&stored).iter().zip(counters(&merged).iter()) {
                prop_assert!(after >= before);
            }
            prop_assert_eq!(merged.kind, initial);
            stored = merged;
        }
    }

    /// The registry's confidence for an address never drops, whatever order
    /// kinds are registered in.
    #[test]
    fn registry_kind_never_regresses(kinds in prop::collection::vec(contract_kind(), 1..30)) {
        let mut registry = ContractTypeRegistry::new();
        let mut best = 0u8;
        for kind in kinds {
            let accepted = registry.register(ADDRESS, kind).is_ok();
            prop_assert_eq!(accepted, kind.confidence() >= best);
            best = best.max(kind.confidence());
            let current = registry.lookup(&ADDRESS).unwrap();
            prop_assert_eq!(current.confidence(), best);
        }
    }
}
