//! The single write path for contract kinds.
//!
//! Every kind change goes through [`Reclassifier::apply_kind`], which updates
//! the registry and the cycle's statistics cache, and stages the persisted
//! row's new kind for the cycle's commit. Nothing else writes a contract kind.

use scan_chain::ChainClient;
use scan_types::{Address, AddressKind, ContractKind};
use tracing::{debug, info};

use crate::registry::{ContractTypeRegistry, RegistryError};
use crate::stats::AddressStatsCache;
use crate::AnalyzeError;

pub struct Reclassifier<'a> {
    client: &'a dyn ChainClient,
}

impl<'a> Reclassifier<'a> {
    pub fn new(client: &'a dyn ChainClient) -> Self {
        Self { client }
    }

    /// Record `kind` for `address` and return the kind now in effect.
    ///
    /// Nothing reaches the store here: the persisted row changes only when
    /// the cycle commits, and the registry write is undone if it does not.
    ///
    /// If the registry already holds a stronger kind (a retried creation
    /// after the contract was recognised as a token) that kind is kept.
    pub fn apply_kind(
        &self,
        registry: &mut ContractTypeRegistry,
        stats: &mut AddressStatsCache,
        address: Address,
        kind: ContractKind,
    ) -> Result<ContractKind, AnalyzeError> {
        let effective = match registry.register(address, kind) {
            Ok(_) => kind,
            Err(RegistryError::KindRegression { current, .. }) => {
                debug!(%address, %current, attempted = %kind, "keeping stronger contract kind");
                current
            }
            Err(e) => return Err(e.into()),
        };
        let address_kind = AddressKind::from(effective);
        stats.escalate_kind(&address, address_kind);
        Ok(effective)
    }

    /// Ask the chain node which token standard `address` implements and
    /// escalate it if it answers. Returns the new kind, if any.
    pub fn probe(
        &self,
        registry: &mut ContractTypeRegistry,
        stats: &mut AddressStatsCache,
        address: Address,
        height: u64,
    ) -> Result<Option<ContractKind>, AnalyzeError> {
        let standard = self.client.probe_contract_interface(&address, height)?;
        registry.clear_probe(&address);
        let Some(standard) = standard else {
            debug!(%address, height, "probe found no token interface");
            return Ok(None);
        };
        let kind = self.apply_kind(registry, stats, address, ContractKind::from_standard(standard))?;
        info!(%address, height, %kind, "contract reclassified as token");
        Ok(Some(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_nullables::NullChainClient;
    use scan_types::{TokenStandard, TxCategory};

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    #[test]
    fn probe_updates_registry_cache_and_staged_kind_in_one_pass() {
        let client = NullChainClient::default();
        client.set_probe(addr(1), TokenStandard::Erc20);

        let mut registry = ContractTypeRegistry::new();
        registry.register(addr(1), ContractKind::EvmGeneric).unwrap();
        let mut stats = AddressStatsCache::new();
        stats.touch(addr(1), AddressKind::EvmContract, TxCategory::Other);

        let reclassifier = Reclassifier::new(&client);
        let kind = reclassifier.probe(&mut registry, &mut stats, addr(1), 10).unwrap();

        assert_eq!(kind, Some(ContractKind::Erc20Evm));
        assert_eq!(registry.lookup(&addr(1)), Some(ContractKind::Erc20Evm));
        assert_eq!(stats.kind_of(&addr(1)), Some(AddressKind::Erc20Contract));
        assert_eq!(stats.take_kind_updates(), vec![(addr(1), AddressKind::Erc20Contract)]);
    }

    #[test]
    fn failed_probe_leaves_address_queued() {
        let client = NullChainClient::default();
        client.fail_call(1);
        let mut registry = ContractTypeRegistry::new();
        registry.register(addr(1), ContractKind::EvmGeneric).unwrap();
        registry.mark_for_probe(addr(1));
        let mut stats = AddressStatsCache::new();

        let reclassifier = Reclassifier::new(&client);
        assert!(reclassifier.probe(&mut registry, &mut stats, addr(1), 10).is_err());
        assert!(registry.is_probe_pending(&addr(1)));
        assert!(stats.take_kind_updates().is_empty());
    }

    #[test]
    fn probe_without_answer_changes_nothing() {
        let client = NullChainClient::default();
        let mut registry = ContractTypeRegistry::new();
        registry.register(addr(1), ContractKind::EvmGeneric).unwrap();
        registry.mark_for_probe(addr(1));
        let mut stats = AddressStatsCache::new();

        let reclassifier = Reclassifier::new(&client);
        assert_eq!(reclassifier.probe(&mut registry, &mut stats, addr(1), 10).unwrap(), None);
        assert_eq!(registry.lookup(&addr(1)), Some(ContractKind::EvmGeneric));
        assert_eq!(registry.pending_probe_count(), 0);
    }

    #[test]
    fn weaker_kind_keeps_registered_token() {
        let client = NullChainClient::default();
        let mut registry = ContractTypeRegistry::new();
        registry.register(addr(1), ContractKind::Erc721Evm).unwrap();
        let mut stats = AddressStatsCache::new();

        let reclassifier = Reclassifier::new(&client);
        let kind = reclassifier
            .apply_kind(&mut registry, &mut stats, addr(1), ContractKind::EvmGeneric)
            .unwrap();
        assert_eq!(kind, ContractKind::Erc721Evm);
    }
}
