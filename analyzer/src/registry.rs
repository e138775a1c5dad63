//! Contract type registry: the kind of every known general contract.
//!
//! Seeded once from persisted address and token rows, then kept current by
//! the analyzer as contracts are created and reclassified. Same-cycle
//! classification decisions read the registry, never the store.

use scan_store::{AddressEntry, TokenRecord};
use scan_types::{Address, ContractKind};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("refusing to demote {address} from {current} to {attempted}")]
    KindRegression {
        address: Address,
        current: ContractKind,
        attempted: ContractKind,
    },

    #[error("the zero address cannot be registered")]
    ZeroAddress,
}

/// One undoable registry write.
#[derive(Clone, Copy, Debug)]
enum Change {
    Kind {
        address: Address,
        previous: Option<ContractKind>,
    },
    Queued(Address),
    Dequeued(Address),
}

/// Process-wide map of general contract kinds.
///
/// Writes made by a cycle attempt are journaled until [`Self::checkpoint`],
/// so an abandoned attempt can be undone with [`Self::rollback`] and its
/// retry sees the registry exactly as the first attempt did.
#[derive(Debug, Default)]
pub struct ContractTypeRegistry {
    kinds: HashMap<Address, ContractKind>,
    /// Generic contracts whose logs looked like token events, awaiting an
    /// interface probe.
    pending_probes: BTreeSet<Address>,
    journal: Vec<Change>,
    seeded: bool,
}

impl ContractTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load persisted contract addresses and tokens. Only the first call has
    /// an effect; returns the number of registered contracts.
    pub fn seed(&mut self, addresses: &[AddressEntry], tokens: &[TokenRecord]) -> usize {
        if self.seeded {
            debug!("contract registry already seeded");
            return self.kinds.len();
        }
        for entry in addresses {
            if let Some(kind) = entry.kind.contract_kind() {
                self.seed_one(entry.address, kind);
            }
        }
        for token in tokens {
            self.seed_one(token.address, ContractKind::from_standard(token.standard));
        }
        self.seeded = true;
        info!(contracts = self.kinds.len(), "contract registry seeded");
        self.kinds.len()
    }

    fn seed_one(&mut self, address: Address, kind: ContractKind) {
        if address.is_zero() {
            return;
        }
        // Token rows may duplicate a generic address row; keep the stronger kind.
        let stronger = match self.kinds.get(&address) {
            Some(current) => kind.confidence() >= current.confidence(),
            None => true,
        };
        if stronger {
            self.kinds.insert(address, kind);
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn lookup(&self, address: &Address) -> Option<ContractKind> {
        self.kinds.get(address).copied()
    }

    /// Register or escalate a contract kind.
    ///
    /// Writing a kind of equal or higher confidence overwrites; a lower
    /// confidence is rejected. Returns whether the stored kind changed.
    pub fn register(&mut self, address: Address, kind: ContractKind) -> Result<bool, RegistryError> {
        if address.is_zero() {
            return Err(RegistryError::ZeroAddress);
        }
        if let Some(current) = self.kinds.get(&address).copied() {
            if kind.confidence() < current.confidence() {
                return Err(RegistryError::KindRegression {
                    address,
                    current,
                    attempted: kind,
                });
            }
            if current == kind {
                return Ok(false);
            }
        }
        let previous = self.kinds.insert(address, kind);
        self.journal.push(Change::Kind { address, previous });
        Ok(true)
    }

    /// Flag a generic contract for an interface probe. Returns `false` if the
    /// address is not a generic EVM contract or is already queued.
    pub fn mark_for_probe(&mut self, address: Address) -> bool {
        if self.lookup(&address) != Some(ContractKind::EvmGeneric) {
            return false;
        }
        let queued = self.pending_probes.insert(address);
        if queued {
            self.journal.push(Change::Queued(address));
        }
        queued
    }

    pub fn is_probe_pending(&self, address: &Address) -> bool {
        self.pending_probes.contains(address)
    }

    pub fn clear_probe(&mut self, address: &Address) {
        if self.pending_probes.remove(address) {
            self.journal.push(Change::Dequeued(*address));
        }
    }

    /// Drain the probe queue in address order.
    pub fn take_pending_probes(&mut self) -> Vec<Address> {
        let pending: Vec<Address> = std::mem::take(&mut self.pending_probes).into_iter().collect();
        self.journal.extend(pending.iter().copied().map(Change::Dequeued));
        pending
    }

    pub fn pending_probe_count(&self) -> usize {
        self.pending_probes.len()
    }

    /// Keep every write since the last checkpoint. Call once the cycle that
    /// made them has committed. Returns how many writes were kept.
    pub fn checkpoint(&mut self) -> usize {
        let kept = self.journal.len();
        self.journal.clear();
        kept
    }

    /// Undo every write since the last checkpoint, newest first. Returns how
    /// many writes were undone.
    pub fn rollback(&mut self) -> usize {
        let undone = self.journal.len();
        while let Some(change) = self.journal.pop() {
            match change {
                Change::Kind {
                    address,
                    previous: Some(kind),
                } => {
                    self.kinds.insert(address, kind);
                }
                Change::Kind {
                    address,
                    previous: None,
                } => {
                    self.kinds.remove(&address);
                }
                Change::Queued(address) => {
                    self.pending_probes.remove(&address);
                }
                Change::Dequeued(address) => {
                    self.pending_probes.insert(address);
                }
            }
        }
        if undone > 0 {
            debug!(undone, "contract registry rolled back");
        }
        undone
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
