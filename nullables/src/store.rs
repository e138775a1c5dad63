//! Nullable store: thread-safe in-memory storage for testing.

use scan_store::{
    AddressEntry, AddressStore, BatchStore, CommitBatch, NodeReputation, NodeStore, StoreError,
    TokenRecord, TokenStore, TransactionStore,
};
use scan_types::{Address, ClassifiedTransaction, NodeOperation};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    addresses: HashMap<Address, AddressEntry>,
    tokens: Vec<TokenRecord>,
    nodes: Vec<NodeReputation>,
    tx_count: u64,
    last_height: Option<u64>,
    transactions: Vec<ClassifiedTransaction>,
    node_operations: Vec<NodeOperation>,
    commits: Vec<CommitBatch>,
    fail_commits: u32,
    fail_counts: u32,
    fail_snapshots: u32,
}

/// An in-memory implementation of every store trait.
///
/// A block commit applies under one lock, so it is all-or-nothing like the
/// relational backend. Failures can be injected per operation.
#[derive(Default)]
pub struct NullStore {
    state: Mutex<State>,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a persisted address row.
    pub fn insert_address(&self, entry: AddressEntry) {
        self.state.lock().unwrap().addresses.insert(entry.address, entry);
    }

    pub fn insert_token(&self, token: TokenRecord) {
        self.state.lock().unwrap().tokens.push(token);
    }

    pub fn set_nodes(&self, nodes: Vec<NodeReputation>) {
        self.state.lock().unwrap().nodes = nodes;
    }

    pub fn set_transaction_count(&self, count: u64) {
        self.state.lock().unwrap().tx_count = count;
    }

    /// Make the next `n` commits fail with a backend error.
    pub fn fail_next_commits(&self, n: u32) {
        self.state.lock().unwrap().fail_commits = n;
    }

    /// Make the next `n` transaction-count reads fail.
    pub fn fail_next_count_reads(&self, n: u32) {
        self.state.lock().unwrap().fail_counts = n;
    }

    /// Make the next `n` node snapshot reads fail.
    pub fn fail_next_snapshots(&self, n: u32) {
        self.state.lock().unwrap().fail_snapshots = n;
    }

    /// Every batch committed so far, oldest first.
    pub fn committed_batches(&self) -> Vec<CommitBatch> {
        self.state.lock().unwrap().commits.clone()
    }

    pub fn transactions(&self) -> Vec<ClassifiedTransaction> {
        self.state.lock().unwrap().transactions.clone()
    }

    pub fn node_operations(&self) -> Vec<NodeOperation> {
        self.state.lock().unwrap().node_operations.clone()
    }
}

fn take_failure(counter: &mut u32) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

impl AddressStore for NullStore {
    fn get_address(&self, address: &Address) -> Result<Option<AddressEntry>, StoreError> {
        Ok(self.state.lock().unwrap().addresses.get(address).cloned())
    }

    fn iter_contract_addresses(&self) -> Result<Vec<AddressEntry>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<AddressEntry> = state
            .addresses
            .values()
            .filter(|e| e.kind.contract_kind().is_some())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(out)
    }
}

impl TokenStore for NullStore {
    fn iter_tokens(&self) -> Result<Vec<TokenRecord>, StoreError> {
        Ok(self.state.lock().unwrap().tokens.clone())
    }
}

impl TransactionStore for NullStore {
    fn transaction_count(&self) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        if take_failure(&mut state.fail_counts) {
            return Err(StoreError::Backend("injected count failure".into()));
        }
        Ok(state.tx_count)
    }

    fn last_committed_height(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.state.lock().unwrap().last_height)
    }
}

impl NodeStore for NullStore {
    fn node_reputation_snapshot(&self) -> Result<Vec<NodeReputation>, StoreError> {
        let mut state = self.state.lock().unwrap();
        if take_failure(&mut state.fail_snapshots) {
            return Err(StoreError::Backend("injected snapshot failure".into()));
        }
        Ok(state.nodes.clone())
    }
}

impl BatchStore for NullStore {
    fn commit_block(&self, batch: &CommitBatch) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if take_failure(&mut state.fail_commits) {
            return Err(StoreError::Backend("injected commit failure".into()));
        }
        if batch.tx_count_before != state.tx_count {
            return Err(StoreError::Conflict(format!(
                "batch for block {} expects {} persisted transactions, found {}",
                batch.block_height, batch.tx_count_before, state.tx_count
            )));
        }
        for entry in &batch.addresses {
            state.addresses.insert(entry.address, entry.clone());
        }
        for (address, kind) in &batch.kind_updates {
            let row = state
                .addresses
                .entry(*address)
                .or_insert_with(|| AddressEntry::new(*address, *kind));
            if kind.rank() > row.kind.rank() {
                row.kind = *kind;
            }
        }
        state.transactions.extend(batch.transactions.iter().cloned());
        state.node_operations.extend(batch.node_operations.iter().cloned());
        state.tx_count = batch.tx_count_after();
        state.last_height = Some(batch.block_height);
        state.commits.push(batch.clone());
        Ok(())
    }
}
