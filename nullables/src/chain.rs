//! Nullable chain client: scripted node responses.

use scan_chain::{ChainClient, ClientError, SlashEvidence, VirtualCall};
use scan_types::{Address, RawBlock, TokenStandard, TxHash};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    blocks: BTreeMap<u64, RawBlock>,
    codes: HashMap<Address, Vec<u8>>,
    probes: HashMap<Address, TokenStandard>,
    virtual_calls: HashMap<TxHash, Vec<VirtualCall>>,
    slashes: HashMap<u64, Vec<SlashEvidence>>,
    calls: u64,
    fail_at_call: Option<u64>,
}

/// A chain node that answers from scripted state.
///
/// Unknown addresses have no code and no token interface; unknown
/// transactions trigger no virtual calls.
#[derive(Default)]
pub struct NullChainClient {
    state: Mutex<State>,
}

impl NullChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&self, block: RawBlock) {
        self.state.lock().unwrap().blocks.insert(block.height, block);
    }

    pub fn set_code(&self, address: Address, code: Vec<u8>) {
        self.state.lock().unwrap().codes.insert(address, code);
    }

    pub fn set_probe(&self, address: Address, standard: TokenStandard) {
        self.state.lock().unwrap().probes.insert(address, standard);
    }

    pub fn push_virtual_calls(&self, tx_hash: TxHash, calls: Vec<VirtualCall>) {
        self.state
            .lock()
            .unwrap()
            .virtual_calls
            .entry(tx_hash)
            .or_default()
            .extend(calls);
    }

    pub fn set_slash_evidence(&self, height: u64, evidence: Vec<SlashEvidence>) {
        self.state.lock().unwrap().slashes.insert(height, evidence);
    }

    /// Fail the `n`th call from now (1-based) with a transport error, once.
    pub fn fail_call(&self, n: u64) {
        let mut state = self.state.lock().unwrap();
        state.fail_at_call = Some(state.calls + n);
    }

    /// Calls answered or failed so far.
    pub fn call_count(&self) -> u64 {
        self.state.lock().unwrap().calls
    }

    fn with_state<T>(&self, f: impl FnOnce(&State) -> T) -> Result<T, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.fail_at_call == Some(state.calls) {
            state.fail_at_call = None;
            return Err(ClientError::Transport(format!(
                "injected failure on call {}",
                state.calls
            )));
        }
        Ok(f(&state))
    }
}

impl ChainClient for NullChainClient {
    fn fetch_block(&self, height: u64) -> Result<RawBlock, ClientError> {
        self.with_state(|s| s.blocks.get(&height).cloned())?
            .ok_or_else(|| ClientError::NotFound(format!("block {height}")))
    }

    fn fetch_code(&self, address: &Address, _height: u64) -> Result<Vec<u8>, ClientError> {
        self.with_state(|s| s.codes.get(address).cloned().unwrap_or_default())
    }

    fn probe_contract_interface(
        &self,
        address: &Address,
        _height: u64,
    ) -> Result<Option<TokenStandard>, ClientError> {
        self.with_state(|s| s.probes.get(address).copied())
    }

    fn fetch_virtual_transactions(
        &self,
        _height: u64,
        tx_hash: &TxHash,
    ) -> Result<Vec<VirtualCall>, ClientError> {
        self.with_state(|s| s.virtual_calls.get(tx_hash).cloned().unwrap_or_default())
    }

    fn fetch_historical_slash_evidence(&self, height: u64) -> Result<Vec<SlashEvidence>, ClientError> {
        self.with_state(|s| s.slashes.get(&height).cloned().unwrap_or_default())
    }
}
