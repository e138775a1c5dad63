//! Transaction classification.
//!
//! One raw transaction and its receipt become a [`ClassifiedTransaction`].
//! The first matching rule wins:
//!
//! 1. non-empty input to a system contract: inner-contract call
//! 2. no receiver: contract creation
//! 3. selector-sized input to a registered contract: general invocation
//! 4. empty input: plain transfer
//!
//! Anything else fails the cycle with [`AnalyzeError::Classification`].

use scan_chain::{ChainClient, VirtualCall};
use scan_store::AddressEntry;
use scan_types::{
    block_seq, is_inner_contract, Address, AddressKind, ClassifiedTransaction, ContractKind,
    EmbeddedTransferRecord, RawBlock, RawTransaction, Receipt, TokenTransferRecord, TxHash,
    TxStatus, TxType,
};
use serde_json::{json, Value};
use tracing::{debug, error, trace, warn};

use crate::decoder::{
    decode_delegate_reward, decode_inner_call, is_wasm_payload, method_selector, ParamDecoder,
    SELECTOR_LEN,
};
use crate::reclassify::Reclassifier;
use crate::registry::ContractTypeRegistry;
use crate::stats::{AddressStatsCache, ContractMeta};
use crate::token::{decode_token_transfer, token_event_addresses};
use crate::AnalyzeError;

#[derive(Clone, Copy, Debug, Default)]
pub struct AnalyzerOptions {
    /// Probe a contract as soon as its logs look like token events instead
    /// of leaving it for the end-of-block sweep.
    pub probe_immediately: bool,
}

/// Mutable state owned by one cycle attempt.
#[derive(Debug)]
pub struct CycleScratch {
    pub stats: AddressStatsCache,
    height: u64,
    embedded_transfers: u64,
    token_transfers: u64,
}

impl CycleScratch {
    pub fn new(height: u64) -> Self {
        Self {
            stats: AddressStatsCache::new(),
            height,
            embedded_transfers: 0,
            token_transfers: 0,
        }
    }

    fn next_embedded_seq(&mut self) -> Result<u64, AnalyzeError> {
        let seq = seq_in_block(self.height, self.embedded_transfers)?;
        self.embedded_transfers += 1;
        Ok(seq)
    }

    fn next_token_seq(&mut self) -> Result<u64, AnalyzeError> {
        let seq = seq_in_block(self.height, self.token_transfers)?;
        self.token_transfers += 1;
        Ok(seq)
    }
}

fn seq_in_block(height: u64, offset: u64) -> Result<u64, AnalyzeError> {
    block_seq(height, offset).ok_or_else(|| {
        AnalyzeError::Consistency(format!("sequence out of range at height {height}, offset {offset}"))
    })
}

/// Outcome of the classification rules, before the record is assembled.
struct Resolution {
    tx_type: TxType,
    to_type: AddressKind,
    status: TxStatus,
    info: Value,
    contract_address: Option<Address>,
    contract_kind: Option<ContractKind>,
    bin: Option<Vec<u8>>,
    method: Option<String>,
    virtual_calls: Vec<VirtualCall>,
    metas: Vec<(Address, ContractMeta)>,
}

impl Resolution {
    fn new(tx_type: TxType, to_type: AddressKind, status: TxStatus) -> Self {
        Self {
            tx_type,
            to_type,
            status,
            info: json!({}),
            contract_address: None,
            contract_kind: None,
            bin: None,
            method: None,
            virtual_calls: Vec::new(),
            metas: Vec::new(),
        }
    }
}

pub struct TransactionAnalyzer<'a> {
    client: &'a dyn ChainClient,
    params: &'a dyn ParamDecoder,
    options: AnalyzerOptions,
}

impl<'a> TransactionAnalyzer<'a> {
    pub fn new(client: &'a dyn ChainClient, params: &'a dyn ParamDecoder, options: AnalyzerOptions) -> Self {
        Self {
            client,
            params,
            options,
        }
    }

    fn reclassifier(&self) -> Reclassifier<'a> {
        Reclassifier::new(self.client)
    }

    /// Classify `tx` from `block`, updating the registry and the cycle's
    /// statistics.
    ///
    /// Registry writes are not undone here on error; the caller rolls the
    /// registry back when it abandons the attempt.
    pub fn analyze(
        &self,
        block: &RawBlock,
        tx: &RawTransaction,
        registry: &mut ContractTypeRegistry,
        scratch: &mut CycleScratch,
    ) -> Result<ClassifiedTransaction, AnalyzeError> {
        let height = block.height;
        let receipt = block
            .receipt(&tx.hash)
            .ok_or_else(|| classification(height, tx.hash, "missing receipt"))?;

        let resolution = match tx.to {
            Some(to) if is_inner_contract(&to) && !tx.input.is_empty() => {
                self.resolve_inner_call(height, tx, receipt)?
            }
            None => self.resolve_creation(height, tx, receipt, registry, scratch)?,
            Some(to) => match registry.lookup(&to) {
                Some(kind) if tx.input.len() >= SELECTOR_LEN => {
                    self.resolve_invocation(height, tx, receipt, to, kind)?
                }
                _ if tx.input.is_empty() => {
                    Resolution::new(TxType::Transfer, transfer_to_type(&to, registry), receipt.status)
                }
                _ => {
                    return Err(classification(
                        height,
                        tx.hash,
                        format!("{} input bytes to unregistered address {to}", tx.input.len()),
                    ))
                }
            },
        };

        let fee = u128::from(receipt.gas_used)
            .checked_mul(tx.gas_price)
            .ok_or_else(|| classification(height, tx.hash, "fee overflow"))?;
        let seq = seq_in_block(height, u64::from(tx.index))?;

        let mut record = ClassifiedTransaction {
            id: 0,
            hash: tx.hash,
            parent_hash: None,
            block_height: height,
            block_time: block.timestamp,
            index: tx.index,
            seq,
            from: tx.from,
            to: tx.to,
            value: tx.value,
            input: tx.input.clone(),
            tx_type: resolution.tx_type,
            to_type: resolution.to_type,
            info: resolution.info,
            gas_limit: tx.gas_limit,
            gas_price: tx.gas_price,
            gas_used: receipt.gas_used,
            fee,
            status: resolution.status,
            fail_reason: receipt.fail_reason.clone(),
            contract_address: resolution.contract_address,
            contract_kind: resolution.contract_kind,
            bin: resolution.bin,
            method: resolution.method,
            virtual_transactions: Vec::new(),
            embedded_transfers: Vec::new(),
            token_transfers: Vec::new(),
        };

        for call in &resolution.virtual_calls {
            let child = self.classify_virtual(&record, call)?;
            record.virtual_transactions.push(child);
        }

        if record.status.is_success() {
            record.embedded_transfers = embedded_transfers(&record, receipt, registry, scratch)?;
        }

        self.queue_token_probes(height, receipt, registry, scratch)?;

        // After the probes, so a contract recognised just now counts.
        if record.status.is_success() {
            record.token_transfers = token_transfers(&record, receipt, registry, scratch)?;
        }

        scratch.stats.record_transaction(&record, registry);
        for (address, meta) in resolution.metas {
            scratch.stats.record_contract_meta(address, meta);
        }

        trace!(hash = %record.hash, tx_type = ?record.tx_type, to_type = ?record.to_type, "classified");
        Ok(record)
    }

    fn resolve_inner_call(
        &self,
        height: u64,
        tx: &RawTransaction,
        receipt: &Receipt,
    ) -> Result<Resolution, AnalyzeError> {
        let call = decode_inner_call(&tx.input)
            .map_err(|e| classification(height, tx.hash, format!("inner call: {e}")))?;
        let status = receipt.log_status.unwrap_or_else(|| {
            warn!(hash = %tx.hash, "inner-contract receipt without log status");
            receipt.status
        });
        let mut resolution = Resolution::new(call.tx_type, AddressKind::InnerContract, status);
        resolution.info = self.params.decode(&call)?;

        if call.tx_type == TxType::DelegateExit && status.is_success() {
            if let Some(reward) = decode_delegate_reward(&receipt.logs)? {
                match resolution.info.as_object_mut() {
                    Some(info) => {
                        info.insert("reward".to_string(), json!(reward.to_string()));
                    }
                    None => warn!(hash = %tx.hash, "delegate exit params are not an object; reward dropped"),
                }
            }
        }
        Ok(resolution)
    }

    fn resolve_creation(
        &self,
        height: u64,
        tx: &RawTransaction,
        receipt: &Receipt,
        registry: &mut ContractTypeRegistry,
        scratch: &mut CycleScratch,
    ) -> Result<Resolution, AnalyzeError> {
        let payload_kind = if is_wasm_payload(&tx.input) {
            ContractKind::WasmGeneric
        } else {
            ContractKind::EvmGeneric
        };
        let mut resolution = Resolution::new(
            TxType::ContractCreate,
            AddressKind::from(payload_kind),
            receipt.status,
        );
        resolution.contract_kind = Some(payload_kind);

        let Some(created) = receipt.contract_address else {
            debug!(hash = %tx.hash, "creation without a created address");
            return Ok(resolution);
        };
        resolution.contract_address = Some(created);
        if created.is_zero() {
            error!(hash = %tx.hash, "created contract address is zero; not registering");
            return Ok(resolution);
        }
        if !receipt.status.is_success() {
            return Ok(resolution);
        }

        let code = self.client.fetch_code(&created, height)?;
        let mut kind = payload_kind;
        if kind == ContractKind::EvmGeneric {
            if let Some(standard) = self.client.probe_contract_interface(&created, height)? {
                kind = ContractKind::from_standard(standard);
            }
        }
        let kind = self
            .reclassifier()
            .apply_kind(registry, &mut scratch.stats, created, kind)?;
        debug!(address = %created, %kind, hash = %tx.hash, "contract registered");

        resolution.to_type = AddressKind::from(kind);
        resolution.contract_kind = Some(kind);
        resolution.metas = vec![
            (created, ContractMeta::Creator(tx.from)),
            (created, ContractMeta::CreateHash(tx.hash)),
            (created, ContractMeta::Bin(code.clone())),
        ];
        resolution.bin = Some(code);
        Ok(resolution)
    }

    fn resolve_invocation(
        &self,
        height: u64,
        tx: &RawTransaction,
        receipt: &Receipt,
        to: Address,
        kind: ContractKind,
    ) -> Result<Resolution, AnalyzeError> {
        let mut resolution =
            Resolution::new(TxType::ContractInvoke, AddressKind::from(kind), receipt.status);
        resolution.contract_kind = Some(kind);
        resolution.method = method_selector(&tx.input);

        let code = self.client.fetch_code(&to, height)?;
        if code.is_empty() {
            debug!(address = %to, hash = %tx.hash, "invoked contract has no code");
        }
        resolution.bin = Some(code);

        if receipt.status.is_success() {
            resolution.virtual_calls = self
                .client
                .fetch_virtual_transactions(height, &tx.hash)?
                .into_iter()
                .filter(|call| call.status.is_success())
                .collect();
        }
        Ok(resolution)
    }

    fn classify_virtual(
        &self,
        parent: &ClassifiedTransaction,
        call: &VirtualCall,
    ) -> Result<ClassifiedTransaction, AnalyzeError> {
        let height = parent.block_height;
        if !is_inner_contract(&call.to) {
            return Err(classification(
                height,
                parent.hash,
                format!("virtual call to non-system address {}", call.to),
            ));
        }
        let decoded = decode_inner_call(&call.input)
            .map_err(|e| classification(height, parent.hash, format!("virtual call: {e}")))?;
        let info = self.params.decode(&decoded)?;

        Ok(ClassifiedTransaction {
            id: 0,
            hash: parent.hash,
            parent_hash: Some(parent.hash),
            block_height: height,
            block_time: parent.block_time,
            index: parent.index,
            seq: parent.seq,
            from: call.from,
            to: Some(call.to),
            value: 0,
            input: call.input.clone(),
            tx_type: decoded.tx_type,
            to_type: AddressKind::InnerContract,
            info,
            gas_limit: 0,
            gas_price: 0,
            gas_used: 0,
            fee: 0,
            status: call.status,
            fail_reason: None,
            contract_address: None,
            contract_kind: None,
            bin: None,
            method: None,
            virtual_transactions: Vec::new(),
            embedded_transfers: Vec::new(),
            token_transfers: Vec::new(),
        })
    }

    fn queue_token_probes(
        &self,
        height: u64,
        receipt: &Receipt,
        registry: &mut ContractTypeRegistry,
        scratch: &mut CycleScratch,
    ) -> Result<(), AnalyzeError> {
        for address in token_event_addresses(receipt) {
            if registry.mark_for_probe(address) {
                debug!(%address, height, "token event from generic contract");
            }
            // Still queued after an earlier attempt failed: probe again.
            if self.options.probe_immediately && registry.is_probe_pending(&address) {
                self.reclassifier()
                    .probe(registry, &mut scratch.stats, address, height)?;
            }
        }
        Ok(())
    }

    /// Probe every contract queued during this block. Returns how many were
    /// reclassified.
    ///
    /// On error the drained queue is restored by the caller's registry
    /// rollback.
    pub fn sweep_pending_probes(
        &self,
        height: u64,
        registry: &mut ContractTypeRegistry,
        scratch: &mut CycleScratch,
    ) -> Result<usize, AnalyzeError> {
        let pending = registry.take_pending_probes();
        let reclassifier = self.reclassifier();
        let mut reclassified = 0;
        for address in pending {
            if reclassifier
                .probe(registry, &mut scratch.stats, address, height)?
                .is_some()
            {
                reclassified += 1;
            }
        }
        Ok(reclassified)
    }
}

fn classification(height: u64, hash: TxHash, reason: impl Into<String>) -> AnalyzeError {
    AnalyzeError::Classification {
        height,
        hash,
        reason: reason.into(),
    }
}

fn transfer_to_type(to: &Address, registry: &ContractTypeRegistry) -> AddressKind {
    registry
        .lookup(to)
        .map(AddressKind::from)
        .unwrap_or_else(|| AddressEntry::default_kind(to))
}

fn resolve_kind(address: &Address, registry: &ContractTypeRegistry, stats: &AddressStatsCache) -> AddressKind {
    stats
        .kind_of(address)
        .unwrap_or_else(|| transfer_to_type(address, registry))
}

fn embedded_transfers(
    parent: &ClassifiedTransaction,
    receipt: &Receipt,
    registry: &ContractTypeRegistry,
    scratch: &mut CycleScratch,
) -> Result<Vec<EmbeddedTransferRecord>, AnalyzeError> {
    let mut out = Vec::with_capacity(receipt.embedded_transfers.len());
    for transfer in &receipt.embedded_transfers {
        let (Some(from), Some(to), Some(value)) = (transfer.from, transfer.to, transfer.value) else {
            warn!(hash = %parent.hash, "skipping incomplete embedded transfer");
            continue;
        };
        out.push(EmbeddedTransferRecord {
            seq: scratch.next_embedded_seq()?,
            parent_hash: parent.hash,
            block_height: parent.block_height,
            block_time: parent.block_time,
            from,
            from_type: resolve_kind(&from, registry, &scratch.stats),
            to,
            to_type: resolve_kind(&to, registry, &scratch.stats),
            value,
        });
    }
    Ok(out)
}

/// Transfers logged by contracts registered as tokens.
fn token_transfers(
    parent: &ClassifiedTransaction,
    receipt: &Receipt,
    registry: &ContractTypeRegistry,
    scratch: &mut CycleScratch,
) -> Result<Vec<TokenTransferRecord>, AnalyzeError> {
    let mut out = Vec::new();
    for log in &receipt.logs {
        let Some(kind) = registry.lookup(&log.address).filter(ContractKind::is_token) else {
            continue;
        };
        let transfer = match decode_token_transfer(log, kind) {
            Ok(Some(transfer)) => transfer,
            Ok(None) => continue,
            Err(e) => {
                warn!(hash = %parent.hash, contract = %log.address, error = %e, "skipping token transfer log");
                continue;
            }
        };
        out.push(TokenTransferRecord {
            seq: scratch.next_token_seq()?,
            parent_hash: parent.hash,
            block_height: parent.block_height,
            block_time: parent.block_time,
            contract: log.address,
            standard: transfer.standard,
            operator: transfer.operator,
            from: transfer.from,
            to: transfer.to,
            value: transfer.value,
            token_id: transfer.token_id,
        });
    }
    Ok(out)
}
