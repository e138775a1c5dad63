//! Block ingestion pipeline.
//!
//! One call to [`BlockIngestionPipeline::run_cycle`] is one attempt at one
//! block: classify every transaction in index order, fold block counters,
//! allocate sequence ids, run the business analyzers, commit everything as
//! one batch and publish it. Any error abandons the attempt with nothing
//! committed or published. The cycle's scratch state lives on the stack of
//! the attempt, so the next attempt always starts from an empty statistics
//! cache.

use scan_analyzer::{
    merge_with_storage, AnalyzerOptions, ContractTypeRegistry, CycleScratch, DefaultParamDecoder,
    ParamDecoder, SequenceAssigner, SequenceRange, TransactionAnalyzer,
};
use scan_chain::ChainClient;
use scan_store::{CommitBatch, ScanStore};
use scan_types::{RawBlock, RawTransaction};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::business::{default_analyzers, BusinessAnalyzer, BusinessInput, BusinessOutput};
use crate::config::CollectorConfig;
use crate::metrics::CollectorMetrics;
use crate::node_cache::NodeCache;
use crate::publisher::{FinalizedBatch, Publisher};
use crate::tracing_spans::{classify_span, commit_span, cycle_span};
use crate::CycleError;

pub use scan_types::BlockStats;

/// A block delivered by the upstream feed.
///
/// The block sits behind an `Arc` and is never mutated, so every attempt
/// sees exactly what the feed delivered.
#[derive(Clone, Debug)]
pub struct BlockEvent {
    pub block: Arc<RawBlock>,
    /// Correlates log lines of one delivery.
    pub trace_id: u64,
}

impl BlockEvent {
    pub fn new(block: RawBlock, trace_id: u64) -> Self {
        Self {
            block: Arc::new(block),
            trace_id,
        }
    }

    pub fn height(&self) -> u64 {
        self.block.height
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    Classifying,
    Aggregating,
    Sequencing,
    BusinessAnalysis,
    Persisting,
    Publishing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Classified, committed and published by this attempt.
    Committed,
    /// Committed by an earlier attempt whose publication failed; published now.
    Republished,
    /// Already durably committed; delivered again by the feed.
    AlreadyCommitted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleOutcome {
    pub height: u64,
    pub disposition: Disposition,
    pub range: Option<SequenceRange>,
    pub stats: BlockStats,
    pub tokens_reclassified: usize,
}

impl CycleOutcome {
    fn without_work(height: u64, disposition: Disposition) -> Self {
        Self {
            height,
            disposition,
            range: None,
            stats: BlockStats::default(),
            tokens_reclassified: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineOptions {
    pub analyzer: AnalyzerOptions,
    pub sweep_each_block: bool,
}

impl From<&CollectorConfig> for PipelineOptions {
    fn from(config: &CollectorConfig) -> Self {
        Self {
            analyzer: AnalyzerOptions {
                probe_immediately: config.probe.immediate,
            },
            sweep_each_block: config.probe.sweep_each_block,
        }
    }
}

/// Sequential block consumer. Owns the process-wide contract registry,
/// sequence assigner and node cache; only one cycle runs at a time.
pub struct BlockIngestionPipeline<S, C> {
    store: Arc<S>,
    client: Arc<C>,
    publisher: Arc<dyn Publisher>,
    params: Box<dyn ParamDecoder>,
    business: Vec<Box<dyn BusinessAnalyzer>>,
    registry: ContractTypeRegistry,
    sequence: SequenceAssigner,
    nodes: NodeCache,
    options: PipelineOptions,
    /// Committed but not yet published.
    retained: Option<FinalizedBatch>,
    stage: CycleStage,
    metrics: Option<Arc<CollectorMetrics>>,
}

impl<S, C> BlockIngestionPipeline<S, C>
where
    S: ScanStore,
    C: ChainClient,
{
    pub fn new(
        store: Arc<S>,
        client: Arc<C>,
        publisher: Arc<dyn Publisher>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            client,
            publisher,
            params: Box::new(DefaultParamDecoder),
            business: default_analyzers(),
            registry: ContractTypeRegistry::new(),
            sequence: SequenceAssigner::new(),
            nodes: NodeCache::new(),
            options,
            retained: None,
            stage: CycleStage::Idle,
            metrics: None,
        }
    }

    pub fn with_param_decoder(mut self, params: Box<dyn ParamDecoder>) -> Self {
        self.params = params;
        self
    }

    /// Replace the business analyzers; they run in the given order.
    pub fn with_business_analyzers(mut self, analyzers: Vec<Box<dyn BusinessAnalyzer>>) -> Self {
        self.business = analyzers;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<CollectorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Seed the contract registry and load the node cache. Runs
    /// automatically before the first cycle.
    pub fn initialize(&mut self) -> Result<(), CycleError> {
        if !self.registry.is_seeded() {
            let addresses = self.store.iter_contract_addresses()?;
            let tokens = self.store.iter_tokens()?;
            self.registry.seed(&addresses, &tokens);
        }
        if !self.nodes.is_loaded() {
            self.nodes.reload(&*self.store)?;
        }
        Ok(())
    }

    pub fn stage(&self) -> CycleStage {
        self.stage
    }

    pub fn registry(&self) -> &ContractTypeRegistry {
        &self.registry
    }

    pub fn nodes(&self) -> &NodeCache {
        &self.nodes
    }

    pub fn has_retained_batch(&self) -> bool {
        self.retained.is_some()
    }

    /// Run attempt number `attempt` (starting at 1) for `event`.
    ///
    /// A failed attempt leaves the contract registry as it was before the
    /// attempt began.
    pub fn run_cycle(&mut self, event: &BlockEvent, attempt: u32) -> Result<CycleOutcome, CycleError> {
        let height = event.height();
        let span = cycle_span(height, attempt);
        let _enter = span.enter();
        if let Some(metrics) = &self.metrics {
            metrics.cycle_attempts.inc();
        }
        let started = Instant::now();

        let result = self.attempt(event, attempt);

        match &result {
            Ok(outcome) => {
                if let Some(metrics) = &self.metrics {
                    self.record_success(metrics, outcome, started);
                }
            }
            Err(e) => {
                self.registry.rollback();
                warn!(
                    height,
                    attempt,
                    trace_id = event.trace_id,
                    stage = ?self.stage,
                    error = %e,
                    "cycle attempt abandoned"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure(e);
                }
            }
        }
        self.stage = CycleStage::Idle;
        result
    }

    fn record_success(&self, metrics: &CollectorMetrics, outcome: &CycleOutcome, started: Instant) {
        metrics
            .cycle_time_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);
        if outcome.disposition != Disposition::Committed {
            return;
        }
        metrics.blocks_committed.inc();
        metrics.transactions_classified.inc_by(outcome.stats.tx_qty);
        metrics.tokens_reclassified.inc_by(outcome.tokens_reclassified as u64);
        metrics.last_committed_height.set(outcome.height as i64);
        if let Some(range) = outcome.range {
            metrics.persisted_transactions.set(range.after() as i64);
        }
    }

    fn attempt(&mut self, event: &BlockEvent, attempt: u32) -> Result<CycleOutcome, CycleError> {
        let height = event.height();
        if attempt >= 2 {
            self.nodes.reload(&*self.store)?;
        }
        self.initialize()?;

        if let Some(outcome) = self.publish_retained(height)? {
            return Ok(outcome);
        }
        if let Some(last) = self.store.last_committed_height()? {
            if height <= last {
                info!(height, last, "block already committed; skipping");
                return Ok(CycleOutcome::without_work(height, Disposition::AlreadyCommitted));
            }
            if height != last + 1 {
                warn!(height, last, "block height is not contiguous with the last commit");
            }
        }

        let block: &RawBlock = &event.block;
        let mut scratch = CycleScratch::new(height);
        let analyzer = TransactionAnalyzer::new(&*self.client, self.params.as_ref(), self.options.analyzer);

        self.stage = CycleStage::Classifying;
        let mut ordered: Vec<&RawTransaction> = block.transactions.iter().collect();
        ordered.sort_by_key(|tx| tx.index);
        let mut transactions = Vec::with_capacity(ordered.len());
        for raw in ordered {
            let _classify = classify_span(&raw.hash).entered();
            transactions.push(analyzer.analyze(block, raw, &mut self.registry, &mut scratch)?);
        }
        let tokens_reclassified = if self.options.sweep_each_block {
            analyzer.sweep_pending_probes(height, &mut self.registry, &mut scratch)?
        } else {
            0
        };

        self.stage = CycleStage::Aggregating;
        let stats = BlockStats::fold(&transactions);
        debug!(
            height,
            txs = stats.tx_qty,
            transfers = stats.transfer_qty,
            staking = stats.staking_qty,
            delegate = stats.delegate_qty,
            proposals = stats.proposal_qty,
            token_transfers = stats.erc20_tx_qty + stats.erc721_tx_qty + stats.erc1155_tx_qty,
            "block aggregated"
        );

        self.stage = CycleStage::Sequencing;
        let range = self.sequence.allocate(&*self.store, &mut transactions)?;

        self.stage = CycleStage::BusinessAnalysis;
        let mut output = BusinessOutput::default();
        {
            let input = BusinessInput {
                block,
                transactions: &transactions,
                addresses: &scratch.stats,
                nodes: &self.nodes,
            };
            for business in &self.business {
                business.analyze(&input, &*self.client, &mut output)?;
                debug!(analyzer = business.name(), "business analysis done");
            }
        }
        for reward in &output.rewards {
            scratch.stats.record_reward(reward.address, reward.amount)?;
        }

        self.stage = CycleStage::Persisting;
        let kind_updates = scratch.stats.take_kind_updates();
        let addresses =
            merge_with_storage(scratch.stats.drain(), &kind_updates, &transactions, &*self.store)?;
        let batch = CommitBatch {
            block_height: height,
            tx_count_before: range.before,
            transactions,
            node_operations: output.node_operations,
            addresses,
            kind_updates,
            stats: stats.clone(),
        };
        {
            let _commit = commit_span(height).entered();
            self.store.commit_block(&batch)?;
        }
        self.sequence.confirm(range);
        let registry_writes = self.registry.checkpoint();
        info!(
            height,
            txs = batch.transactions.len(),
            first_id = range.first(),
            addresses = batch.addresses.len(),
            kinds = batch.kind_updates.len(),
            registry_writes,
            "block committed"
        );

        self.stage = CycleStage::Publishing;
        let CommitBatch {
            transactions,
            node_operations,
            stats: committed_stats,
            ..
        } = batch;
        let finalized = FinalizedBatch {
            block: Arc::clone(&event.block),
            transactions,
            node_operations,
            rewards: output.rewards,
            stats: committed_stats,
        };
        if let Err(e) = self.publisher.publish(&finalized) {
            self.retained = Some(finalized);
            return Err(e.into());
        }

        Ok(CycleOutcome {
            height,
            disposition: Disposition::Committed,
            range: Some(range),
            stats,
            tokens_reclassified,
        })
    }

    /// Publish a batch a previous attempt committed but could not publish.
    fn publish_retained(&mut self, height: u64) -> Result<Option<CycleOutcome>, CycleError> {
        let Some(batch) = self.retained.take() else {
            return Ok(None);
        };
        if batch.height() != height {
            let retained_height = batch.height();
            self.retained = Some(batch);
            return Err(CycleError::ConsistencyViolation(format!(
                "block {height} delivered while block {retained_height} is still unpublished"
            )));
        }
        self.stage = CycleStage::Publishing;
        if let Err(e) = self.publisher.publish(&batch) {
            self.retained = Some(batch);
            return Err(e.into());
        }
        info!(height, "retained batch published");
        let mut outcome = CycleOutcome::without_work(height, Disposition::Republished);
        outcome.stats = batch.stats.clone();
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_probe_config() {
        let mut config = CollectorConfig::default();
        config.probe.immediate = true;
        config.probe.sweep_each_block = false;
        let options = PipelineOptions::from(&config);
        assert!(options.analyzer.probe_immediately);
        assert!(!options.sweep_each_block);
    }
}
