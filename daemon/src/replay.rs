//! Offline replay: serve blocks from a JSON file through a scripted chain
//! node and run the block feed and collector service against in-memory
//! storage.

use anyhow::{bail, Context};
use scan_collector::{
    block_queue, BlockFeed, BlockIngestionPipeline, ChannelPublisher, CollectorConfig,
    CollectorMetrics, CollectorService, FinalizedBatch, PipelineOptions, RetryPolicy,
    ServiceReport, ShutdownController,
};
use scan_nullables::{NullChainClient, NullStore};
use scan_store::TokenRecord;
use scan_types::bytes::hex_bytes;
use scan_types::{Address, RawBlock, TokenStandard};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Contract code the scripted node serves.
#[derive(Debug, Deserialize)]
pub struct ContractCode {
    pub address: Address,
    #[serde(with = "hex_bytes")]
    pub code: Vec<u8>,
    /// Answer to interface probes, if the contract is a token.
    #[serde(default)]
    pub standard: Option<TokenStandard>,
}

#[derive(Debug, Deserialize)]
pub struct ReplayFile {
    pub blocks: Vec<RawBlock>,
    #[serde(default)]
    pub tokens: Vec<TokenRecord>,
    #[serde(default)]
    pub contracts: Vec<ContractCode>,
    /// Transactions already persisted before the first block.
    #[serde(default)]
    pub initial_tx_count: u64,
}

impl ReplayFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading replay file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing replay file {}", path.display()))
    }

    /// Parse and sort the blocks; heights must be contiguous.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut file: Self = serde_json::from_str(content)?;
        file.blocks.sort_by_key(|b| b.height);
        for pair in file.blocks.windows(2) {
            if pair[1].height != pair[0].height + 1 {
                bail!(
                    "block heights must be contiguous: {} is followed by {}",
                    pair[0].height,
                    pair[1].height
                );
            }
        }
        Ok(file)
    }

    /// Inclusive height range of the blocks, if any.
    pub fn height_range(&self) -> Option<(u64, u64)> {
        Some((self.blocks.first()?.height, self.blocks.last()?.height))
    }

    fn into_fixtures(self) -> (NullStore, NullChainClient) {
        let store = NullStore::new();
        store.set_transaction_count(self.initial_tx_count);
        for token in self.tokens {
            store.insert_token(token);
        }
        let client = NullChainClient::new();
        for contract in self.contracts {
            if let Some(standard) = contract.standard {
                client.set_probe(contract.address, standard);
            }
            client.set_code(contract.address, contract.code);
        }
        for block in self.blocks {
            client.add_block(block);
        }
        (store, client)
    }
}

/// One line per published block.
pub fn summary_line(batch: &FinalizedBatch) -> String {
    let first_id = batch
        .transactions
        .first()
        .map(|tx| tx.id.to_string())
        .unwrap_or_else(|| "-".into());
    format!(
        "height={} txs={} first_id={} node_ops={} rewards={}",
        batch.height(),
        batch.transactions.len(),
        first_id,
        batch.node_operations.len(),
        batch.rewards.len()
    )
}

/// Drive every block of `file` through the collector service and print a
/// summary line per published block. Returns once all blocks are committed
/// or shutdown is signalled.
pub async fn run(
    file: ReplayFile,
    config: &CollectorConfig,
    shutdown: &ShutdownController,
) -> anyhow::Result<ServiceReport> {
    let Some((first, last)) = file.height_range() else {
        tracing::warn!("replay file holds no blocks");
        return Ok(ServiceReport::default());
    };
    let (store, client) = file.into_fixtures();
    let client = Arc::new(client);
    let (publisher, mut published) = ChannelPublisher::channel();
    let metrics = config
        .enable_metrics
        .then(|| Arc::new(CollectorMetrics::new()));

    let mut pipeline = BlockIngestionPipeline::new(
        Arc::new(store),
        Arc::clone(&client),
        Arc::new(publisher),
        PipelineOptions::from(config),
    );
    if let Some(metrics) = &metrics {
        pipeline = pipeline.with_metrics(Arc::clone(metrics));
    }
    pipeline.initialize().context("initialising pipeline")?;

    let (events, queue) = block_queue(config.queue_capacity);
    let service = CollectorService::new(pipeline, RetryPolicy::from(&config.retry));
    let handle = service.spawn(queue, shutdown.subscribe());

    let printer = tokio::spawn(async move {
        let mut printed = 0u64;
        while let Some(batch) = published.recv().await {
            println!("{}", summary_line(&batch));
            printed += 1;
        }
        printed
    });

    tracing::info!(first, last, "replaying blocks");
    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let feed = BlockFeed::new(client, first, poll_interval).with_end_height(last);
    let queued = feed.run(events, shutdown.subscribe()).await;
    tracing::debug!(queued, "block feed finished");

    let report = handle.await.context("collector service panicked")?;
    let printed = printer.await.context("summary printer panicked")?;
    tracing::info!(printed, "replay finished");

    if let Some(metrics) = metrics {
        print!("{}", metrics.encode_text()?);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLAY: &str = r#"{
        "initial_tx_count": 5,
        "blocks": [
            {
                "height": 1,
                "timestamp": 1700000000000,
                "miner": "0x00000000000000000000000000000000000000aa",
                "transactions": [{
                    "hash": "0x0101010101010101010101010101010101010101010101010101010101010101",
                    "index": 0,
                    "from": "0x00000000000000000000000000000000000000bb",
                    "to": "0x00000000000000000000000000000000000000cc",
                    "value": 10,
                    "input": "0x",
                    "gas_limit": 21000,
                    "gas_price": 1
                }],
                "receipts": {
                    "0x0101010101010101010101010101010101010101010101010101010101010101": {
                        "status": "Success",
                        "gas_used": 21000
                    }
                }
            },
            {
                "height": 2,
                "timestamp": 1700000001000,
                "miner": "0x00000000000000000000000000000000000000aa"
            }
        ],
        "contracts": [{
            "address": "0x00000000000000000000000000000000000000dd",
            "code": "0x6080",
            "standard": "Erc20"
        }]
    }"#;

    #[test]
    fn parses_replay_file() {
        let file = ReplayFile::parse(REPLAY).unwrap();
        assert_eq!(file.blocks.len(), 2);
        assert_eq!(file.initial_tx_count, 5);
        assert_eq!(file.contracts[0].code, vec![0x60, 0x80]);
        assert_eq!(file.contracts[0].standard, Some(TokenStandard::Erc20));
        assert!(file.tokens.is_empty());
        assert_eq!(file.height_range(), Some((1, 2)));
    }

    #[test]
    fn rejects_gaps_between_blocks() {
        let gapped = REPLAY.replace(r#""height": 2"#, r#""height": 4"#);
        assert!(ReplayFile::parse(&gapped).is_err());
    }

    #[tokio::test]
    async fn replays_every_block() {
        let file = ReplayFile::parse(REPLAY).unwrap();
        let shutdown = ShutdownController::new();
        let report = run(file, &CollectorConfig::default(), &shutdown)
            .await
            .unwrap();
        assert_eq!(report.blocks_committed, 2);
        assert_eq!(report.last_height, Some(2));
    }

    #[test]
    fn summary_line_for_empty_block() {
        let file = ReplayFile::parse(REPLAY).unwrap();
        let batch = FinalizedBatch {
            block: Arc::new(file.blocks[1].clone()),
            transactions: vec![],
            node_operations: vec![],
            rewards: vec![],
            stats: Default::default(),
        };
        assert_eq!(
            summary_line(&batch),
            "height=2 txs=0 first_id=- node_ops=0 rewards=0"
        );
    }
}
