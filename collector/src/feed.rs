//! Upstream producer: fetch finalized blocks by height from the chain node
//! and queue them for the service loop, in order, without gaps. Fetches run
//! on the blocking pool.

use scan_chain::{ChainClient, ClientError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::pipeline::BlockEvent;
use crate::shutdown::ShutdownReason;

pub struct BlockFeed<C> {
    client: Arc<C>,
    next_height: u64,
    /// Inclusive; `None` follows the chain head forever.
    end_height: Option<u64>,
    poll_interval: Duration,
}

impl<C> BlockFeed<C>
where
    C: ChainClient + 'static,
{
    pub fn new(client: Arc<C>, start_height: u64, poll_interval: Duration) -> Self {
        Self {
            client,
            next_height: start_height,
            end_height: None,
            poll_interval,
        }
    }

    pub fn with_end_height(mut self, end_height: u64) -> Self {
        self.end_height = Some(end_height);
        self
    }

    pub fn spawn(
        self,
        events: mpsc::Sender<BlockEvent>,
        shutdown: broadcast::Receiver<ShutdownReason>,
    ) -> JoinHandle<u64> {
        tokio::spawn(self.run(events, shutdown))
    }

    /// Queue blocks until the end height, shutdown, or the consumer goes
    /// away. Returns how many blocks were queued.
    pub async fn run(
        mut self,
        events: mpsc::Sender<BlockEvent>,
        mut shutdown: broadcast::Receiver<ShutdownReason>,
    ) -> u64 {
        let mut queued = 0;
        loop {
            if self.end_height.is_some_and(|end| self.next_height > end) {
                info!(queued, "block feed reached end height");
                break;
            }

            let height = self.next_height;
            let client = Arc::clone(&self.client);
            let fetched = match tokio::task::spawn_blocking(move || client.fetch_block(height)).await {
                Ok(fetched) => fetched,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => {
                    error!(height, error = %e, "block fetch task cancelled, feed stopping");
                    break;
                }
            };
            match fetched {
                Ok(block) => {
                    let event = BlockEvent::new(block, height);
                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => break,
                        sent = events.send(event) => {
                            if sent.is_err() {
                                info!(height, "block queue closed, feed stopping");
                                break;
                            }
                        }
                    }
                    debug!(height, "block queued");
                    self.next_height += 1;
                    queued += 1;
                    continue;
                }
                Err(ClientError::NotFound(_)) => {
                    debug!(height, "block not yet available");
                }
                Err(e) => {
                    warn!(height, error = %e, "block fetch failed");
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::block_queue;
    use crate::ShutdownController;
    use scan_nullables::NullChainClient;
    use scan_types::{Address, RawBlock, Timestamp};
    use std::collections::HashMap;

    fn block(height: u64) -> RawBlock {
        RawBlock {
            height,
            timestamp: Timestamp::new(height),
            miner: Address::ZERO,
            transactions: vec![],
            receipts: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn queues_blocks_in_height_order() {
        let client = Arc::new(NullChainClient::new());
        for h in 3..=5 {
            client.add_block(block(h));
        }
        let (tx, mut rx) = block_queue(8);
        let shutdown = ShutdownController::new();
        let feed = BlockFeed::new(client, 3, Duration::from_millis(1)).with_end_height(5);

        let queued = feed.run(tx, shutdown.subscribe()).await;
        assert_eq!(queued, 3);
        for h in 3..=5 {
            assert_eq!(rx.recv().await.unwrap().height(), h);
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn retries_after_fetch_failure() {
        let client = Arc::new(NullChainClient::new());
        client.add_block(block(1));
        client.fail_call(1);
        let (tx, mut rx) = block_queue(2);
        let shutdown = ShutdownController::new();
        let feed = BlockFeed::new(Arc::clone(&client), 1, Duration::from_millis(1)).with_end_height(1);

        assert_eq!(feed.run(tx, shutdown.subscribe()).await, 1);
        assert_eq!(rx.recv().await.unwrap().height(), 1);
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn waits_for_missing_block_until_shutdown() {
        let client = Arc::new(NullChainClient::new());
        let (tx, _rx) = block_queue(1);
        let shutdown = ShutdownController::new();
        let handle = BlockFeed::new(client, 1, Duration::from_millis(1)).spawn(tx, shutdown.subscribe());
        tokio::time::sleep(Duration::from_millis(5)).await;
        shutdown.shutdown();
        assert_eq!(handle.await.unwrap(), 0);
    }
}
