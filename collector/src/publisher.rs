//! Hand-off of committed blocks to downstream consumers.

use scan_types::{BlockStats, ClassifiedTransaction, NodeOperation, RawBlock, RewardClaim};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("downstream consumer is gone")]
    Closed,

    #[error("downstream rejected batch: {0}")]
    Rejected(String),
}

/// Everything downstream learns about one committed block.
#[derive(Clone, Debug)]
pub struct FinalizedBatch {
    pub block: Arc<RawBlock>,
    pub transactions: Vec<ClassifiedTransaction>,
    pub node_operations: Vec<NodeOperation>,
    pub rewards: Vec<RewardClaim>,
    pub stats: BlockStats,
}

impl FinalizedBatch {
    pub fn height(&self) -> u64 {
        self.block.height
    }
}

/// Receives each committed block exactly once, in height order.
pub trait Publisher: Send + Sync {
    fn publish(&self, batch: &FinalizedBatch) -> Result<(), PublishError>;
}

/// Publishes into an unbounded tokio channel.
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<FinalizedBatch>,
}

impl ChannelPublisher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FinalizedBatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, batch: &FinalizedBatch) -> Result<(), PublishError> {
        self.tx.send(batch.clone()).map_err(|_| PublishError::Closed)
    }
}
