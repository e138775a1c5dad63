//! Block collector: the sequential consumer that turns finalized blocks
//! into committed, published scanner records.
//!
//! For each block the collector:
//! - Classifies every transaction and maintains the contract registry
//! - Folds per-block and per-address statistics
//! - Assigns dense global transaction ids
//! - Runs the business analyzers (node operations, rewards)
//! - Commits the block atomically, then publishes it downstream
//! - Retries failed blocks with backoff, never skipping one
//!
//! [`BlockFeed`] is the upstream producer that fetches blocks by height.

pub mod business;
pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod metrics;
pub mod node_cache;
pub mod pipeline;
pub mod publisher;
pub mod service;
pub mod shutdown;
pub mod tracing_spans;

pub use business::{
    default_analyzers, BusinessAnalyzer, BusinessInput, BusinessOutput, RewardClaimAnalyzer,
    StakingOperationAnalyzer,
};
pub use config::{CollectorConfig, ProbeConfig, RetryConfig};
pub use error::{CollectorError, CycleError};
pub use feed::BlockFeed;
pub use logging::{init_logging, LogFormat};
pub use metrics::CollectorMetrics;
pub use node_cache::NodeCache;
pub use pipeline::{
    BlockEvent, BlockIngestionPipeline, BlockStats, CycleOutcome, CycleStage, Disposition,
    PipelineOptions,
};
pub use publisher::{ChannelPublisher, FinalizedBatch, PublishError, Publisher};
pub use service::{block_queue, CollectorService, RetryPolicy, ServiceReport};
pub use shutdown::{ShutdownController, ShutdownReason};
