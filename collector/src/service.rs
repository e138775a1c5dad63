//! Service loop: pull block events off the queue and drive each one through
//! the pipeline until it commits.
//!
//! A block is never skipped. Failed attempts are retried with capped
//! exponential backoff, and the next block is not dequeued until the
//! current one succeeds. Shutdown is observed between blocks and between
//! retry attempts.
//!
//! Cycles make blocking store and node calls, so each attempt runs on the
//! blocking pool with the pipeline moved into it and handed back after.

use scan_chain::ChainClient;
use scan_store::ScanStore;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::RetryConfig;
use crate::pipeline::{BlockEvent, BlockIngestionPipeline, Disposition};
use crate::shutdown::ShutdownReason;

/// Bounded queue between the block feed and the service loop.
pub fn block_queue(capacity: usize) -> (mpsc::Sender<BlockEvent>, mpsc::Receiver<BlockEvent>) {
    mpsc::channel(capacity.max(1))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    initial: Duration,
    max: Duration,
    multiplier: f64,
}

impl RetryPolicy {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max: max.max(initial),
            multiplier: multiplier.max(1.0),
        }
    }

    /// Delay after failed attempt `attempt` (starting at 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let millis = self.initial.as_millis() as f64 * self.multiplier.powi(exponent);
        if !millis.is_finite() || millis >= self.max.as_millis() as f64 {
            return self.max;
        }
        Duration::from_millis(millis as u64)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
            config.multiplier,
        )
    }
}

/// Totals reported when the loop exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServiceReport {
    pub blocks_committed: u64,
    pub blocks_skipped: u64,
    pub attempts: u64,
    pub last_height: Option<u64>,
}

pub struct CollectorService<S, C> {
    pipeline: BlockIngestionPipeline<S, C>,
    retry: RetryPolicy,
}

impl<S, C> CollectorService<S, C>
where
    S: ScanStore + 'static,
    C: ChainClient + 'static,
{
    pub fn new(pipeline: BlockIngestionPipeline<S, C>, retry: RetryPolicy) -> Self {
        Self { pipeline, retry }
    }

    pub fn spawn(
        self,
        events: mpsc::Receiver<BlockEvent>,
        shutdown: broadcast::Receiver<ShutdownReason>,
    ) -> JoinHandle<ServiceReport> {
        tokio::spawn(self.run(events, shutdown))
    }

    /// Consume events until the queue closes or shutdown is signalled.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<BlockEvent>,
        mut shutdown: broadcast::Receiver<ShutdownReason>,
    ) -> ServiceReport {
        let Self { pipeline, retry } = self;
        let mut pipeline = Some(pipeline);
        let mut report = ServiceReport::default();
        info!("collector service started");

        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("collector service shutting down");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => event,
                    None => {
                        info!("block queue closed, collector service stopping");
                        break;
                    }
                }
            };

            if !drive(&mut pipeline, &retry, &event, &mut shutdown, &mut report).await {
                info!(height = event.height(), "block left unprocessed");
                break;
            }
        }

        info!(
            committed = report.blocks_committed,
            skipped = report.blocks_skipped,
            attempts = report.attempts,
            "collector service stopped"
        );
        report
    }
}

/// Retry `event` until it succeeds. Returns false if shutdown interrupted
/// the retries or the pipeline was lost with a cancelled task.
async fn drive<S, C>(
    slot: &mut Option<BlockIngestionPipeline<S, C>>,
    retry: &RetryPolicy,
    event: &BlockEvent,
    shutdown: &mut broadcast::Receiver<ShutdownReason>,
    report: &mut ServiceReport,
) -> bool
where
    S: ScanStore + 'static,
    C: ChainClient + 'static,
{
    let mut attempt: u32 = 1;
    loop {
        let Some(mut pipeline) = slot.take() else {
            return false;
        };
        report.attempts += 1;
        let cycle_event = event.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let result = pipeline.run_cycle(&cycle_event, attempt);
            (pipeline, result)
        })
        .await;
        let result = match joined {
            Ok((pipeline, result)) => {
                *slot = Some(pipeline);
                result
            }
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                error!(height = event.height(), attempt, error = %e, "cycle task cancelled");
                return false;
            }
        };

        match result {
            Ok(outcome) => {
                match outcome.disposition {
                    Disposition::Committed | Disposition::Republished => {
                        report.blocks_committed += 1;
                    }
                    Disposition::AlreadyCommitted => report.blocks_skipped += 1,
                }
                report.last_height = Some(outcome.height);
                return true;
            }
            Err(e) => {
                let delay = retry.backoff(attempt);
                warn!(
                    height = event.height(),
                    attempt,
                    cause = e.kind_label(),
                    delay_ms = delay.as_millis() as u64,
                    "block attempt failed, retrying"
                );
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => return false,
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::new(Duration::from_millis(100), Duration::from_millis(1_000), 2.0);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
        assert_eq!(policy.backoff(5), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_millis(1_000));
    }

    #[test]
    fn policy_from_config() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(100), Duration::from_millis(30_000));
    }

    #[test]
    fn multiplier_below_one_does_not_shrink() {
        let policy = RetryPolicy::new(Duration::from_millis(50), Duration::from_millis(500), 0.5);
        assert_eq!(policy.backoff(3), Duration::from_millis(50));
    }
}
