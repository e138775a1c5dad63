//! Stop signal for the block feed and the service loop.
//!
//! The service only looks at the signal between blocks and between retry
//! attempts, so a cycle that has started always runs to commit or abort.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    Requested,
}

/// Fans one stop signal out to every subscribed task.
pub struct ShutdownController {
    tx: broadcast::Sender<ShutdownReason>,
    triggered: AtomicBool,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    /// Receivers only see signals sent after they subscribed; check
    /// [`Self::is_triggered`] when subscribing late.
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownReason> {
        self.tx.subscribe()
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.trigger(ShutdownReason::Requested);
    }

    fn trigger(&self, reason: ShutdownReason) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(?reason, "shutdown triggered");
        // No receivers left just means nothing is running.
        let _ = self.tx.send(reason);
    }

    /// Block until SIGINT or SIGTERM arrives, then signal every subscriber.
    pub async fn wait_for_signal(&self) -> ShutdownReason {
        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "cannot install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        let reason = tokio::select! {
            _ = signal::ctrl_c() => ShutdownReason::Interrupt,
            _ = terminate => ShutdownReason::Terminate,
        };
        self.trigger(reason);
        reason
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
