//! Prometheus metrics for the collector.
//!
//! [`CollectorMetrics`] owns a dedicated [`Registry`] that an exporter can
//! encode into the Prometheus text format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry, Encoder,
    register_int_counter_with_registry, register_int_gauge_with_registry, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::{CollectorError, CycleError};

pub struct CollectorMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub blocks_committed: IntCounter,
    pub transactions_classified: IntCounter,
    /// Every attempt, first tries and retries alike.
    pub cycle_attempts: IntCounter,
    /// Abandoned attempts, labelled `classification`, `transient` or
    /// `consistency`.
    pub cycle_failures: IntCounterVec,
    pub tokens_reclassified: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub last_committed_height: IntGauge,
    pub persisted_transactions: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of successful cycles, in milliseconds.
    pub cycle_time_ms: Histogram,
}

impl CollectorMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let blocks_committed = register_int_counter_with_registry!(
            Opts::new("scan_blocks_committed_total", "Blocks durably committed"),
            registry
        )
        .expect("failed to register blocks_committed counter");

        let transactions_classified = register_int_counter_with_registry!(
            Opts::new(
                "scan_transactions_classified_total",
                "Transactions classified in committed blocks"
            ),
            registry
        )
        .expect("failed to register transactions_classified counter");

        let cycle_attempts = register_int_counter_with_registry!(
            Opts::new("scan_cycle_attempts_total", "Cycle attempts started"),
            registry
        )
        .expect("failed to register cycle_attempts counter");

        let cycle_failures = register_int_counter_vec_with_registry!(
            Opts::new("scan_cycle_failures_total", "Abandoned cycle attempts by cause"),
            &["kind"],
            registry
        )
        .expect("failed to register cycle_failures counter");

        let tokens_reclassified = register_int_counter_with_registry!(
            Opts::new(
                "scan_tokens_reclassified_total",
                "Generic contracts confirmed as tokens by the probe sweep"
            ),
            registry
        )
        .expect("failed to register tokens_reclassified counter");

        let last_committed_height = register_int_gauge_with_registry!(
            Opts::new("scan_last_committed_height", "Height of the last committed block"),
            registry
        )
        .expect("failed to register last_committed_height gauge");

        let persisted_transactions = register_int_gauge_with_registry!(
            Opts::new("scan_persisted_transactions", "Persisted transaction count"),
            registry
        )
        .expect("failed to register persisted_transactions gauge");

        // 1 ms → ~16 s.
        let cycle_time_ms = register_histogram_with_registry!(
            HistogramOpts::new("scan_cycle_time_ms", "Cycle processing time in milliseconds")
                .buckets(prometheus::exponential_buckets(1.0, 2.0, 15).unwrap()),
            registry
        )
        .expect("failed to register cycle_time_ms histogram");

        Self {
            registry,
            blocks_committed,
            transactions_classified,
            cycle_attempts,
            cycle_failures,
            tokens_reclassified,
            last_committed_height,
            persisted_transactions,
            cycle_time_ms,
        }
    }

    pub fn record_failure(&self, error: &CycleError) {
        self.cycle_failures
            .with_label_values(&[error.kind_label()])
            .inc();
    }

    /// Encode every family in the Prometheus text format.
    pub fn encode_text(&self) -> Result<String, CollectorError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| CollectorError::Config(format!("metrics encoding: {e}")))?;
        String::from_utf8(buffer).map_err(|e| CollectorError::Config(e.to_string()))
    }
}

impl Default for CollectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}
