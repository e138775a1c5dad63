//! Pre-built [`tracing::Span`] constructors for collector stages.
//!
//! Consistent span names and fields make one block's attempts easy to
//! correlate across log lines.

use scan_types::TxHash;
use tracing::{debug_span, info_span, Span};

/// Span covering one attempt at one block.
pub fn cycle_span(height: u64, attempt: u32) -> Span {
    info_span!("cycle", height = height, attempt = attempt)
}

/// Span covering the classification of a single transaction.
pub fn classify_span(hash: &TxHash) -> Span {
    debug_span!("classify", hash = %hash)
}

/// Span covering the atomic commit of a block.
pub fn commit_span(height: u64) -> Span {
    info_span!("commit", height = height)
}
