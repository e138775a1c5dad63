use scan_analyzer::AnalyzeError;
use scan_chain::ClientError;
use scan_store::StoreError;
use thiserror::Error;

use crate::publisher::PublishError;

/// Why a cycle attempt was abandoned.
///
/// Every variant aborts the attempt with nothing committed or published;
/// the service retries all of them.
#[derive(Debug, Error)]
pub enum CycleError {
    /// A transaction could not be given both a type and a to-type.
    #[error("classification failed: {0}")]
    Classification(String),

    /// RPC, storage or publication failure.
    #[error("transient infrastructure error: {0}")]
    Transient(String),

    /// A write would decrease a counter, demote a kind or apply a stale
    /// sequence range.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),
}

impl CycleError {
    /// Label used for the failure metric.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Classification(_) => "classification",
            Self::Transient(_) => "transient",
            Self::ConsistencyViolation(_) => "consistency",
        }
    }
}

impl From<AnalyzeError> for CycleError {
    fn from(e: AnalyzeError) -> Self {
        match e {
            AnalyzeError::Classification { .. } | AnalyzeError::Decode(_) => {
                Self::Classification(e.to_string())
            }
            AnalyzeError::Client(inner) => inner.into(),
            AnalyzeError::Store(inner) => inner.into(),
            AnalyzeError::Consistency(msg) => Self::ConsistencyViolation(msg),
        }
    }
}

impl From<StoreError> for CycleError {
    fn from(e: StoreError) -> Self {
        if e.is_conflict() {
            Self::ConsistencyViolation(e.to_string())
        } else {
            Self::Transient(e.to_string())
        }
    }
}

impl From<ClientError> for CycleError {
    fn from(e: ClientError) -> Self {
        Self::Transient(e.to_string())
    }
}

impl From<PublishError> for CycleError {
    fn from(e: PublishError) -> Self {
        Self::Transient(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cycle error: {0}")]
    Cycle(#[from] CycleError),

    #[error("block event queue closed")]
    QueueClosed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_types::TxHash;

    #[test]
    fn store_conflict_is_a_consistency_violation() {
        let e: CycleError = StoreError::Conflict("stale".into()).into();
        assert!(matches!(e, CycleError::ConsistencyViolation(_)));
        let e: CycleError = StoreError::Backend("down".into()).into();
        assert!(matches!(e, CycleError::Transient(_)));
    }

    #[test]
    fn analyze_errors_map_onto_taxonomy() {
        let e: CycleError = AnalyzeError::Classification {
            height: 1,
            hash: TxHash::ZERO,
            reason: "no rule".into(),
        }
        .into();
        assert_eq!(e.kind_label(), "classification");

        let e: CycleError = AnalyzeError::Client(ClientError::Timeout("rpc".into())).into();
        assert_eq!(e.kind_label(), "transient");

        let e: CycleError = AnalyzeError::Store(StoreError::Conflict("kind".into())).into();
        assert_eq!(e.kind_label(), "consistency");
    }
}
