//! Dense global transaction ids.

use scan_store::TransactionStore;
use scan_types::ClassifiedTransaction;
use tracing::debug;

use crate::AnalyzeError;

/// Ids handed out to one block: `before + 1 ..= before + len`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequenceRange {
    /// Persisted transaction count the range was allocated from.
    pub before: u64,
    pub len: u64,
}

impl SequenceRange {
    pub fn first(&self) -> u64 {
        self.before + 1
    }

    /// Persisted count once the range is committed.
    pub fn after(&self) -> u64 {
        self.before + self.len
    }
}

/// Allocates ids from the persisted transaction count.
///
/// The count is re-read on every allocation, so a failed attempt never
/// leaves the next one with a stale base.
#[derive(Debug, Default)]
pub struct SequenceAssigner {
    last_committed: Option<u64>,
}

impl SequenceAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort `transactions` by in-block index and number them from the
    /// persisted count. Virtual children share their parent's id.
    pub fn allocate(
        &self,
        store: &dyn TransactionStore,
        transactions: &mut [ClassifiedTransaction],
    ) -> Result<SequenceRange, AnalyzeError> {
        let before = store.transaction_count()?;
        if let Some(last) = self.last_committed {
            if before < last {
                return Err(AnalyzeError::Consistency(format!(
                    "persisted transaction count {before} is behind committed count {last}"
                )));
            }
        }

        transactions.sort_by_key(|tx| tx.index);
        for (offset, tx) in transactions.iter_mut().enumerate() {
            tx.id = before + 1 + offset as u64;
            for child in &mut tx.virtual_transactions {
                child.id = tx.id;
            }
        }

        let range = SequenceRange {
            before,
            len: transactions.len() as u64,
        };
        debug!(first = range.first(), len = range.len, "sequence range allocated");
        Ok(range)
    }

    /// Record that `range` is durably committed.
    pub fn confirm(&mut self, range: SequenceRange) {
        self.last_committed = Some(range.after());
    }

    pub fn last_committed(&self) -> Option<u64> {
        self.last_committed
    }
}
