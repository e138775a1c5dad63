//! Transaction progress trait.

use crate::StoreError;

/// Read side of the persisted transaction set.
///
/// The persisted transaction count is the base of the global sequence: the
/// next committed transaction receives id `transaction_count() + 1`.
pub trait TransactionStore {
    /// Number of transactions durably persisted.
    fn transaction_count(&self) -> Result<u64, StoreError>;

    /// Height of the last block whose batch was committed.
    fn last_committed_height(&self) -> Result<Option<u64>, StoreError>;
}
