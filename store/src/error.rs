use thiserror::Error;

/// Failures reported by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or the call timed out.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected or failed the operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A persisted row could not be decoded into its record type.
    #[error("malformed {table} row: {detail}")]
    MalformedRow { table: &'static str, detail: String },

    /// A write would contradict what is already persisted (stale sequence
    /// range, kind regression). Never retried into success.
    #[error("write conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
