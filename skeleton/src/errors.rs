use thiserror::Error;

/// Errors returned to callers of the public surface (`sync`, `head`, `header`, `terminate`).
///
/// Restart sentinels (`Linked`/`Merged`/`Reorged`/`Terminated`) are *not* modeled here — they
/// are internal control signals returned from a cycle, see [`crate::controller::CycleOutcome`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkeletonError {
    #[error("skeleton sync was already terminated")]
    StaleSync,

    #[error("sync has not made any progress yet")]
    NotStarted,

    #[error("sync is not finished: primary subchain tail has not reached block 1")]
    NotFinished,

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

/// Errors surfaced by a single fetcher attempt. None of these are fatal to the cycle; every
/// variant here is handled by scheduling a revert for the owning task (§7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("peer returned an empty batch")]
    EmptyBatch,

    #[error("batch anchor mismatch: requested head {requested}, got {got}")]
    BadAnchor { requested: u64, got: u64 },

    #[error("batch size mismatch: expected {expected}, got {got}")]
    BadSize { expected: u64, got: u64 },

    #[error("unlinked headers inside batch at index {index}")]
    UnlinkedInsideBatch { index: usize },

    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,
}
