//! Error type for the persistence layer.

/// Errors raised while loading or saving the snapshot.
///
/// Callers treat any of these as "the write did not happen": the in-memory
/// mutation is discarded and the durable snapshot remains the single point
/// of truth.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying file could not be read, written, or replaced.
    #[error("snapshot io failed: {0}")]
    Io(#[from] std::io::Error),

    /// The on-disk document could not be encoded or decoded.
    #[error("snapshot corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
