//! Error types for the authentication layer.

use hayloft_store::{SessionId, StoreError};

/// Errors that can occur while issuing or consuming a login challenge.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No record exists for the presented nonce. Either it was never
    /// issued, already consumed, or swept after expiry.
    #[error("challenge {0} not found")]
    NotFound(SessionId),

    /// The challenge exists but its deadline has passed.
    #[error("challenge {0} expired")]
    Expired(SessionId),

    /// The presented id resolves to a play session, not a challenge.
    #[error("session {0} is not a login challenge")]
    WrongVariant(SessionId),

    /// The proof did not satisfy the configured verification predicate.
    #[error("signature verification failed for wallet {0}")]
    Unverified(hayloft_store::WalletId),

    /// The snapshot could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}
