//! Error types for the session layer.

use hayloft_store::{SessionId, StoreError, WalletId};

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session record exists for the given id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The id resolves to a login challenge, not a play session.
    #[error("session {0} is not a play session")]
    WrongVariant(SessionId),

    /// The wallet address is malformed (too short to be real).
    #[error("invalid wallet address {0}")]
    InvalidWallet(WalletId),

    /// The session points at a user record that does not exist.
    #[error("user {0} not found")]
    UnknownUser(WalletId),

    /// The snapshot could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}
