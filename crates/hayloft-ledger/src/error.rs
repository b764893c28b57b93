//! Error types for the ledger layer.

use hayloft_store::{SessionId, StoreError, WalletId};

/// Errors that can occur while crediting, converting, or withdrawing.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The caller supplied a zero or out-of-range amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(&'static str),

    /// No play session exists for the given id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The session has already ended; progress can no longer be reported.
    #[error("session {0} is not alive")]
    NotAlive(SessionId),

    /// No user record exists for the given wallet.
    #[error("user {0} not found")]
    UnknownUser(WalletId),

    /// The user's saved points don't cover the requested conversion.
    /// Carries how many points are actually available.
    #[error("insufficient saved points ({available} available)")]
    InsufficientPoints { available: u64 },

    /// The user's token balance doesn't cover the requested withdrawal.
    #[error("insufficient balance ({available} available)")]
    InsufficientBalance { available: u64 },

    /// The requested withdrawal is under the minimum.
    #[error("minimum withdrawal is {minimum} HAY")]
    BelowMinimum { minimum: u64 },

    /// The snapshot could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}
