//! Unified error type for server assembly.

use hayloft_auth::AuthError;
use hayloft_ledger::LedgerError;
use hayloft_rank::RankError;
use hayloft_session::SessionError;
use hayloft_store::StoreError;

/// Top-level error that wraps all crate-specific errors plus server io.
///
/// The binary and the server builder deal with this single type; the
/// `#[from]` attributes let `?` convert sub-crate errors automatically.
/// (Request handlers do their own mapping onto HTTP statuses instead —
/// see the routes module.)
#[derive(Debug, thiserror::Error)]
pub enum HayloftError {
    /// A persistence-layer error (load, save, corrupt snapshot).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An authentication error (nonce issuance or consumption).
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A session-lifecycle error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A ledger error (awards, conversion, withdrawal).
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A leaderboard error.
    #[error(transparent)]
    Rank(#[from] RankError),

    /// Socket binding or serving failed.
    #[error("server io: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use hayloft_store::SessionId;

    #[test]
    fn test_from_store_error() {
        let err = StoreError::Io(std::io::Error::other("disk gone"));
        let top: HayloftError = err.into();
        assert!(matches!(top, HayloftError::Store(_)));
        assert!(top.to_string().contains("disk gone"));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::NotFound(SessionId::from("nope"));
        let top: HayloftError = err.into();
        assert!(matches!(top, HayloftError::Session(_)));
    }

    #[test]
    fn test_from_ledger_error() {
        let err = LedgerError::BelowMinimum { minimum: 100 };
        let top: HayloftError = err.into();
        assert!(matches!(top, HayloftError::Ledger(_)));
        assert!(top.to_string().contains("100"));
    }
}
