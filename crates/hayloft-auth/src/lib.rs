//! Login handshake for Hayloft.
//!
//! This crate handles the front door of the session lifecycle:
//!
//! 1. **Challenge issuance** — short-lived random nonces persisted in the
//!    shared snapshot ([`NonceAuthenticator::issue_challenge`])
//! 2. **Single-use redemption** — atomic verify-and-delete so no
//!    challenge is ever consumed twice
//!    ([`NonceAuthenticator::consume_challenge`])
//! 3. **Ownership proof** — the pluggable [`SignatureVerifier`] predicate
//!    gating redemption
//!
//! # How it fits in the stack
//!
//! ```text
//! HTTP API (above)     ← /api/nonce and /api/connect call in here
//!     ↕
//! Auth layer (this crate)
//!     ↕
//! Store layer (below)  ← challenges live in the session map
//! ```

mod authenticator;
mod error;
mod verifier;

pub use authenticator::{AuthConfig, Challenge, NonceAuthenticator};
pub use error::AuthError;
pub use verifier::{AcceptAllVerifier, ChallengeProof, SignatureVerifier, SignedProofVerifier};
