//! The nonce authenticator: short-lived, single-use login challenges.
//!
//! Login is a two-step handshake. The client first asks for a challenge
//! (a random nonce plus the message it must sign), then redeems it with a
//! proof of wallet ownership:
//!
//! ```text
//!   issue_challenge() ──→ Challenge{expires_at} persisted
//!                              │
//!            consume_challenge(wallet, nonce, proof)
//!                              │
//!              verified? ──→ record deleted ──→ Ok(wallet)
//! ```
//!
//! Consumption deletes the record in the same atomic update that
//! validates it, so a challenge can never be redeemed twice — even when
//! two redemptions race, the second observes the deletion and fails.

use std::sync::Arc;
use std::time::Duration;

use hayloft_store::{now_ms, PersistenceStore, Session, SessionId, StateHandle, WalletId};

use crate::{AuthError, ChallengeProof, SignatureVerifier};

/// Configuration for challenge issuance.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// How long an issued challenge stays redeemable.
    ///
    /// Default: 5 minutes.
    pub challenge_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            challenge_ttl: Duration::from_secs(5 * 60),
        }
    }
}

/// A freshly issued challenge, returned to the client.
#[derive(Debug, Clone)]
pub struct Challenge {
    /// The nonce the client must present when redeeming.
    pub nonce: SessionId,

    /// The exact message the wallet must sign.
    pub message: String,

    /// Redemption deadline, ms since epoch.
    pub expires_at: u64,
}

/// Issues and consumes login challenges.
pub struct NonceAuthenticator<S, V> {
    state: Arc<StateHandle<S>>,
    verifier: V,
    config: AuthConfig,
}

impl<S: PersistenceStore, V: SignatureVerifier> NonceAuthenticator<S, V> {
    /// Creates an authenticator over the shared state handle.
    pub fn new(state: Arc<StateHandle<S>>, verifier: V, config: AuthConfig) -> Self {
        Self {
            state,
            verifier,
            config,
        }
    }

    /// The message a wallet signs to redeem `nonce`.
    pub fn challenge_message(nonce: &SessionId) -> String {
        format!("Sign to login: {nonce}")
    }

    /// Creates and persists a new single-use challenge.
    pub async fn issue_challenge(&self) -> Result<Challenge, AuthError> {
        let nonce = SessionId::generate();
        let expires_at = now_ms() + self.config.challenge_ttl.as_millis() as u64;

        self.state
            .update(|snapshot| {
                snapshot
                    .sessions
                    .insert(nonce.clone(), Session::Challenge { expires_at });
                Ok::<_, AuthError>(())
            })
            .await?;

        tracing::debug!(%nonce, expires_at, "challenge issued");
        Ok(Challenge {
            message: Self::challenge_message(&nonce),
            nonce,
            expires_at,
        })
    }

    /// Redeems a challenge, returning the verified wallet identity.
    ///
    /// On success the challenge record is deleted — a second redemption
    /// fails [`AuthError::NotFound`]. A failed signature leaves the
    /// challenge in place so the client may retry until it expires.
    ///
    /// # Errors
    /// - [`AuthError::NotFound`] — unknown or already-consumed nonce
    /// - [`AuthError::Expired`] — past its deadline
    /// - [`AuthError::WrongVariant`] — the id belongs to a play session
    /// - [`AuthError::Unverified`] — the proof failed the verifier
    pub async fn consume_challenge(
        &self,
        wallet: &WalletId,
        nonce: &SessionId,
        proof: &ChallengeProof,
    ) -> Result<WalletId, AuthError> {
        let message = Self::challenge_message(nonce);
        let wallet = wallet.clone();

        let verified = self
            .state
            .update(|snapshot| {
                let now = now_ms();
                match snapshot.sessions.get(nonce) {
                    None => return Err(AuthError::NotFound(nonce.clone())),
                    Some(Session::Play(_)) => {
                        return Err(AuthError::WrongVariant(nonce.clone()));
                    }
                    Some(Session::Challenge { expires_at }) if *expires_at < now => {
                        return Err(AuthError::Expired(nonce.clone()));
                    }
                    Some(Session::Challenge { .. }) => {}
                }

                if !self.verifier.verify(&wallet, &message, proof) {
                    return Err(AuthError::Unverified(wallet.clone()));
                }

                // Single-use: the deletion commits atomically with the
                // checks above.
                snapshot.sessions.remove(nonce);
                Ok(wallet.clone())
            })
            .await?;

        tracing::info!(wallet = %verified, %nonce, "challenge consumed");
        Ok(verified)
    }
}

// =========================================================================
// Tests
// =========================================================================
