//! Signature verification hook for proving wallet ownership.
//!
//! Hayloft does not verify chain signatures itself — the cryptographic
//! check belongs to whatever wallet ecosystem the deployment targets.
//! What the ledger requires is only that *some* boolean predicate gates
//! challenge consumption, so the predicate is a strategy trait:
//!
//! - [`SignedProofVerifier`] in production, with the real cryptographic
//!   verifier plugged in behind the same trait,
//! - [`AcceptAllVerifier`] in development and tests.
//!
//! A verifier is chosen once at server assembly. There is deliberately no
//! environment-flag bypass inside the consumption path itself.

use hayloft_store::WalletId;

/// The client's evidence that it controls the wallet it claims.
///
/// `signed` is the client's affirmation that the challenge message was
/// signed; `signature` carries the signature payload for verifiers that
/// check it.
#[derive(Debug, Clone, Default)]
pub struct ChallengeProof {
    /// Whether the client claims to have signed the challenge message.
    pub signed: bool,

    /// The signature bytes, encoded however the wallet ecosystem encodes
    /// them. Opaque to this crate.
    pub signature: Option<String>,
}

/// Validates a proof of wallet ownership for a challenge message.
///
/// `Send + Sync + 'static` so one verifier instance can be shared across
/// all connection-handling tasks for the life of the server.
pub trait SignatureVerifier: Send + Sync + 'static {
    /// Returns `true` if `proof` demonstrates that the holder of `wallet`
    /// signed `message`.
    fn verify(&self, wallet: &WalletId, message: &str, proof: &ChallengeProof) -> bool;
}

/// Requires an affirmative signed proof carrying a signature payload.
///
/// This is the production gate at the trust boundary: it rejects anything
/// a well-behaved client would not send. The cryptographic check of the
/// payload itself is the external collaborator that implements this same
/// trait in a chain-specific crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignedProofVerifier;

impl SignatureVerifier for SignedProofVerifier {
    fn verify(&self, _wallet: &WalletId, _message: &str, proof: &ChallengeProof) -> bool {
        proof.signed && proof.signature.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Accepts every proof. Development and test stub only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllVerifier;

impl SignatureVerifier for AcceptAllVerifier {
    fn verify(&self, _wallet: &WalletId, _message: &str, _proof: &ChallengeProof) -> bool {
        true
    }
}
