//! Withdrawal notification hook.
//!
//! Delivering the notification (e-mail, webhook, ops channel) is an
//! external collaborator's job — the ledger only guarantees that every
//! committed debit eventually reaches a notifier exactly until it
//! acknowledges. The delivery mechanism is a strategy trait, same shape
//! as the auth crate's `SignatureVerifier` hook: production plugs in a
//! real sink, tests plug in a recorder.

use std::future::Future;

use hayloft_store::PendingWithdrawal;

/// Delivery failure. The pending record stays queued; the retry loop
/// will present it again.
#[derive(Debug, thiserror::Error)]
#[error("withdrawal notification failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers withdrawal notices to whatever sink the deployment uses.
///
/// `notify` returning `Ok` is the acknowledgement that clears the
/// pending record — implementations must not return `Ok` before the
/// notice is durably handed off.
pub trait WithdrawalNotifier: Send + Sync + 'static {
    /// Attempts to deliver one notice.
    fn notify(
        &self,
        notice: &PendingWithdrawal,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Structured-log sink: the fallback used when no delivery channel is
/// configured, so withdrawal events are at least visible to operators.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl WithdrawalNotifier for LogNotifier {
    async fn notify(&self, notice: &PendingWithdrawal) -> Result<(), NotifyError> {
        tracing::info!(
            id = %notice.id,
            wallet = %notice.wallet_address,
            amount = notice.amount,
            requested_at = notice.requested_at,
            "withdrawal requested"
        );
        Ok(())
    }
}
