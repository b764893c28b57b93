//! The points ledger: quantized awards, conversion, and withdrawal.
//!
//! The client reports raw in-round progress ("N obstacles passed") — an
//! untrusted claim that only becomes durable credit in fixed quanta. The
//! crediting rule is a watermark over *cumulative* round points:
//!
//! ```text
//!   eligible = floor(points / 15) * 15
//!   credit   = eligible - points_awarded     (never negative)
//! ```
//!
//! Because the award is a function of the cumulative total and a
//! watermark, retried or re-chunked progress reports can never credit the
//! same quantum step twice.

use std::sync::Arc;

use hayloft_store::{
    now_ms, PendingWithdrawal, PersistenceStore, PlaySession, Session, SessionId, Snapshot,
    StateHandle, User, WalletId,
};

use crate::{LedgerError, WithdrawalNotifier};

/// Granularity at which raw progress becomes durable credit.
pub const POINT_QUANTUM: u64 = 15;

/// Saved points debited per HAY token credited.
pub const POINTS_PER_TOKEN: u64 = 1000;

/// Smallest withdrawal the server accepts, in HAY tokens.
pub const MIN_WITHDRAWAL_TOKENS: u64 = 100;

/// Credits every fully earned quantum that has not been credited yet.
///
/// Advances the session's `points_awarded` watermark and grows the user's
/// `saved_points_total` by the same amount. Returns the credit applied
/// (zero when the watermark is already at the eligible level). Also used
/// as the round-end flush, where any remainder below one quantum is
/// forfeited by design.
pub fn award_quantized(play: &mut PlaySession, user: &mut User) -> u64 {
    let eligible = (play.points / POINT_QUANTUM) * POINT_QUANTUM;
    let credit = eligible.saturating_sub(play.points_awarded);
    if credit > 0 {
        user.saved_points_total += credit;
        play.points_awarded = eligible;
    }
    credit
}

/// What a progress report returns to the client.
#[derive(Debug, Clone)]
pub struct ProgressReceipt {
    /// Cumulative raw points this round, after the report.
    pub points: u64,

    /// The user's durable credit, after any award.
    pub saved_points_total: u64,

    /// The full user record, post-mutation.
    pub user: User,
}

/// Converts reported progress into account state.
pub struct PointsLedger<S, N> {
    state: Arc<StateHandle<S>>,
    notifier: N,
}

impl<S: PersistenceStore, N: WithdrawalNotifier> PointsLedger<S, N> {
    /// Creates a ledger over the shared state handle.
    pub fn new(state: Arc<StateHandle<S>>, notifier: N) -> Self {
        Self { state, notifier }
    }

    /// Records `passed` progress units against an alive session and
    /// credits any newly eligible quanta to the owning user.
    ///
    /// `total_achievements` grows by the raw delta unconditionally —
    /// achievement counting is not quantized.
    ///
    /// # Errors
    /// - [`LedgerError::InvalidAmount`] — `passed` is zero
    /// - [`LedgerError::NotFound`] — unknown id or a challenge id
    /// - [`LedgerError::NotAlive`] — the round already ended
    pub async fn report_progress(
        &self,
        session_id: &SessionId,
        passed: u64,
    ) -> Result<ProgressReceipt, LedgerError> {
        if passed == 0 {
            return Err(LedgerError::InvalidAmount("progress delta must be positive"));
        }

        self.state
            .update(|snapshot| {
                let Snapshot {
                    users, sessions, ..
                } = snapshot;

                let play = match sessions.get_mut(session_id) {
                    Some(Session::Play(play)) => play,
                    Some(Session::Challenge { .. }) | None => {
                        return Err(LedgerError::NotFound(session_id.clone()));
                    }
                };
                if !play.is_alive {
                    return Err(LedgerError::NotAlive(session_id.clone()));
                }

                let wallet = play.wallet_address.clone();
                let user = users
                    .get_mut(&wallet)
                    .ok_or_else(|| LedgerError::UnknownUser(wallet.clone()))?;

                play.points += passed;
                let credit = award_quantized(play, user);
                user.total_achievements += passed;

                if credit > 0 {
                    tracing::info!(
                        wallet = %wallet,
                        credit,
                        total = user.saved_points_total,
                        "points credited"
                    );
                }

                Ok(ProgressReceipt {
                    points: play.points,
                    saved_points_total: user.saved_points_total,
                    user: user.clone(),
                })
            })
            .await
    }

    /// Converts saved points into HAY tokens at [`POINTS_PER_TOKEN`].
    ///
    /// Debits exactly `tokens * 1000` points and credits exactly `tokens`
    /// to the balance, in one atomic update.
    pub async fn convert(&self, wallet: &WalletId, tokens: u64) -> Result<User, LedgerError> {
        if tokens == 0 {
            return Err(LedgerError::InvalidAmount("token count must be positive"));
        }
        let needed = tokens
            .checked_mul(POINTS_PER_TOKEN)
            .ok_or(LedgerError::InvalidAmount("token count too large"))?;

        let user = self
            .state
            .update(|snapshot| {
                let user = snapshot
                    .users
                    .get_mut(wallet)
                    .ok_or_else(|| LedgerError::UnknownUser(wallet.clone()))?;
                if user.saved_points_total < needed {
                    return Err(LedgerError::InsufficientPoints {
                        available: user.saved_points_total,
                    });
                }
                user.saved_points_total -= needed;
                user.hay_balance += tokens;
                Ok(user.clone())
            })
            .await?;

        tracing::info!(%wallet, tokens, balance = user.hay_balance, "points converted");
        Ok(user)
    }

    /// Withdraws `amount` HAY from the user's balance.
    ///
    /// The debit, the `last_withdrawal_at` stamp, and a pending
    /// notification record commit in one atomic update; delivery is then
    /// attempted once, and a failure leaves the record queued for
    /// [`retry_pending`](Self::retry_pending). The debit is never rolled
    /// back and never silently divorced from its notification.
    pub async fn withdraw(&self, wallet: &WalletId, amount: u64) -> Result<User, LedgerError> {
        if amount < MIN_WITHDRAWAL_TOKENS {
            return Err(LedgerError::BelowMinimum {
                minimum: MIN_WITHDRAWAL_TOKENS,
            });
        }

        let (user, notice) = self
            .state
            .update(|snapshot| {
                let user = snapshot
                    .users
                    .get_mut(wallet)
                    .ok_or_else(|| LedgerError::UnknownUser(wallet.clone()))?;
                if user.hay_balance < amount {
                    return Err(LedgerError::InsufficientBalance {
                        available: user.hay_balance,
                    });
                }

                let now = now_ms();
                user.hay_balance -= amount;
                user.last_withdrawal_at = Some(now);
                let user = user.clone();

                let notice = PendingWithdrawal {
                    id: SessionId::generate(),
                    wallet_address: wallet.clone(),
                    amount,
                    requested_at: now,
                };
                snapshot.pending_withdrawals.push(notice.clone());
                Ok((user, notice))
            })
            .await?;

        tracing::info!(%wallet, amount, balance = user.hay_balance, "withdrawal debited");
        self.try_deliver(&notice).await?;
        Ok(user)
    }

    /// Re-attempts delivery for every queued notice, clearing the ones
    /// that succeed. Returns how many were delivered. Called out of band
    /// on a fixed interval.
    pub async fn retry_pending(&self) -> Result<usize, LedgerError> {
        let pending = self
            .state
            .read(|snapshot| snapshot.pending_withdrawals.clone())
            .await?;

        let mut delivered = 0;
        for notice in &pending {
            match self.notifier.notify(notice).await {
                Ok(()) => {
                    self.clear_pending(&notice.id).await?;
                    delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(id = %notice.id, error = %e, "withdrawal notification retry failed");
                }
            }
        }
        if delivered > 0 {
            tracing::info!(delivered, remaining = pending.len() - delivered, "withdrawal notifications drained");
        }
        Ok(delivered)
    }

    async fn try_deliver(&self, notice: &PendingWithdrawal) -> Result<(), LedgerError> {
        match self.notifier.notify(notice).await {
            Ok(()) => self.clear_pending(&notice.id).await,
            Err(e) => {
                // The record stays queued; the retry loop owns it now.
                tracing::warn!(id = %notice.id, error = %e, "withdrawal notification failed, queued for retry");
                Ok(())
            }
        }
    }

    async fn clear_pending(&self, id: &SessionId) -> Result<(), LedgerError> {
        self.state
            .update(|snapshot| {
                snapshot.pending_withdrawals.retain(|p| &p.id != id);
                Ok(())
            })
            .await
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Naming convention: `test_{function}_{scenario}_{expected}`.

    use super::*;
    use crate::NotifyError;
    use hayloft_store::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Records every delivered notice; deliverability is switchable so a
    /// single test can exercise the failure path and then the retry.
    #[derive(Default)]
    struct SwitchNotifier {
        deliverable: AtomicBool,
        seen: Mutex<Vec<PendingWithdrawal>>,
    }

    impl SwitchNotifier {
        fn delivering() -> Self {
            let n = Self::default();
            n.deliverable.store(true, Ordering::SeqCst);
            n
        }
    }

    impl WithdrawalNotifier for &'static SwitchNotifier {
        async fn notify(&self, notice: &PendingWithdrawal) -> Result<(), NotifyError> {
            if self.deliverable.load(Ordering::SeqCst) {
                self.seen.lock().unwrap().push(notice.clone());
                Ok(())
            } else {
                Err(NotifyError("sink offline".into()))
            }
        }
    }

    fn leak(notifier: SwitchNotifier) -> &'static SwitchNotifier {
        Box::leak(Box::new(notifier))
    }

    fn wallet() -> WalletId {
        WalletId::from("wallet-ledger-test-0000000000000")
    }

    fn play_id() -> SessionId {
        SessionId::from("play-ledger-test")
    }

    /// State pre-seeded with one user and one alive play session.
    fn seeded_state() -> Arc<StateHandle<MemoryStore>> {
        let mut snapshot = Snapshot::default();
        snapshot.user_or_create(&wallet());
        snapshot.sessions.insert(
            play_id(),
            Session::Play(PlaySession::new(wallet(), now_ms())),
        );
        StateHandle::new(MemoryStore::with_snapshot(snapshot))
    }

    fn ledger(
        state: Arc<StateHandle<MemoryStore>>,
    ) -> PointsLedger<MemoryStore, &'static SwitchNotifier> {
        PointsLedger::new(state, leak(SwitchNotifier::delivering()))
    }

    // =====================================================================
    // award_quantized
    // =====================================================================

    #[test]
    fn test_award_quantized_below_one_quantum_credits_nothing() {
        let mut play = PlaySession::new(wallet(), 0);
        let mut user = User::new(wallet());
        play.points = 14;
        assert_eq!(award_quantized(&mut play, &mut user), 0);
        assert_eq!(user.saved_points_total, 0);
        assert_eq!(play.points_awarded, 0);
    }

    #[test]
    fn test_award_quantized_credits_only_the_delta_above_watermark() {
        let mut play = PlaySession::new(wallet(), 0);
        let mut user = User::new(wallet());
        play.points = 47;
        play.points_awarded = 30;
        assert_eq!(award_quantized(&mut play, &mut user), 15);
        assert_eq!(user.saved_points_total, 15);
        assert_eq!(play.points_awarded, 45);
    }

    #[test]
    fn test_award_quantized_at_watermark_is_noop() {
        let mut play = PlaySession::new(wallet(), 0);
        let mut user = User::new(wallet());
        play.points = 22;
        play.points_awarded = 15;
        assert_eq!(award_quantized(&mut play, &mut user), 0);
        assert_eq!(user.saved_points_total, 0);
        assert_eq!(play.points_awarded, 15);
    }

    // =====================================================================
    // report_progress
    // =====================================================================

    #[tokio::test]
    async fn test_report_progress_crosses_quantum_awards_once() {
        // 7 then 10 (cumulative 17) crosses the quantum exactly once and
        // awards 15; 5 more (cumulative 22) awards nothing further.
        let state = seeded_state();
        let ledger = ledger(Arc::clone(&state));

        let r = ledger.report_progress(&play_id(), 7).await.unwrap();
        assert_eq!((r.points, r.saved_points_total), (7, 0));

        let r = ledger.report_progress(&play_id(), 10).await.unwrap();
        assert_eq!((r.points, r.saved_points_total), (17, 15));

        let r = ledger.report_progress(&play_id(), 5).await.unwrap();
        assert_eq!((r.points, r.saved_points_total), (22, 15));

        let watermark = state
            .read(|s| s.play_session(&play_id()).unwrap().points_awarded)
            .await
            .unwrap();
        assert_eq!(watermark, 15);
    }

    #[tokio::test]
    async fn test_report_progress_rechunking_awards_same_total() {
        // Total credit depends only on the cumulative sum, not on how the
        // deltas were chunked.
        for chunks in [vec![61], vec![1; 61], vec![20, 20, 20, 1], vec![15, 15, 15, 15, 1]] {
            let state = seeded_state();
            let ledger = ledger(Arc::clone(&state));
            for chunk in chunks {
                ledger.report_progress(&play_id(), chunk).await.unwrap();
            }
            let total = state
                .read(|s| s.users[&wallet()].saved_points_total)
                .await
                .unwrap();
            assert_eq!(total, 60); // floor(61/15)*15
        }
    }

    #[tokio::test]
    async fn test_report_progress_increments_achievements_unquantized() {
        let state = seeded_state();
        let ledger = ledger(Arc::clone(&state));
        ledger.report_progress(&play_id(), 7).await.unwrap();
        ledger.report_progress(&play_id(), 4).await.unwrap();
        let achievements = state
            .read(|s| s.users[&wallet()].total_achievements)
            .await
            .unwrap();
        assert_eq!(achievements, 11);
    }

    #[tokio::test]
    async fn test_report_progress_zero_delta_fails_invalid() {
        let ledger = ledger(seeded_state());
        assert!(matches!(
            ledger.report_progress(&play_id(), 0).await,
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_report_progress_unknown_session_fails_not_found() {
        let ledger = ledger(seeded_state());
        assert!(matches!(
            ledger.report_progress(&SessionId::from("missing"), 3).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_report_progress_challenge_id_fails_not_found() {
        let state = seeded_state();
        let nonce = SessionId::from("a-nonce");
        state
            .update::<_, LedgerError, _>(|s| {
                s.sessions
                    .insert(nonce.clone(), Session::Challenge { expires_at: u64::MAX });
                Ok(())
            })
            .await
            .unwrap();
        let ledger = ledger(state);
        assert!(matches!(
            ledger.report_progress(&nonce, 3).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_report_progress_ended_session_fails_not_alive() {
        let state = seeded_state();
        state
            .update::<_, LedgerError, _>(|s| {
                s.sessions
                    .get_mut(&play_id())
                    .and_then(Session::as_play_mut)
                    .unwrap()
                    .is_alive = false;
                Ok(())
            })
            .await
            .unwrap();
        let ledger = ledger(state);
        assert!(matches!(
            ledger.report_progress(&play_id(), 3).await,
            Err(LedgerError::NotAlive(_))
        ));
    }

    // =====================================================================
    // convert
    // =====================================================================

    #[tokio::test]
    async fn test_convert_debits_exactly_and_credits_tokens() {
        // 2000 saved points buy exactly 2 tokens; the account is then
        // drained and a further conversion fails.
        let state = seeded_state();
        state
            .update::<_, LedgerError, _>(|s| {
                s.users.get_mut(&wallet()).unwrap().saved_points_total = 2000;
                Ok(())
            })
            .await
            .unwrap();
        let ledger = ledger(Arc::clone(&state));

        let user = ledger.convert(&wallet(), 2).await.unwrap();
        assert_eq!(user.saved_points_total, 0);
        assert_eq!(user.hay_balance, 2);

        let again = ledger.convert(&wallet(), 1).await;
        assert!(matches!(
            again,
            Err(LedgerError::InsufficientPoints { available: 0 })
        ));
    }

    #[tokio::test]
    async fn test_convert_insufficient_points_reports_available() {
        let state = seeded_state();
        state
            .update::<_, LedgerError, _>(|s| {
                s.users.get_mut(&wallet()).unwrap().saved_points_total = 999;
                Ok(())
            })
            .await
            .unwrap();
        let ledger = ledger(state);
        assert!(matches!(
            ledger.convert(&wallet(), 1).await,
            Err(LedgerError::InsufficientPoints { available: 999 })
        ));
    }

    #[tokio::test]
    async fn test_convert_zero_tokens_fails_invalid() {
        let ledger = ledger(seeded_state());
        assert!(matches!(
            ledger.convert(&wallet(), 0).await,
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_convert_unknown_user_fails() {
        let ledger = ledger(seeded_state());
        assert!(matches!(
            ledger.convert(&WalletId::from("nobody"), 1).await,
            Err(LedgerError::UnknownUser(_))
        ));
    }

    // =====================================================================
    // withdraw
    // =====================================================================

    async fn state_with_balance(balance: u64) -> Arc<StateHandle<MemoryStore>> {
        let state = seeded_state();
        state
            .update::<_, LedgerError, _>(|s| {
                s.users.get_mut(&wallet()).unwrap().hay_balance = balance;
                Ok(())
            })
            .await
            .unwrap();
        state
    }

    #[tokio::test]
    async fn test_withdraw_below_minimum_fails() {
        let ledger = ledger(state_with_balance(500).await);
        assert!(matches!(
            ledger.withdraw(&wallet(), 99).await,
            Err(LedgerError::BelowMinimum { minimum: 100 })
        ));
    }

    #[tokio::test]
    async fn test_withdraw_insufficient_balance_fails() {
        let ledger = ledger(state_with_balance(50).await);
        assert!(matches!(
            ledger.withdraw(&wallet(), 100).await,
            Err(LedgerError::InsufficientBalance { available: 50 })
        ));
    }

    #[tokio::test]
    async fn test_withdraw_debits_exactly_and_stamps_timestamp() {
        let state = state_with_balance(500).await;
        let ledger = ledger(Arc::clone(&state));

        let user = ledger.withdraw(&wallet(), 150).await.unwrap();

        assert_eq!(user.hay_balance, 350);
        assert!(user.last_withdrawal_at.is_some());
    }

    #[tokio::test]
    async fn test_withdraw_delivered_notification_clears_pending() {
        let state = state_with_balance(500).await;
        let notifier = leak(SwitchNotifier::delivering());
        let ledger = PointsLedger::new(Arc::clone(&state), notifier);

        ledger.withdraw(&wallet(), 150).await.unwrap();

        let pending = state.read(|s| s.pending_withdrawals.len()).await.unwrap();
        assert_eq!(pending, 0);
        let seen = notifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].amount, 150);
        assert_eq!(seen[0].wallet_address, wallet());
    }

    #[tokio::test]
    async fn test_withdraw_failed_notification_keeps_debit_and_pending() {
        let state = state_with_balance(500).await;
        let notifier = leak(SwitchNotifier::default()); // sink offline
        let ledger = PointsLedger::new(Arc::clone(&state), notifier);

        let user = ledger.withdraw(&wallet(), 150).await.unwrap();

        // The debit stands; the notice waits for the retry loop.
        assert_eq!(user.hay_balance, 350);
        let pending = state.read(|s| s.pending_withdrawals.clone()).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].amount, 150);
    }

    #[tokio::test]
    async fn test_retry_pending_drains_queue_once_sink_recovers() {
        let state = state_with_balance(500).await;
        let notifier = leak(SwitchNotifier::default());
        let ledger = PointsLedger::new(Arc::clone(&state), notifier);

        ledger.withdraw(&wallet(), 150).await.unwrap();
        assert_eq!(ledger.retry_pending().await.unwrap(), 0);

        notifier.deliverable.store(true, Ordering::SeqCst);
        assert_eq!(ledger.retry_pending().await.unwrap(), 1);

        let pending = state.read(|s| s.pending_withdrawals.len()).await.unwrap();
        assert_eq!(pending, 0);
        // Delivered exactly once despite the earlier failed attempt.
        assert_eq!(notifier.seen.lock().unwrap().len(), 1);
    }
}
