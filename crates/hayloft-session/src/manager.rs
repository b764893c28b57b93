//! The session manager: owns the play-session state machine.
//!
//! Per session id the lifecycle is:
//!
//! ```text
//!   Challenge ──(consumed)──→ Play{alive} ──(end)──→ Play{ended}
//!                                  │                      │
//!                                  │ (no heartbeat        │ (disconnect)
//!                                  │  within grace)       ▼
//!                                  └────→ sweep()      deleted
//! ```
//!
//! - **Play{alive}**: heartbeats accrue server-trusted elapsed time,
//!   progress reports accrue points.
//! - **Play{ended}**: terminal. Late heartbeats are answered without
//!   mutation, a second end is a no-op, and the record may be retained
//!   (game over) or deleted (disconnect).
//!
//! The manager holds no session state of its own — every call is one
//! atomic read-mutate-write cycle through the shared [`StateHandle`].

use std::sync::Arc;

use hayloft_ledger::award_quantized;
use hayloft_store::{
    now_ms, PersistenceStore, PlaySession, Session, SessionId, Snapshot, StateHandle, User,
    WalletId,
};

use crate::{SessionConfig, SessionError};

/// Outcome of a heartbeat.
#[derive(Debug, Clone)]
pub enum Heartbeat {
    /// The session is alive; elapsed time advanced by the clamped delta.
    Alive {
        /// Server-trusted play duration after this heartbeat.
        elapsed_ms: u64,
        /// Raw points reported so far this round.
        points: u64,
        /// The owning user, post-update.
        user: User,
    },

    /// The session has ended. Nothing was mutated.
    Ended {
        /// The final server-trusted play duration.
        elapsed_ms: u64,
    },
}

/// What a liveness sweep touched.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Alive sessions ended for missing their heartbeat window.
    pub ended: Vec<SessionId>,

    /// Challenges deleted for passing their redemption deadline.
    pub expired_challenges: Vec<SessionId>,
}

/// Manages the lifecycle of all play sessions.
pub struct SessionManager<S> {
    state: Arc<StateHandle<S>>,
    config: SessionConfig,
}

impl<S: PersistenceStore> SessionManager<S> {
    /// Creates a manager over the shared state handle.
    pub fn new(state: Arc<StateHandle<S>>, config: SessionConfig) -> Self {
        Self { state, config }
    }

    /// Mints an alive play session bound to `wallet`, creating the user
    /// record with all-zero defaults if this is their first session.
    pub async fn start_session(&self, wallet: &WalletId) -> Result<SessionId, SessionError> {
        let session_id = SessionId::generate();
        self.state
            .update(|snapshot| {
                snapshot.user_or_create(wallet);
                snapshot.sessions.insert(
                    session_id.clone(),
                    Session::Play(PlaySession::new(wallet.clone(), now_ms())),
                );
                Ok::<_, SessionError>(())
            })
            .await?;

        tracing::info!(%wallet, session = %session_id, "play session started");
        Ok(session_id)
    }

    /// Advances a session's server-trusted clock.
    ///
    /// The credited delta is `clamp(now - last_heartbeat_at, 0, clamp)`,
    /// so neither client clock skew nor a long stall can inflate elapsed
    /// time. A heartbeat against an ended session returns
    /// [`Heartbeat::Ended`] without mutating anything — late heartbeats
    /// are an expected no-op, not an error.
    pub async fn heartbeat(&self, session_id: &SessionId) -> Result<Heartbeat, SessionError> {
        let clamp = self.config.heartbeat_clamp.as_millis() as u64;
        self.state
            .update(|snapshot| {
                let Snapshot {
                    users, sessions, ..
                } = snapshot;

                let play = match sessions.get_mut(session_id) {
                    Some(Session::Play(play)) => play,
                    Some(Session::Challenge { .. }) => {
                        return Err(SessionError::WrongVariant(session_id.clone()));
                    }
                    None => return Err(SessionError::NotFound(session_id.clone())),
                };

                if !play.is_alive {
                    return Ok(Heartbeat::Ended {
                        elapsed_ms: play.elapsed_server_ms,
                    });
                }

                let now = now_ms();
                let delta = now.saturating_sub(play.last_heartbeat_at).min(clamp);
                play.elapsed_server_ms += delta;
                play.last_heartbeat_at = now;

                let user = users
                    .get(&play.wallet_address)
                    .cloned()
                    .ok_or_else(|| SessionError::UnknownUser(play.wallet_address.clone()))?;

                Ok(Heartbeat::Alive {
                    elapsed_ms: play.elapsed_server_ms,
                    points: play.points,
                    user,
                })
            })
            .await
    }

    /// Rebinds a session to a different wallet (wallet switch in the
    /// extension UI), creating the target user if absent.
    ///
    /// In-flight round progress is abandoned: `points` and
    /// `points_awarded` reset to zero, so neither the old nor the new
    /// owner is credited for the interrupted round. Rebinding to the
    /// current wallet is a no-op.
    pub async fn rebind_wallet(
        &self,
        session_id: &SessionId,
        new_wallet: &WalletId,
    ) -> Result<User, SessionError> {
        if new_wallet.as_str().len() < self.config.min_wallet_len {
            return Err(SessionError::InvalidWallet(new_wallet.clone()));
        }

        let (user, switched) = self
            .state
            .update(|snapshot| {
                let Snapshot {
                    users, sessions, ..
                } = snapshot;

                let play = match sessions.get_mut(session_id) {
                    Some(Session::Play(play)) => play,
                    Some(Session::Challenge { .. }) => {
                        return Err(SessionError::WrongVariant(session_id.clone()));
                    }
                    None => return Err(SessionError::NotFound(session_id.clone())),
                };

                let switched = play.wallet_address != *new_wallet;
                if switched {
                    play.wallet_address = new_wallet.clone();
                    play.points = 0;
                    play.points_awarded = 0;
                }

                let user = users
                    .entry(new_wallet.clone())
                    .or_insert_with(|| User::new(new_wallet.clone()));
                Ok((user.clone(), switched))
            })
            .await?;

        if switched {
            tracing::info!(session = %session_id, wallet = %new_wallet, "session rebound, round progress abandoned");
        }
        Ok(user)
    }

    /// Ends a round: flushes remaining eligible points into the user's
    /// durable credit, zeroes the round counters, and marks the session
    /// dead.
    ///
    /// Idempotent — ending an ended session performs no settlement and
    /// still returns the owning user. `remove` deletes the record
    /// (disconnect); otherwise it is retained closed (game over). Any
    /// remainder below one quantum is forfeited.
    pub async fn end_round(
        &self,
        session_id: &SessionId,
        remove: bool,
    ) -> Result<User, SessionError> {
        let (user, flushed) = self
            .state
            .update(|snapshot| {
                let Snapshot {
                    users, sessions, ..
                } = snapshot;

                let play = match sessions.get_mut(session_id) {
                    Some(Session::Play(play)) => play,
                    Some(Session::Challenge { .. }) => {
                        return Err(SessionError::WrongVariant(session_id.clone()));
                    }
                    None => return Err(SessionError::NotFound(session_id.clone())),
                };

                let wallet = play.wallet_address.clone();
                let user = users
                    .get_mut(&wallet)
                    .ok_or_else(|| SessionError::UnknownUser(wallet.clone()))?;

                let mut flushed = 0;
                if play.is_alive {
                    flushed = award_quantized(play, user);
                    play.points = 0;
                    play.points_awarded = 0;
                    play.is_alive = false;
                }

                let user = user.clone();
                if remove {
                    sessions.remove(session_id);
                }
                Ok((user, flushed))
            })
            .await?;

        tracing::info!(
            session = %session_id,
            wallet = %user.wallet_address,
            flushed,
            removed = remove,
            "round ended"
        );
        Ok(user)
    }

    /// Read-only lookup of the user a session is bound to.
    pub async fn user_for_session(&self, session_id: &SessionId) -> Result<User, SessionError> {
        self.state
            .read(|snapshot| match snapshot.sessions.get(session_id) {
                Some(Session::Play(play)) => snapshot
                    .users
                    .get(&play.wallet_address)
                    .cloned()
                    .ok_or_else(|| SessionError::UnknownUser(play.wallet_address.clone())),
                Some(Session::Challenge { .. }) => {
                    Err(SessionError::WrongVariant(session_id.clone()))
                }
                None => Err(SessionError::NotFound(session_id.clone())),
            })
            .await?
    }

    /// Liveness sweep: ends alive sessions whose last heartbeat is older
    /// than the grace window (retaining them closed) and deletes expired
    /// challenges. Scheduled externally on a fixed interval.
    pub async fn sweep(&self) -> Result<SweepReport, SessionError> {
        let grace = self.config.liveness_grace.as_millis() as u64;
        let report = self
            .state
            .update(|snapshot| {
                let now = now_ms();
                let Snapshot {
                    users, sessions, ..
                } = snapshot;

                let mut report = SweepReport::default();
                for (id, session) in sessions.iter() {
                    match session {
                        Session::Challenge { expires_at } if *expires_at < now => {
                            report.expired_challenges.push(id.clone());
                        }
                        Session::Play(play)
                            if play.is_alive
                                && now.saturating_sub(play.last_heartbeat_at) > grace =>
                        {
                            report.ended.push(id.clone());
                        }
                        _ => {}
                    }
                }

                for id in &report.expired_challenges {
                    sessions.remove(id);
                }
                for id in &report.ended {
                    let Some(Session::Play(play)) = sessions.get_mut(id) else {
                        continue;
                    };
                    if let Some(user) = users.get_mut(&play.wallet_address) {
                        award_quantized(play, user);
                    }
                    play.points = 0;
                    play.points_awarded = 0;
                    play.is_alive = false;
                }

                Ok::<_, SessionError>(report)
            })
            .await?;

        if !report.ended.is_empty() || !report.expired_challenges.is_empty() {
            tracing::info!(
                ended = report.ended.len(),
                expired_challenges = report.expired_challenges.len(),
                "liveness sweep"
            );
        }
        Ok(report)
    }
}
