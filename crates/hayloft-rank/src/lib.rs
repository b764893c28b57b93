//! Leaderboard index for Hayloft.
//!
//! A derived, read-only ranking over user best scores. The index owns
//! nothing: `top` reads whatever user state exists at call time, and
//! `record_score` is the single write path that feeds it (the high-water
//! mark behind the game's "save score" call).

use std::sync::Arc;

use hayloft_store::{
    PersistenceStore, Session, SessionId, StateHandle, StoreError, User, WalletId,
};
use serde::{Deserialize, Serialize};

/// Errors that can occur while ranking or recording scores.
#[derive(Debug, thiserror::Error)]
pub enum RankError {
    /// No play session exists for the given id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The session points at a user record that does not exist.
    #[error("user {0} not found")]
    UnknownUser(WalletId),

    /// The snapshot could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    /// Whose score this is.
    pub wallet_address: WalletId,

    /// Their best score.
    pub best_score: u64,
}

/// Derived ranking over user best scores.
pub struct LeaderboardIndex<S> {
    state: Arc<StateHandle<S>>,
}

impl<S: PersistenceStore> LeaderboardIndex<S> {
    /// Creates an index over the shared state handle.
    pub fn new(state: Arc<StateHandle<S>>) -> Self {
        Self { state }
    }

    /// The top `n` users by best score, descending.
    ///
    /// Users who have never scored (`best_score == 0`) are excluded.
    /// Ties break by wallet address so the ordering is stable across
    /// calls — map iteration order is not.
    pub async fn top(&self, n: usize) -> Result<Vec<RankEntry>, RankError> {
        let mut entries = self
            .state
            .read(|snapshot| {
                snapshot
                    .users
                    .values()
                    .filter(|user| user.best_score > 0)
                    .map(|user| RankEntry {
                        wallet_address: user.wallet_address.clone(),
                        best_score: user.best_score,
                    })
                    .collect::<Vec<_>>()
            })
            .await?;

        entries.sort_by(|a, b| {
            b.best_score
                .cmp(&a.best_score)
                .then_with(|| a.wallet_address.cmp(&b.wallet_address))
        });
        entries.truncate(n);
        Ok(entries)
    }

    /// Records a round score for the session's user: `current_score` is
    /// set unconditionally, `best_score` only rises.
    pub async fn record_score(
        &self,
        session_id: &SessionId,
        score: u64,
    ) -> Result<User, RankError> {
        let user = self
            .state
            .update(|snapshot| {
                let wallet = match snapshot.sessions.get(session_id) {
                    Some(Session::Play(play)) => play.wallet_address.clone(),
                    Some(Session::Challenge { .. }) | None => {
                        return Err(RankError::NotFound(session_id.clone()));
                    }
                };
                let user = snapshot
                    .users
                    .get_mut(&wallet)
                    .ok_or_else(|| RankError::UnknownUser(wallet.clone()))?;
                user.current_score = score;
                user.best_score = user.best_score.max(score);
                Ok(user.clone())
            })
            .await?;

        tracing::debug!(wallet = %user.wallet_address, score, best = user.best_score, "score recorded");
        Ok(user)
    }
}

// =========================================================================
// Tests
// =========================================================================
