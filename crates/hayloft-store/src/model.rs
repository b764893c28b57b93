//! The durable data model: users, sessions, and the snapshot that holds them.
//!
//! Everything the server knows lives in one [`Snapshot`] — a single
//! versionable document of users and sessions (plus the pending-withdrawal
//! queue). Components never keep their own long-lived copies: they read the
//! snapshot, mutate it in memory, and write it back through the store.

use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A user's stable wallet address. Acts as the primary key for [`User`].
///
/// Opaque to the server — we never parse it, only compare and store it.
/// Newtype wrapper so a wallet can't be confused with a session token in
/// a function signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(pub String);

impl WalletId {
    /// Borrows the raw address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WalletId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Key for a [`Session`] record — a login nonce or a play-session token.
///
/// Generated server-side as a 32-character hex string (128 bits of
/// randomness), so guessing a live session id is computationally
/// infeasible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let bytes: [u8; 16] = rng.random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Borrows the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// All persisted timestamps use this representation so the snapshot stays
/// meaningful across restarts (a monotonic clock would not).
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A player's durable account state, keyed by wallet address.
///
/// Balance invariants:
/// - `saved_points_total` grows only in multiples of the award quantum and
///   shrinks only by an exact conversion debit.
/// - `hay_balance` grows only by conversion credits and shrinks only by
///   withdrawal debits.
/// - `best_score` is a high-water mark: it never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The wallet address, duplicated from the map key so the record is
    /// self-describing when returned whole in API responses.
    pub wallet_address: WalletId,

    /// Highest score ever recorded for this user.
    pub best_score: u64,

    /// Score reported for the most recent round, updated unconditionally.
    pub current_score: u64,

    /// Spendable point credit. Mutated only by quantized awards and
    /// conversion debits.
    pub saved_points_total: u64,

    /// HAY token balance, credited by conversion and debited by withdrawal.
    pub hay_balance: u64,

    /// Lifetime count of reported progress units. Not quantized.
    pub total_achievements: u64,

    /// When the user last withdrew, in ms since epoch. `None` until the
    /// first withdrawal.
    pub last_withdrawal_at: Option<u64>,
}

impl User {
    /// Creates a user with all-zero defaults for the given wallet.
    pub fn new(wallet: WalletId) -> Self {
        Self {
            wallet_address: wallet,
            best_score: 0,
            current_score: 0,
            saved_points_total: 0,
            hay_balance: 0,
            total_achievements: 0,
            last_withdrawal_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One round's server-tracked liveness and progress.
///
/// `elapsed_server_ms` is accumulated from server-observed heartbeat
/// deltas, so it cannot be inflated by client clock skew.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaySession {
    /// The user this round is attributed to.
    pub wallet_address: WalletId,

    /// When the session was minted, ms since epoch.
    pub started_at: u64,

    /// Server time of the most recent heartbeat, ms since epoch.
    pub last_heartbeat_at: u64,

    /// Server-trusted play duration, accumulated in clamped heartbeat
    /// deltas.
    pub elapsed_server_ms: u64,

    /// Liveness flag. Transitions `true → false` exactly once; a dead
    /// session is terminal and is never reactivated.
    pub is_alive: bool,

    /// Raw progress reported this round. Reset to zero when the round
    /// ends.
    pub points: u64,

    /// Watermark: the highest quantum multiple already credited to the
    /// user this round. Prevents double-crediting on repeated reports.
    pub points_awarded: u64,
}

impl PlaySession {
    /// Starts a fresh, alive session for `wallet` at time `now`.
    pub fn new(wallet: WalletId, now: u64) -> Self {
        Self {
            wallet_address: wallet,
            started_at: now,
            last_heartbeat_at: now,
            elapsed_server_ms: 0,
            is_alive: true,
            points: 0,
            points_awarded: 0,
        }
    }
}

/// A session record: either an unconsumed login challenge or a play
/// session.
///
/// Internally tagged so the persisted JSON carries an explicit `type`
/// discriminator, and so the variants are an exhaustive-match concern
/// rather than a runtime string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Session {
    /// Single-use login nonce. No user binding until it is consumed.
    Challenge {
        /// When the nonce stops being redeemable, ms since epoch.
        expires_at: u64,
    },

    /// An active or ended play session.
    Play(PlaySession),
}

impl Session {
    /// The play session inside, if this is one.
    pub fn as_play(&self) -> Option<&PlaySession> {
        match self {
            Session::Play(play) => Some(play),
            Session::Challenge { .. } => None,
        }
    }

    /// Mutable access to the play session inside, if this is one.
    pub fn as_play_mut(&mut self) -> Option<&mut PlaySession> {
        match self {
            Session::Play(play) => Some(play),
            Session::Challenge { .. } => None,
        }
    }

    /// `true` for a challenge whose deadline has passed.
    pub fn is_expired_challenge(&self, now: u64) -> bool {
        matches!(self, Session::Challenge { expires_at } if *expires_at < now)
    }
}

// ---------------------------------------------------------------------------
// Pending withdrawals
// ---------------------------------------------------------------------------

/// Reconciliation record for a withdrawal whose notification has not been
/// confirmed delivered yet.
///
/// Appended in the same atomic update as the balance debit, so a crash or
/// a notifier outage can never lose the event — the retry loop drains
/// these out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingWithdrawal {
    /// Unique id for this withdrawal event.
    pub id: SessionId,

    /// Who withdrew.
    pub wallet_address: WalletId,

    /// Amount debited, in HAY tokens.
    pub amount: u64,

    /// When the debit was committed, ms since epoch.
    pub requested_at: u64,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The whole durable state: every user, every session, and the pending
/// withdrawal queue.
///
/// This is the unit of persistence — the store loads and saves it whole,
/// never field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// All known users, keyed by wallet address.
    #[serde(default)]
    pub users: HashMap<WalletId, User>,

    /// All live session records (challenges and play sessions).
    #[serde(default)]
    pub sessions: HashMap<SessionId, Session>,

    /// Withdrawals awaiting notification delivery.
    #[serde(default)]
    pub pending_withdrawals: Vec<PendingWithdrawal>,
}

impl Snapshot {
    /// Returns the user for `wallet`, creating a zeroed record if absent.
    pub fn user_or_create(&mut self, wallet: &WalletId) -> &mut User {
        self.users
            .entry(wallet.clone())
            .or_insert_with(|| User::new(wallet.clone()))
    }

    /// Looks up the play session for `id`, if the record exists and is
    /// the play variant.
    pub fn play_session(&self, id: &SessionId) -> Option<&PlaySession> {
        self.sessions.get(id).and_then(Session::as_play)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The snapshot is a durable document — these tests pin its JSON
    //! shape so an upgraded server can still read state written by an
    //! older one.

    use super::*;

    #[test]
    fn test_session_id_generate_is_32_hex_chars() {
        let id = SessionId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_id_generate_is_unique() {
        // 128 bits of randomness: a collision here means the generator
        // is broken, not unlucky.
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn test_wallet_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&WalletId::from("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn test_challenge_serializes_with_type_tag() {
        let session = Session::Challenge { expires_at: 99 };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["type"], "challenge");
        assert_eq!(json["expiresAt"], 99);
    }

    #[test]
    fn test_play_session_serializes_with_type_tag_and_camel_case() {
        let session = Session::Play(PlaySession::new(WalletId::from("w".repeat(32).as_str()), 1_000));
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["type"], "play");
        assert_eq!(json["isAlive"], true);
        assert_eq!(json["elapsedServerMs"], 0);
        assert_eq!(json["pointsAwarded"], 0);
    }

    #[test]
    fn test_user_serializes_with_camel_case_fields() {
        let user = User::new(WalletId::from("someone"));
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["walletAddress"], "someone");
        assert_eq!(json["bestScore"], 0);
        assert_eq!(json["savedPointsTotal"], 0);
        assert_eq!(json["hayBalance"], 0);
        assert_eq!(json["lastWithdrawalAt"], serde_json::Value::Null);
    }

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let mut snapshot = Snapshot::default();
        let wallet = WalletId::from("wallet-round-trip");
        snapshot.user_or_create(&wallet).saved_points_total = 45;
        snapshot.sessions.insert(
            SessionId::from("nonce-1"),
            Session::Challenge { expires_at: 5 },
        );
        snapshot.sessions.insert(
            SessionId::from("play-1"),
            Session::Play(PlaySession::new(wallet.clone(), 7)),
        );
        snapshot.pending_withdrawals.push(PendingWithdrawal {
            id: SessionId::from("wd-1"),
            wallet_address: wallet,
            amount: 150,
            requested_at: 9,
        });

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_snapshot_deserializes_from_minimal_document() {
        // An older snapshot without the pending-withdrawal queue must
        // still load.
        let restored: Snapshot =
            serde_json::from_str(r#"{"users":{},"sessions":{}}"#).unwrap();
        assert!(restored.pending_withdrawals.is_empty());
    }

    #[test]
    fn test_is_expired_challenge() {
        let challenge = Session::Challenge { expires_at: 100 };
        assert!(!challenge.is_expired_challenge(100));
        assert!(challenge.is_expired_challenge(101));
        let play = Session::Play(PlaySession::new(WalletId::from("w"), 0));
        assert!(!play.is_expired_challenge(u64::MAX));
    }
}
