//! Wire DTOs for the HTTP API.
//!
//! These are the request and response shapes the game client speaks —
//! field names are part of the contract and stay camelCase on the wire.
//! The full [`User`] record is embedded whole in most responses, so the
//! client can refresh its view of balances after any mutation.

use hayloft_rank::RankEntry;
use hayloft_store::{SessionId, User};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `POST /api/connect` — redeem a login challenge.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    /// The wallet claiming the challenge.
    pub wallet_address: String,

    /// The nonce from `GET /api/nonce`.
    pub nonce: SessionId,

    /// The client's affirmation that it signed the challenge message.
    #[serde(default)]
    pub signed: bool,

    /// The signature payload, if the verifier wants one.
    #[serde(default)]
    pub signature: Option<String>,
}

/// Body of `POST /api/update-wallet` — rebind a session to another wallet.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletUpdateRequest {
    pub session_id: SessionId,
    pub new_wallet_address: String,
}

/// Body of the session-keyed operations: heartbeat, gameover,
/// disconnect, user-by-session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: SessionId,
}

/// Body of `POST /api/progress` — obstacles passed since the last report.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub session_id: SessionId,
    pub passed: u64,
}

/// Body of `POST /api/save-score`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveScoreRequest {
    pub session_id: SessionId,
    pub score: u64,
}

/// Body of `POST /api/convert` — saved points into HAY tokens.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    pub wallet_address: String,
    pub tokens: u64,
}

/// Body of `POST /api/withdraw`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub wallet_address: String,
    pub amount: u64,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Response to `GET /api/nonce`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceResponse {
    pub nonce: SessionId,
    pub message: String,
}

/// Response carrying a session id and its user — connect and
/// update-wallet.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUserResponse {
    pub session_id: SessionId,
    pub user: User,
}

/// Response to `POST /api/heartbeat`.
///
/// `points` and `user` are present only while the session is alive; a
/// dead session answers with just its final elapsed time.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    /// `"alive"` or `"dead"`.
    pub status: &'static str,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// Response to `POST /api/progress`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub ok: bool,
    pub points: u64,
    pub saved_points_total: u64,
    pub user: User,
}

/// Generic mutation acknowledgement carrying the refreshed user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OkUserResponse {
    pub ok: bool,
    pub user: User,
}

/// Response to `POST /api/user-by-session`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBySessionResponse {
    pub user: User,
    pub session_id: SessionId,
}

/// Response to `GET /api/leaderboard`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub players: Vec<RankEntry>,
}

/// Error envelope for every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// =========================================================================
// Tests
// =========================================================================
