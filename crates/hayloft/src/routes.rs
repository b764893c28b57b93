//! HTTP routes and the error→status mapping.
//!
//! Handlers are thin: validate the body, call one component operation,
//! wrap the result in its response DTO. All domain decisions live in the
//! component crates; all HTTP decisions live here.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Path, Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use tower_governor::GovernorLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use hayloft_auth::{AuthError, ChallengeProof, SignatureVerifier};
use hayloft_ledger::{LedgerError, WithdrawalNotifier};
use hayloft_rank::RankError;
use hayloft_session::{Heartbeat, SessionError};
use hayloft_store::{PersistenceStore, User, WalletId};

use crate::dto::*;
use crate::server::{App, IpGovernorConfig};

/// Leaderboard responses are truncated to this many rows.
pub const LEADERBOARD_SIZE: usize = 10;

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// An HTTP-mapped failure. Every handler error funnels through here so
/// the status taxonomy lives in one place.
#[derive(Debug)]
pub(crate) enum ApiError {
    /// Malformed input or an operation invalid for the current state.
    BadRequest(String),

    /// Unknown session, user, or route target.
    NotFound(String),

    /// Persistence failed; the in-memory mutation was discarded.
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::BadRequest(error) => (StatusCode::BAD_REQUEST, error),
            Self::NotFound(error) => (StatusCode::NOT_FOUND, error),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error. Please try again.".to_string(),
            ),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            // The client is told only that the nonce is unusable, not why.
            AuthError::NotFound(_) | AuthError::Expired(_) | AuthError::WrongVariant(_) => {
                Self::BadRequest("Invalid or expired nonce".into())
            }
            AuthError::Unverified(_) => Self::BadRequest("Signature verification failed".into()),
            AuthError::Store(e) => internal(e),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) | SessionError::WrongVariant(_) => {
                Self::NotFound("Invalid session".into())
            }
            SessionError::InvalidWallet(_) => Self::BadRequest("Invalid wallet address".into()),
            SessionError::UnknownUser(_) => Self::NotFound("User not found".into()),
            SessionError::Store(e) => internal(e),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidAmount(reason) => Self::BadRequest(reason.to_string()),
            LedgerError::NotFound(_) => Self::NotFound("Invalid session".into()),
            LedgerError::NotAlive(_) => Self::BadRequest("Session not alive".into()),
            LedgerError::UnknownUser(_) => Self::NotFound("User not found".into()),
            LedgerError::InsufficientPoints { available } => {
                Self::BadRequest(format!("Insufficient saved points ({available})"))
            }
            LedgerError::InsufficientBalance { available } => {
                Self::BadRequest(format!("Insufficient balance ({available})"))
            }
            LedgerError::BelowMinimum { minimum } => {
                Self::BadRequest(format!("Minimum withdrawal is {minimum} HAY"))
            }
            LedgerError::Store(e) => internal(e),
        }
    }
}

impl From<RankError> for ApiError {
    fn from(e: RankError) -> Self {
        match e {
            RankError::NotFound(_) => Self::NotFound("Invalid session".into()),
            RankError::UnknownUser(_) => Self::NotFound("User not found".into()),
            RankError::Store(e) => internal(e),
        }
    }
}

fn internal(e: hayloft_store::StoreError) -> ApiError {
    tracing::error!(error = %e, "snapshot store failure");
    ApiError::Internal
}

// ---------------------------------------------------------------------------
// Json extraction
// ---------------------------------------------------------------------------

/// `Json` that rejects malformed bodies with a 400 error envelope
/// instead of axum's default 422.
pub(crate) struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn issue_nonce<S, V, N>(
    State(app): State<App<S, V, N>>,
) -> Result<Json<NonceResponse>, ApiError>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    let challenge = app.auth.issue_challenge().await?;
    Ok(Json(NonceResponse {
        nonce: challenge.nonce,
        message: challenge.message,
    }))
}

async fn connect<S, V, N>(
    State(app): State<App<S, V, N>>,
    ApiJson(req): ApiJson<ConnectRequest>,
) -> Result<Json<SessionUserResponse>, ApiError>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    let wallet = WalletId(req.wallet_address);
    let proof = ChallengeProof {
        signed: req.signed,
        signature: req.signature,
    };
    let wallet = app.auth.consume_challenge(&wallet, &req.nonce, &proof).await?;
    let session_id = app.sessions.start_session(&wallet).await?;
    let user = app.sessions.user_for_session(&session_id).await?;
    Ok(Json(SessionUserResponse { session_id, user }))
}

async fn update_wallet<S, V, N>(
    State(app): State<App<S, V, N>>,
    ApiJson(req): ApiJson<WalletUpdateRequest>,
) -> Result<Json<SessionUserResponse>, ApiError>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    let user = app
        .sessions
        .rebind_wallet(&req.session_id, &WalletId(req.new_wallet_address))
        .await?;
    Ok(Json(SessionUserResponse {
        session_id: req.session_id,
        user,
    }))
}

async fn heartbeat<S, V, N>(
    State(app): State<App<S, V, N>>,
    ApiJson(req): ApiJson<SessionRequest>,
) -> Result<Json<HeartbeatResponse>, ApiError>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    let response = match app.sessions.heartbeat(&req.session_id).await? {
        Heartbeat::Alive {
            elapsed_ms,
            points,
            user,
        } => HeartbeatResponse {
            status: "alive",
            elapsed_ms,
            points: Some(points),
            user: Some(user),
        },
        Heartbeat::Ended { elapsed_ms } => HeartbeatResponse {
            status: "dead",
            elapsed_ms,
            points: None,
            user: None,
        },
    };
    Ok(Json(response))
}

async fn progress<S, V, N>(
    State(app): State<App<S, V, N>>,
    ApiJson(req): ApiJson<ProgressRequest>,
) -> Result<Json<ProgressResponse>, ApiError>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    let receipt = app.ledger.report_progress(&req.session_id, req.passed).await?;
    Ok(Json(ProgressResponse {
        ok: true,
        points: receipt.points,
        saved_points_total: receipt.saved_points_total,
        user: receipt.user,
    }))
}

async fn game_over<S, V, N>(
    State(app): State<App<S, V, N>>,
    ApiJson(req): ApiJson<SessionRequest>,
) -> Result<Json<OkUserResponse>, ApiError>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    let user = app.sessions.end_round(&req.session_id, false).await?;
    Ok(Json(OkUserResponse { ok: true, user }))
}

async fn disconnect<S, V, N>(
    State(app): State<App<S, V, N>>,
    ApiJson(req): ApiJson<SessionRequest>,
) -> Result<Json<OkUserResponse>, ApiError>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    let user = app.sessions.end_round(&req.session_id, true).await?;
    Ok(Json(OkUserResponse { ok: true, user }))
}

async fn save_score<S, V, N>(
    State(app): State<App<S, V, N>>,
    ApiJson(req): ApiJson<SaveScoreRequest>,
) -> Result<Json<OkUserResponse>, ApiError>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    let user = app.rank.record_score(&req.session_id, req.score).await?;
    Ok(Json(OkUserResponse { ok: true, user }))
}

async fn convert<S, V, N>(
    State(app): State<App<S, V, N>>,
    ApiJson(req): ApiJson<ConvertRequest>,
) -> Result<Json<OkUserResponse>, ApiError>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    let user = app
        .ledger
        .convert(&WalletId(req.wallet_address), req.tokens)
        .await?;
    Ok(Json(OkUserResponse { ok: true, user }))
}

async fn withdraw<S, V, N>(
    State(app): State<App<S, V, N>>,
    ApiJson(req): ApiJson<WithdrawRequest>,
) -> Result<Json<OkUserResponse>, ApiError>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    let user = app
        .ledger
        .withdraw(&WalletId(req.wallet_address), req.amount)
        .await?;
    Ok(Json(OkUserResponse { ok: true, user }))
}

async fn user_by_wallet<S, V, N>(
    State(app): State<App<S, V, N>>,
    Path(wallet): Path<String>,
) -> Result<Json<User>, ApiError>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    let wallet = WalletId(wallet);
    let user = app
        .state
        .read(|snapshot| snapshot.users.get(&wallet).cloned())
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(user))
}

async fn user_by_session<S, V, N>(
    State(app): State<App<S, V, N>>,
    ApiJson(req): ApiJson<SessionRequest>,
) -> Result<Json<UserBySessionResponse>, ApiError>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    let user = app.sessions.user_for_session(&req.session_id).await?;
    Ok(Json(UserBySessionResponse {
        user,
        session_id: req.session_id,
    }))
}

async fn leaderboard<S, V, N>(
    State(app): State<App<S, V, N>>,
) -> Result<Json<LeaderboardResponse>, ApiError>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    let players = app.rank.top(LEADERBOARD_SIZE).await?;
    Ok(Json(LeaderboardResponse { players }))
}

// ---------------------------------------------------------------------------
// Router assembly
// ---------------------------------------------------------------------------

/// Builds the full API router over the shared application state.
///
/// Layering, outermost first: trace → CORS → rate limiting → routes.
/// Pass `governor: None` to disable rate limiting (tests).
pub fn router<S, V, N>(app: App<S, V, N>, governor: Option<Arc<IpGovernorConfig>>) -> Router
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    let router = Router::new()
        .route("/api/nonce", get(issue_nonce::<S, V, N>))
        .route("/api/connect", post(connect::<S, V, N>))
        .route("/api/update-wallet", post(update_wallet::<S, V, N>))
        .route("/api/heartbeat", post(heartbeat::<S, V, N>))
        .route("/api/progress", post(progress::<S, V, N>))
        .route("/api/gameover", post(game_over::<S, V, N>))
        .route("/api/save-score", post(save_score::<S, V, N>))
        .route("/api/convert", post(convert::<S, V, N>))
        .route("/api/withdraw", post(withdraw::<S, V, N>))
        .route("/api/disconnect", post(disconnect::<S, V, N>))
        .route("/api/leaderboard", get(leaderboard::<S, V, N>))
        .route("/api/user/:wallet", get(user_by_wallet::<S, V, N>))
        .route("/api/user-by-session", post(user_by_session::<S, V, N>));

    let router = match governor {
        Some(config) => router.layer(GovernorLayer { config }),
        None => router,
    };

    router
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}
