//! `HayloftServer` builder and run loop.
//!
//! Ties the layers together: one shared [`StateHandle`] feeds the auth,
//! session, ledger, and rank components; the axum router exposes them;
//! and two background tasks — the liveness sweep and the
//! withdrawal-notification retry — run for the life of the process.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use governor::middleware::NoOpMiddleware;
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor};

use hayloft_auth::{AuthConfig, NonceAuthenticator, SignatureVerifier};
use hayloft_ledger::{PointsLedger, WithdrawalNotifier};
use hayloft_rank::LeaderboardIndex;
use hayloft_session::{SessionConfig, SessionManager};
use hayloft_store::{PersistenceStore, StateHandle};

use crate::routes::router;
use crate::HayloftError;

/// Per-IP token-bucket rate limiter configuration, shared by every route.
pub type IpGovernorConfig =
    tower_governor::governor::GovernorConfig<SmartIpKeyExtractor, NoOpMiddleware>;

/// Shared application state: every component over one state handle.
///
/// Wrapped in `Arc` so each connection-handling task and background task
/// holds a cheap clone.
pub struct AppState<S, V, N> {
    /// Direct snapshot access for pure reads the components don't cover.
    pub state: Arc<StateHandle<S>>,
    pub auth: NonceAuthenticator<S, V>,
    pub sessions: SessionManager<S>,
    pub ledger: PointsLedger<S, N>,
    pub rank: LeaderboardIndex<S>,
}

/// Alias for the state as handlers receive it.
pub type App<S, V, N> = Arc<AppState<S, V, N>>;

impl<S, V, N> AppState<S, V, N>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    /// Assembles all components over `store`.
    pub fn new(
        store: S,
        verifier: V,
        notifier: N,
        auth_config: AuthConfig,
        session_config: SessionConfig,
    ) -> App<S, V, N> {
        let state = StateHandle::new(store);
        Arc::new(Self {
            auth: NonceAuthenticator::new(Arc::clone(&state), verifier, auth_config),
            sessions: SessionManager::new(Arc::clone(&state), session_config),
            ledger: PointsLedger::new(Arc::clone(&state), notifier),
            rank: LeaderboardIndex::new(Arc::clone(&state)),
            state,
        })
    }
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

/// Token-bucket parameters applied per client IP.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Steady-state requests per minute. 0 disables rate limiting.
    pub per_minute: u64,

    /// Bucket capacity — how many requests may burst at once.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 100,
            burst: 100,
        }
    }
}

/// Builds the governor config for the layer, or `None` when disabled.
pub fn governor_config(limits: &RateLimitConfig) -> Option<Arc<IpGovernorConfig>> {
    if limits.per_minute == 0 || limits.burst == 0 {
        return None;
    }
    // Convert per-minute rate to the period between replenished tokens.
    let nanos_per_request = (60_000_000_000u64 / limits.per_minute).max(1);
    GovernorConfigBuilder::default()
        .period(Duration::from_nanos(nanos_per_request))
        .burst_size(limits.burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .map(Arc::new)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a Hayloft server.
///
/// # Example
///
/// ```rust,ignore
/// let store = JsonFileStore::open("data/hayloft.json").await?;
/// let server = HayloftServer::builder()
///     .bind("0.0.0.0:3000")
///     .build(store, SignedProofVerifier, LogNotifier)
///     .await?;
/// server.run().await
/// ```
pub struct HayloftServerBuilder {
    bind_addr: String,
    auth_config: AuthConfig,
    session_config: SessionConfig,
    rate_limit: RateLimitConfig,
    sweep_interval: Duration,
    notify_retry_interval: Duration,
}

impl HayloftServerBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            auth_config: AuthConfig::default(),
            session_config: SessionConfig::default(),
            rate_limit: RateLimitConfig::default(),
            sweep_interval: Duration::from_secs(30),
            notify_retry_interval: Duration::from_secs(60),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the challenge-issuance configuration.
    pub fn auth_config(mut self, config: AuthConfig) -> Self {
        self.auth_config = config;
        self
    }

    /// Sets the session-lifecycle configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the per-IP rate limit.
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Sets how often the liveness sweep runs.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets how often undelivered withdrawal notifications are retried.
    pub fn notify_retry_interval(mut self, interval: Duration) -> Self {
        self.notify_retry_interval = interval;
        self
    }

    /// Binds the listener and assembles the server.
    pub async fn build<S, V, N>(
        self,
        store: S,
        verifier: V,
        notifier: N,
    ) -> Result<HayloftServer<S, V, N>, HayloftError>
    where
        S: PersistenceStore,
        V: SignatureVerifier,
        N: WithdrawalNotifier,
    {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        let app = AppState::new(
            store,
            verifier,
            notifier,
            self.auth_config,
            self.session_config,
        );
        Ok(HayloftServer {
            listener,
            app,
            governor: governor_config(&self.rate_limit),
            sweep_interval: self.sweep_interval,
            notify_retry_interval: self.notify_retry_interval,
        })
    }
}

impl Default for HayloftServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A configured Hayloft server, ready to serve.
pub struct HayloftServer<S, V, N> {
    listener: TcpListener,
    app: App<S, V, N>,
    governor: Option<Arc<IpGovernorConfig>>,
    sweep_interval: Duration,
    notify_retry_interval: Duration,
}

impl<S, V, N> HayloftServer<S, V, N>
where
    S: PersistenceStore,
    V: SignatureVerifier,
    N: WithdrawalNotifier,
{
    /// Creates a new builder.
    pub fn builder() -> HayloftServerBuilder {
        HayloftServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves the API until the process is terminated.
    ///
    /// Spawns the background tasks first; their lifetimes are tied to the
    /// process — there is no graceful drain beyond what the snapshot's
    /// atomicity already guarantees.
    pub async fn run(self) -> Result<(), HayloftError> {
        self.spawn_sweep();
        self.spawn_notify_retry();
        self.spawn_limiter_cleanup();

        tracing::info!("hayloft server running");
        let service = router(self.app, self.governor)
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(self.listener, service).await?;
        Ok(())
    }

    /// Periodic liveness sweep: ends sessions that stopped heartbeating
    /// and deletes expired challenges.
    fn spawn_sweep(&self) {
        let app = Arc::clone(&self.app);
        let interval = self.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = app.sessions.sweep().await {
                    tracing::error!(error = %e, "liveness sweep failed");
                }
            }
        });
    }

    /// Periodic drain of withdrawal notifications that failed delivery.
    fn spawn_notify_retry(&self) {
        let app = Arc::clone(&self.app);
        let interval = self.notify_retry_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = app.ledger.retry_pending().await {
                    tracing::error!(error = %e, "withdrawal notification retry failed");
                }
            }
        });
    }

    /// Evicts idle entries from the rate limiter's per-key store so it
    /// doesn't grow with every client IP ever seen.
    fn spawn_limiter_cleanup(&self) {
        let Some(config) = &self.governor else {
            return;
        };
        let limiter = config.limiter().clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                ticker.tick().await;
                limiter.retain_recent();
            }
        });
    }
}
