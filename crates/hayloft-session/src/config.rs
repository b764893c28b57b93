//! Session behavior configuration.

use std::time::Duration;

/// Tunables for the session lifecycle.
///
/// One copy lives in the [`SessionManager`](crate::SessionManager);
/// defaults are a sensible starting point for production.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on the time credited by a single heartbeat.
    ///
    /// A client that stalls, sleeps, or replays an old timestamp can gap
    /// its heartbeats arbitrarily; the clamp bounds the elapsed-time
    /// damage to one interval's worth. Default: 5 seconds.
    pub heartbeat_clamp: Duration,

    /// How long a session may go without a heartbeat before the liveness
    /// sweep ends it. Default: 60 seconds.
    pub liveness_grace: Duration,

    /// Minimum length of an acceptable wallet address. Default: 32.
    pub min_wallet_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_clamp: Duration::from_secs(5),
            liveness_grace: Duration::from_secs(60),
            min_wallet_len: 32,
        }
    }
}
