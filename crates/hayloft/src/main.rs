//! Server binary: configuration from the environment, then serve.

use hayloft::{HayloftError, HayloftServerBuilder, RateLimitConfig};
use hayloft_auth::SignedProofVerifier;
use hayloft_ledger::LogNotifier;
use hayloft_store::JsonFileStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), HayloftError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hayloft=info,tower_http=info")),
        )
        .init();

    let addr = env_or("HAYLOFT_ADDR", "127.0.0.1:3000");
    let data_path = env_or("HAYLOFT_DATA", "data/hayloft.json");

    let store = JsonFileStore::open(&data_path).await?;
    let server = HayloftServerBuilder::new()
        .bind(&addr)
        .rate_limit(rate_limit_from_env())
        .build(store, SignedProofVerifier, LogNotifier)
        .await?;

    tracing::info!(addr = %server.local_addr()?, data = %data_path, "hayloft listening");
    server.run().await
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

/// `RATE_LIMIT_PER_MIN` / `RATE_LIMIT_BURST` override the defaults;
/// setting either to 0 disables rate limiting.
fn rate_limit_from_env() -> RateLimitConfig {
    let defaults = RateLimitConfig::default();
    RateLimitConfig {
        per_minute: parse_env_u64("RATE_LIMIT_PER_MIN").unwrap_or(defaults.per_minute),
        burst: parse_env_u64("RATE_LIMIT_BURST")
            .map(|v| v.min(u32::MAX as u64) as u32)
            .unwrap_or(defaults.burst),
    }
}

fn parse_env_u64(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}
