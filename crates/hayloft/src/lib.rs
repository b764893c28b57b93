//! # Hayloft
//!
//! Server-authoritative session lifecycle and points ledger for a
//! wallet-gated mini-game: nonce login handshake, liveness-tracked play
//! sessions, quantized point accrual, and the points→HAY conversion and
//! withdrawal pipeline — all over one durable snapshot.
//!
//! This meta-crate wires the component crates (`hayloft-store`,
//! `hayloft-auth`, `hayloft-session`, `hayloft-ledger`, `hayloft-rank`)
//! behind a JSON-over-HTTP API and ships the server binary.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use hayloft::{HayloftServerBuilder, HayloftError};
//! use hayloft_auth::SignedProofVerifier;
//! use hayloft_ledger::LogNotifier;
//! use hayloft_store::JsonFileStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), HayloftError> {
//!     let store = JsonFileStore::open("data/hayloft.json").await?;
//!     let server = HayloftServerBuilder::new()
//!         .bind("127.0.0.1:3000")
//!         .build(store, SignedProofVerifier, LogNotifier)
//!         .await?;
//!     server.run().await
//! }
//! ```

pub mod dto;
mod error;
mod routes;
mod server;

pub use error::HayloftError;
pub use routes::{router, LEADERBOARD_SIZE};
pub use server::{
    governor_config, App, AppState, HayloftServer, HayloftServerBuilder, IpGovernorConfig,
    RateLimitConfig,
};
