//! The points ledger for Hayloft.
//!
//! Turns untrusted in-round progress claims into durable account state:
//!
//! 1. **Quantized awards** — cumulative round points become saved credit
//!    in steps of 15, guarded by a per-round watermark so retried or
//!    re-chunked reports credit each step exactly once
//! 2. **Conversion** — saved points become HAY tokens at 1000:1
//! 3. **Withdrawal** — balance debits with a minimum of 100 HAY and a
//!    pending-notification queue ([`WithdrawalNotifier`]) so a debit is
//!    never lost when the delivery sink is down
//!
//! # How it fits in the stack
//!
//! ```text
//! HTTP API / SessionManager (above)  ← progress reports and round flushes
//!     ↕
//! Ledger layer (this crate)
//!     ↕
//! Store layer (below)                ← users and sessions in the snapshot
//! ```

#![allow(async_fn_in_trait)]

mod error;
mod ledger;
mod notify;

pub use error::LedgerError;
pub use ledger::{
    award_quantized, PointsLedger, ProgressReceipt, MIN_WITHDRAWAL_TOKENS, POINTS_PER_TOKEN,
    POINT_QUANTUM,
};
pub use notify::{LogNotifier, NotifyError, WithdrawalNotifier};
