//! Nonce reconciliation for accounts that need a gap-free, strictly
//! increasing transaction sequence.
//!
//! A [`NonceResolver`] reconciles the ledger's pending nonce with a locally
//! cached value that is trusted only for a short freshness window after each
//! issued transaction. [`SharedNonceResolver`] and [`NonceRegistry`] add the
//! locking needed when several tasks issue transactions for the same account.

pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod nonce;
pub mod registry;
pub mod shared;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{ConfigError, ResolverConfig};
pub use error::{LedgerQueryError, NonceResult, ResolverError};
pub use ledger::{LedgerQuery, Transactor};
pub use nonce::NonceResolver;
pub use registry::NonceRegistry;
pub use shared::{NonceReservation, SharedNonceResolver};
