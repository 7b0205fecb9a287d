//! Ledger doubles for tests.

use crate::error::{LedgerQueryError, NonceResult};
use crate::ledger::LedgerQuery;
use alloy_primitives::Address;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Reports the same pending nonce for every account until told otherwise.
#[derive(Debug, Default)]
pub struct StaticLedger {
    pending: AtomicU64,
    calls: AtomicU64,
    failure: Mutex<Option<LedgerQueryError>>,
    latency: Mutex<Option<Duration>>,
}

impl StaticLedger {
    pub fn new(pending: u64) -> Self {
        Self {
            pending: AtomicU64::new(pending),
            ..Default::default()
        }
    }

    pub fn set_pending(&self, pending: u64) {
        self.pending.store(pending, Ordering::SeqCst);
    }

    /// Every following query fails with `err` until [`clear_failure`](Self::clear_failure).
    pub fn fail_with(&self, err: LedgerQueryError) {
        *self.failure.lock() = Some(err);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerQuery for StaticLedger {
    async fn pending_nonce(&self, _account: Address) -> NonceResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        Ok(self.pending.load(Ordering::SeqCst))
    }
}
