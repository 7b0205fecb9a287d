use crate::clock::{Clock, TokioClock};
use crate::error::NonceResult;
use crate::ledger::LedgerQuery;
use crate::nonce::NonceResolver;
use alloy_primitives::Address;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

/// A [`NonceResolver`] that several tasks can issue transactions through.
///
/// Each transaction goes through one [`NonceReservation`], which keeps the
/// resolver locked from resolution until commit or drop. Two reservations
/// for the same account therefore never see the same nonce.
pub struct SharedNonceResolver<L: ?Sized, C = TokioClock> {
    inner: Arc<Mutex<NonceResolver<L, C>>>,
}

impl<L: LedgerQuery + ?Sized, C: Clock> SharedNonceResolver<L, C> {
    pub fn new(resolver: NonceResolver<L, C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(resolver)),
        }
    }

    /// Waits for exclusive access and resolves the nonce to use.
    ///
    /// On failure the lock is released before the error is returned.
    pub async fn reserve(&self) -> NonceResult<NonceReservation<L, C>> {
        let mut guard = self.inner.clone().lock_owned().await;
        let nonce = guard.current_nonce().await?;
        Ok(NonceReservation {
            guard,
            nonce,
            committed: false,
        })
    }

    /// Direct access to the resolver, e.g. for inspection.
    pub async fn lock(&self) -> MutexGuard<'_, NonceResolver<L, C>> {
        self.inner.lock().await
    }

    /// True when no reservation is open.
    pub(crate) fn is_idle(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }
}

/// A nonce handed out for exactly one transaction.
///
/// [`commit`](Self::commit) once the transaction was issued. Dropping the
/// reservation instead abandons it and leaves the resolver as it was.
pub struct NonceReservation<L: LedgerQuery + ?Sized, C: Clock = TokioClock> {
    guard: OwnedMutexGuard<NonceResolver<L, C>>,
    nonce: u64,
    committed: bool,
}

impl<L: LedgerQuery + ?Sized, C: Clock> NonceReservation<L, C> {
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn account(&self) -> Address {
        self.guard.account()
    }

    /// Advances the resolver past this nonce and returns the next one.
    pub fn commit(mut self) -> u64 {
        self.committed = true;
        self.guard.increment_nonce()
    }
}

impl<L: LedgerQuery + ?Sized, C: Clock> Drop for NonceReservation<L, C> {
    fn drop(&mut self) {
        if !self.committed {
            self.guard.discard_resolution();
        }
    }
}
