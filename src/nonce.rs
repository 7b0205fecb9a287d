use crate::clock::{Clock, TokioClock};
use crate::config::{ConfigError, ResolverConfig};
use crate::error::{LedgerQueryError, NonceResult, ResolverError};
use crate::ledger::LedgerQuery;
use alloy_primitives::Address;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Decides which nonce an account should use next.
///
/// The ledger's pending nonce wins whenever it is at least as high as the
/// local cache. While the cache is fresh (shortly after
/// [`increment_nonce`](Self::increment_nonce)) a higher cached value wins,
/// covering transactions the ledger has not observed yet. Once the cache
/// expires it is ignored, so a dropped transaction cannot stall the account.
///
/// Not synchronised: wrap it in a [`SharedNonceResolver`](crate::SharedNonceResolver)
/// when several tasks issue transactions for the same account.
pub struct NonceResolver<L: ?Sized, C = TokioClock> {
    account: Address,
    ledger: Arc<L>,
    clock: C,
    config: ResolverConfig,
    /// Next nonce believed usable, absent contrary ledger evidence.
    cached_nonce: u64,
    /// The cache is trusted while `now < fresh_until`.
    fresh_until: Instant,
    /// Value handed out by the last successful `current_nonce`, consumed by
    /// the following `increment_nonce`.
    last_resolved: Option<u64>,
}

impl<L: LedgerQuery + ?Sized> NonceResolver<L, TokioClock> {
    /// Starts with an empty, already expired cache, so the first resolution
    /// trusts the ledger.
    pub fn new(
        account: Address,
        ledger: Arc<L>,
        config: ResolverConfig,
    ) -> Result<Self, ConfigError> {
        let fresh_until = TokioClock.now();
        Self::with_state(account, ledger, 0, fresh_until, config, TokioClock)
    }

    /// Seeds the cache from one ledger query. The cache still starts expired.
    pub async fn seeded(
        account: Address,
        ledger: Arc<L>,
        config: ResolverConfig,
    ) -> Result<Self, ResolverError> {
        config.validate()?;
        let pending = ledger.pending_nonce(account).await?;
        let fresh_until = TokioClock.now();
        Ok(Self::assemble(
            account,
            ledger,
            pending,
            fresh_until,
            config,
            TokioClock,
        ))
    }
}

impl<L: LedgerQuery + ?Sized, C: Clock> NonceResolver<L, C> {
    pub fn with_state(
        account: Address,
        ledger: Arc<L>,
        cached_nonce: u64,
        fresh_until: Instant,
        config: ResolverConfig,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(
            account,
            ledger,
            cached_nonce,
            fresh_until,
            config,
            clock,
        ))
    }

    /// Builds a resolver from a config that was already validated.
    pub(crate) fn assemble(
        account: Address,
        ledger: Arc<L>,
        cached_nonce: u64,
        fresh_until: Instant,
        config: ResolverConfig,
        clock: C,
    ) -> Self {
        Self {
            account,
            ledger,
            clock,
            config,
            cached_nonce,
            fresh_until,
            last_resolved: None,
        }
    }

    /// Returns the nonce to use for the next transaction.
    ///
    /// Queries the ledger every time. A failed query is returned as is,
    /// without falling back to the cache, and leaves the resolver untouched.
    pub async fn current_nonce(&mut self) -> NonceResult<u64> {
        let pending = self.query_pending().await?;
        let nonce = self.reconcile(pending);
        self.last_resolved = Some(nonce);
        Ok(nonce)
    }

    /// Records that the last resolved nonce was used and returns the next one.
    ///
    /// Call exactly once per issued transaction. Without a resolution since
    /// the previous increment, the cached nonce is taken as the one used.
    ///
    /// Saturates at `u64::MAX`; a ledger accepting that nonce has no next one.
    pub fn increment_nonce(&mut self) -> u64 {
        let used = self.last_resolved.take().unwrap_or(self.cached_nonce);
        debug_assert!(used < u64::MAX, "nonce space exhausted for {}", self.account);
        self.cached_nonce = used.saturating_add(1);

        let deadline = self.clock.now() + self.config.freshness_window;
        if deadline > self.fresh_until {
            self.fresh_until = deadline;
        }

        debug!(account = %self.account, used, next = self.cached_nonce, "nonce incremented");
        self.cached_nonce
    }

    /// Forgets an unused resolution, e.g. when a transaction was abandoned
    /// before broadcast.
    pub(crate) fn discard_resolution(&mut self) {
        self.last_resolved = None;
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn cached_nonce(&self) -> u64 {
        self.cached_nonce
    }

    pub fn fresh_until(&self) -> Instant {
        self.fresh_until
    }

    pub fn is_fresh(&self) -> bool {
        self.clock.now() < self.fresh_until
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    async fn query_pending(&self) -> NonceResult<u64> {
        let query = self.ledger.pending_nonce(self.account);
        let result = match self.config.query_timeout {
            Some(limit) => match tokio::time::timeout(limit, query).await {
                Ok(result) => result,
                Err(_) => Err(LedgerQueryError::Timeout(limit)),
            },
            None => query.await,
        };

        if let Err(err) = &result {
            warn!(account = %self.account, %err, "pending nonce query failed");
        }
        result
    }

    fn reconcile(&self, pending: u64) -> u64 {
        let cached = self.cached_nonce;
        if pending >= cached {
            debug!(account = %self.account, pending, cached, "using pending nonce");
            return pending;
        }

        if self.is_fresh() {
            debug!(account = %self.account, pending, cached, "local nonce ahead of pending; using local");
            cached
        } else {
            info!(
                account = %self.account,
                pending,
                cached,
                "local nonce ahead of pending but expired; using pending"
            );
            pending
        }
    }
}
