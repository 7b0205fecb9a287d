use crate::clock::{Clock, TokioClock};
use crate::config::{ConfigError, ResolverConfig};
use crate::error::NonceResult;
use crate::ledger::LedgerQuery;
use crate::nonce::NonceResolver;
use crate::shared::{NonceReservation, SharedNonceResolver};
use alloy_primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;

/// One [`SharedNonceResolver`] per account, all backed by the same ledger.
///
/// Resolvers are created on first use with an empty, expired cache, so the
/// ledger decides the first nonce of every account.
pub struct NonceRegistry<L: ?Sized, C = TokioClock> {
    ledger: Arc<L>,
    clock: C,
    config: ResolverConfig,
    resolvers: DashMap<Address, Arc<SharedNonceResolver<L, C>>>,
}

impl<L: LedgerQuery + ?Sized> NonceRegistry<L, TokioClock> {
    pub fn new(ledger: Arc<L>, config: ResolverConfig) -> Result<Self, ConfigError> {
        Self::with_clock(ledger, config, TokioClock)
    }
}

impl<L: LedgerQuery + ?Sized, C: Clock + Clone> NonceRegistry<L, C> {
    pub fn with_clock(
        ledger: Arc<L>,
        config: ResolverConfig,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            ledger,
            clock,
            config,
            resolvers: DashMap::new(),
        })
    }

    /// Returns the resolver for `account`, creating it if needed.
    pub fn resolver(&self, account: Address) -> Arc<SharedNonceResolver<L, C>> {
        self.resolvers
            .entry(account)
            .or_insert_with(|| {
                let fresh_until = self.clock.now();
                Arc::new(SharedNonceResolver::new(NonceResolver::assemble(
                    account,
                    self.ledger.clone(),
                    0,
                    fresh_until,
                    self.config.clone(),
                    self.clock.clone(),
                )))
            })
            .clone()
    }

    /// Reserves the next nonce of `account`. See [`SharedNonceResolver::reserve`].
    pub async fn reserve(&self, account: Address) -> NonceResult<NonceReservation<L, C>> {
        let resolver = self.resolver(account);
        resolver.reserve().await
    }

    /// Drops the cached state of an idle `account`, so the next use starts
    /// from the ledger.
    ///
    /// Returns `false` if the account is unknown, has an open reservation, or
    /// its resolver is still held elsewhere; the state is then kept, since a
    /// second resolver for the account could hand out a nonce twice.
    pub fn forget(&self, account: &Address) -> bool {
        // the shard lock keeps new handles from being taken during the check
        self.resolvers
            .remove_if(account, |_, shared| {
                Arc::strong_count(shared) == 1 && shared.is_idle()
            })
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::StaticLedger;
    use std::time::Duration;

    #[tokio::test]
    async fn test_accounts_are_independent() {
        let ledger = Arc::new(StaticLedger::new(5));
        let registry = NonceRegistry::with_clock(
            ledger.clone(),
            ResolverConfig::default(),
            ManualClock::default(),
        )
        .unwrap();
        let alice = Address::new([0x01; 20]);
        let bob = Address::new([0x02; 20]);

        let reservation = registry.reserve(alice).await.unwrap();
        assert_eq!(reservation.account(), alice);
        assert_eq!(reservation.nonce(), 5);
        // bob is not blocked by alice's open reservation
        let other = registry.reserve(bob).await.unwrap();
        assert_eq!(other.nonce(), 5);
        assert_eq!(reservation.commit(), 6);
        drop(other);

        assert_eq!(registry.reserve(alice).await.unwrap().nonce(), 6);
        assert_eq!(registry.reserve(bob).await.unwrap().nonce(), 5);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_same_account_shares_resolver() {
        let registry =
            NonceRegistry::new(Arc::new(StaticLedger::new(0)), ResolverConfig::default()).unwrap();
        let account = Address::new([0x03; 20]);
        assert!(Arc::ptr_eq(&registry.resolver(account), &registry.resolver(account)));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_forget_restarts_from_ledger() {
        let ledger = Arc::new(StaticLedger::new(30));
        let clock = ManualClock::default();
        let registry =
            NonceRegistry::with_clock(ledger.clone(), ResolverConfig::default(), clock.clone())
                .unwrap();
        let account = Address::new([0x04; 20]);

        registry.reserve(account).await.unwrap().commit();
        registry.reserve(account).await.unwrap().commit();
        clock.advance(Duration::from_secs(1));
        assert_eq!(registry.reserve(account).await.unwrap().nonce(), 32);

        assert!(registry.forget(&account));
        assert!(registry.is_empty());
        assert_eq!(registry.reserve(account).await.unwrap().nonce(), 30);
        assert!(!registry.forget(&Address::ZERO));
    }

    #[tokio::test]
    async fn test_forget_keeps_account_with_open_reservation() {
        let registry = NonceRegistry::with_clock(
            Arc::new(StaticLedger::new(30)),
            ResolverConfig::default(),
            ManualClock::default(),
        )
        .unwrap();
        let account = Address::new([0x05; 20]);

        let first = registry.reserve(account).await.unwrap();
        assert_eq!(first.nonce(), 30);
        assert!(!registry.forget(&account));
        assert_eq!(registry.len(), 1);

        // a second issuer waits on the same lock instead of a fresh resolver
        let second = {
            let resolver = registry.resolver(account);
            tokio::spawn(async move { resolver.reserve().await.unwrap().nonce() })
        };
        tokio::task::yield_now().await;
        assert!(!second.is_finished());

        assert_eq!(first.commit(), 31);
        assert_eq!(second.await.unwrap(), 31);
        assert!(registry.forget(&account));
    }

    #[tokio::test]
    async fn test_forget_keeps_account_while_handle_is_held() {
        let registry =
            NonceRegistry::new(Arc::new(StaticLedger::new(9)), ResolverConfig::default()).unwrap();
        let account = Address::new([0x06; 20]);

        let handle = registry.resolver(account);
        assert!(!registry.forget(&account));
        drop(handle);
        assert!(registry.forget(&account));
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = ResolverConfig {
            freshness_window: Duration::ZERO,
            ..Default::default()
        };
        let result = NonceRegistry::new(Arc::new(StaticLedger::new(0)), config);
        assert!(matches!(result, Err(ConfigError::ZeroFreshnessWindow)));
    }
}
