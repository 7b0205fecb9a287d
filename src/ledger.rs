use crate::error::NonceResult;
use alloy_primitives::{Address, B256, Bytes};
use alloy_rpc_types_eth::TransactionRequest;
use async_trait::async_trait;
use std::sync::Arc;

/// Read access to the ledger's view of an account's next usable nonce.
///
/// The reported value accounts for transactions already sitting in the
/// ledger's pending pool. Implementations should be cancel-safe: callers
/// abandon a query by dropping the future.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    async fn pending_nonce(&self, account: Address) -> NonceResult<u64>;
}

/// The full port a transaction-issuing client talks to.
///
/// The resolver itself only needs [`LedgerQuery`]; the remaining operations
/// belong to the workflow that builds, prices and broadcasts transactions.
#[async_trait]
pub trait Transactor: LedgerQuery {
    async fn pending_code_at(&self, account: Address) -> NonceResult<Bytes>;

    async fn suggest_gas_price(&self) -> NonceResult<u128>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> NonceResult<u64>;

    /// Broadcasts a transaction, returning its hash.
    async fn send_transaction(&self, tx: TransactionRequest) -> NonceResult<B256>;
}

#[async_trait]
impl<T: LedgerQuery + ?Sized> LedgerQuery for Arc<T> {
    async fn pending_nonce(&self, account: Address) -> NonceResult<u64> {
        (**self).pending_nonce(account).await
    }
}

#[async_trait]
impl<T: LedgerQuery + ?Sized> LedgerQuery for &T {
    async fn pending_nonce(&self, account: Address) -> NonceResult<u64> {
        (**self).pending_nonce(account).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticLedger;

    #[tokio::test]
    async fn test_port_through_arc_and_ref() {
        let ledger = Arc::new(StaticLedger::new(42));
        let account = Address::new([0xAA; 20]);

        let as_arc: Arc<dyn LedgerQuery> = ledger.clone();
        assert_eq!(as_arc.pending_nonce(account).await, Ok(42));
        assert_eq!((&*ledger).pending_nonce(account).await, Ok(42));
        assert_eq!(ledger.calls(), 2);
    }
}
