use alloy_primitives::{Address, B256, Bytes, keccak256};
use alloy_rpc_types_eth::TransactionRequest;
use async_trait::async_trait;
use nonce_resolver::{LedgerQuery, LedgerQueryError, NonceResult, Transactor};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

const TRANSFER_GAS: u64 = 21_000;

pub struct LedgerConfig {
    /// Time before an accepted transaction shows up in the pending nonce.
    pub propagation_delay: Duration,
    /// Every n-th accepted submission is silently lost. Zero disables drops.
    pub drop_every: u64,
    pub base_gas_price: u128,
}

#[derive(Default)]
struct AccountPool {
    /// Next nonce the ledger has observed as usable.
    observed: u64,
    /// Accepted transactions not yet visible, oldest first.
    propagating: VecDeque<(Instant, u64)>,
}

impl AccountPool {
    fn settle(&mut self, now: Instant) {
        while let Some(&(visible_at, nonce)) = self.propagating.front() {
            if visible_at > now {
                break;
            }
            self.propagating.pop_front();
            self.observed = self.observed.max(nonce + 1);
        }
    }

    /// Highest nonce the pool will take next, counting unobserved submissions.
    fn expected(&self) -> u64 {
        self.propagating
            .back()
            .map(|&(_, nonce)| nonce + 1)
            .unwrap_or(self.observed)
            .max(self.observed)
    }
}

/// In-process ledger with delayed visibility and lossy submission.
pub struct SimulatedLedger {
    config: LedgerConfig,
    accounts: Mutex<HashMap<Address, AccountPool>>,
    submissions: Mutex<u64>,
}

impl SimulatedLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            accounts: Mutex::new(HashMap::new()),
            submissions: Mutex::new(0),
        }
    }

    pub fn observed_nonce(&self, account: Address) -> u64 {
        let mut accounts = self.accounts.lock();
        let pool = accounts.entry(account).or_default();
        pool.settle(Instant::now());
        pool.observed
    }
}

#[async_trait]
impl LedgerQuery for SimulatedLedger {
    async fn pending_nonce(&self, account: Address) -> NonceResult<u64> {
        // round trip
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(self.observed_nonce(account))
    }
}

#[async_trait]
impl Transactor for SimulatedLedger {
    async fn pending_code_at(&self, _account: Address) -> NonceResult<Bytes> {
        Ok(Bytes::new())
    }

    async fn suggest_gas_price(&self) -> NonceResult<u128> {
        Ok(self.config.base_gas_price)
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> NonceResult<u64> {
        Ok(TRANSFER_GAS)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> NonceResult<B256> {
        let from = tx
            .from
            .ok_or_else(|| LedgerQueryError::Malformed("missing sender".to_string()))?;
        let nonce = tx
            .nonce
            .ok_or_else(|| LedgerQueryError::Malformed("missing nonce".to_string()))?;

        let now = Instant::now();
        let mut accounts = self.accounts.lock();
        let pool = accounts.entry(from).or_default();
        pool.settle(now);

        let expected = pool.expected();
        if nonce < expected {
            return Err(LedgerQueryError::Fault(format!(
                "nonce too low: got {nonce}, expected {expected}"
            )));
        }
        if nonce > expected {
            return Err(LedgerQueryError::Fault(format!(
                "nonce gap: got {nonce}, expected {expected}"
            )));
        }

        let mut hash_input = from.to_vec();
        hash_input.extend_from_slice(&nonce.to_be_bytes());
        let tx_hash = keccak256(&hash_input);

        let mut submissions = self.submissions.lock();
        *submissions += 1;
        if self.config.drop_every != 0 && *submissions % self.config.drop_every == 0 {
            warn!(%from, nonce, "transaction lost before reaching the pool");
            return Ok(tx_hash);
        }

        pool.propagating
            .push_back((now + self.config.propagation_delay, nonce));
        debug!(%from, nonce, %tx_hash, "transaction accepted");
        Ok(tx_hash)
    }
}
