use crate::events::IssueEvent;
use crate::ledger::SimulatedLedger;
use alloy_primitives::{Address, U256};
use alloy_rpc_types_eth::TransactionRequest;
use nonce_resolver::{NonceRegistry, Transactor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct IssuerConfig {
    pub transactions: usize,
    pub interval: Duration,
    pub max_priority_fee: u128,
}

/// Issues a stream of transfers from one account, one nonce reservation per
/// transaction.
pub struct Issuer {
    id: u32,
    account: Address,
    config: IssuerConfig,
    registry: Arc<NonceRegistry<SimulatedLedger>>,
    ledger: Arc<SimulatedLedger>,
    events: mpsc::Sender<IssueEvent>,
}

impl Issuer {
    pub fn new(
        id: u32,
        account: Address,
        config: IssuerConfig,
        registry: Arc<NonceRegistry<SimulatedLedger>>,
        ledger: Arc<SimulatedLedger>,
        events: mpsc::Sender<IssueEvent>,
    ) -> Self {
        Self {
            id,
            account,
            config,
            registry,
            ledger,
            events,
        }
    }

    /// Issues the configured transactions and returns how many outcomes
    /// reached the journal. Stops early once the journal is gone.
    pub async fn run(self) -> usize {
        let mut reported = 0;
        for _ in 0..self.config.transactions {
            let event = self.issue_one().await;
            if let Err(err) = self.events.send(event).await {
                warn!(issuer = self.id, lost = ?err.0, "journal closed; stopping issuer");
                break;
            }
            reported += 1;
            tokio::time::sleep(self.config.interval).await;
        }
        info!(issuer = self.id, reported, "issuer finished");
        reported
    }

    async fn issue_one(&self) -> IssueEvent {
        let account = self.account.0.0;

        let reservation = match self.registry.reserve(self.account).await {
            Ok(reservation) => reservation,
            Err(err) => {
                return IssueEvent::QueryFailed {
                    issuer: self.id,
                    account,
                    reason: err.to_string(),
                };
            }
        };
        let nonce = reservation.nonce();

        let result = async {
            let gas_price = self.ledger.suggest_gas_price().await? + self.config.max_priority_fee;
            let tx = TransactionRequest::default()
                .from(self.account)
                .to(Address::ZERO)
                .value(U256::from(1))
                .nonce(nonce)
                .max_fee_per_gas(gas_price)
                .max_priority_fee_per_gas(self.config.max_priority_fee);
            let gas = self.ledger.estimate_gas(&tx).await?;
            let tx_hash = self.ledger.send_transaction(tx.gas_limit(gas)).await?;
            Ok::<_, nonce_resolver::LedgerQueryError>((tx_hash, gas_price))
        }
        .await;

        match result {
            Ok((tx_hash, gas_price)) => {
                let next = reservation.commit();
                info!(issuer = self.id, account = %self.account, nonce, next, %tx_hash, "issued");
                IssueEvent::Issued {
                    issuer: self.id,
                    account,
                    nonce,
                    tx_hash: tx_hash.0,
                    gas_price,
                }
            }
            Err(err) => {
                // nothing went out, so the nonce stays available
                drop(reservation);
                warn!(issuer = self.id, account = %self.account, nonce, %err, "submission rejected");
                IssueEvent::Rejected {
                    issuer: self.id,
                    account,
                    nonce,
                    reason: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerConfig;
    use nonce_resolver::ResolverConfig;

    fn issuer(events: mpsc::Sender<IssueEvent>, transactions: usize) -> (Issuer, Arc<SimulatedLedger>) {
        let ledger = Arc::new(SimulatedLedger::new(LedgerConfig {
            propagation_delay: Duration::from_millis(300),
            drop_every: 0,
            base_gas_price: 50,
        }));
        let registry =
            Arc::new(NonceRegistry::new(ledger.clone(), ResolverConfig::default()).unwrap());
        let issuer = Issuer::new(
            7,
            Address::new([0xAA; 20]),
            IssuerConfig {
                transactions,
                interval: Duration::from_millis(10),
                max_priority_fee: 2,
            },
            registry,
            ledger.clone(),
            events,
        );
        (issuer, ledger)
    }

    #[tokio::test(start_paused = true)]
    async fn test_issues_consecutive_nonces() {
        let (tx, mut rx) = mpsc::channel(16);
        let (issuer, _) = issuer(tx, 3);
        assert_eq!(issuer.run().await, 3);

        let mut nonces = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                IssueEvent::Issued { nonce, gas_price, .. } => {
                    assert_eq!(gas_price, 52);
                    nonces.push(nonce);
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(nonces, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_journal_closed() {
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let (issuer, ledger) = issuer(tx, 5);
        assert_eq!(issuer.run().await, 0);

        // only the first transaction went out before the issuer noticed
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ledger.observed_nonce(Address::new([0xAA; 20])), 1);
    }
}
