mod events;
mod issuer;
mod ledger;

use crate::events::IssueEvent;
use crate::issuer::{Issuer, IssuerConfig};
use crate::ledger::{LedgerConfig, SimulatedLedger};
use alloy_primitives::Address;
use nonce_resolver::{NonceRegistry, ResolverConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let ledger = Arc::new(SimulatedLedger::new(LedgerConfig {
        propagation_delay: Duration::from_millis(300),
        drop_every: 7,
        base_gas_price: 50,
    }));

    let config = ResolverConfig {
        freshness_window: Duration::from_secs(2),
        query_timeout: Some(Duration::from_millis(500)),
    };
    let registry = Arc::new(NonceRegistry::new(ledger.clone(), config)?);

    let (event_tx, mut event_rx) = mpsc::channel(100);

    // Journal consumer
    let journal = tokio::spawn(async move {
        let mut journal = Vec::new();
        let (mut issued, mut rejected) = (0usize, 0usize);
        while let Some(event) = event_rx.recv().await {
            match &event {
                IssueEvent::Issued { .. } => issued += 1,
                IssueEvent::Rejected { .. } | IssueEvent::QueryFailed { .. } => rejected += 1,
            }
            journal.extend(borsh::to_vec(&event)?);
        }
        info!(issued, rejected, journal_bytes = journal.len(), "journal closed");
        anyhow::Ok(())
    });

    info!("Starting nonce resolver simulation...");

    let shared_account = Address::new([0xAA; 20]);
    let solo_account = Address::new([0xCC; 20]);
    let accounts = [shared_account, shared_account, shared_account, solo_account];

    let mut handles = Vec::new();
    for (id, account) in accounts.into_iter().enumerate() {
        let issuer = Issuer::new(
            id as u32,
            account,
            IssuerConfig {
                transactions: 10,
                interval: Duration::from_millis(150),
                max_priority_fee: 2,
            },
            registry.clone(),
            ledger.clone(),
            event_tx.clone(),
        );
        handles.push(tokio::spawn(issuer.run()));
    }
    drop(event_tx);

    let reported: usize = futures::future::try_join_all(handles).await?.into_iter().sum();
    info!(reported, "issuers done");
    journal.await??;

    // let the last submissions propagate
    tokio::time::sleep(Duration::from_millis(500)).await;
    for account in [shared_account, solo_account] {
        info!(%account, observed = ledger.observed_nonce(account), "final ledger state");
    }

    info!("Simulation finished.");
    Ok(())
}
