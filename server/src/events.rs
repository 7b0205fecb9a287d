use borsh::{BorshDeserialize, BorshSerialize};

/// Outcome of one issuing attempt, reported by issuers to the journal.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub enum IssueEvent {
    Issued {
        issuer: u32,
        account: [u8; 20],
        nonce: u64,
        tx_hash: [u8; 32],
        gas_price: u128,
    },
    Rejected {
        issuer: u32,
        account: [u8; 20],
        nonce: u64,
        reason: String,
    },
    QueryFailed {
        issuer: u32,
        account: [u8; 20],
        reason: String,
    },
}
