use crate::config::ConfigError;
use std::time::Duration;

/// Failure to obtain the pending nonce from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerQueryError {
    #[error("ledger unreachable: {0}")]
    Unreachable(String),

    #[error("ledger query timed out after {0:?}")]
    Timeout(Duration),

    #[error("ledger returned a fault: {0}")]
    Fault(String),

    #[error("malformed ledger response: {0}")]
    Malformed(String),
}

impl LedgerQueryError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LedgerQueryError::Timeout(_))
    }
}

pub type NonceResult<T> = Result<T, LedgerQueryError>;

/// Failure to build a resolver that needs the ledger during construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerQueryError),
}
