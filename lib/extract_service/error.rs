use crate::db::StoreError;
use crate::ledger_client::LedgerClientError;
use thiserror::Error;
use tokio::task::JoinError;

/// Run-level failures. Per-height and per-batch failures never surface here.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    LedgerClient(#[from] LedgerClientError),

    #[error("Task join error: {0}")]
    TaskJoinError(#[from] JoinError),

    #[error("invalid height range: {0}")]
    InvalidRange(String),

    #[error("invalid pool settings: {0}")]
    InvalidSettings(String),
}
