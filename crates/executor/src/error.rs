use common::ValidationError;
use common::models::Trade;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("trade {0} not found")]
    NotFound(String),
    /// Carries the trade as it was closed the first time.
    #[error("trade {} is already closed", .0.id)]
    AlreadyClosed(Box<Trade>),
    #[error("no price available for {0} and no fallback configured")]
    UpstreamUnavailable(String),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

#[derive(Error, Debug, PartialEq)]
pub enum SignalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no price available for {0} and no fallback configured")]
    UpstreamUnavailable(String),
}
