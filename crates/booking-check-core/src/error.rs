//! Core error types.

use sled::transaction::TransactionError;
use thiserror::Error;

/// Core errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage engine error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Malformed inbound broker payload.
    #[error("decode error: {0}")]
    Decode(String),

    /// The delivery gateway failed to send.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// The broker refused or failed a publish/subscribe.
    #[error("broker error: {0}")]
    Broker(String),

    /// A registry operation panicked or was cancelled on the blocking pool.
    #[error("registry task failed: {0}")]
    Task(String),
}

impl Error {
    /// Whether this error originates from the registry's storage layer.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::Serialization(_) | Error::Task(_)
        )
    }
}

impl From<TransactionError<Error>> for Error {
    fn from(err: TransactionError<Error>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => Error::Storage(e),
        }
    }
}
