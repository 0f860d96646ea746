use thiserror::Error;

use crate::id::{OperationId, TransactionId};
use crate::operation::Outcome;

/// Error decoding an id from its base64 form.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    InvalidBase64(base64::DecodeError),
    #[error("invalid length")]
    InvalidLength,
}

/// Error type for tracked container mutations.
///
/// A failed mutation is rejected before anything is applied or recorded, so
/// the caller can propagate it without worrying about rollback.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("index {index} out of bounds (len {len})")]
    OutOfBounds { index: usize, len: usize },

    #[error("item not found")]
    ItemNotFound,

    /// Removing a map key that does not exist has no previous value to roll
    /// back to, so it is rejected outright.
    #[error("key {key} not found")]
    KeyNotFound { key: String },
}

/// Why a compensating action could not be applied.
#[derive(Debug, Error)]
pub enum CompensationFault {
    /// The mutated container was dropped after the operation was recorded.
    #[error("target no longer exists")]
    TargetDropped,

    /// The target changed since the operation was recorded in a way that makes
    /// the inverse invalid.
    #[error("conflicting state: {detail}")]
    Conflict { detail: String },

    /// A compensating remote call failed.
    #[error("remote compensation failed: {0}")]
    Remote(Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// A compensating action failed. Fatal: the ledger cannot restore the prior
/// state on its own and manual reconciliation is required. Never masked by
/// the error that triggered the rollback.
#[derive(Debug, Error)]
#[error("rollback of operation {operation} failed: {fault}")]
pub struct RollbackError {
    pub operation: OperationId,
    pub fault: CompensationFault,
}

/// Error type for closing a transaction scope.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// One or more operations did not succeed. Every operation that did
    /// succeed has been rolled back by the time this is returned.
    #[error("transaction {transaction} incomplete, failed operations: {failed:?}")]
    Incomplete { transaction: TransactionId, failed: Vec<OperationId> },

    #[error(transparent)]
    Rollback(#[from] RollbackError),
}

/// Error type for exactly-one operation lookups.
#[derive(Debug, Error)]
pub enum FindError {
    #[error("no operation matched")]
    NotFound,

    #[error("{0} operations matched where exactly one was expected")]
    Ambiguous(usize),
}

/// The outcome of an operation is write-once.
#[derive(Debug, Error)]
#[error("outcome of operation {operation} already recorded as {current:?}")]
pub struct OutcomeError {
    pub operation: OperationId,
    pub current: Outcome,
}

/// Error type for storage engines.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("document {id} not found in collection {collection}")]
    NotFound { collection: String, id: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}
