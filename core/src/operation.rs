use std::fmt;
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::{CompensationFault, OutcomeError},
    id::{OperationId, TargetId, TransactionId},
    value::Value,
};

/// Where on the target a mutation landed.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// A named attribute of an aggregate.
    Attr(String),
    /// A position in an ordered collection.
    Index(usize),
    /// A keyed entry in a map.
    Entry(Value),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Attr(name) => write!(f, "{name}"),
            Key::Index(index) => write!(f, "[{index}]"),
            Key::Entry(key) => write!(f, "[{key}]"),
        }
    }
}

/// Tri-state result of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Succeeded,
    Failed,
}

/// How to undo an applied operation.
pub enum Compensation {
    /// Restore in-memory state. Must not record to the ledger.
    Local(Box<dyn Fn() -> Result<(), CompensationFault> + Send + Sync>),
    /// Re-invoke a remote endpoint with the inverse change.
    Remote(Box<dyn RemoteCompensation>),
}

/// A compensating action that crosses a network boundary.
#[async_trait]
pub trait RemoteCompensation: Send + Sync {
    async fn compensate(&self) -> Result<(), CompensationFault>;
}

impl fmt::Debug for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compensation::Local(_) => write!(f, "Local"),
            Compensation::Remote(_) => write!(f, "Remote"),
        }
    }
}

/// One recorded mutation and its bound inverse.
///
/// Immutable once recorded, except for the outcome, which is set exactly once.
/// `old_value` is absent for a create (nothing existed before); `new_value`
/// is absent for a removal.
pub struct Operation {
    pub id: OperationId,
    pub target: TargetId,
    pub key: Key,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub created_at: DateTime<Utc>,
    /// The enclosing transaction, if the operation was recorded inside one.
    pub transaction: Option<TransactionId>,
    compensation: Compensation,
    outcome: OnceLock<Outcome>,
    /// Set when the one permitted compensation attempt starts. A cancelled or
    /// failed attempt is not retried; a remote inverse may already have taken
    /// effect.
    compensated: OnceLock<()>,
}

impl Operation {
    pub fn outcome(&self) -> Outcome { self.outcome.get().copied().unwrap_or(Outcome::Pending) }

    pub fn succeeded(&self) -> bool { self.outcome() == Outcome::Succeeded }

    /// Mark this operation as applied. Write-once.
    pub fn mark_succeeded(&self) -> Result<(), OutcomeError> { self.mark(Outcome::Succeeded) }

    /// Mark this operation as failed. Failed operations are skipped during
    /// rollback because they never took effect. Write-once.
    pub fn mark_failed(&self) -> Result<(), OutcomeError> { self.mark(Outcome::Failed) }

    fn mark(&self, outcome: Outcome) -> Result<(), OutcomeError> {
        self.outcome.set(outcome).map_err(|_| OutcomeError { operation: self.id, current: self.outcome() })
    }

    pub(crate) fn compensation(&self) -> &Compensation { &self.compensation }

    /// Claim the single permitted compensation attempt. False means the
    /// attempt already started somewhere else and must not be repeated.
    pub(crate) fn claim_compensation(&self) -> bool { self.compensated.set(()).is_ok() }

    pub(crate) async fn compensate(&self) -> Result<(), CompensationFault> {
        match &self.compensation {
            Compensation::Local(invert) => invert(),
            Compensation::Remote(invert) => invert.compensate().await,
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("key", &self.key)
            .field("old_value", &self.old_value)
            .field("new_value", &self.new_value)
            .field("transaction", &self.transaction)
            .field("outcome", &self.outcome())
            .finish()
    }
}

/// Everything needed to record an operation. Built by tracked containers and
/// saga services, consumed by [`crate::Ledger::record`].
pub struct OperationDraft {
    pub target: TargetId,
    pub key: Key,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub compensation: Compensation,
}

impl OperationDraft {
    pub(crate) fn build(self, transaction: Option<TransactionId>) -> Operation {
        Operation {
            id: OperationId::new(),
            target: self.target,
            key: self.key,
            old_value: self.old_value,
            new_value: self.new_value,
            created_at: Utc::now(),
            transaction,
            compensation: self.compensation,
            outcome: OnceLock::new(),
            compensated: OnceLock::new(),
        }
    }
}
