use std::sync::{Arc, OnceLock};

use append_only_vec::AppendOnlyVec;
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;
use tracing::{error, warn};

use crate::{
    error::{RollbackError, TransactionError},
    id::TransactionId,
    ledger::Ledger,
    operation::{Operation, OperationDraft},
};

/// Durable audit record of one transaction scope. Retained by the ledger
/// after the scope closes.
pub struct TransactionRecord {
    pub id: TransactionId,
    pub began_at: DateTime<Utc>,
    operations: AppendOnlyVec<Arc<Operation>>,
    closed_at: OnceLock<DateTime<Utc>>,
}

impl TransactionRecord {
    pub(crate) fn new() -> Self {
        Self { id: TransactionId::new(), began_at: Utc::now(), operations: AppendOnlyVec::new(), closed_at: OnceLock::new() }
    }

    pub fn operations(&self) -> Vec<Arc<Operation>> { self.operations.iter().cloned().collect() }

    pub fn len(&self) -> usize { self.operations.len() }

    pub fn is_empty(&self) -> bool { self.operations.len() == 0 }

    pub fn is_closed(&self) -> bool { self.closed_at.get().is_some() }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> { self.closed_at.get().copied() }

    pub(crate) fn push(&self, operation: Arc<Operation>) { self.operations.push(operation); }

    pub(crate) fn close(&self) { let _ = self.closed_at.set(Utc::now()); }
}

impl std::fmt::Debug for TransactionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRecord")
            .field("id", &self.id)
            .field("operations", &self.operations.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Live handle to the single active transaction scope.
///
/// Holds the ledger's scope lock for its whole lifetime. Close it with
/// [`end`](Self::end) on the success path or [`abort`](Self::abort) when a
/// saga step failed; in both cases the lock is released only after any
/// required compensation has run. Dropping the handle without closing it
/// (panic, cancelled task) rolls back every applied operation before the
/// lock is released. A close that is itself cancelled mid-compensation
/// resumes the same way, and no compensation runs twice.
pub struct Transaction {
    ledger: Ledger,
    record: Arc<TransactionRecord>,
    guard: Option<OwnedMutexGuard<()>>,

    // marker so Drop knows the scope was closed properly
    consumed: bool,
}

impl Transaction {
    pub(crate) fn new(ledger: Ledger, record: Arc<TransactionRecord>, guard: OwnedMutexGuard<()>) -> Self {
        Self { ledger, record, guard: Some(guard), consumed: false }
    }

    pub fn id(&self) -> TransactionId { self.record.id }

    pub fn record_ref(&self) -> &Arc<TransactionRecord> { &self.record }

    pub fn operations(&self) -> Vec<Arc<Operation>> { self.record.operations() }

    /// Record an operation against this scope (and the ledger history).
    pub fn record(&self, draft: OperationDraft) -> Arc<Operation> { self.ledger.record_in(draft, &self.record) }

    /// Record an operation for a mutation that has already been applied. The
    /// operation is marked succeeded immediately.
    pub fn record_applied(&self, draft: OperationDraft) -> Arc<Operation> {
        let operation = self.record(draft);
        let _ = operation.mark_succeeded(); // freshly recorded, cannot be set yet
        operation
    }

    /// Close the scope. If every operation succeeded the transaction closes
    /// cleanly. Otherwise every succeeded operation is rolled back in reverse
    /// insertion order and [`TransactionError::Incomplete`] names the ones
    /// that failed. A compensation failure surfaces as
    /// [`TransactionError::Rollback`] instead; it is never masked.
    pub async fn end(mut self) -> Result<(), TransactionError> {
        let result = self.ledger.end_scope(&self.record).await;
        // consumed only once the close ran to completion: cancellation at the
        // await above leaves it false, and Drop finishes the rollback
        self.consumed = true;
        self.guard.take(); // release only after compensation ran
        result
    }

    /// Close the scope from a failure path, rolling back every succeeded
    /// operation regardless of how the rest were marked. Used by sagas when a
    /// step fails without leaving a failed operation behind (for example a
    /// transport error before anything was recorded).
    pub async fn abort(mut self) -> Result<(), RollbackError> {
        let result = self.ledger.abort_scope(&self.record).await;
        self.consumed = true;
        self.guard.take();
        result
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction").field("id", &self.record.id).field("operations", &self.record.len()).finish()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.consumed {
            return;
        }

        // Abandoned scope: panic or cancelled task. Applied operations must be
        // rolled back before the scope lock is released, so the guard moves
        // into the cleanup task and drops after compensation.
        let ledger = self.ledger.clone();
        let record = self.record.clone();
        let guard = self.guard.take();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("transaction {} dropped without end or abort, rolling back", record.id);
                handle.spawn(async move {
                    if let Err(e) = ledger.abort_scope(&record).await {
                        error!("rollback of abandoned transaction {} failed: {e}", record.id);
                    }
                    drop(guard);
                });
            }
            Err(_) => {
                warn!("transaction {} dropped outside a runtime, applying local compensation inline", record.id);
                ledger.abort_scope_blocking(&record);
                drop(guard);
            }
        }
    }
}
