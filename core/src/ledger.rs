use std::sync::{Arc, Mutex};

use append_only_vec::AppendOnlyVec;
use tracing::{debug, error, info, warn};

use crate::{
    error::{FindError, RollbackError, TransactionError},
    id::{TargetId, TransactionId},
    operation::{Compensation, Key, Operation, OperationDraft, Outcome},
    transaction::{Transaction, TransactionRecord},
    value::Value,
};

struct LedgerInner {
    /// Every operation ever recorded, across all transactions. Audit trail;
    /// in-memory only, does not survive a restart.
    history: AppendOnlyVec<Arc<Operation>>,
    /// Every transaction scope ever opened.
    transactions: AppendOnlyVec<Arc<TransactionRecord>>,
    /// The single active transaction, if any.
    current: Mutex<Option<Arc<TransactionRecord>>>,
    /// Serializes transaction scopes process-wide. Acquired by `begin`, held
    /// by the returned handle, released when the scope closes. Fair, so
    /// scopes run in strict begin order.
    scope_lock: Arc<tokio::sync::Mutex<()>>,
}

/// The operation ledger: audit history plus single-writer transaction scopes.
///
/// Cheap to clone; every clone shares the same history and scope lock. There
/// is no global instance: construct one and hand it to every service that
/// performs transactional writes.
pub struct Ledger(Arc<LedgerInner>);

impl Clone for Ledger {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl Default for Ledger {
    fn default() -> Self { Self::new() }
}

impl Ledger {
    pub fn new() -> Self {
        Self(Arc::new(LedgerInner {
            history: AppendOnlyVec::new(),
            transactions: AppendOnlyVec::new(),
            current: Mutex::new(None),
            scope_lock: Arc::new(tokio::sync::Mutex::new(())),
        }))
    }

    /// Open a transaction scope. Suspends until any scope already open has
    /// closed; waiting callers are granted the scope in begin order.
    pub async fn begin(&self) -> Transaction {
        let guard = self.0.scope_lock.clone().lock_owned().await;
        let record = Arc::new(TransactionRecord::new());
        self.0.transactions.push(record.clone());
        *self.0.current.lock().unwrap() = Some(record.clone());
        debug!("transaction {} began", record.id);
        Transaction::new(self.clone(), record, guard)
    }

    /// Record an operation. Appends to the history, and to the active
    /// transaction's operation list if a scope is open.
    pub fn record(&self, draft: OperationDraft) -> Arc<Operation> {
        let current = self.0.current.lock().unwrap().clone();
        match current {
            Some(record) => self.record_in(draft, &record),
            None => {
                let operation = Arc::new(draft.build(None));
                self.0.history.push(operation.clone());
                debug!("recorded operation {:#} on {} {} (no open transaction)", operation.id, operation.target, operation.key);
                operation
            }
        }
    }

    pub(crate) fn record_in(&self, draft: OperationDraft, record: &Arc<TransactionRecord>) -> Arc<Operation> {
        let operation = Arc::new(draft.build(Some(record.id)));
        self.0.history.push(operation.clone());
        record.push(operation.clone());
        debug!("recorded operation {:#} on {} {} in transaction {}", operation.id, operation.target, operation.key, record.id);
        operation
    }

    /// Record an operation for a mutation that has already been applied. The
    /// operation is marked succeeded immediately.
    pub fn record_applied(&self, draft: OperationDraft) -> Arc<Operation> {
        let operation = self.record(draft);
        let _ = operation.mark_succeeded(); // freshly recorded, cannot be set yet
        operation
    }

    /// Invoke an operation's compensating action. Runs at most once per
    /// operation; a later call is a no-op, so a close that was cancelled
    /// mid-compensation can be resumed without undoing anything twice. A
    /// failure here is fatal: the caller must surface it, never retry or
    /// swallow it.
    pub async fn rollback(&self, operation: &Operation) -> Result<(), RollbackError> {
        if !operation.claim_compensation() {
            debug!("compensation of operation {:#} already attempted, skipping", operation.id);
            return Ok(());
        }
        debug!("rolling back operation {:#} on {} {}", operation.id, operation.target, operation.key);
        operation.compensate().await.map_err(|fault| RollbackError { operation: operation.id, fault })
    }

    pub(crate) async fn end_scope(&self, record: &Arc<TransactionRecord>) -> Result<(), TransactionError> {
        let operations = record.operations();
        let mut failed = Vec::new();
        for operation in &operations {
            match operation.outcome() {
                Outcome::Succeeded => {}
                Outcome::Failed => failed.push(operation.id),
                Outcome::Pending => {
                    warn!("operation {:#} still pending at close, treating as failed", operation.id);
                    let _ = operation.mark_failed();
                    failed.push(operation.id);
                }
            }
        }

        let result = if failed.is_empty() {
            debug!("transaction {} closed cleanly with {} operations", record.id, operations.len());
            Ok(())
        } else {
            info!("transaction {} incomplete ({} of {} operations failed), rolling back", record.id, failed.len(), operations.len());
            match self.roll_back_succeeded(&operations).await {
                Ok(()) => Err(TransactionError::Incomplete { transaction: record.id, failed }),
                Err(e) => Err(TransactionError::Rollback(e)),
            }
        };

        self.finish(record);
        result
    }

    pub(crate) async fn abort_scope(&self, record: &Arc<TransactionRecord>) -> Result<(), RollbackError> {
        let operations = record.operations();
        for operation in &operations {
            if operation.outcome() == Outcome::Pending {
                let _ = operation.mark_failed();
            }
        }
        info!("transaction {} aborted, rolling back {} applied operations", record.id, operations.iter().filter(|op| op.succeeded()).count());
        let result = self.roll_back_succeeded(&operations).await;
        self.finish(record);
        result
    }

    /// Fallback for scopes dropped outside a runtime. Local compensations run
    /// inline; remote ones cannot, and are logged for manual reconciliation.
    pub(crate) fn abort_scope_blocking(&self, record: &Arc<TransactionRecord>) {
        let operations = record.operations();
        for operation in &operations {
            if operation.outcome() == Outcome::Pending {
                let _ = operation.mark_failed();
            }
        }
        for operation in operations.iter().rev() {
            if !operation.succeeded() || !operation.claim_compensation() {
                continue;
            }
            match operation.compensation() {
                Compensation::Local(invert) => {
                    if let Err(fault) = invert() {
                        error!("rollback of operation {:#} failed: {fault}", operation.id);
                    }
                }
                Compensation::Remote(_) => {
                    error!("operation {:#} holds a remote compensation and no runtime is available, manual reconciliation required", operation.id);
                }
            }
        }
        self.finish(record);
    }

    /// Reverse insertion order, succeeded operations only. Stops at the first
    /// compensation failure so the fault is not compounded.
    async fn roll_back_succeeded(&self, operations: &[Arc<Operation>]) -> Result<(), RollbackError> {
        for operation in operations.iter().rev() {
            if operation.succeeded() {
                self.rollback(operation).await?;
            }
        }
        Ok(())
    }

    fn finish(&self, record: &Arc<TransactionRecord>) {
        let mut current = self.0.current.lock().unwrap();
        if current.as_ref().is_some_and(|active| active.id == record.id) {
            *current = None;
        }
        drop(current);
        record.close();
    }

    /// Linear search over the history.
    pub fn find_all(&self, query: &OperationQuery) -> Vec<Arc<Operation>> {
        let mut matches = Vec::new();
        for operation in self.0.history.iter() {
            if query.matches(operation) {
                matches.push(operation.clone());
            }
        }
        matches
    }

    /// Exactly-one lookup over the history; zero or multiple matches are
    /// both errors.
    pub fn find_one(&self, query: &OperationQuery) -> Result<Arc<Operation>, FindError> {
        let mut matches = self.find_all(query);
        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(FindError::NotFound),
            n => Err(FindError::Ambiguous(n)),
        }
    }

    pub fn history_len(&self) -> usize { self.0.history.len() }

    pub fn operations(&self) -> Vec<Arc<Operation>> { self.0.history.iter().cloned().collect() }

    pub fn current_transaction(&self) -> Option<Arc<TransactionRecord>> { self.0.current.lock().unwrap().clone() }

    pub fn transaction(&self, id: TransactionId) -> Option<Arc<TransactionRecord>> {
        self.0.transactions.iter().find(|record| record.id == id).cloned()
    }

    pub fn transactions(&self) -> Vec<Arc<TransactionRecord>> { self.0.transactions.iter().cloned().collect() }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("history", &self.0.history.len())
            .field("transactions", &self.0.transactions.len())
            .finish()
    }
}

/// Criteria for searching the ledger history. Unset fields match anything.
#[derive(Debug, Default, Clone)]
pub struct OperationQuery {
    pub target: Option<TargetId>,
    pub key: Option<Key>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub transaction: Option<TransactionId>,
}

impl OperationQuery {
    pub fn new() -> Self { Self::default() }

    pub fn target(mut self, target: TargetId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    pub fn old_value(mut self, value: impl Into<Value>) -> Self {
        self.old_value = Some(value.into());
        self
    }

    pub fn new_value(mut self, value: impl Into<Value>) -> Self {
        self.new_value = Some(value.into());
        self
    }

    pub fn transaction(mut self, id: TransactionId) -> Self {
        self.transaction = Some(id);
        self
    }

    fn matches(&self, operation: &Operation) -> bool {
        if self.target.is_some_and(|target| operation.target != target) {
            return false;
        }
        if self.key.as_ref().is_some_and(|key| operation.key != *key) {
            return false;
        }
        if self.old_value.as_ref().is_some_and(|old| operation.old_value.as_ref() != Some(old)) {
            return false;
        }
        if self.new_value.as_ref().is_some_and(|new| operation.new_value.as_ref() != Some(new)) {
            return false;
        }
        if self.transaction.is_some_and(|trx| operation.transaction != Some(trx)) {
            return false;
        }
        true
    }
}
