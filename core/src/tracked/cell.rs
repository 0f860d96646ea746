use std::sync::{Arc, RwLock};

use crate::{
    error::CompensationFault,
    id::TargetId,
    operation::{Compensation, Key, OperationDraft},
    transaction::Transaction,
    value::TrackedValue,
};

/// A single tracked attribute of a domain aggregate.
///
/// Writes go through [`set`](Self::set) inside a transaction scope, which
/// captures the prior value and records an operation whose rollback restores
/// it. The first-ever write has no prior state to restore and records nothing.
/// Writes outside any scope use [`set_direct`](Self::set_direct) and are
/// deliberately unrecorded.
pub struct TrackedCell<T: TrackedValue> {
    target: TargetId,
    name: String,
    slot: Arc<RwLock<Option<T>>>,
}

impl<T: TrackedValue> Clone for TrackedCell<T> {
    fn clone(&self) -> Self { Self { target: self.target, name: self.name.clone(), slot: self.slot.clone() } }
}

impl<T: TrackedValue> TrackedCell<T> {
    /// An unset cell. The next write is the first write and will not record.
    pub fn new(name: impl Into<String>) -> Self { Self { target: TargetId::new(), name: name.into(), slot: Arc::new(RwLock::new(None)) } }

    /// A cell seeded with an initial value, as if the first write already
    /// happened. Subsequent writes record normally.
    pub fn with_value(name: impl Into<String>, value: T) -> Self {
        Self { target: TargetId::new(), name: name.into(), slot: Arc::new(RwLock::new(Some(value))) }
    }

    pub fn target(&self) -> TargetId { self.target }

    pub fn name(&self) -> &str { &self.name }

    pub fn get(&self) -> Option<T> { self.slot.read().unwrap().clone() }

    /// Write within a transaction scope. Returns the prior value.
    pub fn set(&self, trx: &Transaction, value: T) -> Option<T> {
        let prior = self.slot.write().unwrap().replace(value.clone());

        if let Some(prior_value) = &prior {
            let weak = Arc::downgrade(&self.slot);
            let restore = prior_value.clone();
            trx.record_applied(OperationDraft {
                target: self.target,
                key: Key::Attr(self.name.clone()),
                old_value: Some(prior_value.to_value()),
                new_value: Some(value.to_value()),
                compensation: Compensation::Local(Box::new(move || {
                    let slot = weak.upgrade().ok_or(CompensationFault::TargetDropped)?;
                    *slot.write().unwrap() = Some(restore.clone());
                    Ok(())
                })),
            });
        }
        prior
    }

    /// Write outside any transaction scope. Nothing is recorded, so nothing
    /// will undo this.
    pub fn set_direct(&self, value: T) -> Option<T> { self.slot.write().unwrap().replace(value) }
}

impl<T: TrackedValue> std::fmt::Debug for TrackedCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedCell").field("name", &self.name).field("value", &self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Ledger, OperationQuery};

    #[tokio::test]
    async fn first_write_records_nothing() {
        let ledger = Ledger::new();
        let cell: TrackedCell<i64> = TrackedCell::new("balance");

        let trx = ledger.begin().await;
        assert_eq!(cell.set(&trx, 100), None);
        trx.end().await.unwrap();

        assert_eq!(ledger.history_len(), 0);
        assert_eq!(cell.get(), Some(100));
    }

    #[tokio::test]
    async fn second_write_records_and_rolls_back() {
        let ledger = Ledger::new();
        let cell = TrackedCell::with_value("balance", 100i64);

        let trx = ledger.begin().await;
        assert_eq!(cell.set(&trx, 250), Some(100));
        trx.abort().await.unwrap();

        assert_eq!(cell.get(), Some(100));
        let op = ledger.find_one(&OperationQuery::new().target(cell.target())).unwrap();
        assert_eq!(op.old_value, Some(100i64.into()));
        assert_eq!(op.new_value, Some(250i64.into()));
    }

    #[tokio::test]
    async fn direct_write_is_unrecorded() {
        let ledger = Ledger::new();
        let cell = TrackedCell::with_value("balance", 1i64);

        let trx = ledger.begin().await;
        cell.set_direct(7);
        trx.abort().await.unwrap();

        // nothing recorded, so the abort had nothing to restore
        assert_eq!(cell.get(), Some(7));
        assert_eq!(ledger.history_len(), 0);
    }

    #[tokio::test]
    async fn rollback_after_cell_dropped_reports_target_dropped() {
        let ledger = Ledger::new();
        let trx = ledger.begin().await;
        {
            let cell = TrackedCell::with_value("balance", 1i64);
            cell.set(&trx, 2);
        }
        let err = trx.abort().await.unwrap_err();
        assert!(matches!(err.fault, CompensationFault::TargetDropped));
    }
}
