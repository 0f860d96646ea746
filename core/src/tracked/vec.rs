use std::sync::{Arc, RwLock};

use crate::{
    error::{CompensationFault, MutationError},
    id::TargetId,
    ledger::Ledger,
    operation::{Compensation, Key, Operation, OperationDraft},
    value::TrackedValue,
};

/// A tracked ordered collection.
///
/// Every mutation records an operation, whether or not a transaction scope is
/// open; unlike attribute cells there is no unrecorded first write. Recorded
/// inverses are positional where possible: an insertion's inverse removes at
/// the recorded index when the element there still matches, and falls back to
/// removal by equality when the list has shifted since.
pub struct TrackedVec<T: TrackedValue> {
    target: TargetId,
    name: String,
    items: Arc<RwLock<Vec<T>>>,
}

impl<T: TrackedValue> Clone for TrackedVec<T> {
    fn clone(&self) -> Self { Self { target: self.target, name: self.name.clone(), items: self.items.clone() } }
}

impl<T: TrackedValue> TrackedVec<T> {
    pub fn new(name: impl Into<String>) -> Self { Self { target: TargetId::new(), name: name.into(), items: Arc::new(RwLock::new(Vec::new())) } }

    pub fn with_items(name: impl Into<String>, items: Vec<T>) -> Self {
        Self { target: TargetId::new(), name: name.into(), items: Arc::new(RwLock::new(items)) }
    }

    pub fn target(&self) -> TargetId { self.target }

    pub fn name(&self) -> &str { &self.name }

    pub fn len(&self) -> usize { self.items.read().unwrap().len() }

    pub fn is_empty(&self) -> bool { self.items.read().unwrap().is_empty() }

    pub fn get(&self, index: usize) -> Option<T> { self.items.read().unwrap().get(index).cloned() }

    pub fn contains(&self, item: &T) -> bool { self.items.read().unwrap().contains(item) }

    pub fn position(&self, item: &T) -> Option<usize> { self.items.read().unwrap().iter().position(|existing| existing == item) }

    /// A point-in-time copy of the contents.
    pub fn snapshot(&self) -> Vec<T> { self.items.read().unwrap().clone() }

    /// Append an element.
    pub fn push(&self, ledger: &Ledger, item: T) -> Arc<Operation> {
        let mut items = self.items.write().unwrap();
        let index = items.len();
        items.push(item.clone());
        drop(items);

        ledger.record_applied(OperationDraft {
            target: self.target,
            key: Key::Index(index),
            old_value: None,
            new_value: Some(item.to_value()),
            compensation: self.remove_inserted(index, item),
        })
    }

    /// Insert an element at `index`, shifting the tail right.
    pub fn insert(&self, ledger: &Ledger, index: usize, item: T) -> Result<Arc<Operation>, MutationError> {
        let mut items = self.items.write().unwrap();
        if index > items.len() {
            return Err(MutationError::OutOfBounds { index, len: items.len() });
        }
        items.insert(index, item.clone());
        drop(items);

        Ok(ledger.record_applied(OperationDraft {
            target: self.target,
            key: Key::Index(index),
            old_value: None,
            new_value: Some(item.to_value()),
            compensation: self.remove_inserted(index, item),
        }))
    }

    /// Overwrite the element at `index`.
    pub fn set(&self, ledger: &Ledger, index: usize, item: T) -> Result<Arc<Operation>, MutationError> {
        let mut items = self.items.write().unwrap();
        let Some(slot) = items.get_mut(index) else {
            return Err(MutationError::OutOfBounds { index, len: items.len() });
        };
        let prior = std::mem::replace(slot, item.clone());
        drop(items);

        Ok(ledger.record_applied(OperationDraft {
            target: self.target,
            key: Key::Index(index),
            old_value: Some(prior.to_value()),
            new_value: Some(item.to_value()),
            compensation: self.restore_at(index, prior),
        }))
    }

    /// Remove the first element equal to `item`.
    pub fn remove(&self, ledger: &Ledger, item: &T) -> Result<Arc<Operation>, MutationError> {
        let mut items = self.items.write().unwrap();
        let Some(index) = items.iter().position(|existing| existing == item) else {
            return Err(MutationError::ItemNotFound);
        };
        let removed = items.remove(index);
        drop(items);

        Ok(self.record_removal(ledger, index, removed))
    }

    /// Remove the element at `index`.
    pub fn remove_at(&self, ledger: &Ledger, index: usize) -> Result<Arc<Operation>, MutationError> {
        let mut items = self.items.write().unwrap();
        if index >= items.len() {
            return Err(MutationError::OutOfBounds { index, len: items.len() });
        }
        let removed = items.remove(index);
        drop(items);

        Ok(self.record_removal(ledger, index, removed))
    }

    fn record_removal(&self, ledger: &Ledger, index: usize, removed: T) -> Arc<Operation> {
        ledger.record_applied(OperationDraft {
            target: self.target,
            key: Key::Index(index),
            old_value: Some(removed.to_value()),
            new_value: None,
            compensation: self.reinsert(index, removed),
        })
    }

    /// Inverse of an insertion: take the element back out.
    fn remove_inserted(&self, index: usize, expected: T) -> Compensation {
        let weak = Arc::downgrade(&self.items);
        Compensation::Local(Box::new(move || {
            let items = weak.upgrade().ok_or(CompensationFault::TargetDropped)?;
            let mut items = items.write().unwrap();
            if items.get(index) == Some(&expected) {
                items.remove(index);
                return Ok(());
            }
            // the list shifted since recording, fall back to equality
            match items.iter().position(|existing| *existing == expected) {
                Some(found) => {
                    items.remove(found);
                    Ok(())
                }
                None => Err(CompensationFault::Conflict { detail: format!("inserted element {expected:?} is no longer present") }),
            }
        }))
    }

    /// Inverse of an overwrite: put the prior element back at its index.
    fn restore_at(&self, index: usize, prior: T) -> Compensation {
        let weak = Arc::downgrade(&self.items);
        Compensation::Local(Box::new(move || {
            let items = weak.upgrade().ok_or(CompensationFault::TargetDropped)?;
            let mut items = items.write().unwrap();
            match items.get_mut(index) {
                Some(slot) => {
                    *slot = prior.clone();
                    Ok(())
                }
                None => Err(CompensationFault::Conflict { detail: format!("index {index} is out of range, cannot restore {prior:?}") }),
            }
        }))
    }

    /// Inverse of a removal: put the element back, clamped to the current
    /// length if the tail shrank in the meantime.
    fn reinsert(&self, index: usize, item: T) -> Compensation {
        let weak = Arc::downgrade(&self.items);
        Compensation::Local(Box::new(move || {
            let items = weak.upgrade().ok_or(CompensationFault::TargetDropped)?;
            let mut items = items.write().unwrap();
            let at = index.min(items.len());
            items.insert(at, item.clone());
            Ok(())
        }))
    }
}

impl<T: TrackedValue> std::fmt::Debug for TrackedVec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedVec").field("name", &self.name).field("items", &self.snapshot()).finish()
    }
}
