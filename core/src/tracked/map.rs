use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use crate::{
    error::{CompensationFault, MutationError},
    id::TargetId,
    ledger::Ledger,
    operation::{Compensation, Key, Operation, OperationDraft},
    value::TrackedValue,
};

/// A tracked keyed collection.
///
/// Inverses are keyed, not positional: rolling back an insertion removes the
/// key (or restores the value it displaced), and rolling back a removal
/// reinserts the entry. A removal's inverse refuses to clobber a key that was
/// recreated after the removal; that surfaces as a conflict fault.
pub struct TrackedMap<K, V>
where
    K: TrackedValue + Ord,
    V: TrackedValue,
{
    target: TargetId,
    name: String,
    entries: Arc<RwLock<BTreeMap<K, V>>>,
}

impl<K, V> Clone for TrackedMap<K, V>
where
    K: TrackedValue + Ord,
    V: TrackedValue,
{
    fn clone(&self) -> Self { Self { target: self.target, name: self.name.clone(), entries: self.entries.clone() } }
}

impl<K, V> TrackedMap<K, V>
where
    K: TrackedValue + Ord,
    V: TrackedValue,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self { target: TargetId::new(), name: name.into(), entries: Arc::new(RwLock::new(BTreeMap::new())) }
    }

    pub fn with_entries(name: impl Into<String>, entries: BTreeMap<K, V>) -> Self {
        Self { target: TargetId::new(), name: name.into(), entries: Arc::new(RwLock::new(entries)) }
    }

    pub fn target(&self) -> TargetId { self.target }

    pub fn name(&self) -> &str { &self.name }

    pub fn len(&self) -> usize { self.entries.read().unwrap().len() }

    pub fn is_empty(&self) -> bool { self.entries.read().unwrap().is_empty() }

    pub fn get(&self, key: &K) -> Option<V> { self.entries.read().unwrap().get(key).cloned() }

    pub fn contains_key(&self, key: &K) -> bool { self.entries.read().unwrap().contains_key(key) }

    pub fn keys(&self) -> Vec<K> { self.entries.read().unwrap().keys().cloned().collect() }

    /// A point-in-time copy of the contents.
    pub fn snapshot(&self) -> BTreeMap<K, V> { self.entries.read().unwrap().clone() }

    /// Insert or overwrite an entry. Returns the displaced value, if any.
    pub fn insert(&self, ledger: &Ledger, key: K, value: V) -> (Option<V>, Arc<Operation>) {
        let prior = self.entries.write().unwrap().insert(key.clone(), value.clone());

        let compensation = match &prior {
            Some(prior_value) => self.restore_entry(key.clone(), prior_value.clone()),
            None => self.remove_entry(key.clone()),
        };
        let operation = ledger.record_applied(OperationDraft {
            target: self.target,
            key: Key::Entry(key.to_value()),
            old_value: prior.as_ref().map(|prior_value| prior_value.to_value()),
            new_value: Some(value.to_value()),
            compensation,
        });
        (prior, operation)
    }

    /// Remove an entry. A missing key is an error and records nothing.
    pub fn remove(&self, ledger: &Ledger, key: &K) -> Result<(V, Arc<Operation>), MutationError> {
        let Some(removed) = self.entries.write().unwrap().remove(key) else {
            return Err(MutationError::KeyNotFound { key: format!("{key:?}") });
        };

        let operation = ledger.record_applied(OperationDraft {
            target: self.target,
            key: Key::Entry(key.to_value()),
            old_value: Some(removed.to_value()),
            new_value: None,
            compensation: self.reinsert_entry(key.clone(), removed.clone()),
        });
        Ok((removed, operation))
    }

    /// Inverse of an overwrite: put the displaced value back.
    fn restore_entry(&self, key: K, prior: V) -> Compensation {
        let weak = Arc::downgrade(&self.entries);
        Compensation::Local(Box::new(move || {
            let entries = weak.upgrade().ok_or(CompensationFault::TargetDropped)?;
            entries.write().unwrap().insert(key.clone(), prior.clone());
            Ok(())
        }))
    }

    /// Inverse of a fresh insertion: take the key out again.
    fn remove_entry(&self, key: K) -> Compensation {
        let weak = Arc::downgrade(&self.entries);
        Compensation::Local(Box::new(move || {
            let entries = weak.upgrade().ok_or(CompensationFault::TargetDropped)?;
            let removed = entries.write().unwrap().remove(&key);
            match removed {
                Some(_) => Ok(()),
                None => Err(CompensationFault::Conflict { detail: format!("key {key:?} is already absent") }),
            }
        }))
    }

    /// Inverse of a removal: reinsert the entry, unless the key was recreated
    /// in the meantime.
    fn reinsert_entry(&self, key: K, removed: V) -> Compensation {
        let weak = Arc::downgrade(&self.entries);
        Compensation::Local(Box::new(move || {
            let entries = weak.upgrade().ok_or(CompensationFault::TargetDropped)?;
            let mut entries = entries.write().unwrap();
            if entries.contains_key(&key) {
                return Err(CompensationFault::Conflict { detail: format!("key {key:?} was recreated after the removal") });
            }
            entries.insert(key.clone(), removed.clone());
            Ok(())
        }))
    }
}

impl<K, V> std::fmt::Debug for TrackedMap<K, V>
where
    K: TrackedValue + Ord,
    V: TrackedValue,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedMap").field("name", &self.name).field("entries", &self.snapshot()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_insert_rolls_back_to_absent() {
        let ledger = Ledger::new();
        let map: TrackedMap<String, i64> = TrackedMap::new("rates");

        let trx = ledger.begin().await;
        let (prior, _) = map.insert(&ledger, "checking".into(), 3);
        assert_eq!(prior, None);
        trx.abort().await.unwrap();

        assert!(!map.contains_key(&"checking".to_string()));
    }

    #[tokio::test]
    async fn overwrite_rolls_back_to_displaced_value() {
        let ledger = Ledger::new();
        let map: TrackedMap<String, i64> = TrackedMap::new("rates");
        map.insert(&ledger, "checking".into(), 3);

        let trx = ledger.begin().await;
        let (prior, _) = map.insert(&ledger, "checking".into(), 9);
        assert_eq!(prior, Some(3));
        trx.abort().await.unwrap();

        assert_eq!(map.get(&"checking".to_string()), Some(3));
    }

    #[tokio::test]
    async fn remove_missing_key_is_rejected_before_recording() {
        let ledger = Ledger::new();
        let map: TrackedMap<String, i64> = TrackedMap::new("rates");

        let err = map.remove(&ledger, &"checking".to_string()).unwrap_err();
        assert!(matches!(err, MutationError::KeyNotFound { .. }));
        assert_eq!(ledger.history_len(), 0);
    }

    #[tokio::test]
    async fn removal_rolls_back_to_reinserted_entry() {
        let ledger = Ledger::new();
        let map: TrackedMap<String, i64> = TrackedMap::new("rates");
        map.insert(&ledger, "checking".into(), 3);

        let trx = ledger.begin().await;
        let (removed, _) = map.remove(&ledger, &"checking".to_string()).unwrap();
        assert_eq!(removed, 3);
        trx.abort().await.unwrap();

        assert_eq!(map.get(&"checking".to_string()), Some(3));
    }

    #[tokio::test]
    async fn rolling_back_an_insert_whose_key_vanished_is_a_conflict() {
        let ledger = Ledger::new();
        let map: TrackedMap<String, i64> = TrackedMap::new("rates");

        let (_, insertion) = map.insert(&ledger, "checking".into(), 3);
        map.remove(&ledger, &"checking".to_string()).unwrap();

        let err = ledger.rollback(&insertion).await.unwrap_err();
        assert!(matches!(err.fault, CompensationFault::Conflict { .. }));
    }

    #[tokio::test]
    async fn reinserting_over_a_recreated_key_is_a_conflict() {
        let ledger = Ledger::new();
        let map: TrackedMap<String, i64> = TrackedMap::new("rates");
        map.insert(&ledger, "checking".into(), 3);

        let (_, removal) = map.remove(&ledger, &"checking".to_string()).unwrap();
        map.insert(&ledger, "checking".into(), 9);

        let err = ledger.rollback(&removal).await.unwrap_err();
        assert!(matches!(err.fault, CompensationFault::Conflict { .. }));
        assert_eq!(map.get(&"checking".to_string()), Some(9));
    }
}
