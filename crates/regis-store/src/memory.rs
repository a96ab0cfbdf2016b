//! In-memory record store.
//!
//! [`InMemoryRecordStore`] keeps all records in a `BTreeMap` behind a
//! `RwLock`, which gives the sorted iteration and range scans the
//! [`RecordStore`] contract asks for.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use regis_types::{RecordField, Value};

use crate::error::{StoreError, StoreResult};
use crate::record::Record;
use crate::traits::RecordStore;

/// `BTreeMap`-backed record store.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<BTreeMap<String, Record>>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-keyed records.
    pub fn from_records(records: BTreeMap<String, Record>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, BTreeMap<String, Record>>> {
        self.records
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, BTreeMap<String, Record>>> {
        self.records
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

fn range_bounds<'a>(min: &'a str, max: &'a str) -> (Bound<&'a str>, Bound<&'a str>) {
    (Bound::Included(min), Bound::Excluded(max))
}

impl RecordStore for InMemoryRecordStore {
    fn get(&self, key: &str) -> StoreResult<Option<Record>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn insert(&self, key: &str, record: Record) -> StoreResult<()> {
        let mut map = self.write()?;
        if map.contains_key(key) {
            return Err(StoreError::AlreadyRegistered(key.to_string()));
        }
        map.insert(key.to_string(), record);
        Ok(())
    }

    fn set_value(&self, key: &str, value: Option<Value>) -> StoreResult<Option<Value>> {
        let mut map = self.write()?;
        let record = map
            .get_mut(key)
            .ok_or_else(|| StoreError::KeyNotRegistered(key.to_string()))?;
        Ok(std::mem::replace(&mut record.value, value))
    }

    fn replace_field(&self, key: &str, field: RecordField) -> StoreResult<()> {
        let mut map = self.write()?;
        let record = map
            .get_mut(key)
            .ok_or_else(|| StoreError::KeyNotRegistered(key.to_string()))?;
        record.field = field;
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<Option<Record>> {
        Ok(self.write()?.remove(key))
    }

    fn keys_in_range(&self, min: &str, max: &str) -> StoreResult<Vec<String>> {
        // BTreeMap::range panics on an inverted range.
        if min >= max {
            return Ok(Vec::new());
        }
        let map = self.read()?;
        Ok(map
            .range::<str, _>(range_bounds(min, max))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.read()?.contains_key(key))
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.len())
    }

    fn entries(&self) -> StoreResult<Vec<(String, Record)>> {
        Ok(self
            .read()?
            .iter()
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect())
    }

    fn delete_range(&self, min: &str, max: &str) -> StoreResult<Vec<(String, Record)>> {
        if min >= max {
            return Ok(Vec::new());
        }
        let mut map = self.write()?;
        let keys: Vec<String> = map
            .range::<str, _>(range_bounds(min, max))
            .map(|(k, _)| k.clone())
            .collect();
        Ok(keys
            .into_iter()
            .filter_map(|k| map.remove(&k).map(|r| (k, r)))
            .collect())
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.read().map(|m| m.len()).unwrap_or_default();
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &count)
            .finish()
    }
}
