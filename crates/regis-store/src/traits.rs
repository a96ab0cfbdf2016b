use regis_types::{RecordField, Value};

use crate::error::StoreResult;
use crate::record::Record;

/// Sorted, string-keyed record storage.
///
/// All implementations must satisfy these invariants:
/// - Keys are ordered by plain lexicographic string order and nothing else.
/// - Registration (`insert`) and assignment (`set_value`) are distinct:
///   assigning to a key that was never registered fails with
///   `KeyNotRegistered`.
/// - `keys_in_range(min, max)` covers the half-open range `[min, max)` and
///   returns a snapshot; later writes do not affect a returned vector.
/// - Single-key operations are atomic.
pub trait RecordStore: Send + Sync {
    /// Read the record at `key`.
    ///
    /// Returns `Ok(None)` if the key was never registered.
    fn get(&self, key: &str) -> StoreResult<Option<Record>>;

    /// Register a new record. Fails with `AlreadyRegistered` if the key exists.
    fn insert(&self, key: &str, record: Record) -> StoreResult<()>;

    /// Replace the value of a registered record and return the old value.
    fn set_value(&self, key: &str, value: Option<Value>) -> StoreResult<Option<Value>>;

    /// Replace the descriptor of a registered record, keeping its value.
    fn replace_field(&self, key: &str, field: RecordField) -> StoreResult<()>;

    /// Delete a record. Returns the removed record, if there was one.
    fn delete(&self, key: &str) -> StoreResult<Option<Record>>;

    /// Sorted keys in `[min, max)`. Empty when `min >= max`.
    fn keys_in_range(&self, min: &str, max: &str) -> StoreResult<Vec<String>>;

    fn contains(&self, key: &str) -> StoreResult<bool>;

    fn len(&self) -> StoreResult<usize>;

    /// Every record in key order.
    fn entries(&self) -> StoreResult<Vec<(String, Record)>>;

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Read only the stored value at `key`.
    fn value(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.get(key)?.and_then(|r| r.value))
    }

    /// Delete every record in `[min, max)` and return what was removed.
    ///
    /// Default implementation scans the range, then deletes key by key.
    /// Backends may override to delete the range in one step.
    fn delete_range(&self, min: &str, max: &str) -> StoreResult<Vec<(String, Record)>> {
        let mut removed = Vec::new();
        for key in self.keys_in_range(min, max)? {
            if let Some(record) = self.delete(&key)? {
                removed.push((key, record));
            }
        }
        Ok(removed)
    }
}
