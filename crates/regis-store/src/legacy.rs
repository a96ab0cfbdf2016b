//! The layout-1 record representation.
//!
//! Early snapshots stored each record as a bare `{ "field": ..., "value": ... }`
//! pair: no field indirection, no field name, no owning schema. Such stores
//! are loaded as [`LegacyRecords`] and upgraded to [`Record`]s on first access
//! by the registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use regis_types::{Field, RecordField, Value};

use crate::error::{StoreError, StoreResult};
use crate::record::Record;

/// A layout-1 record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegacyRecord {
    pub field: Field,
    #[serde(default)]
    pub value: Option<Value>,
}

impl LegacyRecord {
    pub fn new(field: Field, value: Option<Value>) -> Self {
        Self { field, value }
    }

    /// Rebuild into the current record shape, keeping field and value.
    pub fn into_record(self) -> Record {
        Record {
            field_name: self.field.name.clone(),
            field: RecordField::Field(self.field),
            value: self.value,
            interface_name: None,
        }
    }
}

/// A layout-1 store: keys mapped to undecoded legacy entries.
///
/// Entries stay raw until migration so that a malformed entry surfaces as a
/// migration failure on first access rather than hiding behind a load error.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LegacyRecords {
    entries: BTreeMap<String, serde_json::Value>,
}

impl LegacyRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_raw(entries: BTreeMap<String, serde_json::Value>) -> Self {
        Self { entries }
    }

    /// Insert a well-formed legacy record.
    pub fn insert(&mut self, key: impl Into<String>, record: &LegacyRecord) -> StoreResult<()> {
        let raw =
            serde_json::to_value(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.entries.insert(key.into(), raw);
        Ok(())
    }

    /// Insert an entry exactly as it would appear on disk.
    pub fn insert_raw(&mut self, key: impl Into<String>, raw: serde_json::Value) {
        self.entries.insert(key.into(), raw);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn raw_entries(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.entries
    }

    /// Decode every entry into the current record shape.
    ///
    /// Fails on the first entry that does not decode; nothing is returned
    /// for a partially decoded store.
    pub fn upgrade(&self) -> StoreResult<BTreeMap<String, Record>> {
        self.entries
            .iter()
            .map(|(key, raw)| {
                let legacy: LegacyRecord = serde_json::from_value(raw.clone()).map_err(|e| {
                    StoreError::Serialization(format!("legacy record {key}: {e}"))
                })?;
                Ok((key.clone(), legacy.into_record()))
            })
            .collect()
    }
}
