//! On-disk snapshot files.
//!
//! A snapshot is a JSON document:
//!
//! ```text
//! { "layout": 2, "records": { "<key>": <record>, ... } }
//! ```
//!
//! Layout 1 stores bare field/value pairs ([`LegacyRecord`](crate::LegacyRecord)),
//! layout 2 stores full [`Record`]s. Snapshots are always written in the
//! current layout.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::legacy::LegacyRecords;
use crate::memory::InMemoryRecordStore;
use crate::record::Record;

/// Layout of snapshots holding bare field/value pairs.
pub const LEGACY_LAYOUT: u32 = 1;

/// Layout written by this version.
pub const CURRENT_LAYOUT: u32 = 2;

/// Serialized form of a record store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub layout: u32,
    pub records: BTreeMap<String, serde_json::Value>,
}

/// The decoded contents of a snapshot.
#[derive(Debug)]
pub enum SnapshotContents {
    Legacy(LegacyRecords),
    Current(InMemoryRecordStore),
}

impl Snapshot {
    /// Build a current-layout snapshot from sorted entries.
    pub fn from_entries(entries: Vec<(String, Record)>) -> StoreResult<Self> {
        let records = entries
            .into_iter()
            .map(|(key, record)| {
                serde_json::to_value(&record)
                    .map(|raw| (key, raw))
                    .map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .collect::<StoreResult<BTreeMap<_, _>>>()?;
        Ok(Self {
            layout: CURRENT_LAYOUT,
            records,
        })
    }

    /// Wrap legacy entries as a layout-1 snapshot.
    pub fn from_legacy(legacy: &LegacyRecords) -> Self {
        Self {
            layout: LEGACY_LAYOUT,
            records: legacy.raw_entries().clone(),
        }
    }

    /// Parse a snapshot from JSON text.
    pub fn from_json(text: &str) -> StoreResult<Self> {
        serde_json::from_str(text).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Read a snapshot file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = fs::read_to_string(path)?;
        let snapshot = Self::from_json(&text)?;
        debug!(
            path = %path.display(),
            layout = snapshot.layout,
            records = snapshot.records.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Write the snapshot atomically: a temp file in the target directory is
    /// written, synced, and renamed over `path`.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let text = serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;

        debug!(path = %path.display(), records = self.records.len(), "snapshot saved");
        Ok(())
    }

    /// Decode the records according to the snapshot's layout.
    ///
    /// Legacy entries are kept raw; they are checked when the registry
    /// migrates them.
    pub fn into_contents(self) -> StoreResult<SnapshotContents> {
        match self.layout {
            LEGACY_LAYOUT => Ok(SnapshotContents::Legacy(LegacyRecords::from_raw(self.records))),
            CURRENT_LAYOUT => {
                let records = self
                    .records
                    .into_iter()
                    .map(|(key, raw)| {
                        serde_json::from_value::<Record>(raw)
                            .map(|record| (key.clone(), record))
                            .map_err(|e| StoreError::Serialization(format!("record {key}: {e}")))
                    })
                    .collect::<StoreResult<BTreeMap<_, _>>>()?;
                Ok(SnapshotContents::Current(InMemoryRecordStore::from_records(records)))
            }
            other => Err(StoreError::UnsupportedLayout(other)),
        }
    }
}
