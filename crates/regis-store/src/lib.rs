//! Sorted record storage for the Regis registry.
//!
//! The registry keeps configuration as a flat map from string keys to
//! [`Record`]s. Keys encode a hierarchy with two separator characters, so
//! everything the registry does with a subtree (existence checks,
//! enumeration, cascading deletes) reduces to half-open range queries over
//! sorted keys. This crate owns that contract and nothing above it.
//!
//! # Storage Backends
//!
//! All backends implement the [`RecordStore`] trait:
//!
//! - [`InMemoryRecordStore`] -- `BTreeMap`-based store
//!
//! # Persistence
//!
//! [`Snapshot`] reads and writes JSON snapshot files. Layout-1 files hold
//! [`LegacyRecord`]s and load as [`LegacyRecords`]; the registry upgrades
//! them lazily.
//!
//! # Design Rules
//!
//! 1. Registration and assignment are separate operations.
//! 2. Keys sort by plain string order; the store never interprets them.
//! 3. Range results are snapshots.
//! 4. Validation is the caller's job: the store writes what it is given.

pub mod error;
pub mod legacy;
pub mod memory;
pub mod record;
pub mod snapshot;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use legacy::{LegacyRecord, LegacyRecords};
pub use memory::InMemoryRecordStore;
pub use record::Record;
pub use snapshot::{Snapshot, SnapshotContents, CURRENT_LAYOUT, LEGACY_LAYOUT};
pub use traits::RecordStore;
