//! Lazy upgrade of legacy record stores.
//!
//! A registry opened from a layout-1 snapshot holds its records as
//! [`LegacyRecords`]. Nothing touches them until the first access, which goes
//! through [`MigrationGuard::store`]: if the representation is still legacy,
//! the caller takes the write lock, rebuilds every entry into a current
//! [`Record`](regis_store::Record) in a fresh store, and swaps it in. Callers
//! arriving meanwhile block on the lock and then see the migrated store.
//! A failed rebuild leaves the legacy representation in place.

use std::sync::{Arc, RwLock};

use regis_store::{InMemoryRecordStore, LegacyRecords, RecordStore, StoreError};
use tracing::{debug, info, warn};

use crate::error::{RegistryError, Result};

/// Which representation a registry's records are currently held in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Representation {
    Legacy,
    Current,
}

enum Records {
    Legacy(LegacyRecords),
    Current(Arc<dyn RecordStore>),
}

/// Owner of the record store reference; upgrades it at most once.
pub(crate) struct MigrationGuard {
    records: RwLock<Records>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> RegistryError {
    RegistryError::Store(StoreError::LockPoisoned(e.to_string()))
}

impl MigrationGuard {
    pub(crate) fn current(store: Arc<dyn RecordStore>) -> Self {
        Self {
            records: RwLock::new(Records::Current(store)),
        }
    }

    pub(crate) fn legacy(records: LegacyRecords) -> Self {
        Self {
            records: RwLock::new(Records::Legacy(records)),
        }
    }

    pub(crate) fn representation(&self) -> Result<Representation> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(match &*records {
            Records::Legacy(_) => Representation::Legacy,
            Records::Current(_) => Representation::Current,
        })
    }

    /// The current-representation store, migrating first if needed.
    pub(crate) fn store(&self) -> Result<Arc<dyn RecordStore>> {
        {
            let records = self.records.read().map_err(poisoned)?;
            if let Records::Current(store) = &*records {
                return Ok(Arc::clone(store));
            }
        }
        self.migrate()?;

        let records = self.records.read().map_err(poisoned)?;
        match &*records {
            Records::Current(store) => Ok(Arc::clone(store)),
            Records::Legacy(_) => Err(RegistryError::MigrationFailed(
                "store is still in the legacy representation".into(),
            )),
        }
    }

    /// Upgrade a legacy store. Returns `false` if there was nothing to do.
    pub(crate) fn migrate(&self) -> Result<bool> {
        let mut records = self.records.write().map_err(poisoned)?;
        let Records::Legacy(legacy) = &*records else {
            debug!("record store already current; migration skipped");
            return Ok(false);
        };

        let upgraded = legacy.upgrade().map_err(|e| {
            warn!(error = %e, "legacy record migration aborted");
            RegistryError::MigrationFailed(e.to_string())
        })?;
        let count = upgraded.len();
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::from_records(upgraded));
        *records = Records::Current(store);

        info!(records = count, "migrated legacy records to the current layout");
        Ok(true)
    }
}

impl std::fmt::Debug for MigrationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationGuard")
            .field("representation", &self.representation().ok())
            .finish()
    }
}
