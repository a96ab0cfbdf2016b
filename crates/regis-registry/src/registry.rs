//! The [`Registry`]: validated access to a sorted record store.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, RwLock};

use regis_store::{
    InMemoryRecordStore, LegacyRecords, Record, RecordStore, Snapshot, SnapshotContents,
};
use regis_types::{FieldDescriptor, FieldRef, RecordField, Schema, Value, VocabularyResolver};
use tracing::debug;

use crate::collection::RecordsProxyCollection;
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::events::{EventBus, EventFilter, EventStream, RegistryEvent};
use crate::keys::KeyLayout;
use crate::migration::{MigrationGuard, Representation};
use crate::proxy::RecordsProxy;

/// A typed configuration registry.
///
/// Records live in a [`RecordStore`] under dotted/slashed keys (see
/// [`keys`](crate::keys)). The registry validates every write against the
/// record's field, publishes change events, and hands out schema-bound
/// [`RecordsProxy`] and [`RecordsProxyCollection`] views.
///
/// Registries opened from a legacy snapshot upgrade their records on first
/// access; see [`migration`](crate::migration).
pub struct Registry {
    records: MigrationGuard,
    config: RegistryConfig,
    layout: KeyLayout,
    events: EventBus,
    schemas: RwLock<BTreeMap<String, Arc<Schema>>>,
}

impl Registry {
    /// An empty in-memory registry with the default configuration.
    pub fn new() -> Self {
        let config = RegistryConfig::default();
        Self {
            records: MigrationGuard::current(Arc::new(InMemoryRecordStore::new())),
            events: EventBus::new(config.event_capacity),
            layout: KeyLayout::default(),
            schemas: RwLock::new(BTreeMap::new()),
            config,
        }
    }

    /// An empty in-memory registry with the given configuration.
    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(InMemoryRecordStore::new()))
    }

    /// A registry over an existing store.
    pub fn with_store(config: RegistryConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        Self::build(config, MigrationGuard::current(store))
    }

    /// A registry over legacy records, upgraded on first access.
    pub fn from_legacy(config: RegistryConfig, legacy: LegacyRecords) -> Result<Self> {
        Self::build(config, MigrationGuard::legacy(legacy))
    }

    /// Open a snapshot file. Legacy snapshots are not migrated until the
    /// registry is first used.
    pub fn open(config: RegistryConfig, path: &Path) -> Result<Self> {
        match Snapshot::load(path)?.into_contents()? {
            SnapshotContents::Legacy(legacy) => Self::from_legacy(config, legacy),
            SnapshotContents::Current(store) => Self::with_store(config, Arc::new(store)),
        }
    }

    fn build(config: RegistryConfig, records: MigrationGuard) -> Result<Self> {
        let layout = config.validate()?;
        Ok(Self {
            records,
            events: EventBus::new(config.event_capacity),
            layout,
            schemas: RwLock::new(BTreeMap::new()),
            config,
        })
    }

    /// Write every record to a current-layout snapshot file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot::from_entries(self.records()?.entries()?)?;
        snapshot.save(path)?;
        Ok(())
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    /// Subscribe to record events matching `filter`.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.events.subscribe(filter)
    }

    /// The representation records are currently held in. Does not migrate.
    pub fn representation(&self) -> Result<Representation> {
        self.records.representation()
    }

    /// Upgrade a legacy store now instead of on first access.
    /// Returns `false` if the store was already current.
    pub fn migrate(&self) -> Result<bool> {
        self.records.migrate()
    }

    /// The underlying record store, migrated if necessary.
    ///
    /// Writes made directly to the store bypass validation and events.
    pub fn records(&self) -> Result<Arc<dyn RecordStore>> {
        self.records.store()
    }

    // ---- Registration ----

    /// Register a record at `key` holding the field's missing value.
    pub fn register_field(&self, key: &str, field: impl Into<RecordField>) -> Result<()> {
        let field = field.into();
        let initial = field.missing_value().cloned();
        self.register_record(key, Record::new(field, initial))
    }

    /// Register a record at `key` with an explicit initial value.
    pub fn register_field_with_value(
        &self,
        key: &str,
        field: impl Into<RecordField>,
        value: Option<Value>,
    ) -> Result<()> {
        self.register_record(key, Record::new(field, value))
    }

    /// Register a prepared record. Fails with `AlreadyRegistered` if the key
    /// exists.
    pub fn register_record(&self, key: &str, record: Record) -> Result<()> {
        check_initial(key, &record)?;
        let interface_name = record.interface_name.clone();
        self.records()?.insert(key, record)?;
        debug!(key, "record registered");
        self.events.emit(RegistryEvent::RecordAdded {
            key: key.to_string(),
            interface_name,
        });
        Ok(())
    }

    /// Register one record per non-omitted field of `schema` under `prefix`
    /// (default: the schema identifier), in declaration order.
    ///
    /// Records start at the field's default and remember the schema
    /// identifier. Keys that already exist are left alone, so registering the
    /// same schema twice is harmless. Returns the newly created keys.
    pub fn register_schema(
        &self,
        schema: &Schema,
        omitted: &[&str],
        prefix: Option<&str>,
    ) -> Result<Vec<String>> {
        let prefix = self.layout.proxy_prefix(schema.identifier(), prefix);
        let store = self.records()?;
        let mut created = Vec::new();
        self.schemas
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(schema.identifier().to_string(), Arc::new(schema.clone()));

        for (name, field) in schema.fields_in_order() {
            if omitted.contains(&name) {
                continue;
            }
            let key = format!("{prefix}{name}");
            if store.contains(&key)? {
                continue;
            }
            let record = Record::with_default(field.clone()).with_interface(schema.identifier());
            self.register_record(&key, record)?;
            created.push(key);
        }

        debug!(
            schema = schema.identifier(),
            prefix = %prefix,
            created = created.len(),
            "schema registered"
        );
        Ok(created)
    }

    /// The schema a record was generated from, if it was registered through
    /// [`register_schema`](Self::register_schema) on this registry.
    pub fn schema_for(&self, record: &Record) -> Option<Arc<Schema>> {
        let name = record.interface_name.as_deref()?;
        self.schemas
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    /// Register `key` as an alias of `source_key`'s field: the new record
    /// carries a [`FieldRef`] to the source field and starts at its default.
    pub fn register_alias(&self, key: &str, source_key: &str) -> Result<()> {
        let source = self
            .record(source_key)?
            .ok_or_else(|| RegistryError::KeyNotRegistered(source_key.to_string()))?;
        let field = source.field.as_field().clone();
        let field_ref = FieldRef::new(source_key, field);
        let initial = field_ref.default_value().cloned();
        let mut record = Record::new(field_ref, initial);
        record.interface_name = source.interface_name;
        self.register_record(key, record)
    }

    /// Move the record at `from` to `to`.
    ///
    /// The descriptor is wrapped in a [`FieldRef`] naming the new key, so the
    /// field's declared type and capabilities are unchanged; value and owning
    /// schema move along. `to` must not exist yet.
    pub fn relocate(&self, from: &str, to: &str) -> Result<()> {
        let store = self.records()?;
        let record = store
            .get(from)?
            .ok_or_else(|| RegistryError::KeyNotRegistered(from.to_string()))?;
        if store.contains(to)? {
            return Err(RegistryError::AlreadyRegistered(to.to_string()));
        }

        let field = FieldRef::new(to, record.field.as_field().clone());
        let moved = Record {
            field: RecordField::Ref(field),
            value: record.value.clone(),
            field_name: record.field_name.clone(),
            interface_name: record.interface_name.clone(),
        };
        self.register_record(to, moved)?;
        self.remove(from)?;
        debug!(from, to, "record relocated");
        Ok(())
    }

    /// Resolve the named vocabularies of the record's field against
    /// `context` and store the bound descriptor in place. The value is kept.
    pub fn bind_field(&self, key: &str, context: &dyn VocabularyResolver) -> Result<()> {
        let store = self.records()?;
        let record = store
            .get(key)?
            .ok_or_else(|| RegistryError::KeyNotRegistered(key.to_string()))?;
        store.replace_field(key, record.field.bind(context))?;
        debug!(key, "record field bound");
        Ok(())
    }

    // ---- Access ----

    pub fn record(&self, key: &str) -> Result<Option<Record>> {
        Ok(self.records()?.get(key)?)
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.records()?.contains(key)?)
    }

    /// The value at `key`, falling back to the field's missing value.
    /// Unregistered keys read as `None`.
    pub fn get_value(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .record(key)?
            .and_then(|record| record.effective_value().cloned()))
    }

    /// Validate `value` against the record's field and store it.
    pub fn set_value(&self, key: &str, value: Option<Value>) -> Result<()> {
        let record = self
            .record(key)?
            .ok_or_else(|| RegistryError::KeyNotRegistered(key.to_string()))?;
        record
            .field
            .validate(value.as_ref())
            .map_err(|source| RegistryError::Validation {
                key: key.to_string(),
                source,
            })?;
        self.write_value(key, value)
    }

    /// Store an already-validated value and publish the change.
    pub(crate) fn write_value(&self, key: &str, value: Option<Value>) -> Result<()> {
        let store = self.records()?;
        let old_value = store.set_value(key, value.clone())?;
        if old_value != value {
            let interface_name = store.get(key)?.and_then(|r| r.interface_name);
            self.events.emit(RegistryEvent::RecordModified {
                key: key.to_string(),
                interface_name,
                old_value,
                new_value: value,
            });
        }
        Ok(())
    }

    /// Delete the record at `key` and return it.
    pub fn remove(&self, key: &str) -> Result<Record> {
        let record = self
            .records()?
            .delete(key)?
            .ok_or_else(|| RegistryError::KeyNotRegistered(key.to_string()))?;
        debug!(key, "record removed");
        self.events.emit(RegistryEvent::RecordRemoved {
            key: key.to_string(),
            interface_name: record.interface_name.clone(),
            value: record.value.clone(),
        });
        Ok(record)
    }

    /// Delete every record in `[min, max)` and return the removed keys.
    pub(crate) fn remove_range(&self, min: &str, max: &str) -> Result<Vec<String>> {
        let removed = self.records()?.delete_range(min, max)?;
        let mut keys = Vec::with_capacity(removed.len());
        for (key, record) in removed {
            self.events.emit(RegistryEvent::RecordRemoved {
                key: key.clone(),
                interface_name: record.interface_name,
                value: record.value,
            });
            keys.push(key);
        }
        debug!(min, max, removed = keys.len(), "record range removed");
        Ok(keys)
    }

    /// Sorted keys in `[min, max)`.
    pub fn keys_in_range(&self, min: &str, max: &str) -> Result<Vec<String>> {
        Ok(self.records()?.keys_in_range(min, max)?)
    }

    /// Every key, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .records()?
            .entries()?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.records()?.len()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.records()?.is_empty()?)
    }

    // ---- Schema views ----

    /// A proxy binding `schema` to the records under `prefix` (default: the
    /// schema identifier).
    ///
    /// With `check`, every non-omitted field must already have a registered
    /// record, otherwise `KeyNotRegistered` names the first missing key.
    pub fn for_schema(
        &self,
        schema: impl Into<Arc<Schema>>,
        check: bool,
        omitted: &[&str],
        prefix: Option<&str>,
    ) -> Result<RecordsProxy<'_>> {
        let schema = schema.into();
        let prefix = self.layout.proxy_prefix(schema.identifier(), prefix);
        let omitted: Arc<BTreeSet<String>> =
            Arc::new(omitted.iter().map(|s| s.to_string()).collect());
        self.proxy(schema, omitted, prefix, check)
    }

    pub(crate) fn proxy(
        &self,
        schema: Arc<Schema>,
        omitted: Arc<BTreeSet<String>>,
        prefix: String,
        check: bool,
    ) -> Result<RecordsProxy<'_>> {
        if check {
            let store = self.records()?;
            for (name, _) in schema.fields_in_order() {
                if omitted.contains(name) {
                    continue;
                }
                let key = format!("{prefix}{name}");
                if !store.contains(&key)? {
                    return Err(RegistryError::KeyNotRegistered(key));
                }
            }
        }
        Ok(RecordsProxy::new(self, schema, omitted, prefix, check))
    }

    /// A collection of `schema` entries under `prefix` (default: the schema
    /// identifier), terminated by the collection separator.
    pub fn collection_for_schema(
        &self,
        schema: impl Into<Arc<Schema>>,
        check: bool,
        omitted: &[&str],
        prefix: Option<&str>,
    ) -> RecordsProxyCollection<'_> {
        let schema = schema.into();
        let prefix = self.layout.collection_prefix(schema.identifier(), prefix);
        let omitted: Arc<BTreeSet<String>> =
            Arc::new(omitted.iter().map(|s| s.to_string()).collect());
        RecordsProxyCollection::new(self, schema, omitted, check, prefix)
    }

    /// A collection at the schema's default prefix using the configured
    /// `check_required` flag.
    pub fn collection(&self, schema: impl Into<Arc<Schema>>) -> RecordsProxyCollection<'_> {
        self.collection_for_schema(schema, self.config.check_required, &[], None)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("records", &self.records)
            .field("layout", &self.layout)
            .field("events", &self.events)
            .finish()
    }
}

/// A record's initial value must satisfy its field unless it is the field's
/// missing value or absent.
fn check_initial(key: &str, record: &Record) -> Result<()> {
    match &record.value {
        None => Ok(()),
        Some(v) if Some(v) == record.field.missing_value() => Ok(()),
        Some(v) => record
            .field
            .validate(Some(v))
            .map_err(|source| RegistryError::Validation {
                key: key.to_string(),
                source,
            }),
    }
}
