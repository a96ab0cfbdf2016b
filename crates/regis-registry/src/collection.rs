//! Named collections of schema-bound entries.
//!
//! A [`RecordsProxyCollection`] stores each entry as a set of records under
//! `prefix + name + leaf`, where `prefix` ends in the collection separator.
//! Nothing records which entries exist: an entry exists while at least one
//! key lies in its range (see [`KeyLayout::entry_range`]), and
//! the set of entries is recovered by scanning the whole collection range.
//!
//! [`KeyLayout::entry_range`]: crate::keys::KeyLayout::entry_range

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use regis_types::{FieldDescriptor, Schema, Value};
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::keys::validate_entry_name;
use crate::proxy::{local_name, RecordsProxy};
use crate::registry::Registry;

/// Anything that can supply field values by name for a bulk write.
pub trait FieldSource {
    /// The value for `name`, or `Ok(None)` if the source has none.
    ///
    /// An error aborts the bulk write before anything is changed.
    fn field_value(&self, name: &str) -> Result<Option<Value>>;
}

impl FieldSource for BTreeMap<String, Value> {
    fn field_value(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.get(name).cloned())
    }
}

impl FieldSource for HashMap<String, Value> {
    fn field_value(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.get(name).cloned())
    }
}

/// JSON objects supply their members; `null` and values with no
/// [`Value`] counterpart count as absent.
impl FieldSource for serde_json::Map<String, serde_json::Value> {
    fn field_value(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.get(name).and_then(Value::from_json))
    }
}

/// Copies one entry's values into another. Fields the proxy's schema does
/// not declare are absent; any other read failure is passed on.
impl FieldSource for RecordsProxy<'_> {
    fn field_value(&self, name: &str) -> Result<Option<Value>> {
        match self.get(name) {
            Err(RegistryError::UnknownField { .. }) => Ok(None),
            other => other,
        }
    }
}

/// A keyed collection of [`RecordsProxy`] entries sharing one schema.
pub struct RecordsProxyCollection<'r> {
    registry: &'r Registry,
    schema: Arc<Schema>,
    omitted: Arc<BTreeSet<String>>,
    check: bool,
    prefix: String,
}

impl<'r> RecordsProxyCollection<'r> {
    pub(crate) fn new(
        registry: &'r Registry,
        schema: Arc<Schema>,
        omitted: Arc<BTreeSet<String>>,
        check: bool,
        prefix: String,
    ) -> Self {
        Self {
            registry,
            schema,
            omitted,
            check,
            prefix,
        }
    }

    /// Collection prefix, terminated by the collection separator.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn check(&self) -> bool {
        self.check
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns `true` if any record belongs to entry `name`.
    pub fn has(&self, name: &str) -> Result<bool> {
        validate_entry_name(name)?;
        let (min, max) = self.registry.layout().entry_range(&self.prefix, name);
        Ok(!self.registry.keys_in_range(&min, &max)?.is_empty())
    }

    /// Entry names in ascending order, each once.
    pub fn keys(&self) -> Result<Vec<String>> {
        let layout = self.registry.layout();
        let (min, max) = layout.collection_range(&self.prefix);
        let mut names: Vec<String> = Vec::new();
        for key in self.registry.keys_in_range(&min, &max)? {
            let Some(name) = layout.entry_name(&self.prefix, &key) else {
                continue;
            };
            if validate_entry_name(name).is_err() {
                continue;
            }
            // Only keys inside the entry's range make it exist.
            let rest = &key[self.prefix.len() + name.len()..];
            if !rest.starts_with(layout.leaf()) {
                continue;
            }
            if names.last().map(String::as_str) != Some(name) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Iterate over a snapshot of the entry names.
    pub fn iter(&self) -> Result<std::vec::IntoIter<String>> {
        Ok(self.keys()?.into_iter())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.keys()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.keys()?.is_empty())
    }

    /// The proxy for entry `name`. Fails with `KeyNotFound` if it does not
    /// exist.
    pub fn get(&self, name: &str) -> Result<RecordsProxy<'r>> {
        if !self.has(name)? {
            return Err(RegistryError::KeyNotFound(name.to_string()));
        }
        self.registry.proxy(
            Arc::clone(&self.schema),
            Arc::clone(&self.omitted),
            self.entry_prefix(name),
            self.check,
        )
    }

    /// Register the schema's records for entry `name` and return its proxy.
    /// Existing records are kept.
    pub fn add(&self, name: &str) -> Result<RecordsProxy<'r>> {
        validate_entry_name(name)?;
        let prefix = self.entry_prefix(name);
        let omitted: Vec<&str> = self.omitted.iter().map(String::as_str).collect();
        self.registry
            .register_schema(&self.schema, &omitted, Some(&prefix))?;
        debug!(collection = %self.prefix, entry = name, "collection entry added");
        Ok(RecordsProxy::new(
            self.registry,
            Arc::clone(&self.schema),
            Arc::clone(&self.omitted),
            prefix,
            self.check,
        ))
    }

    /// Create or update entry `name` from `source`.
    ///
    /// Every writable, non-omitted field is read from `source` and validated
    /// before anything is registered. A value is checked against the schema
    /// field and, where the entry already has a record for it, against the
    /// stored field too. If the collection checks required fields, a required
    /// field missing from `source` fails the whole call with
    /// `RequiredValueMissing`. On any error the registry is unchanged.
    ///
    /// This replaces rather than merges: writable fields that `source` does
    /// not supply are reset to their defaults, as a fresh `add` would leave
    /// them.
    pub fn set(&self, name: &str, source: &dyn FieldSource) -> Result<()> {
        validate_entry_name(name)?;
        let prefix = self.entry_prefix(name);

        let mut values = Vec::new();
        let mut resets = Vec::new();
        for (field_name, field) in self.schema.fields_in_order() {
            if self.omitted.contains(field_name) || field.is_readonly() {
                continue;
            }
            let key = format!("{prefix}{field_name}");
            match source.field_value(field_name)? {
                Some(value) => {
                    let invalid = |err| RegistryError::Validation {
                        key: key.clone(),
                        source: err,
                    };
                    field.validate(Some(&value)).map_err(invalid)?;
                    if let Some(stored) = self.registry.record(&key)? {
                        stored.field.validate(Some(&value)).map_err(invalid)?;
                    }
                    values.push((key, value));
                }
                None if field.is_required() && self.check => {
                    return Err(RegistryError::RequiredValueMissing(field_name.to_string()));
                }
                None => resets.push((key, field.default_value().cloned())),
            }
        }

        self.add(name)?;
        for (key, value) in values {
            self.registry.write_value(&key, Some(value))?;
        }
        for (key, default) in resets {
            self.registry.write_value(&key, default)?;
        }
        Ok(())
    }

    /// Return entry `name`, creating it first if it does not exist: from
    /// `fallback` when given, otherwise with schema defaults.
    pub fn setdefault(
        &self,
        name: &str,
        fallback: Option<&dyn FieldSource>,
    ) -> Result<RecordsProxy<'r>> {
        if !self.has(name)? {
            match fallback {
                Some(source) => self.set(name, source)?,
                None => {
                    self.add(name)?;
                }
            }
        }
        self.get(name)
    }

    /// Delete every record of entry `name`, nested collections included.
    /// Returns the deleted keys.
    pub fn remove(&self, name: &str) -> Result<Vec<String>> {
        if !self.has(name)? {
            return Err(RegistryError::KeyNotFound(name.to_string()));
        }
        let (min, max) = self.registry.layout().entry_range(&self.prefix, name);
        let removed = self.registry.remove_range(&min, &max)?;
        debug!(
            collection = %self.prefix,
            entry = name,
            records = removed.len(),
            "collection entry removed"
        );
        Ok(removed)
    }

    /// A collection of `schema` entries nested under entry `name`, named
    /// after the last segment of the schema identifier.
    pub fn collection(
        &self,
        name: &str,
        schema: impl Into<Arc<Schema>>,
    ) -> Result<RecordsProxyCollection<'r>> {
        validate_entry_name(name)?;
        let schema = schema.into();
        let prefix = self.registry.layout().nested_collection_prefix(
            &self.entry_prefix(name),
            local_name(schema.identifier()),
        );
        Ok(RecordsProxyCollection::new(
            self.registry,
            schema,
            Arc::new(BTreeSet::new()),
            self.check,
            prefix,
        ))
    }

    fn entry_prefix(&self, name: &str) -> String {
        let base = format!("{}{name}", self.prefix);
        self.registry
            .layout()
            .proxy_prefix(self.schema.identifier(), Some(&base))
    }
}

impl fmt::Debug for RecordsProxyCollection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordsProxyCollection")
            .field("schema", &self.schema.identifier())
            .field("prefix", &self.prefix)
            .field("check", &self.check)
            .field("omitted", &self.omitted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventFilter, EventKind};
    use proptest::prelude::*;
    use regis_types::Field;

    fn mail() -> Schema {
        Schema::new("app.mail.Mail")
            .field(Field::text_line("sender").with_default("root@localhost"))
            .field(Field::int("max_daily").with_default(3i64).with_bounds(Some(0.0), None))
            .field(Field::text_line("signature").required(false))
            .field(
                Field::text_line("created_by")
                    .required(false)
                    .readonly(true)
                    .with_default("system"),
            )
    }

    fn filter() -> Schema {
        Schema::new("app.mail.Filter").field(Field::text_line("rule").with_default("*"))
    }

    fn source(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn prefix_defaults_to_identifier() {
        let registry = Registry::new();
        let mails = registry.collection(mail());
        assert_eq!(mails.prefix(), "app.mail.Mail/");
        let custom = registry.collection_for_schema(mail(), false, &[], Some("mail"));
        assert_eq!(custom.prefix(), "mail/");
        assert!(!custom.check());
    }

    #[test]
    fn add_then_has_then_remove() {
        let registry = Registry::new();
        let mails = registry.collection(mail());

        assert!(!mails.has("inbox").unwrap());
        let proxy = mails.add("inbox").unwrap();
        assert_eq!(proxy.prefix(), "app.mail.Mail/inbox.");
        assert!(mails.has("inbox").unwrap());
        assert_eq!(
            proxy.get("sender").unwrap(),
            Some(Value::from("root@localhost"))
        );

        let removed = mails.remove("inbox").unwrap();
        assert_eq!(removed.len(), 4);
        assert!(!mails.has("inbox").unwrap());
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn end_to_end_mail_scenario() {
        let registry = Registry::new();
        let mails = registry.collection(mail());

        let data = source(&[
            ("sender", Value::from("root@localhost")),
            ("max_daily", Value::Int(3)),
        ]);
        mails.set("primary", &data).unwrap();

        assert_eq!(mails.keys().unwrap(), vec!["primary"]);
        let primary = mails.get("primary").unwrap();
        assert_eq!(primary.get("sender").unwrap(), Some(Value::from("root@localhost")));
        assert_eq!(primary.get("max_daily").unwrap(), Some(Value::Int(3)));
        assert_eq!(
            registry.get_value("app.mail.Mail/primary.max_daily").unwrap(),
            Some(Value::Int(3))
        );

        mails.remove("primary").unwrap();
        assert!(!mails.has("primary").unwrap());
        assert!(matches!(
            mails.get("primary"),
            Err(RegistryError::KeyNotFound(_))
        ));
    }

    #[test]
    fn shared_name_prefixes_do_not_interfere() {
        let registry = Registry::new();
        let mails = registry.collection(mail());
        mails.add("foo").unwrap();
        mails.add("foobar").unwrap();
        mails.add("foo_2").unwrap();

        assert_eq!(mails.keys().unwrap(), vec!["foo", "foo_2", "foobar"]);
        mails.remove("foo").unwrap();
        assert!(!mails.has("foo").unwrap());
        assert!(mails.has("foobar").unwrap());
        assert!(mails.has("foo_2").unwrap());
        assert_eq!(mails.len().unwrap(), 2);
    }

    #[test]
    fn iteration_is_sorted_and_unique_with_nested_collections() {
        let registry = Registry::new();
        let mails = registry.collection(mail());
        mails.add("work").unwrap();
        mails.add("home").unwrap();

        let filters = mails.collection("home", filter()).unwrap();
        assert_eq!(filters.prefix(), "app.mail.Mail/home.Filter/");
        filters.add("spam").unwrap();
        filters.add("news").unwrap();

        assert_eq!(mails.iter().unwrap().collect::<Vec<_>>(), vec!["home", "work"]);
        assert_eq!(filters.keys().unwrap(), vec!["news", "spam"]);

        // Removing the entry takes its nested collection along.
        mails.remove("home").unwrap();
        assert!(filters.is_empty().unwrap());
        assert!(mails.has("work").unwrap());
    }

    #[test]
    fn nested_collection_through_proxy_matches() {
        let registry = Registry::new();
        let mails = registry.collection(mail());
        let home = mails.add("home").unwrap();
        let a = home.collection(filter());
        let b = mails.collection("home", filter()).unwrap();
        assert_eq!(a.prefix(), b.prefix());
    }

    #[test]
    fn invalid_names_are_rejected() {
        let registry = Registry::new();
        let mails = registry.collection(mail());
        for bad in ["", "1st", "a.b", "a/b", "a-b"] {
            assert!(matches!(mails.has(bad), Err(RegistryError::InvalidKey { .. })));
            assert!(matches!(mails.add(bad), Err(RegistryError::InvalidKey { .. })));
        }
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn missing_required_field_creates_nothing() {
        let registry = Registry::new();
        let mails = registry.collection(mail());

        let partial = source(&[("max_daily", Value::Int(5))]);
        assert!(matches!(
            mails.set("partial", &partial),
            Err(RegistryError::RequiredValueMissing(f)) if f == "sender"
        ));
        assert!(!mails.has("partial").unwrap());
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn invalid_value_creates_nothing() {
        let registry = Registry::new();
        let mails = registry.collection(mail());
        let bad = source(&[
            ("sender", Value::from("root@localhost")),
            ("max_daily", Value::Int(-4)),
        ]);
        assert!(matches!(
            mails.set("bad", &bad),
            Err(RegistryError::Validation { key, .. }) if key == "app.mail.Mail/bad.max_daily"
        ));
        assert!(!mails.has("bad").unwrap());
    }

    #[test]
    fn unchecked_collection_accepts_partial_sources() {
        let registry = Registry::new();
        let mails = registry.collection_for_schema(mail(), false, &[], None);
        mails
            .set("partial", &source(&[("max_daily", Value::Int(5))]))
            .unwrap();
        let proxy = mails.get("partial").unwrap();
        assert_eq!(proxy.get("max_daily").unwrap(), Some(Value::Int(5)));
        assert_eq!(proxy.get("sender").unwrap(), Some(Value::from("root@localhost")));
    }

    #[test]
    fn set_skips_readonly_and_omitted_fields() {
        let registry = Registry::new();
        let mails = registry.collection_for_schema(mail(), true, &["signature"], None);
        let data = source(&[
            ("sender", Value::from("a@b.com")),
            ("max_daily", Value::Int(1)),
            ("signature", Value::from("-- a")),
            ("created_by", Value::from("someone")),
        ]);
        mails.set("a", &data).unwrap();

        let proxy = mails.get("a").unwrap();
        assert_eq!(proxy.get("created_by").unwrap(), Some(Value::from("system")));
        assert!(!registry.contains("app.mail.Mail/a.signature").unwrap());
        assert_eq!(proxy.get("signature").unwrap(), None);
    }

    #[test]
    fn set_existing_entry_replaces_unsupplied_values() {
        let registry = Registry::new();
        let mails = registry.collection_for_schema(mail(), false, &[], None);
        mails
            .set(
                "a",
                &source(&[
                    ("sender", Value::from("a@b.com")),
                    ("max_daily", Value::Int(8)),
                    ("signature", Value::from("-- a")),
                ]),
            )
            .unwrap();
        mails
            .set("a", &source(&[("sender", Value::from("c@d.com"))]))
            .unwrap();

        let proxy = mails.get("a").unwrap();
        assert_eq!(proxy.get("sender").unwrap(), Some(Value::from("c@d.com")));
        assert_eq!(proxy.get("signature").unwrap(), None);
        assert_eq!(proxy.get("max_daily").unwrap(), Some(Value::Int(3)));
    }

    #[test]
    fn sources_of_every_kind() {
        let registry = Registry::new();
        let mails = registry.collection(mail());

        let mut hashed = HashMap::new();
        hashed.insert("sender".to_string(), Value::from("h@x.org"));
        hashed.insert("max_daily".to_string(), Value::Int(2));
        mails.set("hashed", &hashed).unwrap();

        let json = serde_json::json!({ "sender": "j@x.org", "max_daily": 7, "signature": null });
        let serde_json::Value::Object(map) = json else {
            unreachable!()
        };
        mails.set("json", &map).unwrap();
        assert_eq!(
            mails.get("json").unwrap().get("max_daily").unwrap(),
            Some(Value::Int(7))
        );

        let original = mails.get("json").unwrap();
        mails.set("copy", &original).unwrap();
        let copy = mails.get("copy").unwrap();
        assert_eq!(copy.get("sender").unwrap(), Some(Value::from("j@x.org")));
        assert_eq!(copy.get("max_daily").unwrap(), Some(Value::Int(7)));
    }

    #[test]
    fn setdefault_creates_once() {
        let registry = Registry::new();
        let mails = registry.collection(mail());

        let created = mails.setdefault("a", None).unwrap();
        assert_eq!(created.get("max_daily").unwrap(), Some(Value::Int(3)));
        created.set("max_daily", 9i64).unwrap();

        let fallback = source(&[("sender", Value::from("x@y.z")), ("max_daily", Value::Int(1))]);
        let existing = mails
            .setdefault("a", Some(&fallback as &dyn FieldSource))
            .unwrap();
        assert_eq!(existing.get("max_daily").unwrap(), Some(Value::Int(9)));

        let fresh = mails
            .setdefault("b", Some(&fallback as &dyn FieldSource))
            .unwrap();
        assert_eq!(fresh.get("sender").unwrap(), Some(Value::from("x@y.z")));
    }

    #[test]
    fn remove_missing_entry() {
        let registry = Registry::new();
        let mails = registry.collection(mail());
        assert!(matches!(
            mails.remove("ghost"),
            Err(RegistryError::KeyNotFound(n)) if n == "ghost"
        ));
    }

    #[test]
    fn remove_emits_one_event_per_record() {
        let registry = Registry::new();
        let mails = registry.collection(mail());
        mails.add("a").unwrap();
        let mut rx = registry.subscribe(EventFilter {
            key_prefix: Some("app.mail.Mail/a.".into()),
            kinds: Some(vec![EventKind::RecordRemoved]),
        });
        mails.remove("a").unwrap();
        let removed: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.key().to_string())
            .collect();
        assert_eq!(
            removed,
            vec![
                "app.mail.Mail/a.created_by",
                "app.mail.Mail/a.max_daily",
                "app.mail.Mail/a.sender",
                "app.mail.Mail/a.signature",
            ]
        );
    }

    #[test]
    fn stray_keys_are_not_entries() {
        let registry = Registry::new();
        registry
            .register_field("app.mail.Mail/loose", Field::text_line("loose"))
            .unwrap();
        registry
            .register_field("app.mail.Mail/.x", Field::text_line("x"))
            .unwrap();
        let mails = registry.collection(mail());
        assert!(mails.is_empty().unwrap());
    }

    #[test]
    fn set_validates_against_stored_fields() {
        let registry = Registry::new();
        registry
            .register_field(
                "app.mail.Mail/a.max_daily",
                Field::int("max_daily").with_default(3i64).with_bounds(Some(0.0), Some(5.0)),
            )
            .unwrap();
        let mails = registry.collection(mail());
        mails.add("a").unwrap();

        let data = source(&[("sender", Value::from("x@y.z")), ("max_daily", Value::Int(8))]);
        assert!(matches!(
            mails.set("a", &data),
            Err(RegistryError::Validation { key, .. }) if key == "app.mail.Mail/a.max_daily"
        ));
        let proxy = mails.get("a").unwrap();
        assert_eq!(proxy.get("sender").unwrap(), Some(Value::from("root@localhost")));
        assert_eq!(proxy.get("max_daily").unwrap(), Some(Value::Int(3)));
    }

    #[test]
    fn keys_agree_with_has() {
        let registry = Registry::new();
        registry
            .register_field("app.mail.Mail/inbox/x", Field::text_line("x"))
            .unwrap();
        let mails = registry.collection(mail());
        assert!(!mails.has("inbox").unwrap());
        assert!(mails.keys().unwrap().is_empty());

        mails.add("inbox").unwrap();
        assert_eq!(mails.keys().unwrap(), vec!["inbox"]);
    }

    #[test]
    fn unreadable_source_aborts_set() {
        let mut legacy = regis_store::LegacyRecords::new();
        legacy.insert_raw("foo.rule", serde_json::json!({ "field": 42 }));
        let broken =
            Registry::from_legacy(crate::config::RegistryConfig::default(), legacy).unwrap();
        let original = broken
            .for_schema(filter(), false, &[], Some("foo"))
            .unwrap();

        let registry = Registry::new();
        let filters = registry.collection(filter());
        assert!(matches!(
            filters.set("copy", &original),
            Err(RegistryError::MigrationFailed(_))
        ));
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn proxy_without_declared_field_supplies_nothing() {
        let registry = Registry::new();
        let filters = registry.collection(filter());
        filters.add("spam").unwrap();
        let spam = filters.get("spam").unwrap();
        assert_eq!(spam.field_value("rule").unwrap(), Some(Value::from("*")));
        assert_eq!(spam.field_value("sender").unwrap(), None);
    }

    #[test]
    fn added_entries_inherit_check() {
        let registry = Registry::new();
        let mails = registry.collection_for_schema(mail(), false, &[], None);
        let a = mails.add("a").unwrap();
        assert!(!a.check());
        assert!(!a.collection(filter()).check());
        assert_eq!(
            a.collection(filter()).check(),
            mails.collection("a", filter()).unwrap().check()
        );

        let checked = registry.collection_for_schema(mail(), true, &[], None);
        assert!(checked.add("b").unwrap().check());
    }

    fn names() -> impl Strategy<Value = BTreeSet<String>> {
        prop::collection::btree_set("[a-c][a-c0-9_]{0,3}", 1..12)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn iteration_matches_added_names(names in names()) {
            let registry = Registry::new();
            let mails = registry.collection(filter());
            for name in &names {
                mails.add(name).unwrap();
            }
            let expected: Vec<String> = names.iter().cloned().collect();
            prop_assert_eq!(mails.keys().unwrap(), expected);
        }

        #[test]
        fn removal_touches_only_its_entry(names in names(), pick in any::<prop::sample::Index>()) {
            let registry = Registry::new();
            let mails = registry.collection(filter());
            for name in &names {
                mails.add(name).unwrap();
                mails.collection(name, filter()).unwrap().add("nested").unwrap();
            }
            let victim = pick.get(&names.iter().collect::<Vec<_>>()).to_string();

            mails.remove(&victim).unwrap();

            prop_assert!(!mails.has(&victim).unwrap());
            for name in names.iter().filter(|n| **n != victim) {
                prop_assert!(mails.has(name).unwrap());
            }
            prop_assert_eq!(registry.len().unwrap(), (names.len() - 1) * 2);
        }
    }
}
