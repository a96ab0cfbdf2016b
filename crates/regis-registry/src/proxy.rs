//! Schema-bound views over a key prefix.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use regis_types::{Field, FieldDescriptor, Schema, Value};

use crate::collection::RecordsProxyCollection;
use crate::error::{RegistryError, Result};
use crate::registry::Registry;

/// A view binding a [`Schema`] to the records under one key prefix.
///
/// Field reads and writes pass straight through to the registry: the proxy
/// holds no copy of any stored value. Reading a field whose record was never
/// registered yields the field's missing value; writing one fails with
/// `KeyNotRegistered`.
///
/// Attributes outside the schema can be kept with [`set_local`](Self::set_local).
/// They live only on this proxy and are never stored.
pub struct RecordsProxy<'r> {
    registry: &'r Registry,
    schema: Arc<Schema>,
    omitted: Arc<BTreeSet<String>>,
    prefix: String,
    check: bool,
    local: HashMap<String, Value>,
}

impl<'r> RecordsProxy<'r> {
    pub(crate) fn new(
        registry: &'r Registry,
        schema: Arc<Schema>,
        omitted: Arc<BTreeSet<String>>,
        prefix: String,
        check: bool,
    ) -> Self {
        Self {
            registry,
            schema,
            omitted,
            prefix,
            check,
            local: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Key prefix, terminated by the leaf separator.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn omitted(&self) -> &BTreeSet<String> {
        &self.omitted
    }

    /// The required-field checking flag, passed on to nested collections.
    pub fn check(&self) -> bool {
        self.check
    }

    /// Storage key of `name`. Fails if the schema does not declare it.
    pub fn key_for(&self, name: &str) -> Result<String> {
        self.declared(name)?;
        Ok(format!("{}{name}", self.prefix))
    }

    /// Names of the fields this proxy writes: declared and not omitted.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.schema
            .fields_in_order()
            .map(|(name, _)| name)
            .filter(|name| !self.omitted.contains(*name))
    }

    /// Current value of `name`, or the field's missing value if none is
    /// stored.
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        let field = self.declared(name)?;
        let key = format!("{}{name}", self.prefix);
        let stored = self.registry.record(&key)?.and_then(|record| record.value);
        Ok(stored.or_else(|| field.missing_value().cloned()))
    }

    /// Validate and store a value for `name`.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.set_value(name, Some(value.into()))
    }

    /// Like [`set`](Self::set), but `None` clears the value.
    pub fn set_value(&self, name: &str, value: Option<Value>) -> Result<()> {
        let key = self.key_for(name)?;
        self.registry.set_value(&key, value)
    }

    /// A proxy-local attribute.
    pub fn local(&self, name: &str) -> Option<&Value> {
        self.local.get(name)
    }

    pub fn set_local(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.local.insert(name.into(), value.into());
    }

    /// A collection of `schema` entries nested under this proxy's prefix.
    ///
    /// The collection is named after the last segment of the schema
    /// identifier, so `app.mail.Filter` under `mail/inbox.` lives at
    /// `mail/inbox.Filter/`. Removing the owning collection entry removes the
    /// nested collection with it. The collection inherits this proxy's
    /// `check` flag.
    pub fn collection(&self, schema: impl Into<Arc<Schema>>) -> RecordsProxyCollection<'r> {
        let schema = schema.into();
        let prefix = self
            .registry
            .layout()
            .nested_collection_prefix(&self.prefix, local_name(schema.identifier()));
        RecordsProxyCollection::new(
            self.registry,
            schema,
            Arc::new(BTreeSet::new()),
            self.check,
            prefix,
        )
    }

    fn declared(&self, name: &str) -> Result<&Field> {
        self.schema
            .get(name)
            .ok_or_else(|| RegistryError::UnknownField {
                schema: self.schema.identifier().to_string(),
                field: name.to_string(),
            })
    }
}

/// Last dotted segment of a schema identifier.
pub(crate) fn local_name(identifier: &str) -> &str {
    identifier.rsplit('.').next().unwrap_or(identifier)
}

impl fmt::Display for RecordsProxy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<RecordsProxy for {}>", self.schema.identifier())
    }
}

impl fmt::Debug for RecordsProxy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordsProxy")
            .field("schema", &self.schema.identifier())
            .field("prefix", &self.prefix)
            .field("omitted", &self.omitted)
            .field("check", &self.check)
            .field("local", &self.local)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regis_types::FieldError;

    fn mail() -> Schema {
        Schema::new("app.mail.Mail")
            .field(Field::text_line("sender").with_default("root@localhost"))
            .field(Field::int("max_daily").with_default(3i64).with_bounds(Some(0.0), None))
            .field(
                Field::text_line("signature")
                    .required(false)
                    .with_missing_value(""),
            )
    }

    fn registered() -> Registry {
        let registry = Registry::new();
        registry.register_schema(&mail(), &[], None).unwrap();
        registry
    }

    #[test]
    fn reads_pass_through() {
        let registry = registered();
        let proxy = registry.for_schema(mail(), true, &[], None).unwrap();
        assert_eq!(proxy.get("sender").unwrap(), Some(Value::from("root@localhost")));
        assert_eq!(proxy.get("max_daily").unwrap(), Some(Value::Int(3)));

        registry
            .set_value("app.mail.Mail.max_daily", Some(Value::Int(10)))
            .unwrap();
        assert_eq!(proxy.get("max_daily").unwrap(), Some(Value::Int(10)));
    }

    #[test]
    fn writes_pass_through() {
        let registry = registered();
        let proxy = registry.for_schema(mail(), true, &[], None).unwrap();
        proxy.set("sender", "admin@example.org").unwrap();
        assert_eq!(
            registry.get_value("app.mail.Mail.sender").unwrap(),
            Some(Value::from("admin@example.org"))
        );
    }

    #[test]
    fn missing_value_fallback() {
        let registry = Registry::new();
        let proxy = registry.for_schema(mail(), false, &[], None).unwrap();
        assert_eq!(proxy.get("signature").unwrap(), Some(Value::from("")));
        assert_eq!(proxy.get("sender").unwrap(), None);
    }

    #[test]
    fn unknown_field() {
        let registry = registered();
        let proxy = registry.for_schema(mail(), true, &[], None).unwrap();
        assert!(matches!(
            proxy.get("nope"),
            Err(RegistryError::UnknownField { field, .. }) if field == "nope"
        ));
        assert!(matches!(
            proxy.set("nope", 1i64),
            Err(RegistryError::UnknownField { .. })
        ));
    }

    #[test]
    fn set_requires_backing_record() {
        let registry = Registry::new();
        registry
            .register_schema(&mail(), &["signature"], None)
            .unwrap();
        let proxy = registry
            .for_schema(mail(), true, &["signature"], None)
            .unwrap();

        assert_eq!(proxy.get("signature").unwrap(), Some(Value::from("")));
        assert!(matches!(
            proxy.set("signature", "-- me"),
            Err(RegistryError::KeyNotRegistered(k)) if k == "app.mail.Mail.signature"
        ));
        assert_eq!(proxy.field_names().collect::<Vec<_>>(), vec!["sender", "max_daily"]);
    }

    #[test]
    fn set_validates() {
        let registry = registered();
        let proxy = registry.for_schema(mail(), true, &[], None).unwrap();
        let err = proxy.set("max_daily", -1i64).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Validation {
                source: FieldError::TooSmall { .. },
                ..
            }
        ));
        assert!(proxy.set("max_daily", "many").is_err());
        assert_eq!(proxy.get("max_daily").unwrap(), Some(Value::Int(3)));
    }

    #[test]
    fn local_attributes_are_not_stored() {
        let registry = registered();
        let mut proxy = registry.for_schema(mail(), true, &[], None).unwrap();
        let before = registry.len().unwrap();

        proxy.set_local("dirty", true);
        assert_eq!(proxy.local("dirty"), Some(&Value::Bool(true)));
        assert_eq!(registry.len().unwrap(), before);
        assert!(proxy.local("other").is_none());
    }

    #[test]
    fn custom_prefix() {
        let registry = Registry::new();
        registry.register_schema(&mail(), &[], Some("mysettings")).unwrap();
        let proxy = registry
            .for_schema(mail(), true, &[], Some("mysettings"))
            .unwrap();
        assert_eq!(proxy.prefix(), "mysettings.");
        assert_eq!(proxy.key_for("sender").unwrap(), "mysettings.sender");
        assert_eq!(proxy.to_string(), "<RecordsProxy for app.mail.Mail>");
    }

    #[test]
    fn nested_collection_prefix() {
        let registry = registered();
        let proxy = registry.for_schema(mail(), true, &[], None).unwrap();
        let filters = proxy.collection(Schema::new("app.mail.Filter"));
        assert_eq!(filters.prefix(), "app.mail.Mail.Filter/");
        assert!(filters.check());

        let unchecked = registry.for_schema(mail(), false, &[], None).unwrap();
        assert!(!unchecked.collection(Schema::new("app.mail.Filter")).check());
    }

    #[test]
    fn local_name_of_identifier() {
        assert_eq!(local_name("app.mail.Filter"), "Filter");
        assert_eq!(local_name("Filter"), "Filter");
    }
}
