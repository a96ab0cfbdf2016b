//! Field indirection.
//!
//! A [`FieldRef`] wraps a [`Field`] and points it at a different record key.
//! Everything the wrapped field declares (kind, defaults, flags, validation,
//! capabilities) is forwarded, so moving a value to a new key never changes
//! what the value means.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::field::{Capability, Field, FieldDescriptor, FieldKind};
use crate::value::Value;
use crate::vocabulary::VocabularyResolver;

/// A field descriptor retargeted at another record name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldRef {
    record_name: String,
    field: Box<Field>,
}

impl FieldRef {
    pub fn new(record_name: impl Into<String>, field: Field) -> Self {
        Self {
            record_name: record_name.into(),
            field: Box::new(field),
        }
    }

    /// The record key this reference resolves to.
    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    /// The wrapped descriptor.
    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut Field {
        &mut self.field
    }

    pub fn into_field(self) -> Field {
        *self.field
    }

    /// Bind the wrapped field and return a new reference around the clone.
    ///
    /// The returned reference owns its own copy, so attributes resolved or
    /// reassigned on it (a choice vocabulary, a title) never leak back into
    /// `self`.
    pub fn bind(&self, context: &dyn VocabularyResolver) -> FieldRef {
        FieldRef {
            record_name: self.record_name.clone(),
            field: Box::new(self.field.bind(context)),
        }
    }
}

impl FieldDescriptor for FieldRef {
    fn name(&self) -> &str {
        self.field.name()
    }

    fn title(&self) -> &str {
        self.field.title()
    }

    fn kind(&self) -> &FieldKind {
        self.field.kind()
    }

    fn default_value(&self) -> Option<&Value> {
        self.field.default_value()
    }

    fn missing_value(&self) -> Option<&Value> {
        self.field.missing_value()
    }

    fn is_required(&self) -> bool {
        self.field.is_required()
    }

    fn is_readonly(&self) -> bool {
        self.field.is_readonly()
    }

    fn validate(&self, value: Option<&Value>) -> Result<()> {
        self.field.validate(value)
    }

    /// The wrapper's own capability plus everything the wrapped field offers.
    fn capabilities(&self) -> BTreeSet<Capability> {
        let mut caps = self.field.capabilities();
        caps.insert(Capability::FieldRef);
        caps
    }
}

/// The descriptor stored in a record: a plain field or a reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "def", rename_all = "snake_case")]
pub enum RecordField {
    Field(Field),
    Ref(FieldRef),
}

impl RecordField {
    /// The concrete field behind this descriptor.
    pub fn as_field(&self) -> &Field {
        match self {
            RecordField::Field(f) => f,
            RecordField::Ref(r) => r.field(),
        }
    }

    /// The key the descriptor is retargeted to, if it is a reference.
    pub fn record_name(&self) -> Option<&str> {
        match self {
            RecordField::Field(_) => None,
            RecordField::Ref(r) => Some(r.record_name()),
        }
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, RecordField::Ref(_))
    }

    pub fn bind(&self, context: &dyn VocabularyResolver) -> RecordField {
        match self {
            RecordField::Field(f) => RecordField::Field(f.bind(context)),
            RecordField::Ref(r) => RecordField::Ref(r.bind(context)),
        }
    }

    fn inner(&self) -> &dyn FieldDescriptor {
        match self {
            RecordField::Field(f) => f,
            RecordField::Ref(r) => r,
        }
    }
}

impl From<Field> for RecordField {
    fn from(field: Field) -> Self {
        RecordField::Field(field)
    }
}

impl From<FieldRef> for RecordField {
    fn from(field_ref: FieldRef) -> Self {
        RecordField::Ref(field_ref)
    }
}

impl FieldDescriptor for RecordField {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn title(&self) -> &str {
        self.inner().title()
    }

    fn kind(&self) -> &FieldKind {
        self.inner().kind()
    }

    fn default_value(&self) -> Option<&Value> {
        self.inner().default_value()
    }

    fn missing_value(&self) -> Option<&Value> {
        self.inner().missing_value()
    }

    fn is_required(&self) -> bool {
        self.inner().is_required()
    }

    fn is_readonly(&self) -> bool {
        self.inner().is_readonly()
    }

    fn validate(&self, value: Option<&Value>) -> Result<()> {
        self.inner().validate(value)
    }

    fn capabilities(&self) -> BTreeSet<Capability> {
        self.inner().capabilities()
    }
}
