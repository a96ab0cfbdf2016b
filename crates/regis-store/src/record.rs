use serde::{Deserialize, Serialize};

use regis_types::{FieldDescriptor, RecordField, Value};

/// One stored entry: a field descriptor and its current value.
///
/// `interface_name` is the identifier of the schema the record was generated
/// from when a whole schema was registered; ad-hoc records have none.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub field: RecordField,
    pub value: Option<Value>,
    pub field_name: String,
    #[serde(default)]
    pub interface_name: Option<String>,
}

impl Record {
    /// Create an ad-hoc record. The field name is taken from the descriptor.
    pub fn new(field: impl Into<RecordField>, value: Option<Value>) -> Self {
        let field = field.into();
        Self {
            field_name: field.name().to_string(),
            field,
            value,
            interface_name: None,
        }
    }

    /// Create a record holding the descriptor's default value.
    pub fn with_default(field: impl Into<RecordField>) -> Self {
        let field = field.into();
        let value = field.default_value().cloned();
        Self::new(field, value)
    }

    pub fn with_interface(mut self, interface_name: impl Into<String>) -> Self {
        self.interface_name = Some(interface_name.into());
        self
    }

    /// The stored value, or the descriptor's missing value if none is stored.
    pub fn effective_value(&self) -> Option<&Value> {
        self.value.as_ref().or_else(|| self.field.missing_value())
    }
}
