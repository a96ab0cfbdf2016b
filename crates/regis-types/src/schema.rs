use serde::{Deserialize, Serialize};

use crate::field::Field;

/// A type contract: an ordered set of named field declarations.
///
/// The `identifier` is a dotted name (e.g. `app.mail.MailSettings`) used as
/// the default key prefix when the schema is registered or proxied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    identifier: String,
    #[serde(default)]
    title: String,
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: String::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Append a field declaration. A field with the same name replaces the
    /// earlier declaration in place.
    pub fn field(mut self, field: Field) -> Self {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Fields in declaration order.
    pub fn fields_in_order(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|f| (f.name.as_str(), f))
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
