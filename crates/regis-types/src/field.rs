//! Field descriptors: the typed contract a record's value is checked against.
//!
//! A [`Field`] names a value slot, declares its [`FieldKind`], its default and
//! missing values, and whether it is required or read-only. Anything that can
//! stand in for a field (a plain [`Field`], a [`FieldRef`](crate::FieldRef))
//! implements [`FieldDescriptor`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, Result};
use crate::value::Value;
use crate::vocabulary::{Vocabulary, VocabularyResolver};

/// A capability a field descriptor provides.
///
/// Consumers ask "does this descriptor support X" through
/// [`FieldDescriptor::provides`] instead of matching on concrete kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    Field,
    Text,
    SingleLine,
    Ascii,
    Uri,
    MinMax,
    Int,
    Float,
    Bool,
    Bytes,
    Collection,
    Sequence,
    Choice,
    FieldRef,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Choice configuration: inline terms or a named vocabulary resolved on bind.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub vocabulary_name: Option<String>,
    pub vocabulary: Option<Vocabulary>,
}

/// The declared type of a field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    TextLine,
    Text,
    AsciiLine,
    Uri,
    Int {
        min: Option<i64>,
        max: Option<i64>,
    },
    Float {
        min: Option<f64>,
        max: Option<f64>,
    },
    Bool,
    Bytes,
    List {
        value_type: Box<FieldKind>,
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    Choice(Choice),
}

impl FieldKind {
    /// Capabilities implied by this kind, `Capability::Field` included.
    pub fn capabilities(&self) -> BTreeSet<Capability> {
        let mut caps = BTreeSet::from([Capability::Field]);
        match self {
            FieldKind::TextLine => {
                caps.extend([Capability::Text, Capability::SingleLine]);
            }
            FieldKind::Text => {
                caps.insert(Capability::Text);
            }
            FieldKind::AsciiLine => {
                caps.extend([Capability::Text, Capability::SingleLine, Capability::Ascii]);
            }
            FieldKind::Uri => {
                caps.extend([Capability::Text, Capability::SingleLine, Capability::Uri]);
            }
            FieldKind::Int { .. } => {
                caps.extend([Capability::Int, Capability::MinMax]);
            }
            FieldKind::Float { .. } => {
                caps.extend([Capability::Float, Capability::MinMax]);
            }
            FieldKind::Bool => {
                caps.insert(Capability::Bool);
            }
            FieldKind::Bytes => {
                caps.insert(Capability::Bytes);
            }
            FieldKind::List { .. } => {
                caps.extend([Capability::Collection, Capability::Sequence]);
            }
            FieldKind::Choice(_) => {
                caps.insert(Capability::Choice);
            }
        }
        caps
    }

    fn expected(&self) -> &'static str {
        match self {
            FieldKind::TextLine | FieldKind::Text | FieldKind::AsciiLine | FieldKind::Uri => {
                "text"
            }
            FieldKind::Int { .. } => "int",
            FieldKind::Float { .. } => "float",
            FieldKind::Bool => "bool",
            FieldKind::Bytes => "bytes",
            FieldKind::List { .. } => "list",
            FieldKind::Choice(_) => "text",
        }
    }

    fn wrong_type(&self, field: &str, value: &Value) -> FieldError {
        FieldError::WrongType {
            field: field.to_string(),
            expected: self.expected().to_string(),
            actual: value.type_name().to_string(),
        }
    }

    /// Check a present value against this kind. `field` names the owning
    /// field in error messages.
    pub fn check(&self, field: &str, value: &Value) -> Result<()> {
        match self {
            FieldKind::Text => match value {
                Value::Text(_) => Ok(()),
                other => Err(self.wrong_type(field, other)),
            },
            FieldKind::TextLine => {
                let text = value.as_text().ok_or_else(|| self.wrong_type(field, value))?;
                check_single_line(field, text)
            }
            FieldKind::AsciiLine => {
                let text = value.as_text().ok_or_else(|| self.wrong_type(field, value))?;
                check_single_line(field, text)?;
                if !text.is_ascii() {
                    return Err(FieldError::NotAscii {
                        field: field.to_string(),
                    });
                }
                Ok(())
            }
            FieldKind::Uri => {
                let text = value.as_text().ok_or_else(|| self.wrong_type(field, value))?;
                if !is_uri(text) {
                    return Err(FieldError::InvalidUri {
                        field: field.to_string(),
                        value: text.to_string(),
                    });
                }
                Ok(())
            }
            FieldKind::Int { min, max } => {
                let i = value.as_int().ok_or_else(|| self.wrong_type(field, value))?;
                check_bounds(field, i as f64, min.map(|m| m as f64), max.map(|m| m as f64))
            }
            FieldKind::Float { min, max } => {
                let x = value.as_float().ok_or_else(|| self.wrong_type(field, value))?;
                check_bounds(field, x, *min, *max)
            }
            FieldKind::Bool => match value {
                Value::Bool(_) => Ok(()),
                other => Err(self.wrong_type(field, other)),
            },
            FieldKind::Bytes => match value {
                Value::Bytes(_) => Ok(()),
                other => Err(self.wrong_type(field, other)),
            },
            FieldKind::List {
                value_type,
                min_length,
                max_length,
            } => {
                let items = value.as_list().ok_or_else(|| self.wrong_type(field, value))?;
                if let Some(min) = min_length {
                    if items.len() < *min {
                        return Err(FieldError::TooShort {
                            field: field.to_string(),
                            len: items.len(),
                            min: *min,
                        });
                    }
                }
                if let Some(max) = max_length {
                    if items.len() > *max {
                        return Err(FieldError::TooLong {
                            field: field.to_string(),
                            len: items.len(),
                            max: *max,
                        });
                    }
                }
                items.iter().try_for_each(|item| value_type.check(field, item))
            }
            FieldKind::Choice(choice) => {
                let text = value.as_text().ok_or_else(|| self.wrong_type(field, value))?;
                let vocabulary =
                    choice
                        .vocabulary
                        .as_ref()
                        .ok_or_else(|| FieldError::UnresolvedVocabulary {
                            field: field.to_string(),
                            vocabulary: choice.vocabulary_name.clone().unwrap_or_default(),
                        })?;
                if !vocabulary.contains(text) {
                    return Err(FieldError::NotInVocabulary {
                        field: field.to_string(),
                        value: text.to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}

fn check_single_line(field: &str, text: &str) -> Result<()> {
    if text.contains('\n') || text.contains('\r') {
        return Err(FieldError::NotSingleLine {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn check_bounds(field: &str, value: f64, min: Option<f64>, max: Option<f64>) -> Result<()> {
    if let Some(min) = min {
        if value < min {
            return Err(FieldError::TooSmall {
                field: field.to_string(),
                value,
                min,
            });
        }
    }
    if let Some(max) = max {
        if value > max {
            return Err(FieldError::TooBig {
                field: field.to_string(),
                value,
                max,
            });
        }
    }
    Ok(())
}

/// `scheme:rest`, scheme is `[A-Za-z][A-Za-z0-9+.-]*`, rest is non-empty and
/// has no whitespace.
fn is_uri(text: &str) -> bool {
    let Some((scheme, rest)) = text.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    starts_alpha
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
        && !rest.is_empty()
        && !rest.chars().any(char::is_whitespace)
}

/// The read-side contract every field-like descriptor offers.
pub trait FieldDescriptor {
    /// Logical name of the field.
    fn name(&self) -> &str;

    fn title(&self) -> &str;

    fn kind(&self) -> &FieldKind;

    /// Value a freshly registered record starts with.
    fn default_value(&self) -> Option<&Value>;

    /// Value reported when no value is stored.
    fn missing_value(&self) -> Option<&Value>;

    fn is_required(&self) -> bool;

    fn is_readonly(&self) -> bool;

    /// Validate a candidate value. `None` means "no value".
    fn validate(&self, value: Option<&Value>) -> Result<()>;

    fn capabilities(&self) -> BTreeSet<Capability>;

    fn provides(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// A concrete field declaration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub missing_value: Option<Value>,
    pub required: bool,
    #[serde(default)]
    pub readonly: bool,
}

impl Field {
    /// Create a required field of the given kind with no default.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            description: String::new(),
            kind,
            default: None,
            missing_value: None,
            required: true,
            readonly: false,
        }
    }

    pub fn text_line(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::TextLine)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn ascii_line(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::AsciiLine)
    }

    pub fn uri(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Uri)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Int {
            min: None,
            max: None,
        })
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float {
            min: None,
            max: None,
        })
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn bytes(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bytes)
    }

    pub fn list(name: impl Into<String>, value_type: FieldKind) -> Self {
        Self::new(name, FieldKind::List {
            value_type: Box::new(value_type),
            min_length: None,
            max_length: None,
        })
    }

    /// A choice over inline terms.
    pub fn choice<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, FieldKind::Choice(Choice {
            vocabulary_name: None,
            vocabulary: Some(Vocabulary::from_values(values)),
        }))
    }

    /// A choice over a named vocabulary, resolved by [`Field::bind`].
    pub fn named_choice(name: impl Into<String>, vocabulary: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Choice(Choice {
            vocabulary_name: Some(vocabulary.into()),
            vocabulary: None,
        }))
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_missing_value(mut self, value: impl Into<Value>) -> Self {
        self.missing_value = Some(value.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    /// Set numeric bounds. No-op for non-numeric kinds.
    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        match &mut self.kind {
            FieldKind::Int { min: lo, max: hi } => {
                *lo = min.map(|m| m as i64);
                *hi = max.map(|m| m as i64);
            }
            FieldKind::Float { min: lo, max: hi } => {
                *lo = min;
                *hi = max;
            }
            _ => {}
        }
        self
    }

    /// Mutable access to the choice configuration, if this is a choice field.
    pub fn choice_mut(&mut self) -> Option<&mut Choice> {
        match &mut self.kind {
            FieldKind::Choice(choice) => Some(choice),
            _ => None,
        }
    }

    /// Return a clone bound to `context`.
    ///
    /// Named vocabularies are resolved into the clone. The clone is fully
    /// owned: its vocabulary and every other attribute can be reassigned
    /// without touching `self`.
    pub fn bind(&self, context: &dyn VocabularyResolver) -> Field {
        let mut clone = self.clone();
        if let Some(choice) = clone.choice_mut() {
            if let Some(name) = &choice.vocabulary_name {
                if let Some(vocabulary) = context.resolve(name) {
                    choice.vocabulary = Some(vocabulary);
                }
            }
        }
        clone
    }
}

impl FieldDescriptor for Field {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn kind(&self) -> &FieldKind {
        &self.kind
    }

    fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    fn missing_value(&self) -> Option<&Value> {
        self.missing_value.as_ref()
    }

    fn is_required(&self) -> bool {
        self.required
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }

    fn validate(&self, value: Option<&Value>) -> Result<()> {
        match value {
            None => {
                if self.required {
                    Err(FieldError::RequiredMissing(self.name.clone()))
                } else {
                    Ok(())
                }
            }
            Some(v) if Some(v) == self.missing_value.as_ref() && !self.required => Ok(()),
            Some(v) => self.kind.check(&self.name, v),
        }
    }

    fn capabilities(&self) -> BTreeSet<Capability> {
        self.kind.capabilities()
    }
}
