//! Foundation types for the Regis configuration registry.
//!
//! Every other Regis crate depends on `regis-types`. It defines what a
//! configuration value is and the typed contract values are checked against.
//!
//! # Key Types
//!
//! - [`Value`] -- a stored configuration value
//! - [`Field`] / [`FieldKind`] -- a typed field declaration with defaults and flags
//! - [`FieldDescriptor`] -- the read-side contract shared by all field-like types
//! - [`FieldRef`] -- a field retargeted at another record key
//! - [`RecordField`] -- the descriptor a record carries (plain field or reference)
//! - [`Schema`] -- an ordered set of field declarations (a type contract)
//! - [`Vocabulary`] -- the allowed terms of a choice field

pub mod error;
pub mod field;
pub mod field_ref;
pub mod schema;
pub mod value;
pub mod vocabulary;

pub use error::FieldError;
pub use field::{Capability, Choice, Field, FieldDescriptor, FieldKind};
pub use field_ref::{FieldRef, RecordField};
pub use schema::Schema;
pub use value::Value;
pub use vocabulary::{NoVocabularies, StaticVocabularies, Vocabulary, VocabularyResolver};
