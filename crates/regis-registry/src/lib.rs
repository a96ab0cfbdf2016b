//! Typed configuration registry.
//!
//! A [`Registry`] stores configuration values as records under string keys,
//! each record carrying the field that its value is validated against.
//! On top of the flat key space it offers two schema-bound views:
//!
//! - [`RecordsProxy`] -- one schema instance at a key prefix, with explicit
//!   `get`/`set` accessors
//! - [`RecordsProxyCollection`] -- named instances of one schema under a
//!   collection prefix, with `has`/`get`/`add`/`set`/`remove`
//!
//! Hierarchy is encoded in keys with two adjacent separator characters (see
//! [`keys`]), so every subtree is a contiguous key range.
//!
//! Registries opened from legacy snapshots upgrade their records on first
//! access. Changes are published as [`RegistryEvent`]s.
//!
//! # Example
//!
//! ```
//! use regis_registry::Registry;
//! use regis_types::{Field, Schema, Value};
//!
//! let schema = Schema::new("app.mail.Mail")
//!     .field(Field::text_line("sender").with_default("root@localhost"))
//!     .field(Field::int("max_daily").with_default(3i64));
//!
//! let registry = Registry::new();
//! let mails = registry.collection(schema);
//! let primary = mails.add("primary").unwrap();
//! primary.set("max_daily", 5i64).unwrap();
//!
//! assert_eq!(mails.keys().unwrap(), vec!["primary"]);
//! assert_eq!(
//!     registry.get_value("app.mail.Mail/primary.max_daily").unwrap(),
//!     Some(Value::Int(5))
//! );
//! ```

pub mod collection;
pub mod config;
pub mod error;
pub mod events;
pub mod keys;
pub mod migration;
pub mod proxy;
pub mod registry;

pub use collection::{FieldSource, RecordsProxyCollection};
pub use config::RegistryConfig;
pub use error::{RegistryError, Result};
pub use events::{EventBus, EventFilter, EventKind, EventStream, RegistryEvent};
pub use keys::KeyLayout;
pub use migration::Representation;
pub use proxy::RecordsProxy;
pub use registry::Registry;
