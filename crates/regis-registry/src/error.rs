//! Error types for registry operations.

use regis_store::StoreError;
use regis_types::FieldError;
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The attribute is not declared by the bound schema.
    #[error("unknown field {field} for schema {schema}")]
    UnknownField { schema: String, field: String },

    /// A value was written before its backing record was registered.
    #[error("key not registered: {0}")]
    KeyNotRegistered(String),

    /// A record already exists at this key.
    #[error("key already registered: {0}")]
    AlreadyRegistered(String),

    /// A collection entry name is malformed.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The collection has no entry with this name.
    #[error("collection entry not found: {0}")]
    KeyNotFound(String),

    /// A bulk write omitted a required field while checking was enabled.
    #[error("required value missing: {0}")]
    RequiredValueMissing(String),

    /// A value failed its field's validation.
    #[error("invalid value for {key}: {source}")]
    Validation {
        key: String,
        #[source]
        source: FieldError,
    },

    /// The legacy store could not be upgraded; nothing was swapped.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// The registry configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error while reading configuration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure of the underlying record store.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::KeyNotRegistered(key) => RegistryError::KeyNotRegistered(key),
            StoreError::AlreadyRegistered(key) => RegistryError::AlreadyRegistered(key),
            other => RegistryError::Store(other),
        }
    }
}

/// Convenience type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
