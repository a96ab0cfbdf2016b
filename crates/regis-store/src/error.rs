/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A value was assigned to a key that was never registered.
    #[error("key not registered: {0}")]
    KeyNotRegistered(String),

    /// A record already exists at this key.
    #[error("key already registered: {0}")]
    AlreadyRegistered(String),

    /// A snapshot file carries a layout version this build does not know.
    #[error("unsupported snapshot layout: {0}")]
    UnsupportedLayout(u32),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error while reading or writing a snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
