use thiserror::Error;

/// Validation failures produced by field descriptors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    #[error("field {field}: expected {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("field {field}: value {value} is below the minimum {min}")]
    TooSmall { field: String, value: f64, min: f64 },

    #[error("field {field}: value {value} is above the maximum {max}")]
    TooBig { field: String, value: f64, max: f64 },

    #[error("field {field}: length {len} is below the minimum {min}")]
    TooShort { field: String, len: usize, min: usize },

    #[error("field {field}: length {len} is above the maximum {max}")]
    TooLong { field: String, len: usize, max: usize },

    #[error("field {field}: text must be a single line")]
    NotSingleLine { field: String },

    #[error("field {field}: text must be ASCII")]
    NotAscii { field: String },

    #[error("field {field}: invalid URI: {value}")]
    InvalidUri { field: String, value: String },

    #[error("field {field}: {value} is not in the vocabulary")]
    NotInVocabulary { field: String, value: String },

    #[error("field {field}: vocabulary {vocabulary} has not been resolved")]
    UnresolvedVocabulary { field: String, vocabulary: String },

    #[error("required field is missing: {0}")]
    RequiredMissing(String),
}

/// Convenience alias for field validation results.
pub type Result<T> = std::result::Result<T, FieldError>;
