use thiserror::Error;

/// A single field-level violation found while validating a configuration.
///
/// Configuration validators collect every violation before failing, so one
/// round trip surfaces all the problems in an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum ScfError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid configuration: {}", join_errors(.0))]
    InvalidConfiguration(Vec<ValidationError>),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ScfError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(kind: &str, name: &str) -> Self {
        ScfError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl From<serde_json::Error> for ScfError {
    fn from(e: serde_json::Error) -> Self {
        ScfError::SerializationError(e.to_string())
    }
}
