//! Error types for mtbridge core operations.

use thiserror::Error;

/// Core error type for mailbox and record operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error on a mailbox file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound text is not a well-formed record of the expected shape.
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A command field cannot be represented in the command record.
    #[error("invalid command field {field}: {message}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// Error message.
        message: String,
    },

    /// Text is not a command record.
    #[error("invalid command record: {message}")]
    InvalidRecord {
        /// Error message.
        message: String,
    },

    /// Unknown command name.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

impl Error {
    /// Creates an invalid field error.
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: message.into(),
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }
}

/// Result type alias for mtbridge core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_display() {
        let err = Error::invalid_field("comment", "contains ','");
        let msg = err.to_string();
        assert!(msg.contains("comment"));
        assert!(msg.contains("contains ','"));
    }

    #[test]
    fn test_malformed_from_serde() {
        let parse = serde_json::from_str::<serde_json::Value>("{\"a\":");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Malformed(_)));
        assert!(err.to_string().starts_with("malformed record"));
    }
}
