//! Error types for the travel chatbot.

use thiserror::Error;

/// Result type alias using TravelError.
pub type Result<T> = std::result::Result<T, TravelError>;

/// Errors that can occur in the travel chatbot.
#[derive(Error, Debug)]
pub enum TravelError {
    /// Missing or invalid startup configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Store unreachable, connection refused or timed out.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// The query service rejected or failed a statement.
    #[error("Query error: {message}")]
    Query { message: String },

    /// The search service rejected or failed a request.
    #[error("Search error on index {index}: {message}")]
    Search { index: String, message: String },

    /// A response did not have the expected shape.
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    /// Embedding model error.
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TravelError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a search error for the given index.
    pub fn search(index: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Search {
            index: index.into(),
            message: message.into(),
        }
    }

    /// Create a malformed-response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error came from reaching the store rather than from data.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Get the stable error code reported by the CLI.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Connection { .. } => "CONNECTION_ERROR",
            Self::Query { .. } => "QUERY_ERROR",
            Self::Search { .. } => "SEARCH_ERROR",
            Self::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TravelError::search("landmarks-index", "index not found");
        let text = err.to_string();
        assert!(text.contains("landmarks-index"));
        assert!(text.contains("index not found"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(TravelError::config("missing").error_code(), "CONFIG_ERROR");
        assert_eq!(
            TravelError::connection("timed out").error_code(),
            "CONNECTION_ERROR"
        );
        assert_eq!(
            TravelError::malformed("not json").error_code(),
            "MALFORMED_RESPONSE"
        );
    }

    #[test]
    fn test_connectivity_classification() {
        assert!(TravelError::connection("refused").is_connectivity());
        assert!(!TravelError::query("syntax error").is_connectivity());
    }
}
