//! Error types for chainsql

use thiserror::Error;

/// The main error type for chainsql operations
#[derive(Error, Debug)]
pub enum Error {
    /// The underlying client could not be reached (connect, ping, pool, TLS)
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// The driver rejected the SQL text itself
    #[error("Prepare error: {message}")]
    Prepare { message: String },

    /// Constraint violation, type mismatch or any other failure during execute
    #[error("Execution error: {message}")]
    Execution { message: String },

    /// Malformed operator/value shape in a where/having/join call
    #[error("Invalid condition: {message}")]
    InvalidCondition { message: String },

    /// Invalid query configuration
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience Result type for chainsql operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a new prepare error
    pub fn prepare(message: impl Into<String>) -> Self {
        Self::Prepare {
            message: message.into(),
        }
    }

    /// Create a new execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Create a new invalid condition error
    pub fn invalid_condition(message: impl Into<String>) -> Self {
        Self::InvalidCondition {
            message: message.into(),
        }
    }

    /// Create a new invalid query error
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// True for errors raised by the builder before anything reached the driver
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCondition { .. } | Self::InvalidQuery { .. }
        )
    }

    /// Classify a driver error into the chainsql taxonomy
    pub fn from_driver(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(_)
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::connection(err.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned());
                let message = db_err.message().to_string();
                if is_syntax_error(code.as_deref(), &message) {
                    Self::prepare(message)
                } else {
                    Self::execution(message)
                }
            }
            other => Self::execution(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::from_driver(err)
    }
}

// 42601: PostgreSQL syntax_error, 42000: MySQL syntax error or access rule violation
fn is_syntax_error(code: Option<&str>, message: &str) -> bool {
    matches!(code, Some("42601") | Some("42000") | Some("1064"))
        || message.contains("syntax error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::prepare("near \"SELEC\": syntax error");
        assert!(matches!(err, Error::Prepare { .. }));
        assert_eq!(err.to_string(), "Prepare error: near \"SELEC\": syntax error");
    }

    #[test]
    fn test_invalid_condition_error() {
        let err = Error::invalid_condition("BETWEEN expects exactly two values");
        assert!(matches!(err, Error::InvalidCondition { .. }));
        assert!(err.is_input_error());
        assert_eq!(
            err.to_string(),
            "Invalid condition: BETWEEN expects exactly two values"
        );
    }

    #[test]
    fn test_invalid_query_error() {
        let err = Error::invalid_query("Missing WHERE clause");
        assert!(err.is_input_error());
        assert_eq!(err.to_string(), "Invalid query: Missing WHERE clause");
    }

    #[test]
    fn test_driver_errors_are_classified() {
        let err = Error::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, Error::Connection { .. }));
        assert!(!err.is_input_error());

        let err = Error::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, Error::Execution { .. }));
    }

    #[test]
    fn test_syntax_error_detection() {
        assert!(is_syntax_error(Some("42601"), "whatever"));
        assert!(is_syntax_error(None, "near \"FORM\": syntax error"));
        assert!(!is_syntax_error(Some("23505"), "duplicate key value"));
    }
}
