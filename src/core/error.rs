//! Unified error handling for sqlchain
//!
//! Every failure that can reach a pipeline caller is expressed as a
//! [`SqlError`]. Errors produced by the database collaborator travel inside
//! [`SqlError::Driver`] untouched, so callers can still downcast to the
//! concrete driver error.

use std::fmt;

use super::request::Operation;

/// Unified error type for the statement pipeline
#[derive(Debug)]
pub enum SqlError {
    /// Error returned by the underlying connection, carried unmodified
    Driver(Box<dyn std::error::Error + Send + Sync>),

    /// An interceptor refused to let the statement through
    Rejected(String),

    /// The chain finished without an outcome and without an error
    Unresolved(String),

    /// A result slot was populated that does not match the operation
    OperationMismatch {
        expected: Operation,
        found: Operation,
    },

    /// The caller's context was cancelled before dispatch
    Cancelled,

    /// The caller's deadline passed before dispatch
    DeadlineExceeded,

    /// Configuration-related errors
    Configuration(String),

    /// Validation errors
    Validation(String),

    /// Internal errors
    Internal(String),
}

impl SqlError {
    /// Wrap a collaborator error without altering it.
    pub fn driver<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SqlError::Driver(Box::new(err))
    }

    /// Borrow the concrete collaborator error, if this is a driver error of type `E`.
    pub fn driver_error<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            SqlError::Driver(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub fn is_driver(&self) -> bool {
        matches!(self, SqlError::Driver(_))
    }

    pub fn serialization_error(context: &str, err: serde_json::Error) -> Self {
        SqlError::Configuration(format!("{context}: {err}"))
    }
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlError::Driver(err) => write!(f, "{err}"),
            SqlError::Rejected(msg) => write!(f, "Statement rejected: {msg}"),
            SqlError::Unresolved(msg) => write!(f, "Statement unresolved: {msg}"),
            SqlError::OperationMismatch { expected, found } => {
                write!(f, "Operation mismatch: expected {expected}, found {found}")
            }
            SqlError::Cancelled => write!(f, "Context cancelled"),
            SqlError::DeadlineExceeded => write!(f, "Context deadline exceeded"),
            SqlError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            SqlError::Validation(msg) => write!(f, "Validation error: {msg}"),
            SqlError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for SqlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SqlError::Driver(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for SqlError {
    fn from(err: validator::ValidationErrors) -> Self {
        SqlError::Validation(err.to_string())
    }
}

/// Result type alias for pipeline operations
pub type SqlResult<T> = std::result::Result<T, SqlError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> SqlResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> SqlResult<T> {
        self.map_err(|e| SqlError::Internal(format!("{context}: {e}")))
    }
}

/// Convenience macros for error creation
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::SqlError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::SqlError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::core::SqlError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::SqlError::Internal(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Constraint;

    impl fmt::Display for Constraint {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "constraint violated")
        }
    }

    impl std::error::Error for Constraint {}

    #[test]
    fn test_driver_error_is_transparent() {
        let err = SqlError::driver(Constraint);
        assert!(err.is_driver());
        assert_eq!(err.to_string(), "constraint violated");
        assert_eq!(err.driver_error::<Constraint>(), Some(&Constraint));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_driver_error_wrong_type() {
        let err = SqlError::driver(std::io::Error::new(std::io::ErrorKind::Other, "io"));
        assert!(err.driver_error::<Constraint>().is_none());
        assert!(SqlError::Cancelled.driver_error::<Constraint>().is_none());
    }

    #[test]
    fn test_display() {
        let err = SqlError::OperationMismatch {
            expected: Operation::Exec,
            found: Operation::QueryOne,
        };
        assert_eq!(
            err.to_string(),
            "Operation mismatch: expected exec, found query_one"
        );
        assert!(config_error!("bad {}", 1)
            .to_string()
            .contains("Configuration error: bad 1"));
    }

    #[test]
    fn test_with_context() {
        let result: Result<(), &str> = Err("boom");
        let err = result.with_context("loading").unwrap_err();
        assert!(matches!(err, SqlError::Internal(ref m) if m == "loading: boom"));
    }
}
