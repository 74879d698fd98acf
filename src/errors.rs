//! Error taxonomy shared by the entity, storage and console layers
//!
//! The first three kinds are user-input errors and map onto the fixed console
//! strings. `Backend` is the only kind that can leave a command half-done, and
//! every backend guarantees the durable state is untouched when it is returned.

use thiserror::Error;

/// Result type alias using HbnbError
pub type Result<T> = std::result::Result<T, HbnbError>;

/// Which positional argument a command was missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    ClassName,
    InstanceId,
    AttributeName,
    Value,
}

impl Missing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Missing::ClassName => "class name missing",
            Missing::InstanceId => "instance id missing",
            Missing::AttributeName => "attribute name missing",
            Missing::Value => "value missing",
        }
    }
}

#[derive(Debug, Error)]
pub enum HbnbError {
    #[error("{}", .0.as_str())]
    MissingArgument(Missing),

    #[error("class doesn't exist")]
    UnknownClass(String),

    #[error("no instance found")]
    NotFound(String),

    #[error("backend failure during {op}: {message}")]
    Backend { op: &'static str, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HbnbError {
    /// Create a backend error tagged with the operation that failed
    pub fn backend(op: &'static str, message: impl Into<String>) -> Self {
        HbnbError::Backend {
            op,
            message: message.into(),
        }
    }

    /// True for errors caused by the caller's input rather than the backend
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            HbnbError::MissingArgument(_) | HbnbError::UnknownClass(_) | HbnbError::NotFound(_)
        )
    }
}

impl From<std::io::Error> for HbnbError {
    fn from(err: std::io::Error) -> Self {
        HbnbError::backend("io", err.to_string())
    }
}

impl From<serde_json::Error> for HbnbError {
    fn from(err: serde_json::Error) -> Self {
        HbnbError::backend("serde_json", err.to_string())
    }
}

impl From<rusqlite::Error> for HbnbError {
    fn from(err: rusqlite::Error) -> Self {
        HbnbError::backend("sqlite", err.to_string())
    }
}
