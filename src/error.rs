//! Error types for the schema registry

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Stable identifier for each error family, for programmatic dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidSchemaRef,
    UnknownRef,
    InvalidArgs,
    CompileError,
    EncodeError,
    DecodeError,
    ImmutabilityViolation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidSchemaRef => "InvalidSchemaRef",
            ErrorKind::UnknownRef => "UnknownRef",
            ErrorKind::InvalidArgs => "InvalidArgs",
            ErrorKind::CompileError => "CompileError",
            ErrorKind::EncodeError => "EncodeError",
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::ImmutabilityViolation => "ImmutabilityViolation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema registry errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Invalid schema name {name:?}: {reason}")]
    InvalidSchemaRef { name: String, reason: String },

    #[error("Unknown schema ref: {name}{}", did_you_mean(.suggestion))]
    UnknownRef {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Schema compile error at {path}: {message}")]
    Compile { path: String, message: String },

    #[error("Encode error at {path}: {message}")]
    Encode { path: String, message: String },

    #[error("Decode error at {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Schema immutability violation: {name} is already bound")]
    ImmutabilityViolation { name: String },
}

impl SchemaError {
    /// The stable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchemaError::InvalidSchemaRef { .. } => ErrorKind::InvalidSchemaRef,
            SchemaError::UnknownRef { .. } => ErrorKind::UnknownRef,
            SchemaError::InvalidArgs(_) => ErrorKind::InvalidArgs,
            SchemaError::Compile { .. } => ErrorKind::CompileError,
            SchemaError::Encode { .. } => ErrorKind::EncodeError,
            SchemaError::Decode { .. } => ErrorKind::DecodeError,
            SchemaError::ImmutabilityViolation { .. } => ErrorKind::ImmutabilityViolation,
        }
    }

    pub(crate) fn compile(path: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Compile {
            path: path.into(),
            message: message.into(),
        }
    }
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean `{}`?)", name),
        None => String::new(),
    }
}
