//! Ignore engine error types

use crate::core::error_handling::ContextualError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IgnoreError {
    #[error("Incorrect glob syntax '{pattern}': {message}")]
    Glob { pattern: String, message: String },

    #[error("Failed to read ignore file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Parsing of {path} was cancelled")]
    Cancelled { path: String },

    #[error("{message}")]
    Lock { message: String },
}

impl ContextualError for IgnoreError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, IgnoreError::Glob { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            IgnoreError::Glob { message, .. } => Some(message),
            _ => None,
        }
    }
}

pub type IgnoreResult<T> = Result<T, IgnoreError>;
