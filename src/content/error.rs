//! Content store error types

use crate::core::error_handling::ContextualError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("{message}")]
    Lock { message: String },
}

impl ContextualError for StoreError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
