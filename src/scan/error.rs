//! Orchestration error types

use crate::bundle::SyncError;
use crate::core::cancellation::Cancelled;
use crate::core::error_handling::ContextualError;
use crate::ignore::IgnoreError;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Ignore(IgnoreError),

    #[error("Scan cancelled")]
    Cancelled,
}

impl From<Cancelled> for ScanError {
    fn from(_: Cancelled) -> Self {
        ScanError::Cancelled
    }
}

impl From<IgnoreError> for ScanError {
    fn from(error: IgnoreError) -> Self {
        match error {
            IgnoreError::Cancelled { .. } => ScanError::Cancelled,
            other => ScanError::Ignore(other),
        }
    }
}

impl ScanError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ScanError::Cancelled | ScanError::Sync(SyncError::Cancelled)
        )
    }
}

impl ContextualError for ScanError {
    fn is_user_actionable(&self) -> bool {
        match self {
            ScanError::Sync(e) => e.is_user_actionable(),
            ScanError::Ignore(e) => e.is_user_actionable(),
            ScanError::Cancelled => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ScanError::Sync(e) => e.user_message(),
            ScanError::Ignore(e) => e.user_message(),
            ScanError::Cancelled => None,
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_recognised_from_every_layer() {
        assert!(ScanError::from(Cancelled).is_cancelled());
        assert!(ScanError::from(SyncError::Cancelled).is_cancelled());
        assert!(ScanError::from(IgnoreError::Cancelled {
            path: ".gitignore".to_string()
        })
        .is_cancelled());
        assert!(!ScanError::from(IgnoreError::Read {
            path: ".gitignore".to_string(),
            message: "denied".to_string()
        })
        .is_cancelled());
    }
}
