//! Sync engine error types

use crate::bundle::api::ResponseStatus;
use crate::content::StoreError;
use crate::core::cancellation::Cancelled;
use crate::core::error_handling::ContextualError;

/// Remote failure classified from a response status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiFailure {
    #[error("Not authenticated: {description}")]
    Unauthenticated { description: String },

    #[error("Bundle expired: {description}")]
    BundleExpired { description: String },

    #[error("Request failed with status {code}: {description}")]
    Generic { code: u16, description: String },
}

impl ApiFailure {
    /// `Ok` for 200, otherwise the failure class of the status code
    ///
    /// A transport failure (code 0) is a generic failure.
    pub fn classify(status: &ResponseStatus) -> Result<(), ApiFailure> {
        let description = status.description.clone();
        match status.code {
            200 => Ok(()),
            401 => Err(ApiFailure::Unauthenticated { description }),
            404 => Err(ApiFailure::BundleExpired { description }),
            code => Err(ApiFailure::Generic { code, description }),
        }
    }

    /// Expired bundles and generic failures restart bundle creation
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ApiFailure::Unauthenticated { .. })
    }
}

impl ContextualError for ApiFailure {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ApiFailure::Unauthenticated { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ApiFailure::Unauthenticated { description } => Some(description),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiFailure),

    #[error("Sync cancelled")]
    Cancelled,

    #[error(transparent)]
    Content(#[from] StoreError),

    #[error("{message}")]
    Lock { message: String },
}

impl From<Cancelled> for SyncError {
    fn from(_: Cancelled) -> Self {
        SyncError::Cancelled
    }
}

impl ContextualError for SyncError {
    fn is_user_actionable(&self) -> bool {
        match self {
            SyncError::Api(failure) => failure.is_user_actionable(),
            _ => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            SyncError::Api(failure) => failure.user_message(),
            _ => None,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid analysis service URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Failed to create HTTP client: {message}")]
    Build { message: String },
}

impl ContextualError for ClientError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ClientError::InvalidUrl { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ClientError::InvalidUrl { message, .. } => Some(message),
            ClientError::Build { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(ApiFailure::classify(&ResponseStatus::ok()), Ok(()));
        assert!(matches!(
            ApiFailure::classify(&ResponseStatus::new(401, "login")),
            Err(ApiFailure::Unauthenticated { .. })
        ));
        assert!(matches!(
            ApiFailure::classify(&ResponseStatus::new(404, "expired")),
            Err(ApiFailure::BundleExpired { .. })
        ));
        assert!(matches!(
            ApiFailure::classify(&ResponseStatus::new(500, "boom")),
            Err(ApiFailure::Generic { code: 500, .. })
        ));
        assert!(matches!(
            ApiFailure::classify(&ResponseStatus::transport_failure("refused")),
            Err(ApiFailure::Generic { code: 0, .. })
        ));
    }

    #[test]
    fn test_only_auth_failures_are_user_actionable() {
        let unauthenticated = ApiFailure::Unauthenticated {
            description: "Missing sessionToken".to_string(),
        };
        let generic = ApiFailure::Generic {
            code: 413,
            description: "Payload too large".to_string(),
        };

        assert!(unauthenticated.is_user_actionable());
        assert!(!unauthenticated.is_retryable());
        assert_eq!(unauthenticated.user_message(), Some("Missing sessionToken"));
        assert!(!generic.is_user_actionable());
        assert!(generic.is_retryable());
        assert!(SyncError::from(unauthenticated).is_user_actionable());
    }
}
