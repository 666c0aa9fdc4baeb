//! Error types for the notification system

use crate::core::error_handling::ContextualError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotificationError {
    #[error("Failed to publish {event_type} event to {} subscribers: {failed_subscribers:?}", .failed_subscribers.len())]
    PublishFailed {
        event_type: String,
        failed_subscribers: Vec<String>,
    },
}

impl ContextualError for NotificationError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}
