//! Generic error handling utilities
//!
//! Errors that can reach the user implement [`ContextualError`], which tells
//! the reporting code whether the error text itself is worth showing or only
//! the surrounding operation.

/// Distinguishes errors with an actionable message from internal failures
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(message)`. Otherwise it returns `None`.
pub trait ContextualError: std::error::Error {
    /// True for configuration problems, missing credentials and similar
    /// errors the user can fix
    fn is_user_actionable(&self) -> bool;

    fn user_message(&self) -> Option<&str>;
}

/// Log an error at the detail level appropriate for its kind
///
/// User-actionable errors log their own message; anything else logs the
/// operation context. Full detail always goes to debug.
pub fn log_error_with_context<E: ContextualError + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
