//! Configuration and command line errors

use crate::core::error_handling::ContextualError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("The specified configuration file does not exist: {path}")]
    FileNotFound { path: String },

    #[error("Error reading configuration file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Error parsing configuration file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("No project directory given")]
    MissingProjectDir,

    #[error("Project directory does not exist: {path}")]
    ProjectDirNotFound { path: String },

    #[error("No session token configured. Use --token, the 'token' configuration key or BUNDLESYNC_TOKEN")]
    MissingToken,
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::FileNotFound { .. } => Some("The specified configuration file does not exist"),
            ConfigError::Read { message, .. }
            | ConfigError::Parse { message, .. }
            | ConfigError::InvalidValue { message, .. } => Some(message),
            ConfigError::MissingProjectDir => Some("No project directory given"),
            ConfigError::ProjectDirNotFound { .. } => Some("Project directory does not exist"),
            ConfigError::MissingToken => Some("No session token configured"),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
