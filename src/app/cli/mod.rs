//! Command line interface: arguments, configuration file and output

pub mod args;
pub mod config;
pub mod display;
pub mod error;

pub use args::Args;
pub use config::{OutputFormat, Settings, TOKEN_ENV_VAR};
pub use display::{render_json, render_text, ProjectReport};
pub use error::{ConfigError, ConfigResult};
