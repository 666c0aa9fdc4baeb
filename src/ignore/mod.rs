//! Ignore-rule engine for `.gitignore` and `.dcignore` files
//!
//! Each ignore file compiles into an [`IgnoreRuleSet`]; the [`IgnoreEngine`]
//! keeps one per ignore file and memoises per-path decisions until an ignore
//! file in scope changes.

pub mod engine;
pub mod error;
pub mod glob;
pub mod rules;

pub use engine::{IgnoreEngine, DCIGNORE_FILE_NAME, GITIGNORE_FILE_NAME};
pub use error::{IgnoreError, IgnoreResult};
pub use glob::PathMatcher;
pub use rules::IgnoreRuleSet;
