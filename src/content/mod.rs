//! File content and content-hash caching
//!
//! The [`ContentStore`] is the only owner of per-file content and SHA-256
//! entries. It answers "has this file changed since the last sync" and hands
//! out line-start tables for converting row/column ranges to offsets.

pub mod error;
pub mod line_index;
pub mod store;
pub mod workspace;

pub use error::{StoreError, StoreResult};
pub use line_index::LineIndex;
pub use store::{hash_text, ContentSource, ContentStore};
pub use workspace::Workspace;
