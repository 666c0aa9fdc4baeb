//! Opaque project and file handles
//!
//! Every cache in the crate is keyed by these handles. They are cheap to clone
//! (reference counted strings) and compare by value, so two handles built from
//! the same project name and relative path address the same cache entries.

use std::fmt;
use std::sync::Arc;

/// Stable identity of one project
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(Arc<str>);

impl ProjectId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of one trackable source file
///
/// The path is relative to the project root, uses `/` as separator on every
/// platform and never starts with a separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileRef {
    project: ProjectId,
    path: Arc<str>,
}

impl FileRef {
    pub fn new(project: ProjectId, path: impl AsRef<str>) -> Self {
        let normalised = path.as_ref().replace('\\', "/");
        let trimmed = normalised.trim_start_matches('/');
        Self {
            project,
            path: Arc::from(trimmed),
        }
    }

    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    /// Project-relative path, `/`-separated
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path as the analysis service knows it: project-relative with a leading `/`
    pub fn bundle_path(&self) -> String {
        format!("/{}", self.path)
    }

    pub fn file_name(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[idx + 1..],
            None => &self.path,
        }
    }

    /// Directory of this file in bundle-path form (`""` for the project root)
    pub fn dir_path(&self) -> String {
        match self.path.rfind('/') {
            Some(idx) => format!("/{}", &self.path[..idx]),
            None => String::new(),
        }
    }

    /// Lower-cased extension without the leading dot
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(idx) if idx + 1 < name.len() => Some(name[idx + 1..].to_lowercase()),
            _ => None,
        }
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project, self.bundle_path())
    }
}
