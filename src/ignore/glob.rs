//! Compiled ignore globs
//!
//! Globs are matched against `/`-separated bundle paths with `globset`.
//! `*`, `?` and character classes stay within one path component; `**`
//! crosses components.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::ignore::error::IgnoreError;

fn glob_error(glob: &str, error: impl ToString) -> IgnoreError {
    IgnoreError::Glob {
        pattern: glob.to_string(),
        message: error.to_string(),
    }
}

/// One or more globs matched as an alternation
#[derive(Debug, Clone)]
pub struct PathMatcher {
    globs: Vec<String>,
    set: GlobSet,
}

impl PathMatcher {
    pub fn new(glob: &str) -> Result<Self, IgnoreError> {
        Self::any_of(&[glob.to_string()])
    }

    /// Matches when any of `globs` matches; fails on the first invalid glob
    pub fn any_of(globs: &[String]) -> Result<Self, IgnoreError> {
        let mut builder = GlobSetBuilder::new();
        for glob in globs {
            let compiled = GlobBuilder::new(glob)
                .literal_separator(true)
                .backslash_escape(true)
                .build()
                .map_err(|e| glob_error(glob, e))?;
            builder.add(compiled);
        }
        let set = builder
            .build()
            .map_err(|e| glob_error(&globs.join(" | "), e))?;
        Ok(Self {
            globs: globs.to_vec(),
            set,
        })
    }

    pub fn globs(&self) -> &[String] {
        &self.globs
    }

    pub fn matches(&self, path: &str) -> bool {
        self.set.is_match(path)
    }
}
