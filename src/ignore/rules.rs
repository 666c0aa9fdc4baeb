use std::collections::BTreeMap;

use crate::core::cancellation::{Cancelled, ProgressHandle};
use crate::ignore::glob::PathMatcher;

/// Compiled matchers of one ignore file
///
/// Both maps are keyed by the 0-based source line. Paths handed to
/// [`IgnoreRuleSet::is_ignored`] are bundle paths (`/dir/file.js`); the base
/// directory uses the same form and is `""` for the project root.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRuleSet {
    base_dir: String,
    excludes: BTreeMap<usize, PathMatcher>,
    re_includes: BTreeMap<usize, PathMatcher>,
}

/// Build the globs for one trimmed, non-comment pattern line
///
/// A pattern ending in `/` only matches inside the directory; any other
/// pattern matches the path itself or anything below it.
fn pattern_to_globs(base_dir: &str, pattern: &str) -> Vec<String> {
    let any_depth = if base_dir.is_empty() {
        "**/".to_string()
    } else {
        format!("{}/**/", base_dir)
    };
    let body = &pattern[..pattern.len() - pattern.chars().last().map_or(0, char::len_utf8)];
    let prefix = match body.find('/') {
        // no separator, or only a trailing one: match at any depth
        None => any_depth,
        Some(0) => base_dir.to_string(),
        Some(first) => {
            let ends_with_wildcard = pattern.ends_with("/*") || pattern.ends_with("/**");
            match pattern.rfind('/') {
                Some(last) if ends_with_wildcard && last == first => any_depth,
                _ => format!("{}/", base_dir),
            }
        }
    };

    let glob = format!("{}{}", prefix, pattern);
    if pattern.ends_with('/') {
        vec![format!("{}**", glob)]
    } else {
        let below = format!("{}/**", glob);
        vec![glob, below]
    }
}

fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while let Some(idx) = rest.find(['\r', '\n']) {
        lines.push(&rest[..idx]);
        let skip = if rest[idx..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[idx + skip..];
    }
    lines.push(rest);
    lines
}

impl IgnoreRuleSet {
    /// Compile the text of an ignore file located in `base_dir`
    ///
    /// Lines with invalid glob syntax are logged and skipped. The progress,
    /// when given, receives the line fraction and is checked for cancellation
    /// after every line.
    pub fn parse(
        base_dir: &str,
        text: &str,
        progress: Option<&ProgressHandle>,
    ) -> Result<Self, Cancelled> {
        let mut rules = IgnoreRuleSet {
            base_dir: base_dir.trim_end_matches('/').to_string(),
            ..Default::default()
        };
        let lines = split_lines(text);
        let total = lines.len();

        for (line_index, raw) in lines.into_iter().enumerate() {
            let mut line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let re_include = line.starts_with('!');
            if re_include {
                line = &line[1..];
                if line.is_empty() {
                    continue;
                }
            }

            let globs = pattern_to_globs(&rules.base_dir, line);
            match PathMatcher::any_of(&globs) {
                Ok(matcher) if re_include => {
                    rules.re_includes.insert(line_index, matcher);
                }
                Ok(matcher) => {
                    rules.excludes.insert(line_index, matcher);
                }
                Err(e) => log::warn!("Incorrect Glob syntax in .ignore file: {}", e),
            }

            if let Some(progress) = progress {
                progress.set_fraction(line_index as f64 / total as f64);
                progress.check_cancelled()?;
            }
        }

        Ok(rules)
    }

    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    pub fn exclude_count(&self) -> usize {
        self.excludes.len()
    }

    pub fn re_include_count(&self) -> usize {
        self.re_includes.len()
    }

    /// True when `path` lies inside this ignore file's directory
    pub fn in_scope(&self, path: &str) -> bool {
        if self.base_dir.is_empty() {
            return true;
        }
        path.strip_prefix(&self.base_dir)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// An exclude matches and no re-include on a later line matches
    pub fn is_ignored(&self, path: &str) -> bool {
        self.excludes.iter().any(|(line, matcher)| {
            matcher.matches(path)
                && !self
                    .re_includes
                    .range(line + 1..)
                    .any(|(_, re_include)| re_include.matches(path))
        })
    }
}
