use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::content::ContentSource;
use crate::core::cancellation::ProgressHandle;
use crate::core::model::{FileRef, ProjectId};
use crate::core::sync::{read_recovering, write_recovering};
use crate::ignore::error::{IgnoreError, IgnoreResult};
use crate::ignore::rules::IgnoreRuleSet;

pub const GITIGNORE_FILE_NAME: &str = ".gitignore";
pub const DCIGNORE_FILE_NAME: &str = ".dcignore";

/// Answers whether a file is excluded from analysis
///
/// Decisions are memoised per project and path. Updating or removing an
/// ignore file drops the memoised decisions for every path in its directory.
pub struct IgnoreEngine {
    source: Arc<dyn ContentSource>,
    rule_sets: RwLock<HashMap<FileRef, IgnoreRuleSet>>,
    decisions: RwLock<HashMap<ProjectId, HashMap<String, bool>>>,
}

impl IgnoreEngine {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self {
            source,
            rule_sets: RwLock::new(HashMap::new()),
            decisions: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_ignore_file(&self, file: &FileRef) -> bool {
        self.is_dcignore_file(file) || self.is_gitignore_file(file)
    }

    pub fn is_dcignore_file(&self, file: &FileRef) -> bool {
        file.file_name() == DCIGNORE_FILE_NAME
    }

    pub fn is_gitignore_file(&self, file: &FileRef) -> bool {
        file.file_name() == GITIGNORE_FILE_NAME
    }

    /// Whether rules for this ignore file have been compiled
    pub fn is_parsed(&self, ignore_file: &FileRef) -> bool {
        read_recovering(&self.rule_sets, "ignore rules").contains_key(ignore_file)
    }

    /// Read and (re)compile an ignore file, replacing earlier rules for it
    pub fn update_ignore_file(
        &self,
        ignore_file: &FileRef,
        progress: Option<&ProgressHandle>,
    ) -> IgnoreResult<()> {
        let text = self
            .source
            .read_content(ignore_file)
            .map_err(|e| IgnoreError::Read {
                path: ignore_file.to_string(),
                message: e.to_string(),
            })?;
        self.update_ignore_file_content(ignore_file, &text, progress)
    }

    /// Compile already loaded ignore file text
    pub fn update_ignore_file_content(
        &self,
        ignore_file: &FileRef,
        text: &str,
        progress: Option<&ProgressHandle>,
    ) -> IgnoreResult<()> {
        log::info!("Scanning .ignore file: {}", ignore_file);
        if let Some(progress) = progress {
            progress.set_text(format!("parsing file: {}", ignore_file.bundle_path()));
        }

        let rules = IgnoreRuleSet::parse(&ignore_file.dir_path(), text, progress).map_err(|_| {
            IgnoreError::Cancelled {
                path: ignore_file.to_string(),
            }
        })?;
        log::debug!(
            "{}: {} exclude and {} re-include rules",
            ignore_file,
            rules.exclude_count(),
            rules.re_include_count()
        );

        self.forget_decisions_in_scope(ignore_file.project(), &rules);
        write_recovering(&self.rule_sets, "ignore rules").insert(ignore_file.clone(), rules);

        log::info!("Scan FINISHED for .ignore file: {}", ignore_file);
        Ok(())
    }

    pub fn remove_ignore_file(&self, ignore_file: &FileRef) {
        let removed = write_recovering(&self.rule_sets, "ignore rules").remove(ignore_file);
        if let Some(rules) = removed {
            self.forget_decisions_in_scope(ignore_file.project(), &rules);
        }
    }

    pub fn remove_project(&self, project: &ProjectId) {
        write_recovering(&self.rule_sets, "ignore rules")
            .retain(|ignore_file, _| ignore_file.project() != project);
        write_recovering(&self.decisions, "ignore decisions").remove(project);
    }

    /// Compile every ignore file in `files` that has no rules yet
    ///
    /// Unreadable ignore files are logged and skipped; cancellation stops the scan.
    pub fn scan_all_missed_ignore_files(
        &self,
        files: &[FileRef],
        progress: Option<&ProgressHandle>,
    ) -> IgnoreResult<()> {
        for ignore_file in files.iter().filter(|f| self.is_ignore_file(f)) {
            if self.is_parsed(ignore_file) {
                continue;
            }
            match self.update_ignore_file(ignore_file, progress) {
                Err(e @ IgnoreError::Cancelled { .. }) => return Err(e),
                Err(e) => log::warn!("{}", e),
                Ok(()) => {}
            }
        }
        Ok(())
    }

    pub fn is_ignored(&self, file: &FileRef) -> bool {
        let path = file.bundle_path();
        let cached = read_recovering(&self.decisions, "ignore decisions")
            .get(file.project())
            .and_then(|paths| paths.get(&path).copied());
        if let Some(ignored) = cached {
            return ignored;
        }

        let ignored = read_recovering(&self.rule_sets, "ignore rules")
            .iter()
            .filter(|(ignore_file, rules)| {
                ignore_file.project() == file.project() && rules.in_scope(&path)
            })
            .any(|(_, rules)| rules.is_ignored(&path));

        write_recovering(&self.decisions, "ignore decisions")
            .entry(file.project().clone())
            .or_default()
            .insert(path, ignored);
        ignored
    }

    fn forget_decisions_in_scope(&self, project: &ProjectId, rules: &IgnoreRuleSet) {
        if let Some(paths) = write_recovering(&self.decisions, "ignore decisions").get_mut(project)
        {
            paths.retain(|path, _| !rules.in_scope(path));
        }
    }
}

