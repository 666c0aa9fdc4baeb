//! Selection of the files worth sending for analysis

use std::collections::HashSet;
use std::sync::Arc;

use crate::bundle::AnalysisApi;
use crate::content::Workspace;
use crate::core::cancellation::ProgressHandle;
use crate::core::model::{FileRef, ProjectId};
use crate::ignore::IgnoreEngine;
use crate::scan::error::ScanResult;

/// Extensions analysed when the service cannot be asked
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "phtml", "vue", "xsd", "slim", "py", "es6", "js", "jsx", "pom", "java", "erb", "xml", "aspx",
    "tsx", "html", "swift", "cc", "htm", "cpp", "cxx", "c", "h", "go", "haml", "hpp", "hxx", "kt",
    "rhtml", "cls", "cjs", "es", "ejs", "rb", "cs", "wxs", "mjs", "php", "config", "ts",
];

pub const DEFAULT_CONFIG_FILES: &[&str] = &[".gitignore", ".dcignore"];

/// Extension and config-file allowlists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedFiles {
    extensions: HashSet<String>,
    config_files: HashSet<String>,
}

impl Default for SupportedFiles {
    fn default() -> Self {
        Self::new(
            DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()),
            DEFAULT_CONFIG_FILES.iter().map(|f| f.to_string()),
        )
    }
}

impl SupportedFiles {
    /// Leading dots on extensions are stripped
    pub fn new(
        extensions: impl IntoIterator<Item = String>,
        config_files: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            config_files: config_files.into_iter().collect(),
        }
    }

    /// Ask the service for its allowlists, falling back to the defaults
    pub async fn from_filters(api: &dyn AnalysisApi, token: &str) -> Self {
        let response = api.get_filters(token).await;
        if !response.status.is_success() {
            log::warn!(
                "Can't retrieve supported file extensions and config files from the server. \
                 Fallback to default set. {} {}",
                response.status.code,
                response.status.description
            );
            return Self::default();
        }

        let supported = Self::new(response.extensions, response.config_files);
        log::info!("Supported extensions: {:?}", supported.extensions);
        log::info!("Supported config files: {:?}", supported.config_files);
        supported
    }

    pub fn has_supported_extension(&self, file: &FileRef) -> bool {
        file.extension()
            .is_some_and(|extension| self.extensions.contains(&extension))
    }

    pub fn is_config_file(&self, file: &FileRef) -> bool {
        self.config_files.contains(file.file_name())
    }
}

/// Applies ignore rules, size limits and allowlists to a project's files
pub struct FileCollector {
    workspace: Arc<dyn Workspace>,
    ignore: Arc<IgnoreEngine>,
    supported: SupportedFiles,
    max_file_size: u64,
}

impl FileCollector {
    pub fn new(
        workspace: Arc<dyn Workspace>,
        ignore: Arc<IgnoreEngine>,
        supported: SupportedFiles,
        max_file_size: u64,
    ) -> Self {
        Self {
            workspace,
            ignore,
            supported,
            max_file_size,
        }
    }

    pub fn ignore(&self) -> &Arc<IgnoreEngine> {
        &self.ignore
    }

    pub fn supported(&self) -> &SupportedFiles {
        &self.supported
    }

    pub fn is_supported(&self, file: &FileRef) -> bool {
        if self.ignore.is_ignored(file) {
            return false;
        }
        let size = self.workspace.file_size(file);
        0 < size
            && size < self.max_file_size
            && (self.supported.has_supported_extension(file) || self.supported.is_config_file(file))
    }

    /// Files of the project that should be analysed
    ///
    /// With `scan_missed_ignore_files` unset, ignore decisions made without
    /// the project's ignore files are discarded afterwards.
    pub fn supported_files_in_project(
        &self,
        project: &ProjectId,
        scan_missed_ignore_files: bool,
        progress: Option<&ProgressHandle>,
    ) -> ScanResult<Vec<FileRef>> {
        let all_files = self.workspace.project_files(project);
        if all_files.is_empty() {
            log::warn!("Empty files list for project: {}", project);
        }
        if scan_missed_ignore_files {
            self.ignore.scan_all_missed_ignore_files(&all_files, progress)?;
        }

        log::info!("Rescan for all ignored files at: {}", project);
        let total = all_files.len().max(1);
        let mut result = Vec::new();
        for (i, file) in all_files.into_iter().enumerate() {
            if let Some(progress) = progress {
                progress.set_text(format!("Checked if supported {} files of {}", i, total));
                progress.set_fraction(i as f64 / total as f64);
                progress.check_cancelled()?;
            }
            if self.is_supported(&file) {
                result.push(file);
            }
        }
        if !scan_missed_ignore_files {
            self.ignore.remove_project(project);
        }

        if result.iter().all(|file| self.supported.is_config_file(file)) {
            result.clear();
        }
        if result.is_empty() {
            log::warn!("Empty supported files list for project: {}", project);
        }
        Ok(result)
    }
}
