use crate::content::store::ContentSource;
use crate::core::model::{FileRef, ProjectId};

/// File system view the engine and orchestrator work against
pub trait Workspace: ContentSource {
    /// Every file currently belonging to the project, ignored ones included
    fn project_files(&self, project: &ProjectId) -> Vec<FileRef>;

    /// Size in bytes, `0` when the file cannot be inspected
    fn file_size(&self, file: &FileRef) -> u64;

    /// Map a bundle path reported by the service back to a tracked file
    fn resolve_bundle_path(&self, project: &ProjectId, bundle_path: &str) -> Option<FileRef>;

    /// Name used to derive the per-project shard token
    fn project_name(&self, project: &ProjectId) -> String {
        project.name().to_string()
    }
}
