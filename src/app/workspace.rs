//! Workspace backed by directories on the local file system

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use walkdir::{DirEntry, WalkDir};

use crate::content::{ContentSource, Workspace};
use crate::core::model::{FileRef, ProjectId};
use crate::core::sync::read_recovering;
use crate::core::sync::write_recovering;

/// Directories never descended into
const SKIPPED_DIRS: &[&str] = &[".git", ".hg", ".svn", ".idea"];

#[derive(Default)]
pub struct LocalWorkspace {
    roots: RwLock<HashMap<ProjectId, PathBuf>>,
}

impl LocalWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project root; the project is named after the directory
    pub fn add_root(&self, root: &Path) -> io::Result<ProjectId> {
        let root = root.canonicalize()?;
        let name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        let project = ProjectId::new(name);
        write_recovering(&self.roots, "workspace roots").insert(project.clone(), root);
        Ok(project)
    }

    pub fn root(&self, project: &ProjectId) -> Option<PathBuf> {
        read_recovering(&self.roots, "workspace roots")
            .get(project)
            .cloned()
    }

    fn absolute(&self, file: &FileRef) -> Option<PathBuf> {
        self.root(file.project())
            .map(|root| file.path().split('/').fold(root, |path, part| path.join(part)))
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

impl ContentSource for LocalWorkspace {
    fn read_content(&self, file: &FileRef) -> io::Result<String> {
        let path = self.absolute(file).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("unknown project {}", file.project()),
            )
        })?;
        // invalid UTF-8 is replaced rather than failing the whole project
        let bytes = std::fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Workspace for LocalWorkspace {
    fn project_files(&self, project: &ProjectId) -> Vec<FileRef> {
        let Some(root) = self.root(project) else {
            return Vec::new();
        };

        let mut files = Vec::new();
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_skipped(entry));
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if let Some(path) = relative_path(&root, entry.path()) {
                        files.push(FileRef::new(project.clone(), path));
                    }
                }
                Ok(_) => {}
                Err(e) => log::debug!("Skipping unreadable entry in {}: {}", root.display(), e),
            }
        }
        files.sort();
        files
    }

    fn file_size(&self, file: &FileRef) -> u64 {
        self.absolute(file)
            .and_then(|path| std::fs::metadata(path).ok())
            .map_or(0, |meta| meta.len())
    }

    fn resolve_bundle_path(&self, project: &ProjectId, bundle_path: &str) -> Option<FileRef> {
        let file = FileRef::new(project.clone(), bundle_path);
        self.absolute(&file)
            .filter(|path| path.is_file())
            .map(|_| file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn workspace_with_files() -> (tempfile::TempDir, LocalWorkspace, ProjectId) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("demo");
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("src/app.js"), "let a = 1;\n").unwrap();
        fs::write(root.join("src/nested/util.py"), "x = 2\n").unwrap();
        fs::write(root.join(".gitignore"), "build/\n").unwrap();
        fs::write(root.join(".git/config"), "[core]\n").unwrap();

        let workspace = LocalWorkspace::new();
        let project = workspace.add_root(&root).unwrap();
        (dir, workspace, project)
    }

    #[test]
    fn test_project_is_named_after_directory() {
        let (_dir, _workspace, project) = workspace_with_files();
        assert_eq!(project.name(), "demo");
    }

    #[test]
    fn test_listing_skips_vcs_directories() {
        let (_dir, workspace, project) = workspace_with_files();

        let paths: Vec<String> = workspace
            .project_files(&project)
            .iter()
            .map(|f| f.path().to_string())
            .collect();

        assert_eq!(paths, vec![".gitignore", "src/app.js", "src/nested/util.py"]);
    }

    #[test]
    fn test_content_and_size() {
        let (_dir, workspace, project) = workspace_with_files();
        let file = FileRef::new(project.clone(), "src/app.js");

        assert_eq!(workspace.read_content(&file).unwrap(), "let a = 1;\n");
        assert_eq!(workspace.file_size(&file), 11);
        assert_eq!(workspace.file_size(&FileRef::new(project, "missing.js")), 0);
    }

    #[test]
    fn test_resolve_bundle_path() {
        let (_dir, workspace, project) = workspace_with_files();

        assert_eq!(
            workspace.resolve_bundle_path(&project, "/src/nested/util.py"),
            Some(FileRef::new(project.clone(), "src/nested/util.py"))
        );
        assert_eq!(workspace.resolve_bundle_path(&project, "/src/gone.py"), None);
        assert_eq!(
            workspace.resolve_bundle_path(&ProjectId::new("other"), "/src/app.js"),
            None
        );
    }

    #[test]
    fn test_non_utf8_content_is_read_lossily() {
        let (dir, workspace, project) = workspace_with_files();
        fs::write(dir.path().join("demo/src/latin1.js"), b"// caf\xe9\n").unwrap();

        let text = workspace
            .read_content(&FileRef::new(project, "src/latin1.js"))
            .unwrap();
        assert_eq!(text, "// caf\u{fffd}\n");
    }

    #[test]
    fn test_unknown_project_read_fails() {
        let workspace = LocalWorkspace::new();
        let file = FileRef::new(ProjectId::new("nowhere"), "a.js");
        assert_eq!(
            workspace.read_content(&file).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }
}
