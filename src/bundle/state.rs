//! Per-project bundle bookkeeping

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::core::model::{FileRef, ProjectId};
use crate::core::sync::{read_recovering, write_recovering};

/// A bundle hash made of zeros means the service has no bundle at all
const EMPTY_BUNDLE_SUFFIX: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Map the service's all-zero sentinel to "no bundle"
pub fn normalise_bundle_id(bundle_hash: &str) -> String {
    if bundle_hash.ends_with(EMPTY_BUNDLE_SUFFIX) {
        String::new()
    } else {
        bundle_hash.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectBundleState {
    /// Empty until the first successful create
    pub bundle_id: String,
    /// Files dropped from tracking since the last extend
    pub removed_files: HashSet<FileRef>,
    pub analysis_url: String,
    pub update_in_progress: bool,
}

/// Bundle id, pending removals and status flags of every known project
#[derive(Default)]
pub struct BundleRegistry {
    projects: RwLock<HashMap<ProjectId, ProjectBundleState>>,
}

impl BundleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project with no bundle; false when it was already known
    pub fn add_project(&self, project: &ProjectId) -> bool {
        let mut projects = write_recovering(&self.projects, "bundle registry");
        if projects.contains_key(project) {
            return false;
        }
        projects.insert(project.clone(), ProjectBundleState::default());
        true
    }

    pub fn projects(&self) -> Vec<ProjectId> {
        let mut projects: Vec<ProjectId> = read_recovering(&self.projects, "bundle registry")
            .keys()
            .cloned()
            .collect();
        projects.sort_by(|a, b| a.name().cmp(b.name()));
        projects
    }

    pub fn contains(&self, project: &ProjectId) -> bool {
        read_recovering(&self.projects, "bundle registry").contains_key(project)
    }

    pub fn bundle_id(&self, project: &ProjectId) -> String {
        read_recovering(&self.projects, "bundle registry")
            .get(project)
            .map(|state| state.bundle_id.clone())
            .unwrap_or_default()
    }

    pub fn set_bundle_id(&self, project: &ProjectId, bundle_id: impl Into<String>) {
        write_recovering(&self.projects, "bundle registry")
            .entry(project.clone())
            .or_default()
            .bundle_id = bundle_id.into();
    }

    pub fn analysis_url(&self, project: &ProjectId) -> String {
        read_recovering(&self.projects, "bundle registry")
            .get(project)
            .map(|state| state.analysis_url.clone())
            .unwrap_or_default()
    }

    pub fn set_analysis_url(&self, project: &ProjectId, url: impl Into<String>) {
        write_recovering(&self.projects, "bundle registry")
            .entry(project.clone())
            .or_default()
            .analysis_url = url.into();
    }

    pub fn add_removed(&self, project: &ProjectId, files: impl IntoIterator<Item = FileRef>) {
        write_recovering(&self.projects, "bundle registry")
            .entry(project.clone())
            .or_default()
            .removed_files
            .extend(files);
    }

    /// Drain the pending removals of the project
    pub fn take_removed(&self, project: &ProjectId) -> HashSet<FileRef> {
        write_recovering(&self.projects, "bundle registry")
            .get_mut(project)
            .map(|state| std::mem::take(&mut state.removed_files))
            .unwrap_or_default()
    }

    pub fn is_update_in_progress(&self, project: &ProjectId) -> bool {
        read_recovering(&self.projects, "bundle registry")
            .get(project)
            .is_some_and(|state| state.update_in_progress)
    }

    pub fn set_update_in_progress(&self, project: &ProjectId, in_progress: bool) {
        let mut projects = write_recovering(&self.projects, "bundle registry");
        if in_progress {
            projects.entry(project.clone()).or_default().update_in_progress = true;
        } else if let Some(state) = projects.get_mut(project) {
            state.update_in_progress = false;
        }
    }

    /// Forget the project entirely; a running update keeps its flag
    pub fn remove_project(&self, project: &ProjectId) {
        let mut projects = write_recovering(&self.projects, "bundle registry");
        let in_progress = projects
            .remove(project)
            .is_some_and(|state| state.update_in_progress);
        if in_progress {
            projects.insert(
                project.clone(),
                ProjectBundleState {
                    update_in_progress: true,
                    ..ProjectBundleState::default()
                },
            );
        }
    }
}
