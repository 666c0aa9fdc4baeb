use std::collections::HashMap;
use std::sync::RwLock;

use crate::bundle::types::SuggestionEntry;
use crate::core::model::{FileRef, ProjectId};
use crate::core::sync::{read_recovering, write_recovering};

/// Findings per analysed file
///
/// A missing key means "not analysed yet"; an empty list means "analysed,
/// no findings".
#[derive(Default)]
pub struct SuggestionCache {
    entries: RwLock<HashMap<FileRef, Vec<SuggestionEntry>>>,
}

impl SuggestionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file: &FileRef) -> Option<Vec<SuggestionEntry>> {
        read_recovering(&self.entries, "suggestion cache")
            .get(file)
            .cloned()
    }

    pub fn contains(&self, file: &FileRef) -> bool {
        read_recovering(&self.entries, "suggestion cache").contains_key(file)
    }

    /// Publish the results of one sync cycle in a single write
    pub fn publish(&self, results: HashMap<FileRef, Vec<SuggestionEntry>>) {
        write_recovering(&self.entries, "suggestion cache").extend(results);
    }

    /// Drop entries and return the files that had one
    pub fn remove_files<'a>(&self, files: impl IntoIterator<Item = &'a FileRef>) -> Vec<FileRef> {
        let mut entries = write_recovering(&self.entries, "suggestion cache");
        files
            .into_iter()
            .filter(|file| entries.remove(*file).is_some())
            .cloned()
            .collect()
    }

    pub fn files(&self, project: &ProjectId) -> Vec<FileRef> {
        let mut files: Vec<FileRef> = read_recovering(&self.entries, "suggestion cache")
            .keys()
            .filter(|file| file.project() == project)
            .cloned()
            .collect();
        files.sort_by(|a, b| a.path().cmp(b.path()));
        files
    }

    pub fn files_with_suggestions(&self, project: &ProjectId) -> Vec<FileRef> {
        let mut files: Vec<FileRef> = read_recovering(&self.entries, "suggestion cache")
            .iter()
            .filter(|(file, entries)| file.project() == project && !entries.is_empty())
            .map(|(file, _)| file.clone())
            .collect();
        files.sort_by(|a, b| a.path().cmp(b.path()));
        files
    }
}
