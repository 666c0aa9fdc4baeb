//! Conversion of a completed analysis response into cached findings
//!
//! Row/column ranges are turned into character offsets through the line index
//! of the file they point into. Malformed ranges are dropped one by one, but an
//! unknown suggestion id or an unresolvable marker file voids the whole batch.

use std::collections::HashMap;

use crate::bundle::api::{AnalysisResponse, Position, Suggestion};
use crate::bundle::types::{MarkerRange, Severity, SuggestionEntry, TextRange};
use crate::content::{ContentStore, LineIndex, StoreError, Workspace};
use crate::core::model::{FileRef, ProjectId};

pub type MergedResults = HashMap<FileRef, Vec<SuggestionEntry>>;

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Analysis response has no files map")]
    MissingFiles,

    #[error("Analysis response has no suggestions map")]
    MissingSuggestions,

    #[error("Suggestion '{id}' referenced by {file} is not in the response")]
    UnknownSuggestion { id: String, file: String },

    #[error("Marker file '{path}' cannot be resolved")]
    UnresolvedMarkerFile { path: String },

    #[error(transparent)]
    Content(#[from] StoreError),
}

pub struct ResultMerger<'a> {
    project: &'a ProjectId,
    content: &'a ContentStore,
    workspace: &'a dyn Workspace,
    line_indexes: HashMap<FileRef, LineIndex>,
}

impl<'a> ResultMerger<'a> {
    pub fn new(
        project: &'a ProjectId,
        content: &'a ContentStore,
        workspace: &'a dyn Workspace,
    ) -> Self {
        Self {
            project,
            content,
            workspace,
            line_indexes: HashMap::new(),
        }
    }

    /// Findings for every requested file; files the service did not mention
    /// get an empty list
    pub fn merge(
        &mut self,
        files: &[FileRef],
        response: &AnalysisResponse,
    ) -> Result<MergedResults, MergeError> {
        let files_map = response.files.as_ref().ok_or(MergeError::MissingFiles)?;
        let mut results = MergedResults::with_capacity(files.len());

        for file in files {
            let Some(file_suggestions) = files_map.get(&file.bundle_path()) else {
                results.insert(file.clone(), Vec::new());
                continue;
            };
            let suggestions = response
                .suggestions
                .as_ref()
                .ok_or(MergeError::MissingSuggestions)?;

            let mut entries = Vec::with_capacity(file_suggestions.len());
            for (suggestion_id, positions) in file_suggestions {
                let suggestion =
                    suggestions
                        .get(suggestion_id)
                        .ok_or_else(|| MergeError::UnknownSuggestion {
                            id: suggestion_id.clone(),
                            file: file.to_string(),
                        })?;
                let Some(severity) = Severity::from_level(suggestion.severity) else {
                    log::warn!(
                        "Suggestion {} has unknown severity {}; dropped",
                        suggestion.id,
                        suggestion.severity
                    );
                    continue;
                };

                let mut ranges = Vec::with_capacity(positions.len());
                for file_position in positions {
                    let mut markers = Vec::with_capacity(file_position.markers.len());
                    for marker in &file_position.markers {
                        let Some((message_start, message_end)) = message_range(&marker.msg) else {
                            log::warn!("Incorrect marker message range {:?} in {}", marker.msg, file);
                            continue;
                        };
                        let mut marker_positions = Vec::with_capacity(marker.pos.len());
                        for position in &marker.pos {
                            let target = self.marker_target(file, position)?;
                            if let Some(range) = self.text_range(&target, position, Vec::new())? {
                                marker_positions.push(range);
                            }
                        }
                        markers.push(MarkerRange {
                            message_start,
                            message_end,
                            positions: marker_positions,
                        });
                    }

                    if let Some(range) =
                        self.text_range(file, &file_position.position(), markers)?
                    {
                        ranges.push(range);
                    }
                }

                entries.push(suggestion_entry(suggestion, severity, ranges));
            }
            results.insert(file.clone(), entries);
        }

        Ok(results)
    }

    fn marker_target(&self, file: &FileRef, position: &Position) -> Result<FileRef, MergeError> {
        match position.file.as_deref() {
            None | Some("") => Ok(file.clone()),
            Some(path) => self
                .workspace
                .resolve_bundle_path(self.project, path)
                .ok_or_else(|| MergeError::UnresolvedMarkerFile {
                    path: path.to_string(),
                }),
        }
    }

    fn line_index(&mut self, file: &FileRef) -> Result<&LineIndex, StoreError> {
        if !self.line_indexes.contains_key(file) {
            let index = self.content.line_index(file)?;
            self.line_indexes.insert(file.clone(), index);
        }
        Ok(&self.line_indexes[file])
    }

    /// `None` for positions with missing, non-positive rows or negative columns
    fn text_range(
        &mut self,
        file: &FileRef,
        position: &Position,
        markers: Vec<MarkerRange>,
    ) -> Result<Option<TextRange>, MergeError> {
        let (Some(&[start_row, end_row]), Some(&[start_col, end_col])) =
            (position.rows.get(..2), position.cols.get(..2))
        else {
            log::warn!("Incomplete position {:?} in {}", position, file);
            return Ok(None);
        };
        let start_col = start_col.saturating_sub(1);
        if start_row <= 0 || end_row <= 0 || start_col < 0 || end_col < 0 {
            log::warn!(
                "Incorrect position rows {:?} cols {:?} in {}",
                position.rows,
                position.cols,
                file
            );
            return Ok(None);
        }

        let (start_row, end_row) = (start_row as usize, end_row as usize);
        let (start_col, end_col) = (start_col as usize, end_col as usize);
        let index = self.line_index(file)?;
        let start = index.line_start_offset(start_row - 1).saturating_add(start_col);
        let end = index.line_start_offset(end_row - 1).saturating_add(end_col);

        Ok(Some(TextRange {
            start,
            end,
            start_row,
            end_row,
            start_col,
            end_col,
            markers,
            file: file.bundle_path(),
        }))
    }
}

/// Marker message indices are inclusive on the wire
fn message_range(msg: &[i64]) -> Option<(usize, usize)> {
    match msg {
        [start, end, ..] if *start >= 0 && *end >= *start => {
            Some((*start as usize, *end as usize + 1))
        }
        _ => None,
    }
}

fn suggestion_entry(
    suggestion: &Suggestion,
    severity: Severity,
    ranges: Vec<TextRange>,
) -> SuggestionEntry {
    SuggestionEntry {
        id: suggestion.id.clone(),
        rule: suggestion.rule.clone(),
        message: suggestion.message.clone(),
        title: suggestion.title.clone(),
        text: suggestion.text.clone(),
        severity,
        repo_dataset_size: suggestion.repo_dataset_size,
        example_commit_descriptions: suggestion.example_commit_descriptions.clone(),
        example_commit_fixes: suggestion.example_commit_fixes.clone(),
        ranges,
        categories: suggestion.categories.clone(),
        tags: suggestion.tags.clone(),
        cwe: suggestion.cwe.clone(),
        lead_url: suggestion.lead_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentSource;
    use std::io;
    use std::sync::Arc;

    const SOURCE: &str = "var a = 1;\nvar b = 2;\nconsole.log(a);\n";
    const OTHER: &str = "export const x = 1;\n";

    struct FixtureWorkspace;

    impl ContentSource for FixtureWorkspace {
        fn read_content(&self, file: &FileRef) -> io::Result<String> {
            match file.path() {
                "src/a.js" => Ok(SOURCE.to_string()),
                "src/other.js" => Ok(OTHER.to_string()),
                _ => Err(io::Error::new(io::ErrorKind::NotFound, "no such file")),
            }
        }
    }

    impl Workspace for FixtureWorkspace {
        fn project_files(&self, project: &ProjectId) -> Vec<FileRef> {
            vec![
                FileRef::new(project.clone(), "src/a.js"),
                FileRef::new(project.clone(), "src/other.js"),
            ]
        }

        fn file_size(&self, _file: &FileRef) -> u64 {
            1
        }

        fn resolve_bundle_path(&self, project: &ProjectId, bundle_path: &str) -> Option<FileRef> {
            self.project_files(project)
                .into_iter()
                .find(|file| file.bundle_path() == bundle_path)
        }
    }

    fn project() -> ProjectId {
        ProjectId::new("p")
    }

    fn response(body: &str) -> AnalysisResponse {
        serde_json::from_str(body).unwrap()
    }

    fn merge(files: &[FileRef], response: &AnalysisResponse) -> Result<MergedResults, MergeError> {
        let workspace = FixtureWorkspace;
        let content = ContentStore::new(Arc::new(FixtureWorkspace));
        let project = project();
        ResultMerger::new(&project, &content, &workspace).merge(files, response)
    }

    fn file(path: &str) -> FileRef {
        FileRef::new(project(), path)
    }

    #[test]
    fn test_offsets_from_rows_and_columns() {
        let response = response(
            r#"{"status": "COMPLETE",
                "files": {"/src/a.js": {"0": [{"rows": [2, 2], "cols": [5, 9], "markers": [
                    {"msg": [0, 2], "pos": [{"rows": [3, 3], "cols": [13, 13]},
                                            {"rows": [1, 1], "cols": [1, 6], "file": "/src/other.js"}]}
                ]}]}},
                "suggestions": {"0": {"id": "js/Unused", "rule": "Unused", "message": "b is unused", "severity": 2}}}"#,
        );

        let results = merge(&[file("src/a.js"), file("src/b.js")], &response).unwrap();

        assert_eq!(results[&file("src/b.js")], Vec::new());
        let entries = &results[&file("src/a.js")];
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].severity, Severity::Warning);
        let range = &entries[0].ranges[0];
        assert_eq!((range.start, range.end), (15, 20));
        assert_eq!(&SOURCE[range.start..range.end], "b = 2");
        assert_eq!((range.start_col, range.end_col), (4, 9));

        let marker = &range.markers[0];
        assert_eq!((marker.message_start, marker.message_end), (0, 3));
        assert_eq!((marker.positions[0].start, marker.positions[0].end), (34, 35));
        assert_eq!(&SOURCE[34..35], "a");
        assert_eq!(marker.positions[1].file, "/src/other.js");
        assert_eq!(&OTHER[marker.positions[1].start..marker.positions[1].end], "export");
    }

    #[test]
    fn test_malformed_ranges_are_dropped() {
        let response = response(
            r#"{"status": "COMPLETE",
                "files": {"/src/a.js": {"0": [{"rows": [0, 1], "cols": [1, 2]},
                                              {"rows": [1], "cols": [1, 2]},
                                              {"rows": [1, 1], "cols": [0, 2]},
                                              {"rows": [1, 1], "cols": [1, 3]}]}},
                "suggestions": {"0": {"id": "x", "severity": 1}}}"#,
        );

        let results = merge(&[file("src/a.js")], &response).unwrap();

        let ranges = &results[&file("src/a.js")][0].ranges;
        assert_eq!(ranges.len(), 1);
        assert_eq!((ranges[0].start, ranges[0].end), (0, 3));
    }

    #[test]
    fn test_extreme_columns_do_not_overflow() {
        let response = response(
            r#"{"status": "COMPLETE",
                "files": {"/src/a.js": {"0": [{"rows": [1, 1], "cols": [-9223372036854775808, 2]},
                                              {"rows": [1, 1], "cols": [1, -9223372036854775808]},
                                              {"rows": [1, 1], "cols": [1, 3]},
                                              {"rows": [1, 1], "cols": [1, 9223372036854775807]}]}},
                "suggestions": {"0": {"id": "x", "severity": 1}}}"#,
        );

        let results = merge(&[file("src/a.js")], &response).unwrap();

        let ranges = &results[&file("src/a.js")][0].ranges;
        assert_eq!(ranges.len(), 2);
        assert_eq!((ranges[0].start, ranges[0].end), (0, 3));
        assert_eq!(ranges[1].end_col, i64::MAX as usize);
    }

    #[test]
    fn test_unknown_suggestion_voids_batch() {
        let response = response(
            r#"{"status": "COMPLETE",
                "files": {"/src/a.js": {"7": [{"rows": [1, 1], "cols": [1, 2]}]}},
                "suggestions": {"0": {"id": "x", "severity": 1}}}"#,
        );

        let result = merge(&[file("src/a.js")], &response);
        assert!(matches!(result, Err(MergeError::UnknownSuggestion { .. })));
    }

    #[test]
    fn test_unresolvable_marker_file_voids_batch() {
        let response = response(
            r#"{"status": "COMPLETE",
                "files": {"/src/a.js": {"0": [{"rows": [1, 1], "cols": [1, 2], "markers": [
                    {"msg": [0, 1], "pos": [{"rows": [1, 1], "cols": [1, 2], "file": "/gone.js"}]}]}]}},
                "suggestions": {"0": {"id": "x", "severity": 1}}}"#,
        );

        let result = merge(&[file("src/a.js")], &response);
        assert!(matches!(result, Err(MergeError::UnresolvedMarkerFile { .. })));
    }

    #[test]
    fn test_missing_files_map_voids_batch() {
        let result = merge(&[file("src/a.js")], &response(r#"{"status": "COMPLETE"}"#));
        assert!(matches!(result, Err(MergeError::MissingFiles)));
    }

    #[test]
    fn test_empty_files_map_means_no_findings() {
        let response = response(r#"{"status": "COMPLETE", "files": {}}"#);
        let results = merge(&[file("src/a.js")], &response).unwrap();
        assert_eq!(results[&file("src/a.js")], Vec::new());
    }

    #[test]
    fn test_unknown_severity_is_dropped() {
        let response = response(
            r#"{"status": "COMPLETE",
                "files": {"/src/a.js": {"0": [{"rows": [1, 1], "cols": [1, 2]}]}},
                "suggestions": {"0": {"id": "x", "severity": 9}}}"#,
        );

        let results = merge(&[file("src/a.js")], &response).unwrap();
        assert!(results[&file("src/a.js")].is_empty());
    }
}
