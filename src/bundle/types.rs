//! Cached analysis findings

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info = 1,
    Warning = 2,
    Error = 3,
}

impl Severity {
    /// Map the service's numeric severity; anything outside 1..=3 is rejected
    pub fn from_level(value: i32) -> Option<Self> {
        match value {
            1 => Some(Severity::Info),
            2 => Some(Severity::Warning),
            3 => Some(Severity::Error),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Resolved source range; offsets are 0-based, `end` exclusive
///
/// Rows are the 1-based rows reported by the service, columns are 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
    pub start_row: usize,
    pub end_row: usize,
    pub start_col: usize,
    pub end_col: usize,
    pub markers: Vec<MarkerRange>,
    /// Bundle path of the file this range belongs to
    pub file: String,
}

/// Part of a finding's message pointing at further source locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerRange {
    /// Character range within the message text, end exclusive
    pub message_start: usize,
    pub message_end: usize,
    pub positions: Vec<TextRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExampleLine {
    pub line: String,
    pub line_number: u32,
    pub line_change: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleCommitFix {
    #[serde(rename = "commitURL")]
    pub commit_url: String,
    pub lines: Vec<ExampleLine>,
}

/// One finding as cached for one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionEntry {
    pub id: String,
    pub rule: String,
    pub message: String,
    pub title: String,
    pub text: String,
    pub severity: Severity,
    pub repo_dataset_size: u32,
    pub example_commit_descriptions: Vec<String>,
    pub example_commit_fixes: Vec<ExampleCommitFix>,
    pub ranges: Vec<TextRange>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub cwe: Vec<String>,
    pub lead_url: String,
}

/// Distinct finding counts by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SeveritySummary {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl SeveritySummary {
    /// Count each finding id once, whatever number of files it occurs in
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a SuggestionEntry>) -> Self {
        let mut seen = HashSet::new();
        let mut summary = SeveritySummary::default();
        for entry in entries {
            if !seen.insert(entry.id.as_str()) {
                continue;
            }
            match entry.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.infos += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.infos
    }
}
