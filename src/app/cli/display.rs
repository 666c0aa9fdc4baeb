//! Rendering of cached findings for the terminal

use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::bundle::{BundleSyncEngine, Severity, SeveritySummary, SuggestionEntry};
use crate::core::model::ProjectId;

#[derive(Debug, Clone, Serialize)]
pub struct FileFindings {
    pub path: String,
    pub suggestions: Vec<SuggestionEntry>,
}

/// Everything shown for one analysed project
#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    pub project: String,
    /// RFC 3339 time the report was taken
    pub generated_at: String,
    pub analysis_url: String,
    pub files: Vec<FileFindings>,
    pub summary: SeveritySummary,
}

impl ProjectReport {
    /// Snapshot of the engine's cache for `project`, files sorted by path
    pub fn collect(engine: &BundleSyncEngine, project: &ProjectId) -> Self {
        let files = engine.files_with_suggestions(project);
        let analysis = engine.get_analysis(&files);

        let mut findings: Vec<FileFindings> = analysis
            .into_iter()
            .filter(|(_, suggestions)| !suggestions.is_empty())
            .map(|(file, mut suggestions)| {
                suggestions.sort_by_key(|s| {
                    (
                        std::cmp::Reverse(s.severity),
                        s.ranges.first().map(|r| r.start).unwrap_or(0),
                    )
                });
                FileFindings {
                    path: file.path().to_string(),
                    suggestions,
                }
            })
            .collect();
        findings.sort_by(|a, b| a.path.cmp(&b.path));

        Self {
            project: project.name().to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            analysis_url: engine.analysis_url(project),
            summary: engine.severity_summary(&files),
            files: findings,
        }
    }
}

fn severity_label(severity: Severity, color: bool) -> String {
    let label = format!("{:<7}", severity.to_string());
    if !color {
        return label;
    }
    match severity {
        Severity::Error => label.red().bold().to_string(),
        Severity::Warning => label.yellow().to_string(),
        Severity::Info => label.blue().to_string(),
    }
}

fn position(suggestion: &SuggestionEntry) -> String {
    match suggestion.ranges.first() {
        Some(range) => format!("{}:{}", range.start_row, range.start_col + 1),
        None => "-".to_string(),
    }
}

pub fn render_text(report: &ProjectReport, out: &mut dyn Write, color: bool) -> std::io::Result<()> {
    for file in &report.files {
        if color {
            writeln!(out, "{}", file.path.bold())?;
        } else {
            writeln!(out, "{}", file.path)?;
        }
        for suggestion in &file.suggestions {
            writeln!(
                out,
                "  {} {:<8} {} {}",
                severity_label(suggestion.severity, color),
                position(suggestion),
                suggestion.rule,
                suggestion.message
            )?;
        }
    }

    let summary = &report.summary;
    let line = format!(
        "{}: {} errors, {} warnings, {} infos",
        report.project, summary.errors, summary.warnings, summary.infos
    );
    if report.files.is_empty() {
        writeln!(out, "{}: no findings", report.project)?;
    } else if color {
        writeln!(out, "{}", line.bold())?;
    } else {
        writeln!(out, "{}", line)?;
    }
    if !report.analysis_url.is_empty() {
        writeln!(out, "Details: {}", report.analysis_url)?;
    }
    Ok(())
}

pub fn render_json(report: &ProjectReport, out: &mut dyn Write) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::TextRange;

    fn suggestion(id: &str, severity: Severity, row: usize) -> SuggestionEntry {
        SuggestionEntry {
            id: id.to_string(),
            rule: format!("Rule{}", id),
            message: "Avoid this".to_string(),
            title: String::new(),
            text: String::new(),
            severity,
            repo_dataset_size: 0,
            example_commit_descriptions: Vec::new(),
            example_commit_fixes: Vec::new(),
            ranges: vec![TextRange {
                start: row * 10,
                end: row * 10 + 3,
                start_row: row,
                end_row: row,
                start_col: 4,
                end_col: 7,
                markers: Vec::new(),
                file: "/src/app.js".to_string(),
            }],
            categories: Vec::new(),
            tags: Vec::new(),
            cwe: Vec::new(),
            lead_url: String::new(),
        }
    }

    fn report() -> ProjectReport {
        ProjectReport {
            project: "demo".to_string(),
            generated_at: "2026-01-01T00:00:00+00:00".to_string(),
            analysis_url: "https://example.test/analysis/1".to_string(),
            files: vec![FileFindings {
                path: "src/app.js".to_string(),
                suggestions: vec![
                    suggestion("a", Severity::Error, 3),
                    suggestion("b", Severity::Info, 9),
                ],
            }],
            summary: SeveritySummary {
                errors: 1,
                warnings: 0,
                infos: 1,
            },
        }
    }

    #[test]
    fn test_plain_text_output() {
        let mut out = Vec::new();
        render_text(&report(), &mut out, false).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "src/app.js");
        assert!(lines[1].contains("error"));
        assert!(lines[1].contains("3:5"));
        assert!(lines[1].contains("Rulea Avoid this"));
        assert!(lines[2].contains("info"));
        assert_eq!(lines[3], "demo: 1 errors, 0 warnings, 1 infos");
        assert_eq!(lines[4], "Details: https://example.test/analysis/1");
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn test_empty_report() {
        let mut empty = report();
        empty.files.clear();
        empty.summary = SeveritySummary::default();
        empty.analysis_url.clear();

        let mut out = Vec::new();
        render_text(&empty, &mut out, false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "demo: no findings\n");
    }

    #[test]
    fn test_json_output() {
        let mut out = Vec::new();
        render_json(&report(), &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["project"], "demo");
        assert_eq!(value["generated_at"], "2026-01-01T00:00:00+00:00");
        assert_eq!(value["summary"]["errors"], 1);
        assert_eq!(value["files"][0]["path"], "src/app.js");
        assert_eq!(value["files"][0]["suggestions"][0]["severity"], "error");
        assert_eq!(value["files"][0]["suggestions"][1]["ranges"][0]["start_row"], 9);
    }
}
