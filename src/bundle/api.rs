//! Remote analysis service contract
//!
//! Every operation is infallible at the type level: transport failures come
//! back as a response whose status code is `0`, so retry policy lives in one
//! place (the sync engine) and works from status codes alone.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bundle::types::ExampleCommitFix;

pub const STATUS_COMPLETE: &str = "COMPLETE";
pub const STATUS_FAILED: &str = "FAILED";

/// HTTP-like outcome attached to every response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseStatus {
    pub code: u16,
    pub description: String,
}

impl ResponseStatus {
    pub fn new(code: u16, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    /// No response received at all
    pub fn transport_failure(detail: impl std::fmt::Display) -> Self {
        Self::new(
            0,
            format!("Connection to the analysis service failed: {}", detail),
        )
    }

    pub fn is_success(&self) -> bool {
        self.code == 200
    }
}

/// Bundle path → content hash
pub type BundleManifest = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHashContent {
    pub hash: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BundleFiles {
    Hashes(BundleManifest),
    Contents(BTreeMap<String, FileHashContent>),
}

impl BundleFiles {
    pub fn len(&self) -> usize {
        match self {
            BundleFiles::Hashes(files) => files.len(),
            BundleFiles::Contents(files) => files.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendBundleRequest {
    pub files: BundleFiles,
    pub removed_files: Vec<String>,
}

/// Answer to create, extend and check calls
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleResponse {
    #[serde(default)]
    pub bundle_hash: String,
    #[serde(default)]
    pub missing_files: Vec<String>,
    #[serde(skip)]
    pub status: ResponseStatus,
}

impl BundleResponse {
    pub fn with_status(status: ResponseStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub bundle_id: String,
    pub min_severity: u8,
    pub limit_to_files: Vec<String>,
    pub shard: String,
    pub ide_product_name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub rows: Vec<i64>,
    #[serde(default)]
    pub cols: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Marker {
    #[serde(default)]
    pub msg: Vec<i64>,
    #[serde(default)]
    pub pos: Vec<Position>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilePosition {
    #[serde(default)]
    pub rows: Vec<i64>,
    #[serde(default)]
    pub cols: Vec<i64>,
    #[serde(default)]
    pub markers: Vec<Marker>,
}

impl FilePosition {
    pub fn position(&self) -> Position {
        Position {
            rows: self.rows.clone(),
            cols: self.cols.clone(),
            file: None,
        }
    }
}

/// Finding metadata shared by every file it occurs in
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Suggestion {
    pub id: String,
    pub rule: String,
    pub message: String,
    pub title: String,
    pub text: String,
    pub severity: i32,
    pub repo_dataset_size: u32,
    pub example_commit_descriptions: Vec<String>,
    pub example_commit_fixes: Vec<ExampleCommitFix>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub cwe: Vec<String>,
    #[serde(rename = "leadURL")]
    pub lead_url: String,
}

/// Bundle path → suggestion id → occurrences
pub type FilesMap = BTreeMap<String, BTreeMap<String, Vec<FilePosition>>>;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AnalysisResponse {
    #[serde(rename = "status", default)]
    pub analysis_status: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(rename = "analysisURL", default)]
    pub analysis_url: String,
    #[serde(default)]
    pub files: Option<FilesMap>,
    #[serde(default)]
    pub suggestions: Option<BTreeMap<String, Suggestion>>,
    #[serde(skip)]
    pub status: ResponseStatus,
}

impl AnalysisResponse {
    pub fn with_status(status: ResponseStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.analysis_status.eq_ignore_ascii_case(STATUS_COMPLETE)
    }

    pub fn is_failed(&self) -> bool {
        self.analysis_status.eq_ignore_ascii_case(STATUS_FAILED)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiltersResponse {
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub config_files: Vec<String>,
    #[serde(skip)]
    pub status: ResponseStatus,
}

/// Operations consumed from the analysis service
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    async fn create_bundle(
        &self,
        org: &str,
        request_id: &str,
        files: &BundleManifest,
    ) -> BundleResponse;

    async fn extend_bundle(
        &self,
        org: &str,
        request_id: &str,
        bundle_id: &str,
        request: &ExtendBundleRequest,
    ) -> BundleResponse;

    async fn check_bundle(&self, org: &str, request_id: &str, bundle_id: &str) -> BundleResponse;

    async fn get_analysis(
        &self,
        org: &str,
        request_id: &str,
        request: &AnalysisRequest,
    ) -> AnalysisResponse;

    async fn get_filters(&self, token: &str) -> FiltersResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_request_serialisation() {
        let mut files = BTreeMap::new();
        files.insert(
            "/a.js".to_string(),
            FileHashContent {
                hash: "abc".to_string(),
                content: "x".to_string(),
            },
        );
        let request = ExtendBundleRequest {
            files: BundleFiles::Contents(files),
            removed_files: vec!["/old.js".to_string()],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["files"]["/a.js"]["hash"], "abc");
        assert_eq!(json["removedFiles"][0], "/old.js");
    }

    #[test]
    fn test_analysis_response_parsing() {
        let body = r#"{
            "status": "complete",
            "progress": 1.0,
            "analysisURL": "https://example.test/a/1",
            "files": {"/a.js": {"0": [{"rows": [1, 1], "cols": [1, 4], "markers": []}]}},
            "suggestions": {"0": {"id": "js/NoVar", "rule": "NoVar", "message": "m",
                                   "severity": 2, "leadURL": "", "cwe": ["CWE-1"]}}
        }"#;

        let response: AnalysisResponse = serde_json::from_str(body).unwrap();

        assert!(response.is_complete());
        assert!(!response.is_failed());
        assert_eq!(response.analysis_url, "https://example.test/a/1");
        let files = response.files.unwrap();
        assert_eq!(files["/a.js"]["0"][0].cols, vec![1, 4]);
        assert_eq!(response.suggestions.unwrap()["0"].cwe, vec!["CWE-1"]);
    }

    #[test]
    fn test_missing_maps_stay_none() {
        let response: AnalysisResponse =
            serde_json::from_str(r#"{"status": "ANALYZING", "progress": 0.3}"#).unwrap();

        assert!(response.files.is_none());
        assert!(response.suggestions.is_none());
        assert!(!response.is_complete());
    }

    #[test]
    fn test_bundle_response_defaults() {
        let response: BundleResponse = serde_json::from_str(r#"{"bundleHash": "b1"}"#).unwrap();
        assert_eq!(response.bundle_hash, "b1");
        assert!(response.missing_files.is_empty());
    }
}
