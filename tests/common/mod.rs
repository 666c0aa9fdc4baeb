//! Shared fixtures for the integration tests: a scripted analysis service,
//! an in-memory workspace and event helpers.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use bundlesync::bundle::api::{FilePosition, Suggestion, STATUS_COMPLETE, STATUS_FAILED};
use bundlesync::bundle::{
    AnalysisApi, AnalysisRequest, AnalysisResponse, BundleManifest, BundleResponse,
    BundleSyncEngine, ExtendBundleRequest, FiltersResponse, ResponseStatus, SyncConfig,
};
use bundlesync::content::{ContentSource, ContentStore, Workspace};
use bundlesync::core::model::{FileRef, ProjectId};
use bundlesync::notifications::{EventBus, EventFilter, SyncEvent, SyncEventKind};

pub const PROJECT: &str = "demo";
pub const BUNDLE: &str = "bundle-1";

/// Responses handed out in order, then the fallback forever
struct Script<T> {
    queue: VecDeque<T>,
    fallback: T,
}

impl<T: Clone> Script<T> {
    fn new(fallback: T) -> Self {
        Self {
            queue: VecDeque::new(),
            fallback,
        }
    }

    fn next(&mut self) -> T {
        self.queue
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Calls {
    pub creates: Vec<BundleManifest>,
    pub extends: Vec<(String, ExtendBundleRequest)>,
    pub checks: usize,
    pub analyses: Vec<AnalysisRequest>,
}

pub struct MockApi {
    create: Mutex<Script<BundleResponse>>,
    extend: Mutex<Script<BundleResponse>>,
    check: Mutex<Script<BundleResponse>>,
    analysis: Mutex<Script<AnalysisResponse>>,
    calls: Mutex<Calls>,
}

impl MockApi {
    /// Service that accepts every bundle and reports no findings
    pub fn healthy() -> Self {
        Self {
            create: Mutex::new(Script::new(bundle(BUNDLE, &[]))),
            extend: Mutex::new(Script::new(bundle(BUNDLE, &[]))),
            check: Mutex::new(Script::new(bundle(BUNDLE, &[]))),
            analysis: Mutex::new(Script::new(complete_analysis(BTreeMap::new(), BTreeMap::new()))),
            calls: Mutex::new(Calls::default()),
        }
    }

    pub fn push_create(&self, response: BundleResponse) {
        self.create.lock().unwrap().queue.push_back(response);
    }

    pub fn set_create_fallback(&self, response: BundleResponse) {
        self.create.lock().unwrap().fallback = response;
    }

    pub fn push_extend(&self, response: BundleResponse) {
        self.extend.lock().unwrap().queue.push_back(response);
    }

    pub fn set_check_fallback(&self, response: BundleResponse) {
        self.check.lock().unwrap().fallback = response;
    }

    pub fn push_analysis(&self, response: AnalysisResponse) {
        self.analysis.lock().unwrap().queue.push_back(response);
    }

    pub fn set_analysis_fallback(&self, response: AnalysisResponse) {
        self.analysis.lock().unwrap().fallback = response;
    }

    pub fn calls(&self) -> Calls {
        self.calls.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        let calls = self.calls();
        calls.creates.len() + calls.extends.len() + calls.checks + calls.analyses.len()
    }
}

#[async_trait]
impl AnalysisApi for MockApi {
    async fn create_bundle(&self, _org: &str, _request_id: &str, files: &BundleManifest) -> BundleResponse {
        self.calls.lock().unwrap().creates.push(files.clone());
        self.create.lock().unwrap().next()
    }

    async fn extend_bundle(
        &self,
        _org: &str,
        _request_id: &str,
        bundle_id: &str,
        request: &ExtendBundleRequest,
    ) -> BundleResponse {
        self.calls
            .lock()
            .unwrap()
            .extends
            .push((bundle_id.to_string(), request.clone()));
        self.extend.lock().unwrap().next()
    }

    async fn check_bundle(&self, _org: &str, _request_id: &str, _bundle_id: &str) -> BundleResponse {
        self.calls.lock().unwrap().checks += 1;
        self.check.lock().unwrap().next()
    }

    async fn get_analysis(
        &self,
        _org: &str,
        _request_id: &str,
        request: &AnalysisRequest,
    ) -> AnalysisResponse {
        self.calls.lock().unwrap().analyses.push(request.clone());
        self.analysis.lock().unwrap().next()
    }

    async fn get_filters(&self, _token: &str) -> FiltersResponse {
        FiltersResponse {
            extensions: vec![".js".to_string(), ".py".to_string()],
            config_files: vec![".eslintrc.json".to_string()],
            status: ResponseStatus::ok(),
        }
    }
}

pub fn bundle(hash: &str, missing: &[&str]) -> BundleResponse {
    BundleResponse {
        bundle_hash: hash.to_string(),
        missing_files: missing.iter().map(|p| p.to_string()).collect(),
        status: ResponseStatus::ok(),
    }
}

pub fn bundle_failure(code: u16) -> BundleResponse {
    BundleResponse::with_status(ResponseStatus::new(code, "scripted failure"))
}

pub fn complete_analysis(
    files: BTreeMap<String, BTreeMap<String, Vec<FilePosition>>>,
    suggestions: BTreeMap<String, Suggestion>,
) -> AnalysisResponse {
    AnalysisResponse {
        analysis_status: STATUS_COMPLETE.to_string(),
        progress: 1.0,
        analysis_url: "https://example.test/analysis/1".to_string(),
        files: Some(files),
        suggestions: Some(suggestions),
        status: ResponseStatus::ok(),
    }
}

pub fn analysis_in_progress() -> AnalysisResponse {
    AnalysisResponse {
        analysis_status: "ANALYZING".to_string(),
        progress: 0.5,
        status: ResponseStatus::ok(),
        ..AnalysisResponse::default()
    }
}

pub fn failed_analysis() -> AnalysisResponse {
    AnalysisResponse {
        analysis_status: STATUS_FAILED.to_string(),
        status: ResponseStatus::ok(),
        ..AnalysisResponse::default()
    }
}

pub fn analysis_failure(code: u16) -> AnalysisResponse {
    AnalysisResponse::with_status(ResponseStatus::new(code, "scripted failure"))
}

/// One finding at `rows`/`cols` of `path`
pub fn single_finding(path: &str, rows: [i64; 2], cols: [i64; 2], severity: i32) -> AnalysisResponse {
    let mut occurrences = BTreeMap::new();
    occurrences.insert(
        "0".to_string(),
        vec![FilePosition {
            rows: rows.to_vec(),
            cols: cols.to_vec(),
            markers: Vec::new(),
        }],
    );
    let mut files = BTreeMap::new();
    files.insert(path.to_string(), occurrences);

    let mut suggestions = BTreeMap::new();
    suggestions.insert(
        "0".to_string(),
        Suggestion {
            id: "javascript/NoUnusedVar".to_string(),
            rule: "NoUnusedVar".to_string(),
            message: "Unused variable".to_string(),
            severity,
            ..Suggestion::default()
        },
    );
    complete_analysis(files, suggestions)
}

/// Single-project workspace held in memory
pub struct MemoryWorkspace {
    project: ProjectId,
    files: RwLock<BTreeMap<String, String>>,
}

impl MemoryWorkspace {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self {
            project: ProjectId::new(PROJECT),
            files: RwLock::new(
                files
                    .iter()
                    .map(|(path, text)| (path.to_string(), text.to_string()))
                    .collect(),
            ),
        }
    }

    pub fn write(&self, path: &str, text: &str) {
        self.files
            .write()
            .unwrap()
            .insert(path.to_string(), text.to_string());
    }

    pub fn delete(&self, path: &str) {
        self.files.write().unwrap().remove(path);
    }
}

impl ContentSource for MemoryWorkspace {
    fn read_content(&self, file: &FileRef) -> io::Result<String> {
        self.files
            .read()
            .unwrap()
            .get(file.path())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, file.to_string()))
    }
}

impl Workspace for MemoryWorkspace {
    fn project_files(&self, project: &ProjectId) -> Vec<FileRef> {
        if project != &self.project {
            return Vec::new();
        }
        self.files
            .read()
            .unwrap()
            .keys()
            .map(|path| FileRef::new(project.clone(), path))
            .collect()
    }

    fn file_size(&self, file: &FileRef) -> u64 {
        self.files
            .read()
            .unwrap()
            .get(file.path())
            .map_or(0, |text| text.len() as u64)
    }

    fn resolve_bundle_path(&self, project: &ProjectId, bundle_path: &str) -> Option<FileRef> {
        let file = FileRef::new(project.clone(), bundle_path);
        self.files
            .read()
            .unwrap()
            .contains_key(file.path())
            .then_some(file)
    }
}

pub struct Harness {
    pub api: Arc<MockApi>,
    pub workspace: Arc<MemoryWorkspace>,
    pub content: Arc<ContentStore>,
    pub events: Arc<EventBus>,
    pub engine: Arc<BundleSyncEngine>,
    pub project: ProjectId,
}

impl Harness {
    pub fn new(files: &[(&str, &str)], config: SyncConfig) -> Self {
        let api = Arc::new(MockApi::healthy());
        let workspace = Arc::new(MemoryWorkspace::new(files));
        let source: Arc<dyn ContentSource> = workspace.clone();
        let tracked: Arc<dyn Workspace> = workspace.clone();
        let content = Arc::new(ContentStore::new(source));
        let events = Arc::new(EventBus::new());
        let engine = Arc::new(BundleSyncEngine::new(
            config,
            api.clone(),
            tracked,
            content.clone(),
            events.clone(),
        ));
        Self {
            api,
            workspace,
            content,
            events,
            engine,
            project: ProjectId::new(PROJECT),
        }
    }

    pub fn file(&self, path: &str) -> FileRef {
        FileRef::new(self.project.clone(), path)
    }

    pub fn files(&self, paths: &[&str]) -> Vec<FileRef> {
        paths.iter().map(|path| self.file(path)).collect()
    }

    pub fn subscribe(&self, name: &str) -> UnboundedReceiver<SyncEvent> {
        self.events.subscribe(name, EventFilter::All, "tests")
    }
}

/// Short delays so polling tests run quickly under paused time
pub fn test_config() -> SyncConfig {
    SyncConfig {
        poll_delay: Duration::from_millis(10),
        analysis_timeout: Duration::from_secs(5),
        ..SyncConfig::default()
    }
}

/// Every event received so far
pub fn drain(events: &mut UnboundedReceiver<SyncEvent>) -> Vec<SyncEventKind> {
    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.kind);
    }
    kinds
}

pub fn count_warnings(events: &[SyncEventKind], key: bundlesync::notifications::WarningKey) -> usize {
    events
        .iter()
        .filter(|kind| matches!(kind, SyncEventKind::Warning { key: k, .. } if *k == key))
        .count()
}
