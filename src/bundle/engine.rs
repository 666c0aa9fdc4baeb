//! Bundle synchronisation protocol
//!
//! One [`BundleSyncEngine::sync`] call runs a full cycle for a project:
//! create or extend the remote bundle with content hashes, upload the content
//! the service is missing, poll for the analysis and publish the merged
//! findings. Remote failures are classified from status codes and retried
//! with attempt counters; they reach callers only as a [`SyncOutcome`] and
//! as deduplicated warning events.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::bundle::api::{
    AnalysisApi, AnalysisRequest, AnalysisResponse, BundleFiles, BundleManifest, BundleResponse,
    ExtendBundleRequest, FileHashContent, ResponseStatus,
};
use crate::bundle::cache::SuggestionCache;
use crate::bundle::config::SyncConfig;
use crate::bundle::error::{ApiFailure, SyncError, SyncResult};
use crate::bundle::merge::{MergedResults, ResultMerger};
use crate::bundle::state::{normalise_bundle_id, BundleRegistry};
use crate::bundle::types::{SeveritySummary, SuggestionEntry};
use crate::bundle::warnings::WarningLedger;
use crate::content::{hash_text, ContentStore, StoreError, Workspace};
use crate::core::cancellation::ProgressHandle;
use crate::core::critical_section::CriticalSection;
use crate::core::model::{FileRef, ProjectId};
use crate::notifications::{EventBus, SyncEvent, SyncEventKind, WarningKey};

const UPDATE_WAIT_DELAY: Duration = Duration::from_millis(200);

const BUNDLE_FAILED_MESSAGE: &str =
    "Operations with bundle failed. Please try again later or contact support";
const UPLOAD_FAILED_MESSAGE: &str = "Failed to upload files. Please try again later or contact support";
const ANALYSIS_FAILED_MESSAGE: &str =
    "Failed to get analysis results. Please try again later or contact support";

/// What one sync cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Every candidate was already analysed and nothing was pending removal
    NothingToDo,
    /// Results for `analysed` files were published
    Updated { analysed: usize },
    /// The cycle stopped without publishing results
    Aborted(AbortReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Unauthenticated,
    RetriesExhausted,
    UploadIncomplete,
    NoBundle,
    AnalysisIncomplete,
    AnalysisFailed,
    MalformedResponse,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AbortReason::Unauthenticated => "authentication required",
            AbortReason::RetriesExhausted => "bundle operations failed",
            AbortReason::UploadIncomplete => "files could not be uploaded",
            AbortReason::NoBundle => "no bundle available",
            AbortReason::AnalysisIncomplete => "analysis did not complete",
            AbortReason::AnalysisFailed => "analysis failed on the server",
            AbortReason::MalformedResponse => "analysis response could not be parsed",
        };
        write!(f, "{}", text)
    }
}

/// Result of one create, upload, poll and merge attempt
enum Retrieval {
    Results(MergedResults),
    Expired,
    Aborted(AbortReason),
}

enum PollResult {
    Complete(AnalysisResponse),
    Incomplete,
    Failed,
    Unauthenticated,
}

/// Identifiers shared by every call of one sync cycle
struct Cycle<'a> {
    project: &'a ProjectId,
    request_id: String,
    progress: &'a ProgressHandle,
}

/// Candidates in request order without duplicates
fn distinct(files: &[FileRef]) -> Vec<FileRef> {
    let mut seen = HashSet::new();
    files
        .iter()
        .filter(|file| seen.insert(*file))
        .cloned()
        .collect()
}

pub struct BundleSyncEngine {
    config: SyncConfig,
    api: Arc<dyn AnalysisApi>,
    workspace: Arc<dyn Workspace>,
    content: Arc<ContentStore>,
    suggestions: SuggestionCache,
    bundles: BundleRegistry,
    warnings: WarningLedger,
    critical: CriticalSection,
    events: Arc<EventBus>,
}

impl BundleSyncEngine {
    pub fn new(
        config: SyncConfig,
        api: Arc<dyn AnalysisApi>,
        workspace: Arc<dyn Workspace>,
        content: Arc<ContentStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            api,
            workspace,
            content,
            suggestions: SuggestionCache::new(),
            bundles: BundleRegistry::new(),
            warnings: WarningLedger::new(),
            critical: CriticalSection::new(),
            events,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn content(&self) -> &Arc<ContentStore> {
        &self.content
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Bring the cached findings of `candidates` up to date
    ///
    /// Files already in the cache are not re-analysed; files removed since the
    /// last cycle are dropped from the remote bundle unless they are candidates
    /// again. A refresh is requested whatever the outcome.
    pub async fn sync(
        &self,
        project: &ProjectId,
        candidates: &[FileRef],
        progress: &ProgressHandle,
    ) -> SyncResult<SyncOutcome> {
        let candidate_set: HashSet<&FileRef> = candidates.iter().collect();
        let mut to_remove: Vec<FileRef> = self
            .bundles
            .take_removed(project)
            .into_iter()
            .filter(|file| !candidate_set.contains(file))
            .collect();
        to_remove.sort_by(|a, b| a.path().cmp(b.path()));

        if candidates.is_empty() && to_remove.is_empty() {
            log::warn!("Sync requested for empty list of files in {}", project);
            return Ok(SyncOutcome::NothingToDo);
        }

        let guard = self.critical.enter(&format!("sync {}", project)).await;
        self.bundles.set_update_in_progress(project, true);

        let result = self.sync_locked(project, candidates, to_remove, progress).await;

        self.bundles.set_update_in_progress(project, false);
        drop(guard);
        self.events
            .emit(SyncEvent::new(project.clone(), SyncEventKind::RefreshRequested));

        match &result {
            Ok(outcome) => log::info!("Sync of {} finished: {:?}", project, outcome),
            Err(e) => log::warn!("Sync of {} stopped: {}", project, e),
        }
        result
    }

    async fn sync_locked(
        &self,
        project: &ProjectId,
        candidates: &[FileRef],
        to_remove: Vec<FileRef>,
        progress: &ProgressHandle,
    ) -> SyncResult<SyncOutcome> {
        let mut files: Vec<FileRef> = distinct(candidates)
            .into_iter()
            .filter(|file| !self.suggestions.contains(file))
            .collect();
        let mut removals = to_remove;

        if files.is_empty() && removals.is_empty() {
            log::debug!("All {} requested files of {} are cached", candidates.len(), project);
            return Ok(SyncOutcome::NothingToDo);
        }

        let cycle = Cycle {
            project,
            request_id: uuid::Uuid::new_v4().to_string(),
            progress,
        };
        let mut retries = 0;
        loop {
            match self.retrieve_suggestions(&cycle, &files, &removals).await? {
                Retrieval::Results(results) => {
                    let analysed = results.len();
                    self.suggestions.publish(results);
                    return Ok(SyncOutcome::Updated { analysed });
                }
                Retrieval::Aborted(reason) => return Ok(SyncOutcome::Aborted(reason)),
                Retrieval::Expired if retries < self.config.bundle_retries => {
                    retries += 1;
                    log::warn!(
                        "Bundle of {} expired or failed, recreating from scratch (retry {} of {})",
                        project,
                        retries,
                        self.config.bundle_retries
                    );
                    self.remove_project_locked(project)?;
                    files = distinct(candidates);
                    removals.clear();
                }
                Retrieval::Expired => {
                    self.warn_once(project, WarningKey::BundleOperationsFailed, BUNDLE_FAILED_MESSAGE);
                    return Ok(SyncOutcome::Aborted(AbortReason::RetriesExhausted));
                }
            }
        }
    }

    async fn retrieve_suggestions(
        &self,
        cycle: &Cycle<'_>,
        files: &[FileRef],
        removals: &[FileRef],
    ) -> SyncResult<Retrieval> {
        let project = cycle.project;
        let started = Instant::now();

        let (files, missing) = match self.create_bundle_step(cycle, files, removals).await {
            Ok(step) => step,
            Err(SyncError::Api(ApiFailure::Unauthenticated { .. })) => {
                return Ok(Retrieval::Aborted(AbortReason::Unauthenticated))
            }
            Err(SyncError::Api(_)) => {
                self.bundles.set_bundle_id(project, "");
                return Ok(Retrieval::Expired);
            }
            Err(e) => return Err(e),
        };
        log::info!("--- Create/Extend Bundle took: {:?}", started.elapsed());

        if files.is_empty() {
            log::info!("No files to analyse for {}", project);
            return Ok(Retrieval::Results(MergedResults::new()));
        }

        let started = Instant::now();
        match self.upload_files_step(cycle, &files, missing).await {
            Ok(true) => {}
            Ok(false) => return Ok(Retrieval::Aborted(AbortReason::UploadIncomplete)),
            Err(SyncError::Api(ApiFailure::BundleExpired { .. })) => return Ok(Retrieval::Expired),
            Err(e) => return Err(e),
        }
        log::info!("--- Upload Files took: {:?}", started.elapsed());

        let bundle_id = self.bundles.bundle_id(project);
        if bundle_id.is_empty() {
            log::info!("No bundle available for {}, analysis not requested", project);
            return Ok(Retrieval::Aborted(AbortReason::NoBundle));
        }

        let started = Instant::now();
        let response = match self.poll_analysis(cycle, &bundle_id, &files).await? {
            PollResult::Complete(response) => response,
            PollResult::Incomplete => return Ok(Retrieval::Aborted(AbortReason::AnalysisIncomplete)),
            PollResult::Failed => return Ok(Retrieval::Aborted(AbortReason::AnalysisFailed)),
            PollResult::Unauthenticated => {
                return Ok(Retrieval::Aborted(AbortReason::Unauthenticated))
            }
        };
        log::info!("--- Get Analysis took: {:?}", started.elapsed());

        cycle.progress.check_cancelled()?;
        self.bundles.set_analysis_url(project, response.analysis_url.clone());
        let started = Instant::now();
        let merged = ResultMerger::new(project, &self.content, self.workspace.as_ref())
            .merge(&files, &response);
        log::info!("--- Parsing Analysis took: {:?}", started.elapsed());

        match merged {
            Ok(results) => Ok(Retrieval::Results(results)),
            Err(e) => {
                log::warn!("Analysis results of {} discarded: {}", project, e);
                Ok(Retrieval::Aborted(AbortReason::MalformedResponse))
            }
        }
    }

    /// Send content hashes in manifests bounded by the bundle budget
    ///
    /// Returns the files that made it into the bundle and the paths the
    /// service still needs content for. Files that cannot be read are left
    /// out of this cycle and stay uncached.
    async fn create_bundle_step(
        &self,
        cycle: &Cycle<'_>,
        files: &[FileRef],
        removals: &[FileRef],
    ) -> SyncResult<(Vec<FileRef>, Vec<String>)> {
        let progress = cycle.progress;
        progress.set_text("Preparing files for upload...");
        progress.check_cancelled()?;

        let total = files.len().max(1);
        let mut bundled = Vec::with_capacity(files.len());
        let mut manifest = BundleManifest::new();
        let mut size = 0usize;
        for (i, file) in files.iter().enumerate() {
            self.content.invalidate(file)?;
            progress.check_cancelled()?;
            progress.set_fraction(i as f64 / total as f64);
            progress.set_text(format!("Calculating hash for: {}", file.path()));

            let hash = match self.content.get_hash(file) {
                Ok(hash) => hash,
                Err(e @ StoreError::Read { .. }) => {
                    log::warn!("Skipping {}: {}", file, e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let path = file.bundle_path();
            size += (path.len() + hash.len()) * 2;
            manifest.insert(path, hash);
            bundled.push(file.clone());

            if size > self.config.max_bundle_size {
                log::info!("Bundle manifest size exceeds budget, flushing {} entries", manifest.len());
                self.make_new_bundle(cycle, &manifest, &[]).await?;
                size = 0;
                manifest.clear();
            }
        }

        if bundled.is_empty() && removals.is_empty() {
            log::info!("No readable files to send for {}", cycle.project);
            return Ok((bundled, Vec::new()));
        }
        let response = self.make_new_bundle(cycle, &manifest, removals).await?;
        Ok((bundled, response.missing_files))
    }

    async fn make_new_bundle(
        &self,
        cycle: &Cycle<'_>,
        manifest: &BundleManifest,
        removals: &[FileRef],
    ) -> SyncResult<BundleResponse> {
        let project = cycle.project;
        let parent = self.bundles.bundle_id(project);
        let removed_files: Vec<String> = removals.iter().map(FileRef::bundle_path).collect();

        let (response, context) = if parent.is_empty() {
            log::info!("Creating new bundle with {} files", manifest.len());
            let response = self
                .api
                .create_bundle(&self.config.org, &cycle.request_id, manifest)
                .await;
            (response, "Bad Create Bundle request: ")
        } else {
            if manifest.is_empty() && !removals.is_empty() {
                let cached = self.suggestions.files(project);
                let removed: HashSet<&FileRef> = removals.iter().collect();
                if !cached.is_empty() && cached.iter().all(|file| removed.contains(file)) {
                    log::warn!(
                        "Extending bundle {} of {} removes every cached file",
                        parent,
                        project
                    );
                }
            }
            log::info!(
                "Extending existing bundle [{}] with {} files and removing {} files",
                parent,
                manifest.len(),
                removed_files.len()
            );
            let request = ExtendBundleRequest {
                files: BundleFiles::Hashes(manifest.clone()),
                removed_files,
            };
            let response = self
                .api
                .extend_bundle(&self.config.org, &cycle.request_id, &parent, &request)
                .await;
            (response, "Bad Extend Bundle request: ")
        };

        self.check_api_call(project, &response.status, context)?;
        let bundle_id = normalise_bundle_id(&response.bundle_hash);
        log::debug!("Bundle of {} is now [{}]", project, bundle_id);
        self.bundles.set_bundle_id(project, bundle_id);
        Ok(response)
    }

    /// Upload missing content until the service reports nothing missing
    ///
    /// An expired bundle propagates; other failures retry with the same list.
    async fn upload_files_step(
        &self,
        cycle: &Cycle<'_>,
        files: &[FileRef],
        missing: Vec<String>,
    ) -> SyncResult<bool> {
        let project = cycle.project;
        let bundle_id = self.bundles.bundle_id(project);
        if bundle_id.is_empty() {
            log::info!("Bundle id is empty, nothing to upload for {}", project);
            return Ok(missing.is_empty());
        }
        if missing.is_empty() {
            log::info!("No missing files to upload for {}", project);
            return Ok(true);
        }

        let mut missing = missing;
        let mut attempts = 0;
        while !missing.is_empty() && attempts < self.config.upload_attempts {
            if attempts > 0 {
                log::warn!(
                    "Check Bundle found {} missing files (attempt {})",
                    missing.len(),
                    attempts
                );
            }
            let step = match self.upload_files(cycle, files, &missing, &bundle_id).await {
                Ok(()) => self.check_bundle(cycle, &bundle_id).await,
                Err(e) => Err(e),
            };
            match step {
                Ok(still_missing) => missing = still_missing,
                Err(SyncError::Api(ApiFailure::Unauthenticated { .. })) => break,
                Err(SyncError::Api(ApiFailure::Generic { .. })) => {}
                Err(e) => return Err(e),
            }
            attempts += 1;
        }

        if !missing.is_empty() && attempts >= self.config.upload_attempts {
            self.warn_once(project, WarningKey::UploadFailed, UPLOAD_FAILED_MESSAGE);
        }
        Ok(missing.is_empty())
    }

    async fn upload_files(
        &self,
        cycle: &Cycle<'_>,
        files: &[FileRef],
        missing: &[String],
        bundle_id: &str,
    ) -> SyncResult<()> {
        let progress = cycle.progress;
        let by_path: HashMap<String, &FileRef> =
            files.iter().map(|file| (file.bundle_path(), file)).collect();

        let total = missing.len().max(1);
        let mut chunk: Vec<&FileRef> = Vec::new();
        let mut chunk_size = 0usize;
        let mut broken = Vec::new();
        for (i, path) in missing.iter().enumerate() {
            progress.check_cancelled()?;
            progress.set_fraction(i as f64 / total as f64);
            progress.set_text(format!("Uploading: {}", path));

            let Some(file) = by_path.get(path) else {
                broken.push(path.as_str());
                continue;
            };
            let size = self.content.get_content(file)?.len();
            if chunk_size + size > self.config.max_bundle_size && !chunk.is_empty() {
                log::info!("Files-chunk size: {}", chunk_size);
                self.do_upload_files(cycle, &chunk, bundle_id).await?;
                chunk_size = 0;
                chunk.clear();
            }
            chunk_size += size;
            chunk.push(*file);
        }

        if !broken.is_empty() {
            log::warn!(
                "{} missing paths have no matching file, first: {}",
                broken.len(),
                broken[0]
            );
        }
        log::info!("Last files-chunk size: {}", chunk_size);
        self.do_upload_files(cycle, &chunk, bundle_id).await
    }

    async fn do_upload_files(
        &self,
        cycle: &Cycle<'_>,
        files: &[&FileRef],
        bundle_id: &str,
    ) -> SyncResult<()> {
        if files.is_empty() {
            return Ok(());
        }

        let mut contents = std::collections::BTreeMap::new();
        for file in files {
            let content = self.content.get_content(file)?;
            let hash = self.content.get_hash(file)?;
            contents.insert(
                file.bundle_path(),
                FileHashContent {
                    hash,
                    content: content.to_string(),
                },
            );
        }
        let request = ExtendBundleRequest {
            files: BundleFiles::Contents(contents),
            removed_files: Vec::new(),
        };

        let response = self
            .api
            .extend_bundle(&self.config.org, &cycle.request_id, bundle_id, &request)
            .await;
        self.check_api_call(cycle.project, &response.status, "Bad Upload Files request: ")?;
        Ok(())
    }

    async fn check_bundle(&self, cycle: &Cycle<'_>, bundle_id: &str) -> SyncResult<Vec<String>> {
        let response = self
            .api
            .check_bundle(&self.config.org, &cycle.request_id, bundle_id)
            .await;
        self.check_api_call(cycle.project, &response.status, "Bad Check Bundle request: ")?;
        Ok(response.missing_files)
    }

    async fn poll_analysis(
        &self,
        cycle: &Cycle<'_>,
        bundle_id: &str,
        files: &[FileRef],
    ) -> SyncResult<PollResult> {
        let project = cycle.project;
        let progress = cycle.progress;
        progress.set_text("Waiting for analysis from server...");

        let request = AnalysisRequest {
            bundle_id: bundle_id.to_string(),
            min_severity: self.config.min_severity,
            limit_to_files: files.iter().map(FileRef::bundle_path).collect(),
            shard: hash_text(&self.workspace.project_name(project)),
            ide_product_name: self.config.ide_product_name.clone(),
        };
        let expected_attempts = self.config.expected_poll_attempts();
        let deadline = Instant::now() + self.config.analysis_timeout;

        let mut attempt: u64 = 0;
        let mut consecutive_failures = 0;
        loop {
            if attempt > 0 {
                progress.delay(self.config.poll_delay).await?;
            }
            let response = self
                .api
                .get_analysis(&self.config.org, &cycle.request_id, &request)
                .await;
            progress.check_cancelled()?;
            log::debug!(
                "Analysis of {} status {} progress {}",
                project,
                response.analysis_status,
                response.progress
            );

            match self.check_api_call(project, &response.status, "Bad Get Analysis request: ") {
                Ok(()) => consecutive_failures = 0,
                Err(ApiFailure::Unauthenticated { .. }) => return Ok(PollResult::Unauthenticated),
                Err(_) if consecutive_failures >= self.config.poll_failure_tolerance => {
                    self.warn_once(project, WarningKey::AnalysisFailed, ANALYSIS_FAILED_MESSAGE);
                    return Ok(PollResult::Incomplete);
                }
                Err(_) => consecutive_failures += 1,
            }

            let mut fraction = response.progress;
            if fraction <= 0.0 || fraction > 1.0 {
                fraction = attempt as f64 / expected_attempts as f64;
            }
            progress.set_fraction(fraction);
            progress.set_text(format!(
                "Waiting for analysis from server: {:.0}% done",
                fraction * 100.0
            ));

            if Instant::now() >= deadline {
                let message = format!(
                    "Can't get analysis results from the server. Timeout of {} sec. is reached. \
                     Please, increase timeout or try again later.",
                    self.config.analysis_timeout.as_secs()
                );
                self.warn_once(project, WarningKey::AnalysisTimeout, &message);
                return Ok(if response.is_complete() {
                    PollResult::Complete(response)
                } else {
                    PollResult::Incomplete
                });
            }

            if response.is_failed() {
                log::warn!("Analysis of {} FAILED on the server, requesting full rescan", project);
                self.events
                    .emit(SyncEvent::new(project.clone(), SyncEventKind::FullRescanRequested));
                return Ok(PollResult::Failed);
            }
            if response.is_complete() {
                return Ok(PollResult::Complete(response));
            }
            attempt += 1;
        }
    }

    /// Classify a response status, updating warning and login state
    fn check_api_call(
        &self,
        project: &ProjectId,
        status: &ResponseStatus,
        context: &str,
    ) -> Result<(), ApiFailure> {
        match ApiFailure::classify(status) {
            Ok(()) => {
                self.warnings.clear(project);
                Ok(())
            }
            Err(failure) => {
                log::warn!("{}{} {}", context, status.code, status.description);
                if matches!(failure, ApiFailure::Unauthenticated { .. })
                    && self.warnings.request_login(project)
                {
                    self.events
                        .emit(SyncEvent::new(project.clone(), SyncEventKind::LoginRequired));
                }
                Err(failure)
            }
        }
    }

    fn warn_once(&self, project: &ProjectId, key: WarningKey, message: &str) {
        log::warn!("{}: {}", project, message);
        if self.warnings.should_show(project, key) {
            self.events
                .emit(SyncEvent::warning(project.clone(), key, message));
        }
    }

    /// Cached findings only; files never analysed are left out
    pub fn get_analysis(&self, files: &[FileRef]) -> HashMap<FileRef, Vec<SuggestionEntry>> {
        if files.is_empty() {
            log::warn!("get_analysis requested for empty list of files");
            return HashMap::new();
        }

        let mut results = HashMap::with_capacity(files.len());
        let mut not_cached = Vec::new();
        for file in files {
            match self.suggestions.get(file) {
                Some(entries) => {
                    results.insert(file.clone(), entries);
                }
                None => not_cached.push(file.to_string()),
            }
        }
        if !not_cached.is_empty() {
            log::warn!("No results cached for: {}", not_cached.join(", "));
        }
        results
    }

    pub fn analysis_url(&self, project: &ProjectId) -> String {
        self.bundles.analysis_url(project)
    }

    pub fn add_project(&self, project: &ProjectId) -> bool {
        self.bundles.add_project(project)
    }

    pub fn cached_projects(&self) -> Vec<ProjectId> {
        self.bundles.projects()
    }

    pub fn is_project_not_analysed(&self, project: &ProjectId) -> bool {
        !self.bundles.contains(project)
    }

    pub fn is_update_in_progress(&self, project: &ProjectId) -> bool {
        self.bundles.is_update_in_progress(project)
    }

    pub async fn wait_for_update_finish(
        &self,
        project: &ProjectId,
        progress: &ProgressHandle,
    ) -> SyncResult<()> {
        while self.is_update_in_progress(project) {
            progress.delay(UPDATE_WAIT_DELAY).await?;
        }
        Ok(())
    }

    pub fn files_with_suggestions(&self, project: &ProjectId) -> Vec<FileRef> {
        self.suggestions.files_with_suggestions(project)
    }

    pub fn cached_files(&self, project: &ProjectId) -> Vec<FileRef> {
        self.suggestions.files(project)
    }

    pub fn is_file_cached(&self, file: &FileRef) -> bool {
        self.suggestions.contains(file)
    }

    pub fn severity_summary(&self, files: &[FileRef]) -> SeveritySummary {
        let entries: Vec<SuggestionEntry> = files
            .iter()
            .filter_map(|file| self.suggestions.get(file))
            .flatten()
            .collect();
        SeveritySummary::from_entries(&entries)
    }

    /// Drop results and content of the files and queue them for removal
    /// from the remote bundle
    pub async fn remove_files(&self, files: &[FileRef]) -> SyncResult<()> {
        if files.is_empty() {
            return Ok(());
        }
        let _guard = self.critical.enter("remove files").await;
        self.remove_files_locked(files)
    }

    /// Content is invalidated before findings are dropped, so a file that is
    /// no longer reported as cached never has stale content or hash left.
    fn remove_files_locked(&self, files: &[FileRef]) -> SyncResult<()> {
        for file in files {
            self.content.invalidate(file)?;
        }
        let removed = self.suggestions.remove_files(files);
        if removed.is_empty() {
            return Ok(());
        }

        let mut by_project: HashMap<ProjectId, Vec<FileRef>> = HashMap::new();
        for file in removed {
            by_project.entry(file.project().clone()).or_default().push(file);
        }
        for (project, files) in by_project {
            log::debug!("Removed {} files of {} from cache", files.len(), project);
            self.bundles.add_removed(&project, files.iter().cloned());
            self.events
                .emit(SyncEvent::new(project, SyncEventKind::FilesRemoved { files }));
        }
        Ok(())
    }

    /// Forget content, bundle, findings and pending removals of the project
    pub async fn remove_project(&self, project: &ProjectId) -> SyncResult<()> {
        let _guard = self.critical.enter(&format!("remove {}", project)).await;
        self.remove_project_locked(project)
    }

    fn remove_project_locked(&self, project: &ProjectId) -> SyncResult<()> {
        log::info!("Removing {} from caches", project);
        self.content.invalidate_project(project)?;
        let cached = self.suggestions.files(project);
        self.remove_files_locked(&cached)?;
        self.bundles.remove_project(project);
        Ok(())
    }
}
