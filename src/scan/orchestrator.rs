//! Debounced, cancellable scheduling of analysis work
//!
//! Bursts of requests for the same file or project collapse into one run of
//! the most recent request. A run that gets superseded is cancelled through
//! its [`ProgressHandle`] at its next suspension point.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tokio::task::JoinHandle;

use crate::bundle::{BundleSyncEngine, SyncOutcome};
use crate::core::cancellation::ProgressHandle;
use crate::core::model::{FileRef, ProjectId};
use crate::core::sync::lock_recovering;
use crate::notifications::{EventFilter, SyncEvent, SyncEventKind};
use crate::scan::error::ScanResult;
use crate::scan::filters::FileCollector;

type Work = Box<dyn FnOnce(ProgressHandle) -> BoxFuture<'static, ()> + Send>;

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Window in which repeated requests are coalesced
    pub debounce: Duration,
    /// Extra wait before the network heavy part of a cancellable run
    pub settle_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(200),
            settle_delay: Duration::from_millis(1000),
        }
    }
}

/// Receives the files with findings after each project rescan
pub trait ResultsPresenter: Send + Sync {
    fn present(&self, project: &ProjectId, files_with_suggestions: &[FileRef]);
}

/// Presenter for headless use
pub struct LogPresenter;

impl ResultsPresenter for LogPresenter {
    fn present(&self, project: &ProjectId, files_with_suggestions: &[FileRef]) {
        log::info!(
            "{} files with findings in {}",
            files_with_suggestions.len(),
            project
        );
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingRescan {
    request_id: u64,
    bulk: bool,
}

#[derive(Default)]
struct OrchestratorState {
    running: HashMap<ProjectId, HashSet<ProgressHandle>>,
    pending_work: HashMap<FileRef, Work>,
    file_progress: HashMap<FileRef, ProgressHandle>,
    full_rescan_requested: HashSet<ProjectId>,
    pending_rescans: HashMap<ProjectId, PendingRescan>,
    rescan_progress: HashMap<ProjectId, ProgressHandle>,
    /// Request id of the bulk rescan currently executing
    bulk_running: HashMap<ProjectId, u64>,
    last_outcomes: HashMap<ProjectId, SyncOutcome>,
}

impl OrchestratorState {
    fn register(&mut self, project: &ProjectId, progress: &ProgressHandle) {
        self.running
            .entry(project.clone())
            .or_default()
            .insert(progress.clone());
    }

    fn unregister(&mut self, project: &ProjectId, progress: &ProgressHandle) -> bool {
        self.running
            .get_mut(project)
            .is_some_and(|running| running.remove(progress))
    }
}

pub struct ScanOrchestrator {
    config: OrchestratorConfig,
    engine: Arc<BundleSyncEngine>,
    files: Arc<FileCollector>,
    presenter: Arc<dyn ResultsPresenter>,
    state: Mutex<OrchestratorState>,
    next_request_id: AtomicU64,
}

impl ScanOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        engine: Arc<BundleSyncEngine>,
        files: Arc<FileCollector>,
        presenter: Arc<dyn ResultsPresenter>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            engine,
            files,
            presenter,
            state: Mutex::new(OrchestratorState::default()),
            next_request_id: AtomicU64::new(1),
        })
    }

    pub fn engine(&self) -> &Arc<BundleSyncEngine> {
        &self.engine
    }

    pub fn files(&self) -> &Arc<FileCollector> {
        &self.files
    }

    /// Run `work` in the background, registered as running for the project
    pub fn run_in_background<F, Fut>(
        self: &Arc<Self>,
        project: &ProjectId,
        title: &str,
        work: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(ProgressHandle) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        log::info!("Background run requested: {}", title);
        let progress = ProgressHandle::new(title);
        lock_recovering(&self.state, "orchestrator").register(project, &progress);

        let this = Arc::clone(self);
        let project = project.clone();
        tokio::spawn(async move {
            log::info!("Process [{}] started for {}", progress, project);
            work(progress.clone()).await;
            log::info!("Process [{}] ending for {}", progress, project);
            lock_recovering(&this.state, "orchestrator").unregister(&project, &progress);
        })
    }

    /// Coalesce work for one file; only the most recently supplied `work`
    /// of a burst runs
    ///
    /// Returns the spawned task, or `None` when the request joined a burst
    /// that is still waiting.
    pub fn run_cancellable<F, Fut>(
        self: &Arc<Self>,
        file: &FileRef,
        title: &str,
        work: F,
    ) -> Option<JoinHandle<()>>
    where
        F: FnOnce(ProgressHandle) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let work: Work = Box::new(move |progress| work(progress).boxed());
        if lock_recovering(&self.state, "orchestrator")
            .pending_work
            .insert(file.clone(), work)
            .is_some()
        {
            log::debug!("Cancellable run for {} coalesced", file);
            return None;
        }
        log::info!("New cancellable run registered for {}", file);

        let this = Arc::clone(self);
        let file = file.clone();
        let progress = ProgressHandle::new(title);
        Some(tokio::spawn(async move {
            this.run_file_work(file, progress).await;
        }))
    }

    async fn run_file_work(&self, file: FileRef, progress: ProgressHandle) {
        let project = file.project().clone();
        let superseded = {
            let mut state = lock_recovering(&self.state, "orchestrator");
            let previous = state.file_progress.insert(file.clone(), progress.clone());
            state.register(&project, &progress);
            previous.filter(|previous| state.unregister(&project, previous))
        };
        if let Some(previous) = superseded {
            log::info!("Previous run for {} cancelled [{}]", file, previous);
            previous.cancel();
            if let Err(e) = self.engine.content().invalidate(&file) {
                log::warn!("Failed to invalidate {}: {}", file, e);
            }
        }

        if progress.delay(self.config.debounce).await.is_ok() {
            let work = lock_recovering(&self.state, "orchestrator")
                .pending_work
                .remove(&file);
            match work {
                Some(work) => {
                    if progress.delay(self.config.settle_delay).await.is_ok() {
                        work(progress.clone()).await;
                    }
                }
                None => log::warn!("No pending work found for {}", file),
            }
        }

        let mut state = lock_recovering(&self.state, "orchestrator");
        state.unregister(&project, &progress);
        if state
            .file_progress
            .get(&file)
            .is_some_and(|current| current == &progress)
        {
            state.file_progress.remove(&file);
        }
        log::info!("Cancellable run ending for {}", file);
    }

    /// Schedule a full rescan of the project after `delay`
    ///
    /// Requests arriving before the delay elapses replace the pending one;
    /// a bulk request keeps the pending rescan in bulk mode.
    pub fn rescan_delayed(
        self: &Arc<Self>,
        project: &ProjectId,
        delay: Duration,
        bulk: bool,
        invalidate_caches: bool,
    ) -> Option<JoinHandle<()>> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        log::info!("Rescan requested for {} with request id {}", project, request_id);
        {
            let mut state = lock_recovering(&self.state, "orchestrator");
            state.full_rescan_requested.insert(project.clone());
            match state.pending_rescans.entry(project.clone()) {
                Entry::Occupied(mut pending) => {
                    let pending = pending.get_mut();
                    pending.request_id = request_id;
                    pending.bulk |= bulk;
                    return None;
                }
                Entry::Vacant(slot) => {
                    slot.insert(PendingRescan { request_id, bulk });
                }
            }
        }

        let this = Arc::clone(self);
        let project = project.clone();
        let progress = ProgressHandle::new(format!("Full project re-analysing for {}", project));
        Some(tokio::spawn(async move {
            this.run_rescan(project, progress, delay, invalidate_caches).await;
        }))
    }

    async fn run_rescan(
        &self,
        project: ProjectId,
        progress: ProgressHandle,
        delay: Duration,
        invalidate_caches: bool,
    ) {
        let superseded = {
            let mut state = lock_recovering(&self.state, "orchestrator");
            let previous = state.rescan_progress.insert(project.clone(), progress.clone());
            state.register(&project, &progress);
            previous.filter(|previous| state.unregister(&project, previous))
        };
        if let Some(previous) = superseded {
            log::info!("Previous rescan of {} cancelled [{}]", project, previous);
            previous.cancel();
        }

        let mut running_request = None;
        let result: ScanResult<()> = async {
            progress.delay(delay).await?;

            let pending = {
                let mut state = lock_recovering(&self.state, "orchestrator");
                let pending = state.pending_rescans.remove(&project);
                if let Some(pending) = pending.filter(|pending| pending.bulk) {
                    state.bulk_running.insert(project.clone(), pending.request_id);
                }
                pending
            };
            let Some(pending) = pending else {
                log::warn!("No pending rescan request found for {}", project);
                return Ok(());
            };
            running_request = Some(pending.request_id);
            log::info!(
                "Rescan started for {} with request id {}",
                project,
                pending.request_id
            );

            if invalidate_caches {
                self.engine.remove_project(&project).await?;
            }
            self.update_cached_analysis_results(&project, &progress).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            if e.is_cancelled() {
                log::info!("Rescan of {} cancelled", project);
            } else {
                log::warn!("Rescan of {} failed: {}", project, e);
            }
        }

        let mut state = lock_recovering(&self.state, "orchestrator");
        state.unregister(&project, &progress);
        if running_request.is_some() && state.bulk_running.get(&project) == running_request.as_ref() {
            state.bulk_running.remove(&project);
        }
        if state
            .rescan_progress
            .get(&project)
            .is_some_and(|current| current == &progress)
        {
            state.rescan_progress.remove(&project);
        }
        if !state.pending_rescans.contains_key(&project) {
            state.full_rescan_requested.remove(&project);
        }
        log::info!("Rescan ending for {}", project);
    }

    /// Collect the supported files and sync them
    ///
    /// The full-rescan flag is cleared before results are presented.
    pub async fn update_cached_analysis_results(
        &self,
        project: &ProjectId,
        progress: &ProgressHandle,
    ) -> ScanResult<SyncOutcome> {
        let result: ScanResult<SyncOutcome> = async {
            let files = self
                .files
                .supported_files_in_project(project, true, Some(progress))?;
            Ok(self.engine.sync(project, &files, progress).await?)
        }
        .await;

        {
            let mut state = lock_recovering(&self.state, "orchestrator");
            if !state.pending_rescans.contains_key(project) {
                state.full_rescan_requested.remove(project);
            }
            if let Ok(outcome) = &result {
                state.last_outcomes.insert(project.clone(), outcome.clone());
            }
        }
        self.presenter
            .present(project, &self.engine.files_with_suggestions(project));
        result
    }

    /// Schedule a short delayed rescan for each project without one pending
    pub fn analyse_projects(self: &Arc<Self>, projects: &[ProjectId]) {
        for project in projects {
            if !self.is_full_rescan_requested(project) {
                self.rescan_delayed(project, self.config.debounce, false, true);
            }
        }
    }

    /// Cancel every running operation of the project and drop its requests
    pub fn cancel_all(&self, project: &ProjectId) {
        let mut state = lock_recovering(&self.state, "orchestrator");
        state.bulk_running.remove(project);
        state.pending_rescans.remove(project);
        let running = state.running.remove(project).unwrap_or_default();
        log::info!("Cancelling {} running operations of {}", running.len(), project);
        for progress in &running {
            log::debug!("Cancelling [{}]", progress);
            progress.cancel();
        }
        state.full_rescan_requested.remove(project);
    }

    /// Cancel work and forget cached results of one project or all known ones
    pub async fn reset_caches_and_tasks(&self, project: Option<&ProjectId>) -> ScanResult<()> {
        let projects = match project {
            Some(project) => vec![project.clone()],
            None => self.engine.cached_projects(),
        };
        for project in projects {
            self.cancel_all(&project);
            self.engine.remove_project(&project).await?;
            self.engine
                .events()
                .emit(SyncEvent::new(project, SyncEventKind::RefreshRequested));
        }
        Ok(())
    }

    pub fn is_full_rescan_requested(&self, project: &ProjectId) -> bool {
        lock_recovering(&self.state, "orchestrator")
            .full_rescan_requested
            .contains(project)
    }

    /// True while a bulk rescan is pending or executing
    pub fn is_bulk_mode(&self, project: &ProjectId) -> bool {
        let state = lock_recovering(&self.state, "orchestrator");
        state.bulk_running.contains_key(project)
            || state
                .pending_rescans
                .get(project)
                .is_some_and(|pending| pending.bulk)
    }

    pub fn running_count(&self, project: &ProjectId) -> usize {
        lock_recovering(&self.state, "orchestrator")
            .running
            .get(project)
            .map_or(0, HashSet::len)
    }

    /// Outcome of the last completed sync started by a rescan
    pub fn last_outcome(&self, project: &ProjectId) -> Option<SyncOutcome> {
        lock_recovering(&self.state, "orchestrator")
            .last_outcomes
            .get(project)
            .cloned()
    }

    /// React to full-rescan requests published by the engine
    pub fn spawn_event_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events =
            self.engine
                .events()
                .subscribe("scan-orchestrator", EventFilter::RescanOnly, "orchestrator");
        let orchestrator: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(orchestrator) = orchestrator.upgrade() else {
                    break;
                };
                log::info!("Full rescan requested for {}", event.project);
                orchestrator.rescan_delayed(
                    &event.project,
                    orchestrator.config.debounce,
                    false,
                    true,
                );
            }
        })
    }
}
