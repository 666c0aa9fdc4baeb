//! Events emitted by the sync engine and orchestrator

use std::time::SystemTime;

use crate::core::model::{FileRef, ProjectId};

/// Identifies one rate-limited user warning
///
/// Each key is shown at most once per project until the project's next
/// successful remote call clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKey {
    BundleOperationsFailed,
    UploadFailed,
    AnalysisFailed,
    AnalysisTimeout,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEventKind {
    /// User-facing warning, already deduplicated
    Warning { key: WarningKey, message: String },
    /// The service rejected the session token
    LoginRequired,
    /// Cached results changed; presentation should be refreshed
    RefreshRequested,
    /// Files left tracking and their results were dropped
    FilesRemoved { files: Vec<FileRef> },
    /// Local and remote state diverged; the whole project must be re-analysed
    FullRescanRequested,
}

#[derive(Debug, Clone)]
pub struct SyncEvent {
    pub project: ProjectId,
    pub kind: SyncEventKind,
    pub timestamp: SystemTime,
}

impl SyncEvent {
    pub fn new(project: ProjectId, kind: SyncEventKind) -> Self {
        Self {
            project,
            kind,
            timestamp: SystemTime::now(),
        }
    }

    pub fn warning(project: ProjectId, key: WarningKey, message: impl Into<String>) -> Self {
        Self::new(
            project,
            SyncEventKind::Warning {
                key,
                message: message.into(),
            },
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            SyncEventKind::Warning { .. } => "Warning",
            SyncEventKind::LoginRequired => "LoginRequired",
            SyncEventKind::RefreshRequested => "RefreshRequested",
            SyncEventKind::FilesRemoved { .. } => "FilesRemoved",
            SyncEventKind::FullRescanRequested => "FullRescanRequested",
        }
    }
}

/// Subscriber side event selection
#[derive(Debug, Clone, PartialEq)]
pub enum EventFilter {
    All,
    WarningsOnly,
    RescanOnly,
    Project(ProjectId),
}

impl EventFilter {
    pub fn accepts(&self, event: &SyncEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::WarningsOnly => matches!(
                event.kind,
                SyncEventKind::Warning { .. } | SyncEventKind::LoginRequired
            ),
            EventFilter::RescanOnly => matches!(event.kind, SyncEventKind::FullRescanRequested),
            EventFilter::Project(project) => &event.project == project,
        }
    }
}
