//! Bundle synchronisation with the remote analysis service
//!
//! [`BundleSyncEngine`] owns the per-project bundle state and the suggestion
//! cache; [`AnalysisApi`] is the seam to the service, implemented over HTTP by
//! [`HttpAnalysisApi`].

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod merge;
pub mod state;
pub mod types;
pub mod warnings;

pub use api::{
    AnalysisApi, AnalysisRequest, AnalysisResponse, BundleFiles, BundleManifest, BundleResponse,
    ExtendBundleRequest, FiltersResponse, ResponseStatus,
};
pub use client::{HttpAnalysisApi, DEFAULT_API_URL};
pub use config::{SyncConfig, MAX_BUNDLE_SIZE, MAX_FILE_SIZE};
pub use engine::{AbortReason, BundleSyncEngine, SyncOutcome};
pub use error::{ApiFailure, ClientError, SyncError, SyncResult};
pub use types::{Severity, SeveritySummary, SuggestionEntry, TextRange};
