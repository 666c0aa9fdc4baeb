//! Scheduling of project rescans and selection of analysable files

pub mod error;
pub mod filters;
pub mod orchestrator;

pub use error::{ScanError, ScanResult};
pub use filters::{FileCollector, SupportedFiles, DEFAULT_CONFIG_FILES, DEFAULT_EXTENSIONS};
pub use orchestrator::{LogPresenter, OrchestratorConfig, ResultsPresenter, ScanOrchestrator};
