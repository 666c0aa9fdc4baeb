//! Sync engine tunables

use std::time::Duration;

/// Byte budget of one create/extend manifest or upload chunk
pub const MAX_BUNDLE_SIZE: usize = 4_000_000;

/// Files at or above this size are never analysed
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

pub const DEFAULT_IDE_PRODUCT_NAME: &str = "bundlesync";

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Organisation name sent with every bundle and analysis call
    pub org: String,
    /// Severity floor for requested findings (1 = info)
    pub min_severity: u8,
    /// Overall budget for polling one analysis
    pub analysis_timeout: Duration,
    pub poll_delay: Duration,
    pub max_bundle_size: usize,
    /// Extra create attempts after an expired or failed bundle call
    pub bundle_retries: usize,
    pub upload_attempts: usize,
    /// Consecutive failed polls tolerated before giving up
    pub poll_failure_tolerance: usize,
    pub ide_product_name: String,
    pub max_file_size: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            org: String::new(),
            min_severity: 1,
            analysis_timeout: Duration::from_secs(60),
            poll_delay: Duration::from_millis(1000),
            max_bundle_size: MAX_BUNDLE_SIZE,
            bundle_retries: 2,
            upload_attempts: 10,
            poll_failure_tolerance: 5,
            ide_product_name: DEFAULT_IDE_PRODUCT_NAME.to_string(),
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

impl SyncConfig {
    /// Number of polls that fit in the analysis timeout, at least one
    pub fn expected_poll_attempts(&self) -> u64 {
        let delay = self.poll_delay.as_millis().max(1);
        ((self.analysis_timeout.as_millis() / delay) as u64).max(1)
    }
}
