//! Per-project deduplication of user warnings and login requests

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::core::model::ProjectId;
use crate::core::sync::lock_recovering;
use crate::notifications::WarningKey;

#[derive(Default)]
pub struct WarningLedger {
    shown: Mutex<HashMap<ProjectId, HashSet<WarningKey>>>,
    login_requested: Mutex<HashSet<ProjectId>>,
}

impl WarningLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the warning; true only the first time until cleared
    pub fn should_show(&self, project: &ProjectId, key: WarningKey) -> bool {
        lock_recovering(&self.shown, "warning ledger")
            .entry(project.clone())
            .or_default()
            .insert(key)
    }

    /// Record a login request; true only the first time until cleared
    pub fn request_login(&self, project: &ProjectId) -> bool {
        lock_recovering(&self.login_requested, "login requests").insert(project.clone())
    }

    pub fn active(&self, project: &ProjectId) -> Vec<WarningKey> {
        lock_recovering(&self.shown, "warning ledger")
            .get(project)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Called on every successful remote call of the project
    pub fn clear(&self, project: &ProjectId) {
        lock_recovering(&self.shown, "warning ledger").remove(project);
        lock_recovering(&self.login_requested, "login requests").remove(project);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_key_shown_once_until_cleared() {
        let ledger = WarningLedger::new();
        let project = ProjectId::new("p");

        assert!(ledger.should_show(&project, WarningKey::UploadFailed));
        assert!(!ledger.should_show(&project, WarningKey::UploadFailed));
        assert!(ledger.should_show(&project, WarningKey::AnalysisTimeout));
        assert!(ledger.should_show(&ProjectId::new("q"), WarningKey::UploadFailed));

        ledger.clear(&project);
        assert!(ledger.active(&project).is_empty());
        assert!(ledger.should_show(&project, WarningKey::UploadFailed));
    }

    #[test]
    fn test_login_requested_once() {
        let ledger = WarningLedger::new();
        let project = ProjectId::new("p");

        assert!(ledger.request_login(&project));
        assert!(!ledger.request_login(&project));
        ledger.clear(&project);
        assert!(ledger.request_login(&project));
    }
}
