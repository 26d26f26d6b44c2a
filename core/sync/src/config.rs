//! Sync configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use coursesync_model::{TaskKind, COURSE_MODE};

/// Public site the "open on remote" links point to.
pub const DEFAULT_SITE_URL: &str = "https://stepik.org";

/// Platform account granted the administrator role on published courses.
pub const DEFAULT_ADMIN_ACCOUNT: &str = "17813950";

/// Accounts used for automated testing on the platform.
pub const DEFAULT_TEST_ACCOUNTS: [u64; 1] = [17869355];

/// Configuration for a course push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL used to build course links.
    pub site_url: String,
    /// Mode stamped on newly published courses.
    pub course_mode: String,
    /// Task kinds that are never pushed.
    pub excluded_task_kinds: BTreeSet<TaskKind>,
    /// Account added to the admins group of new courses, `None` to disable.
    pub admin_account_id: Option<String>,
    /// Users for whom the admin grant is skipped.
    pub test_account_ids: Vec<u64>,
    /// Internal mode skips the admin grant entirely.
    pub internal: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_string(),
            course_mode: COURSE_MODE.to_string(),
            excluded_task_kinds: [TaskKind::Choice, TaskKind::Code].into_iter().collect(),
            admin_account_id: Some(DEFAULT_ADMIN_ACCOUNT.to_string()),
            test_account_ids: DEFAULT_TEST_ACCOUNTS.to_vec(),
            internal: false,
        }
    }
}

impl SyncConfig {
    /// Link to a course on the remote site.
    pub fn course_url(&self, course_id: u64) -> String {
        format!("{}/course/{}", self.site_url.trim_end_matches('/'), course_id)
    }

    /// Whether the admin grant applies to a course published by `user_id`.
    pub fn grants_admin_for(&self, user_id: u64) -> bool {
        !self.internal && !self.test_account_ids.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();

        assert_eq!(config.course_mode, "Course Creator");
        assert!(config.excluded_task_kinds.contains(&TaskKind::Choice));
        assert!(config.excluded_task_kinds.contains(&TaskKind::Code));
        assert!(!config.excluded_task_kinds.contains(&TaskKind::Edu));
        assert_eq!(config.admin_account_id.as_deref(), Some("17813950"));
    }

    #[test]
    fn test_course_url() {
        let mut config = SyncConfig::default();
        assert_eq!(config.course_url(42), "https://stepik.org/course/42");

        config.site_url = "https://example.org/".to_string();
        assert_eq!(config.course_url(7), "https://example.org/course/7");
    }

    #[test]
    fn test_admin_grant_rules() {
        let mut config = SyncConfig::default();
        assert!(config.grants_admin_for(5));
        assert!(!config.grants_admin_for(17869355));

        config.internal = true;
        assert!(!config.grants_admin_for(5));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{"internal": true}"#).unwrap();
        assert!(config.internal);
        assert_eq!(config.site_url, DEFAULT_SITE_URL);
        assert_eq!(config.excluded_task_kinds.len(), 2);
    }
}
