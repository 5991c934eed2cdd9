use serde::{Deserialize, Serialize};

/// Configuration for the update coordinator.
///
/// Autocommit bounds exist per policy: the hard policy stamps a durable commit
/// point, the soft policy only refreshes visibility. A value `<= 0` disables
/// the corresponding bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Hard-autocommit document bound.
    pub auto_commit_max_docs: i64,

    /// Hard-autocommit time bound in milliseconds.
    pub auto_commit_max_time_ms: i64,

    /// Whether a hard autocommit opens a registered searcher.
    pub auto_commit_open_searcher: bool,

    /// Soft-autocommit document bound.
    pub auto_soft_commit_max_docs: i64,

    /// Soft-autocommit time bound in milliseconds.
    pub auto_soft_commit_max_time_ms: i64,

    /// When true, per-command `commit_within` requests and autocommit
    /// bookkeeping drive the soft tracker; otherwise the hard tracker.
    pub commit_within_soft_commit: bool,

    /// Commit uncommitted log state when the shared writer is retired. When
    /// false the writer is rolled back on close instead.
    pub commit_on_close: bool,

    /// Unique-key field name. `None` turns every add into a pure append.
    pub unique_key_field: Option<String>,

    /// Field carrying the document version used for reorder checks.
    pub version_field: String,

    /// Set when this index participates in distributed replica coordination.
    /// Rollback is rejected in that mode.
    pub distributed: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        UpdateConfig {
            auto_commit_max_docs: -1,
            auto_commit_max_time_ms: -1,
            auto_commit_open_searcher: true,
            auto_soft_commit_max_docs: -1,
            auto_soft_commit_max_time_ms: -1,
            commit_within_soft_commit: false,
            commit_on_close: true,
            unique_key_field: Some("id".to_string()),
            version_field: "_version_".to_string(),
            distributed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UpdateConfig::default();
        assert_eq!(config.auto_commit_max_docs, -1);
        assert_eq!(config.auto_commit_max_time_ms, -1);
        assert!(config.commit_on_close);
        assert_eq!(config.unique_key_field.as_deref(), Some("id"));
        assert!(!config.distributed);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = UpdateConfig {
            auto_commit_max_docs: 1000,
            auto_commit_max_time_ms: 15000,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: UpdateConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.auto_commit_max_docs, 1000);
        assert_eq!(back.auto_commit_max_time_ms, 15000);
    }
}
