use async_trait::async_trait;

use crate::db::error::DbResult;

/// A resource config holding more versions than the retention cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionScope {
    pub resource_config_id: i64,
    /// Versions in the scope, excluding the baseline.
    pub version_count: u64,
}

#[async_trait]
pub trait VersionRepo: Send + Sync {
    /// Scopes with more than `keep` non-baseline versions.
    async fn scopes_exceeding(&self, keep: u32) -> DbResult<Vec<VersionScope>>;

    /// Delete all but the `keep` highest check orders of a scope. The
    /// baseline (check order 0) is never deleted. Returns the count.
    async fn prune_versions(&self, resource_config_id: i64, keep: u32) -> DbResult<u64>;
}
