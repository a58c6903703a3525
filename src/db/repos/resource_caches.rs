use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::error::DbResult;

/// Reference-counted cleanup of resource caches, their configs and check
/// sessions. Each call deletes only rows with no remaining referents, so the
/// stages must run in declaration order to make progress within one pass.
#[async_trait]
pub trait ResourceCacheLifecycleRepo: Send + Sync {
    /// Drop cache uses whose owner is gone, and image-resource records of
    /// finished job builds that are no longer the latest completed build of
    /// their job. One-off builds keep their records until the build itself
    /// is deleted.
    async fn clean_build_image_caches(&self) -> DbResult<u64>;

    /// Drop cache uses of finished builds, except the job's latest build
    /// when it failed and uses recorded as the build's image resource.
    async fn clean_uses_for_finished_builds(&self) -> DbResult<u64>;

    /// Delete caches with no uses that are not pinned as next-build inputs,
    /// not a retained build's image resource and not a custom type's parent.
    async fn clean_unreferenced_caches(&self) -> DbResult<u64>;

    /// Delete configs with no caches, active resources, active resource
    /// types or check sessions.
    async fn clean_unreferenced_configs(&self) -> DbResult<u64>;

    async fn clean_expired_check_sessions(&self, now: DateTime<Utc>) -> DbResult<u64>;

    /// Delete check sessions whose config is not used by any active resource
    /// or resource type of an unpaused pipeline.
    async fn clean_inactive_check_sessions(&self) -> DbResult<u64>;
}
