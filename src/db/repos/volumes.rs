use async_trait::async_trait;

use super::HandleRepo;
use crate::{
    db::error::DbResult,
    models::{OrphanedVolumes, Transition},
};

#[async_trait]
pub trait VolumeRepo: HandleRepo {
    /// Volumes on active workers with neither an owning container nor a
    /// resource cache, excluding volumes that still have child volumes.
    async fn find_orphaned(&self) -> DbResult<OrphanedVolumes>;

    /// Hard-delete volumes whose creation failed. Returns the count.
    async fn destroy_failed(&self) -> DbResult<u64>;

    /// Move a Created volume to Destroying.
    async fn mark_destroying(&self, id: i64) -> DbResult<Transition>;
}
