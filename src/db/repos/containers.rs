use async_trait::async_trait;

use super::HandleRepo;
use crate::{
    db::error::DbResult,
    models::{ContainerState, OrphanedContainers, Transition},
};

#[async_trait]
pub trait ContainerRepo: HandleRepo {
    /// Containers with no owner reference (or owned by a build that can no
    /// longer be intercepted), partitioned by state.
    async fn find_orphaned(&self) -> DbResult<OrphanedContainers>;

    /// Hard-delete containers whose creation failed. Returns the count.
    async fn destroy_failed(&self) -> DbResult<u64>;

    /// Move a container to Destroying if it is still in `from`.
    async fn mark_destroying(&self, id: i64, from: ContainerState) -> DbResult<Transition>;

    /// Move a Created container to Discontinued.
    async fn mark_discontinued(&self, id: i64) -> DbResult<Transition>;
}
