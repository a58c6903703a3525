use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{Build, Page},
};

#[async_trait]
pub trait BuildRepo: Send + Sync {
    /// Builds of a job within the page window, newest first.
    async fn job_builds(&self, job_id: i64, page: Page) -> DbResult<Vec<Build>>;

    /// IDs of the job's newest `limit` succeeded builds.
    async fn latest_succeeded_build_ids(&self, job_id: i64, limit: u32) -> DbResult<Vec<i64>>;

    /// Delete the event logs of the given builds and stamp their reap time.
    /// Returns the number of event rows deleted.
    async fn delete_build_events(&self, build_ids: &[i64]) -> DbResult<u64>;

    /// Finished builds stop being interceptible unless they are the latest
    /// build of their job and did not succeed. Returns the count.
    async fn mark_non_interceptible(&self) -> DbResult<u64>;
}
