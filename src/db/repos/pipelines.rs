use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{Job, Pipeline},
};

#[async_trait]
pub trait PipelineRepo: Send + Sync {
    async fn unpaused_pipelines(&self) -> DbResult<Vec<Pipeline>>;

    async fn jobs(&self, pipeline_id: i64) -> DbResult<Vec<Job>>;

    /// Advance the job's log watermark. Never moves it backwards; returns
    /// whether the row changed.
    async fn update_first_logged_build_id(&self, job_id: i64, build_id: i64) -> DbResult<bool>;
}
