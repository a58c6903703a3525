use async_trait::async_trait;

use crate::{db::error::DbResult, models::Worker};

#[async_trait]
pub trait WorkerRepo: Send + Sync {
    /// Workers whose handle reports can be trusted (not stalled, not landed).
    async fn reporting_workers(&self) -> DbResult<Vec<Worker>>;
}
