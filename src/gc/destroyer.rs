use std::sync::Arc;

use crate::{
    db::{DbResult, HandleRepo},
    models::HandleKind,
    observability::metrics,
};

/// Deletes rows for handles a worker has confirmed gone.
///
/// Only rows already in Destroying are touched; anything else absent from
/// the report goes through missing-since accounting instead.
pub struct Destroyer {
    kind: HandleKind,
    repo: Arc<dyn HandleRepo>,
}

impl Destroyer {
    pub fn new(kind: HandleKind, repo: Arc<dyn HandleRepo>) -> Self {
        Self { kind, repo }
    }

    /// `live_handles` must be the worker's complete report.
    pub async fn destroy(&self, worker_name: &str, live_handles: &[String]) -> DbResult<u64> {
        let deleted = self.repo.destroy_unknown(worker_name, live_handles).await?;

        if deleted > 0 {
            tracing::debug!(
                kind = %self.kind,
                worker = worker_name,
                deleted,
                "Deleted rows confirmed gone by worker"
            );
            metrics::record_gc_deletion(self.kind.as_str(), deleted);
        }

        Ok(deleted)
    }
}
