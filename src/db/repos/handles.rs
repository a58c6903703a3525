use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::error::DbResult;

/// Handle bookkeeping shared by containers and volumes.
///
/// These are the store operations behind the worker reconciliation protocol.
/// Every method is a single conditional statement, so concurrent callers
/// converge instead of conflicting.
#[async_trait]
pub trait HandleRepo: Send + Sync {
    /// Delete this worker's Destroying rows whose handles are absent from
    /// `live_handles`. Returns the number of rows deleted.
    async fn destroy_unknown(&self, worker_name: &str, live_handles: &[String]) -> DbResult<u64>;

    /// Stamp `missing_since = now` on this worker's live-state rows absent
    /// from `live_handles` (unless already stamped) and clear the stamp on
    /// rows whose handle was reported.
    async fn update_missing_since(
        &self,
        worker_name: &str,
        live_handles: &[String],
        now: DateTime<Utc>,
    ) -> DbResult<()>;

    /// Delete rows that have been missing since before `missing_before` on
    /// workers that are not stalled.
    async fn remove_missing(&self, missing_before: DateTime<Utc>) -> DbResult<u64>;

    /// Handles on this worker that are waiting for a destroy instruction.
    async fn find_destroying(&self, worker_name: &str) -> DbResult<Vec<String>>;

    /// Insert reported handles the store has never heard of as Destroying,
    /// so the worker is told to remove them. Returns the number inserted.
    async fn register_unknown(&self, worker_name: &str, live_handles: &[String]) -> DbResult<u64>;
}
