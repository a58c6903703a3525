use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::Destroyer;
use crate::{
    db::{DbResult, HandleRepo},
    models::HandleKind,
    observability::metrics,
};

/// Outcome of reconciling one worker report.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncResult {
    /// Destroying rows the worker confirmed gone.
    pub destroyed: u64,
    /// Rows missing for longer than the grace period.
    pub purged: u64,
    /// Reported handles the store had never seen.
    pub registered: u64,
}

/// Reconciles a worker's reported handles with the store.
///
/// One absence only stamps `missing_since`; a row is deleted after staying
/// absent for the whole grace period, so a worker that drops a handle from
/// a single report never loses it.
pub struct HandleSyncer {
    kind: HandleKind,
    repo: Arc<dyn HandleRepo>,
    destroyer: Destroyer,
    missing_grace: Duration,
    register_unknown: bool,
}

impl HandleSyncer {
    pub fn new(
        kind: HandleKind,
        repo: Arc<dyn HandleRepo>,
        missing_grace: Duration,
        register_unknown: bool,
    ) -> Self {
        Self {
            kind,
            destroyer: Destroyer::new(kind, repo.clone()),
            repo,
            missing_grace,
            register_unknown,
        }
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// Reconcile using the current time.
    ///
    /// `None` means the worker's handles are unknown (not registered, or
    /// listing failed) and nothing is touched. `Some(&[])` is a worker that
    /// genuinely has nothing.
    pub async fn sync(
        &self,
        worker_name: &str,
        live_handles: Option<&[String]>,
    ) -> DbResult<SyncResult> {
        self.sync_at(worker_name, live_handles, Utc::now()).await
    }

    pub async fn sync_at(
        &self,
        worker_name: &str,
        live_handles: Option<&[String]>,
        now: DateTime<Utc>,
    ) -> DbResult<SyncResult> {
        let Some(live_handles) = live_handles else {
            tracing::debug!(kind = %self.kind, worker = worker_name, "No handle report, skipping sync");
            return Ok(SyncResult::default());
        };

        let mut result = SyncResult {
            destroyed: self.destroyer.destroy(worker_name, live_handles).await?,
            ..Default::default()
        };

        self.repo
            .update_missing_since(worker_name, live_handles, now)
            .await?;

        // A grace period reaching past the earliest representable time
        // leaves nothing old enough to purge.
        if let Some(cutoff) = now.checked_sub_signed(self.missing_grace) {
            result.purged = self.repo.remove_missing(cutoff).await?;
        }
        if result.purged > 0 {
            tracing::info!(
                kind = %self.kind,
                purged = result.purged,
                "Removed rows missing from their worker beyond the grace period"
            );
            metrics::record_gc_deletion(self.kind.as_str(), result.purged);
        }

        if self.register_unknown {
            result.registered = self.repo.register_unknown(worker_name, live_handles).await?;
            if result.registered > 0 {
                tracing::info!(
                    kind = %self.kind,
                    worker = worker_name,
                    registered = result.registered,
                    "Registered unknown handles for destruction"
                );
            }
        }

        Ok(result)
    }
}
