use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::{GcError, PhaseErrors, Reclaimer, RunContext};
use crate::{
    db::{DbResult, VolumeRepo},
    models::{Transition, VolumeState},
    observability::metrics,
};

/// Drives orphaned volumes toward Destroying. Same shape as the container
/// reclaimer, minus hijacking.
pub struct VolumeReclaimer {
    repo: Arc<dyn VolumeRepo>,
    missing_grace: Duration,
}

impl VolumeReclaimer {
    pub fn new(repo: Arc<dyn VolumeRepo>, missing_grace: Duration) -> Self {
        Self {
            repo,
            missing_grace,
        }
    }

    pub async fn run_at(&self, ctx: &RunContext, now: DateTime<Utc>) -> Result<(), GcError> {
        let mut errors = PhaseErrors::new(self.name());

        if let Some(deleted) = errors.check("failed", self.repo.destroy_failed().await)
            && deleted > 0
        {
            tracing::info!(deleted, "Deleted failed volumes");
            metrics::record_gc_deletion("volumes", deleted);
        }

        ctx.check_cancelled()?;
        if let Err(e) = self.reclaim_orphans().await {
            errors.record("orphans", e.into());
        }

        ctx.check_cancelled()?;
        if let Some(cutoff) = now.checked_sub_signed(self.missing_grace)
            && let Some(purged) = errors.check("missing", self.repo.remove_missing(cutoff).await)
            && purged > 0
        {
            tracing::info!(purged, "Removed volumes missing beyond the grace period");
            metrics::record_gc_deletion("volumes", purged);
        }

        errors.finish()
    }

    async fn reclaim_orphans(&self) -> DbResult<()> {
        let orphans = self.repo.find_orphaned().await?;
        if orphans.total() == 0 {
            return Ok(());
        }

        tracing::debug!(
            creating = orphans.creating.len(),
            created = orphans.created.len(),
            destroying = orphans.destroying.len(),
            "Found orphaned volumes"
        );

        for volume in &orphans.created {
            match self.repo.mark_destroying(volume.id).await? {
                Transition::Transitioned => {
                    tracing::debug!(
                        handle = %volume.handle,
                        worker = %volume.worker_name,
                        "Marked orphaned volume destroying"
                    );
                    metrics::record_gc_transition("volumes", VolumeState::Destroying.as_str());
                }
                outcome => {
                    tracing::debug!(
                        handle = %volume.handle,
                        outcome = ?outcome,
                        "Volume moved on before transition"
                    );
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Reclaimer for VolumeReclaimer {
    fn name(&self) -> &'static str {
        "volumes"
    }

    async fn run(&self, ctx: &RunContext) -> Result<(), GcError> {
        self.run_at(ctx, Utc::now()).await
    }
}
