use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::{GcError, PhaseErrors, Reclaimer, RunContext};
use crate::{
    db::{ContainerRepo, DbResult},
    models::{Container, ContainerState, OrphanDisposition, Transition},
    observability::metrics,
};

/// Drives orphaned containers toward Destroying.
///
/// Rows are never deleted here except for failed creations and containers
/// missing from their worker beyond the grace period; Destroying rows wait
/// for the worker to confirm they are gone.
pub struct ContainerReclaimer {
    repo: Arc<dyn ContainerRepo>,
    hijack_grace: Duration,
    missing_grace: Duration,
}

impl ContainerReclaimer {
    pub fn new(repo: Arc<dyn ContainerRepo>, hijack_grace: Duration, missing_grace: Duration) -> Self {
        Self {
            repo,
            hijack_grace,
            missing_grace,
        }
    }

    pub async fn run_at(&self, ctx: &RunContext, now: DateTime<Utc>) -> Result<(), GcError> {
        let mut errors = PhaseErrors::new(self.name());

        if let Some(deleted) = errors.check("failed", self.repo.destroy_failed().await)
            && deleted > 0
        {
            tracing::info!(deleted, "Deleted failed containers");
            metrics::record_gc_deletion("containers", deleted);
        }

        ctx.check_cancelled()?;
        if let Err(e) = self.reclaim_orphans(now).await {
            errors.record("orphans", e.into());
        }

        ctx.check_cancelled()?;
        if let Some(cutoff) = now.checked_sub_signed(self.missing_grace)
            && let Some(purged) = errors.check("missing", self.repo.remove_missing(cutoff).await)
            && purged > 0
        {
            tracing::info!(purged, "Removed containers missing beyond the grace period");
            metrics::record_gc_deletion("containers", purged);
        }

        errors.finish()
    }

    async fn reclaim_orphans(&self, now: DateTime<Utc>) -> DbResult<()> {
        let orphans = self.repo.find_orphaned().await?;
        if orphans.total() == 0 {
            return Ok(());
        }

        tracing::debug!(
            creating = orphans.creating.len(),
            created = orphans.created.len(),
            discontinued = orphans.discontinued.len(),
            destroying = orphans.destroying.len(),
            "Found orphaned containers"
        );

        for container in orphans.created.iter().chain(orphans.discontinued.iter()) {
            self.advance(container, now).await?;
        }

        Ok(())
    }

    async fn advance(&self, container: &Container, now: DateTime<Utc>) -> DbResult<()> {
        let (outcome, to) = match container.orphan_disposition(now, self.hijack_grace) {
            OrphanDisposition::Leave => return Ok(()),
            OrphanDisposition::Discontinue => (
                self.repo.mark_discontinued(container.id).await?,
                ContainerState::Discontinued,
            ),
            OrphanDisposition::Destroy => (
                self.repo
                    .mark_destroying(container.id, container.state)
                    .await?,
                ContainerState::Destroying,
            ),
        };

        match outcome {
            Transition::Transitioned => {
                tracing::debug!(
                    handle = %container.handle,
                    worker = %container.worker_name,
                    from = %container.state,
                    to = %to,
                    "Transitioned orphaned container"
                );
                metrics::record_gc_transition("containers", to.as_str());
            }
            Transition::AlreadyTransitioned | Transition::NotFound => {
                tracing::debug!(
                    handle = %container.handle,
                    outcome = ?outcome,
                    "Container moved on before transition"
                );
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Reclaimer for ContainerReclaimer {
    fn name(&self) -> &'static str {
        "containers"
    }

    async fn run(&self, ctx: &RunContext) -> Result<(), GcError> {
        self.run_at(ctx, Utc::now()).await
    }
}
