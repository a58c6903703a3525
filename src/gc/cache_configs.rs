use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{GcError, PhaseErrors, Reclaimer, RunContext};
use crate::{
    db::{DbResult, ResourceCacheLifecycleRepo},
    observability::metrics,
};

/// Removes resource cache uses, then caches, then configs and check
/// sessions.
///
/// Each stage only removes rows whose references the previous stages have
/// already removed, so stages always run in this order. A failed stage is
/// recorded and the remaining stages still run; whatever they could not
/// remove this time is picked up on the next pass.
pub struct CacheConfigReclaimer {
    repo: Arc<dyn ResourceCacheLifecycleRepo>,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    BuildImageCaches,
    UsesForFinishedBuilds,
    UnreferencedCaches,
    UnreferencedConfigs,
    ExpiredCheckSessions,
    InactiveCheckSessions,
}

impl Stage {
    const ORDER: [Stage; 6] = [
        Stage::BuildImageCaches,
        Stage::UsesForFinishedBuilds,
        Stage::UnreferencedCaches,
        Stage::UnreferencedConfigs,
        Stage::ExpiredCheckSessions,
        Stage::InactiveCheckSessions,
    ];

    fn name(self) -> &'static str {
        match self {
            Stage::BuildImageCaches => "build_image_caches",
            Stage::UsesForFinishedBuilds => "uses_for_finished_builds",
            Stage::UnreferencedCaches => "unreferenced_caches",
            Stage::UnreferencedConfigs => "unreferenced_configs",
            Stage::ExpiredCheckSessions => "expired_check_sessions",
            Stage::InactiveCheckSessions => "inactive_check_sessions",
        }
    }

    /// Metric label for the rows this stage deletes.
    fn deletes(self) -> &'static str {
        match self {
            Stage::BuildImageCaches | Stage::UsesForFinishedBuilds => "resource_cache_uses",
            Stage::UnreferencedCaches => "resource_caches",
            Stage::UnreferencedConfigs => "resource_configs",
            Stage::ExpiredCheckSessions | Stage::InactiveCheckSessions => "check_sessions",
        }
    }
}

impl CacheConfigReclaimer {
    pub fn new(repo: Arc<dyn ResourceCacheLifecycleRepo>) -> Self {
        Self { repo }
    }

    pub async fn run_at(&self, ctx: &RunContext, now: DateTime<Utc>) -> Result<(), GcError> {
        let mut errors = PhaseErrors::new(self.name());

        for stage in Stage::ORDER {
            ctx.check_cancelled()?;
            let result = self.run_stage(stage, now).await;
            if let Some(deleted) = errors.check(stage.name(), result)
                && deleted > 0
            {
                tracing::debug!(stage = stage.name(), deleted, "Cleaned resource cache rows");
                metrics::record_gc_deletion(stage.deletes(), deleted);
            }
        }

        errors.finish()
    }

    async fn run_stage(&self, stage: Stage, now: DateTime<Utc>) -> DbResult<u64> {
        match stage {
            Stage::BuildImageCaches => self.repo.clean_build_image_caches().await,
            Stage::UsesForFinishedBuilds => self.repo.clean_uses_for_finished_builds().await,
            Stage::UnreferencedCaches => self.repo.clean_unreferenced_caches().await,
            Stage::UnreferencedConfigs => self.repo.clean_unreferenced_configs().await,
            Stage::ExpiredCheckSessions => self.repo.clean_expired_check_sessions(now).await,
            Stage::InactiveCheckSessions => self.repo.clean_inactive_check_sessions().await,
        }
    }
}

#[async_trait]
impl Reclaimer for CacheConfigReclaimer {
    fn name(&self) -> &'static str {
        "cache_configs"
    }

    async fn run(&self, ctx: &RunContext) -> Result<(), GcError> {
        self.run_at(ctx, Utc::now()).await
    }
}
