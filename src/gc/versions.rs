use std::sync::Arc;

use async_trait::async_trait;

use super::{GcError, PhaseErrors, Reclaimer, RunContext};
use crate::{config::MIN_RETAINED_VERSIONS, db::VersionRepo, observability::metrics};

/// Caps the versions kept per resource config.
///
/// The newest `max_versions` by check order survive, plus the baseline row
/// (check order 0), which is never deleted.
pub struct VersionReaper {
    repo: Arc<dyn VersionRepo>,
    max_versions: u32,
    dry_run: bool,
}

impl VersionReaper {
    /// `max_versions` below the floor is raised to it.
    pub fn new(repo: Arc<dyn VersionRepo>, max_versions: u32, dry_run: bool) -> Self {
        Self {
            repo,
            max_versions: max_versions.max(MIN_RETAINED_VERSIONS),
            dry_run,
        }
    }

    pub fn max_versions(&self) -> u32 {
        self.max_versions
    }
}

#[async_trait]
impl Reclaimer for VersionReaper {
    fn name(&self) -> &'static str {
        "versions"
    }

    async fn run(&self, ctx: &RunContext) -> Result<(), GcError> {
        let scopes = self.repo.scopes_exceeding(self.max_versions).await?;
        let mut errors = PhaseErrors::new(self.name());
        let mut total = 0;

        for scope in scopes {
            ctx.check_cancelled()?;

            if self.dry_run {
                tracing::info!(
                    resource_config_id = scope.resource_config_id,
                    excess = scope.version_count.saturating_sub(u64::from(self.max_versions)),
                    "DRY RUN: Would prune resource versions"
                );
                continue;
            }

            let result = self
                .repo
                .prune_versions(scope.resource_config_id, self.max_versions)
                .await;
            if let Some(deleted) = errors.check("prune", result) {
                total += deleted;
            }
        }

        if total > 0 {
            tracing::info!(deleted = total, keep = self.max_versions, "Pruned resource versions");
            metrics::record_gc_deletion("resource_config_versions", total);
        }

        errors.finish()
    }
}
