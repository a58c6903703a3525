//! Build event log reaper.
//!
//! Each job carries a watermark, `first_logged_build_id`: every build below
//! it has already had its events reaped. A pass examines one batch of builds
//! starting at the watermark, deletes the events of those the retention
//! policy no longer covers, and moves the watermark forward. The next pass
//! resumes where this one stopped instead of rescanning the job's history.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::Instrument;

use super::{GcError, PhaseErrors, Reclaimer, RunContext};
use crate::{
    config::BuildLogConfig,
    db::{BuildRepo, DbResult, PipelineRepo},
    models::{Build, Job, JobRetention, Page},
    observability::metrics,
};

/// Retention that applies to one job once server defaults and maxima are
/// taken into account. Zero means "not limited by this dimension".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub builds: u32,
    pub days: u32,
    pub min_succeeded_builds: u32,
}

impl RetentionPolicy {
    pub fn effective(job: JobRetention, config: &BuildLogConfig) -> Self {
        let builds = cap(
            if job.builds == 0 {
                config.default_builds
            } else {
                job.builds
            },
            config.max_builds,
        );
        let days = cap(
            if job.days == 0 {
                config.default_days
            } else {
                job.days
            },
            config.max_days,
        );

        let min_succeeded_builds = if builds > 0 {
            job.min_succeeded_builds.min(builds)
        } else {
            job.min_succeeded_builds
        };

        Self {
            builds,
            days,
            min_succeeded_builds,
        }
    }

    /// Keep everything.
    pub fn is_unbounded(&self) -> bool {
        self.builds == 0 && self.days == 0
    }
}

/// A zero maximum leaves the value alone; otherwise an unset or larger value
/// is brought down to the maximum.
fn cap(value: u32, max: u32) -> u32 {
    if max == 0 {
        value
    } else if value == 0 || value > max {
        max
    } else {
        value
    }
}

pub struct BuildLogReaper {
    pipelines: Arc<dyn PipelineRepo>,
    builds: Arc<dyn BuildRepo>,
    config: BuildLogConfig,
    dry_run: bool,
}

impl BuildLogReaper {
    pub fn new(
        pipelines: Arc<dyn PipelineRepo>,
        builds: Arc<dyn BuildRepo>,
        config: BuildLogConfig,
        dry_run: bool,
    ) -> Self {
        Self {
            pipelines,
            builds,
            config,
            dry_run,
        }
    }

    pub async fn run_at(&self, ctx: &RunContext, now: DateTime<Utc>) -> Result<(), GcError> {
        let pipelines = self.pipelines.unpaused_pipelines().await?;
        let mut errors = PhaseErrors::new(self.name());
        let mut total = 0;

        for pipeline in pipelines {
            ctx.check_cancelled()?;

            let Some(jobs) = errors.check("jobs", self.pipelines.jobs(pipeline.id).await) else {
                continue;
            };

            for job in jobs {
                ctx.check_cancelled()?;

                let span = tracing::debug_span!("job", pipeline = %pipeline.name, job = %job.name);
                let result = self.reap_job(&job, now).instrument(span.clone()).await;
                if let Some(deleted) = span.in_scope(|| errors.check("job", result)) {
                    total += deleted;
                }
            }
        }

        if total > 0 {
            tracing::info!(events = total, "Reaped build event logs");
            metrics::record_gc_deletion("build_events", total);
        }

        errors.finish()
    }

    /// Reap one batch of a job's builds. Returns how many build events were
    /// deleted.
    async fn reap_job(&self, job: &Job, now: DateTime<Utc>) -> DbResult<u64> {
        let policy = RetentionPolicy::effective(job.retention, &self.config);
        if policy.is_unbounded() {
            return Ok(0);
        }

        let candidates = self.candidates(job).await?;
        if candidates.is_empty() {
            return Ok(0);
        }

        // Oldest of the builds the count policy keeps. Without any builds
        // there is nothing to anchor a count-only policy to.
        let boundary = if policy.builds > 0 {
            let retained = self
                .builds
                .job_builds(job.id, Page::newest(policy.builds))
                .await?;
            match retained.last() {
                Some(oldest) => Some(oldest.id),
                None if policy.days == 0 => return Ok(0),
                None => None,
            }
        } else {
            None
        };

        let keep_succeeded: HashSet<i64> = if policy.min_succeeded_builds > 0 {
            self.builds
                .latest_succeeded_build_ids(job.id, policy.min_succeeded_builds)
                .await?
                .into_iter()
                .collect()
        } else {
            HashSet::new()
        };

        let mut to_delete = Vec::new();
        // Lowest build skipped only because it is not reapable yet. The
        // watermark never passes it, so a later pass looks at it again.
        let mut held_back: Option<i64> = None;

        for build in &candidates {
            if build.is_running() || boundary.is_some_and(|b| build.id >= b) {
                break;
            }

            if self.config.drain_required && !build.drained {
                held_back.get_or_insert(build.id);
                continue;
            }

            if policy.days > 0 && !build.ended_before(now, policy.days) {
                held_back.get_or_insert(build.id);
                continue;
            }

            if keep_succeeded.contains(&build.id) {
                held_back.get_or_insert(build.id);
                continue;
            }

            to_delete.push(build.id);
        }

        let Some(&highest) = to_delete.iter().max() else {
            return Ok(0);
        };

        if self.dry_run {
            tracing::info!(
                job_id = job.id,
                builds = ?to_delete,
                "DRY RUN: Would delete build event logs"
            );
            return Ok(0);
        }

        let deleted = self.builds.delete_build_events(&to_delete).await?;

        let watermark = held_back.map_or(highest + 1, |held| held.min(highest + 1));
        if watermark > job.first_logged_build_id {
            self.pipelines
                .update_first_logged_build_id(job.id, watermark)
                .await?;
        }

        tracing::debug!(
            builds = to_delete.len(),
            events = deleted,
            first_logged_build_id = watermark,
            "Reaped job build logs"
        );

        Ok(deleted)
    }

    /// The batch of builds at or after the job's watermark, oldest first.
    async fn candidates(&self, job: &Job) -> DbResult<Vec<Build>> {
        let batch = self.config.batch_size;

        let mut builds = if job.first_logged_build_id > 1 {
            self.builds
                .job_builds(job.id, Page::until(job.first_logged_build_id - 1, batch))
                .await?
        } else {
            // Build 1 sits below any `until` window, so it is fetched on
            // its own.
            let mut first = self.builds.job_builds(job.id, Page::since(2, 1)).await?;
            if first.is_empty() {
                self.builds
                    .job_builds(job.id, Page::until(1, batch))
                    .await?
            } else {
                if batch > 1 {
                    first.extend(
                        self.builds
                            .job_builds(job.id, Page::until(1, batch - 1))
                            .await?,
                    );
                }
                first
            }
        };

        builds.sort_by_key(|b| b.id);
        builds.dedup_by_key(|b| b.id);
        Ok(builds)
    }
}

#[async_trait]
impl Reclaimer for BuildLogReaper {
    fn name(&self) -> &'static str {
        "build_logs"
    }

    async fn run(&self, ctx: &RunContext) -> Result<(), GcError> {
        self.run_at(ctx, Utc::now()).await
    }
}
