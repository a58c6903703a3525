//! Reclamation of containers, volumes, resource caches, versions and build
//! event logs.
//!
//! Every reclaimer pulls its work from the database and mutates it through
//! conditional statements only, so any number of passes (in this process or
//! another) may overlap safely. A failed pass is simply retried on the next
//! tick.

mod aggregate;
mod build_logs;
mod builds;
mod cache_configs;
mod containers;
mod destroyer;
mod handle_syncer;
mod scheduler;
mod sweeper;
mod versions;
mod volumes;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

pub use aggregate::AggregateCollector;
pub use build_logs::{BuildLogReaper, RetentionPolicy};
pub use builds::BuildCollector;
pub use cache_configs::CacheConfigReclaimer;
pub use containers::ContainerReclaimer;
pub use destroyer::Destroyer;
pub use handle_syncer::{HandleSyncer, SyncResult};
pub use scheduler::start_reclaimer_worker;
pub use sweeper::WorkerSweeper;
pub use versions::VersionReaper;
pub use volumes::VolumeReclaimer;

use crate::{db::DbError, observability::metrics, worker_client::WorkerClientError};

#[derive(Debug, Error)]
pub enum GcError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerClientError),

    #[error("Reclamation cancelled")]
    Cancelled,
}

/// Per-pass context handed to every reclaimer.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Correlates every log line of one pass.
    pub run_id: Uuid,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            cancel,
        }
    }

    /// Errors once shutdown has been requested. Checked between stages;
    /// a stage that already started runs to completion.
    pub fn check_cancelled(&self) -> Result<(), GcError> {
        if self.cancel.is_cancelled() {
            Err(GcError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
pub trait Reclaimer: Send + Sync {
    /// Stable name used in logs and metric labels.
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &RunContext) -> Result<(), GcError>;
}

/// Run one pass of `reclaimer` inside a span carrying its name and the run
/// id, recording how long it took.
pub async fn run_pass(reclaimer: &dyn Reclaimer, ctx: &RunContext) -> Result<(), GcError> {
    let span = tracing::info_span!("gc", reclaimer = reclaimer.name(), run_id = %ctx.run_id);
    let start = Instant::now();
    let result = reclaimer.run(ctx).instrument(span).await;
    metrics::record_gc_run_duration(reclaimer.name(), start.elapsed().as_secs_f64());
    result
}

/// Collects the failures of independent phases within one pass.
///
/// Every failure is logged and counted; the first one is what the pass
/// returns once all phases have had their turn.
pub(crate) struct PhaseErrors {
    reclaimer: &'static str,
    first: Option<GcError>,
}

impl PhaseErrors {
    pub(crate) fn new(reclaimer: &'static str) -> Self {
        Self {
            reclaimer,
            first: None,
        }
    }

    /// Unwrap a phase result, recording the error if there is one.
    pub(crate) fn check<T, E>(&mut self, phase: &'static str, result: Result<T, E>) -> Option<T>
    where
        E: Into<GcError>,
    {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.record(phase, e.into());
                None
            }
        }
    }

    pub(crate) fn record(&mut self, phase: &'static str, error: GcError) {
        tracing::error!(
            reclaimer = self.reclaimer,
            phase,
            error = %error,
            "Reclamation phase failed"
        );
        metrics::record_gc_error(self.reclaimer);
        if self.first.is_none() {
            self.first = Some(error);
        }
    }

    pub(crate) fn finish(self) -> Result<(), GcError> {
        match self.first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
