//! Periodic driver for reclaimers.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use super::{GcError, Reclaimer, RunContext, run_pass};
use crate::observability::metrics;

/// Runs `reclaimer` every `interval` until `cancel` fires.
///
/// A failed pass is logged and retried on the next tick. The first pass
/// starts immediately. Cancellation is observed between stages of a pass
/// and while sleeping, so the task returns promptly on shutdown.
pub async fn start_reclaimer_worker(
    reclaimer: Arc<dyn Reclaimer>,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        reclaimer = reclaimer.name(),
        interval_secs = interval.as_secs(),
        "Starting reclaimer"
    );

    loop {
        let ctx = RunContext::new(cancel.clone());
        match run_pass(reclaimer.as_ref(), &ctx).await {
            Ok(()) => {
                tracing::debug!(reclaimer = reclaimer.name(), run_id = %ctx.run_id, "Reclamation pass complete");
            }
            Err(GcError::Cancelled) => break,
            Err(e) => {
                metrics::record_gc_error(reclaimer.name());
                tracing::error!(
                    reclaimer = reclaimer.name(),
                    run_id = %ctx.run_id,
                    error = %e,
                    "Reclamation pass failed"
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!(reclaimer = reclaimer.name(), "Reclaimer stopped");
}
