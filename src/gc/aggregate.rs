use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use super::{GcError, Reclaimer, RunContext, run_pass};
use crate::observability::metrics;

/// Runs a full reclamation pass.
///
/// `sequential` reclaimers run one after another in order, then `parallel`
/// reclaimers run concurrently. A failing reclaimer never stops the others;
/// every failure is logged and the first one is returned.
pub struct AggregateCollector {
    sequential: Vec<Arc<dyn Reclaimer>>,
    parallel: Vec<Arc<dyn Reclaimer>>,
}

impl AggregateCollector {
    pub fn new(sequential: Vec<Arc<dyn Reclaimer>>, parallel: Vec<Arc<dyn Reclaimer>>) -> Self {
        Self {
            sequential,
            parallel,
        }
    }
}

fn note_failure(name: &'static str, error: GcError, first: &mut Option<GcError>) {
    tracing::error!(reclaimer = name, error = %error, "Reclaimer failed");
    metrics::record_gc_error(name);
    first.get_or_insert(error);
}

#[async_trait]
impl Reclaimer for AggregateCollector {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    async fn run(&self, ctx: &RunContext) -> Result<(), GcError> {
        let mut first = None;

        for reclaimer in &self.sequential {
            ctx.check_cancelled()?;
            if let Err(e) = run_pass(reclaimer.as_ref(), ctx).await {
                note_failure(reclaimer.name(), e, &mut first);
            }
        }

        ctx.check_cancelled()?;
        let results = join_all(self.parallel.iter().map(|reclaimer| async move {
            (reclaimer.name(), run_pass(reclaimer.as_ref(), ctx).await)
        }))
        .await;

        for (name, result) in results {
            if let Err(e) = result {
                note_failure(name, e, &mut first);
            }
        }

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
