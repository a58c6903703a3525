use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use super::{GcError, HandleSyncer, PhaseErrors, Reclaimer, RunContext};
use crate::{
    config::GcConfig,
    db::{HandleRepo, WorkerRepo},
    models::{HandleKind, Worker},
    worker_client::{WorkerClient, WorkerClientError},
};

/// Talks to every reporting worker: tells it to destroy the handles the
/// store has marked Destroying, then feeds its live handle lists to the
/// handle syncers.
///
/// Worker call failures are logged and otherwise ignored; the next sweep
/// retries. A worker whose handles cannot be listed is skipped rather than
/// treated as empty.
pub struct WorkerSweeper {
    workers: Arc<dyn WorkerRepo>,
    client: Arc<dyn WorkerClient>,
    container_handles: Arc<dyn HandleRepo>,
    volume_handles: Arc<dyn HandleRepo>,
    container_syncer: HandleSyncer,
    volume_syncer: HandleSyncer,
    request_timeout: Duration,
}

impl WorkerSweeper {
    pub fn new(
        workers: Arc<dyn WorkerRepo>,
        client: Arc<dyn WorkerClient>,
        container_handles: Arc<dyn HandleRepo>,
        volume_handles: Arc<dyn HandleRepo>,
        gc: &GcConfig,
        request_timeout: Duration,
    ) -> Self {
        let grace = gc.missing_grace_period();
        Self {
            container_syncer: HandleSyncer::new(
                HandleKind::Container,
                container_handles.clone(),
                grace,
                gc.register_unknown_handles,
            ),
            volume_syncer: HandleSyncer::new(
                HandleKind::Volume,
                volume_handles.clone(),
                grace,
                gc.register_unknown_handles,
            ),
            workers,
            client,
            container_handles,
            volume_handles,
            request_timeout,
        }
    }

    async fn sweep_worker(&self, worker: &Worker) -> Result<(), GcError> {
        for (kind, repo, syncer) in [
            (
                HandleKind::Container,
                &self.container_handles,
                &self.container_syncer,
            ),
            (HandleKind::Volume, &self.volume_handles, &self.volume_syncer),
        ] {
            for handle in repo.find_destroying(&worker.name).await? {
                self.destroy(kind, worker, &handle).await;
            }

            let live = self.list(kind, worker).await;
            let result = syncer.sync(&worker.name, live.as_deref()).await?;
            if result.destroyed > 0 || result.purged > 0 || result.registered > 0 {
                tracing::debug!(
                    worker = %worker.name,
                    kind = %kind,
                    destroyed = result.destroyed,
                    purged = result.purged,
                    registered = result.registered,
                    "Synced worker handles"
                );
            }
        }
        Ok(())
    }

    /// Destroy one handle on the worker. Not-found is success.
    async fn destroy(&self, kind: HandleKind, worker: &Worker, handle: &str) {
        let call = match kind {
            HandleKind::Container => self.client.destroy_container(worker, handle),
            HandleKind::Volume => self.client.destroy_volume(worker, handle),
        };

        let error = match tokio::time::timeout(self.request_timeout, call).await {
            Ok(Ok(())) | Ok(Err(WorkerClientError::NotFound)) => return,
            Ok(Err(e)) => e,
            Err(_) => WorkerClientError::Timeout,
        };

        tracing::warn!(
            worker = %worker.name,
            kind = %kind,
            handle,
            error = %error,
            "Failed to destroy handle on worker"
        );
    }

    /// The worker's complete handle list, or `None` if it could not be
    /// fetched.
    async fn list(&self, kind: HandleKind, worker: &Worker) -> Option<Vec<String>> {
        let call = match kind {
            HandleKind::Container => self.client.list_containers(worker),
            HandleKind::Volume => self.client.list_volumes(worker),
        };

        let error = match tokio::time::timeout(self.request_timeout, call).await {
            Ok(Ok(handles)) => return Some(handles),
            Ok(Err(e)) => e,
            Err(_) => WorkerClientError::Timeout,
        };

        tracing::warn!(
            worker = %worker.name,
            kind = %kind,
            error = %error,
            "Failed to list handles on worker"
        );
        None
    }
}

#[async_trait]
impl Reclaimer for WorkerSweeper {
    fn name(&self) -> &'static str {
        "workers"
    }

    async fn run(&self, ctx: &RunContext) -> Result<(), GcError> {
        let workers = self.workers.reporting_workers().await?;
        let mut errors = PhaseErrors::new(self.name());

        for worker in &workers {
            ctx.check_cancelled()?;
            let result = self.sweep_worker(worker).await;
            errors.check("sweep", result);
        }

        errors.finish()
    }
}
