//! Client for the container and volume APIs running on each worker.
//!
//! The reclaimer only ever lists handles and asks for handles to be
//! destroyed; creating containers or volumes is the scheduler's business.

#[cfg(feature = "native-http")]
mod http;

use async_trait::async_trait;
#[cfg(feature = "native-http")]
pub use http::HttpWorkerClient;
use thiserror::Error;

use crate::models::Worker;

#[derive(Debug, Error)]
pub enum WorkerClientError {
    /// The handle does not exist on the worker. Callers destroying a handle
    /// treat this as success.
    #[error("Handle not found on worker")]
    NotFound,

    #[error("Worker {0} has no address for this API")]
    NoAddress(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Worker returned status {0}")]
    Status(u16),

    #[error("Worker request timed out")]
    Timeout,
}

#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Every container handle the worker currently has.
    async fn list_containers(&self, worker: &Worker) -> Result<Vec<String>, WorkerClientError>;

    /// Every volume handle the worker currently has.
    async fn list_volumes(&self, worker: &Worker) -> Result<Vec<String>, WorkerClientError>;

    async fn destroy_container(
        &self,
        worker: &Worker,
        handle: &str,
    ) -> Result<(), WorkerClientError>;

    async fn destroy_volume(&self, worker: &Worker, handle: &str)
    -> Result<(), WorkerClientError>;
}
