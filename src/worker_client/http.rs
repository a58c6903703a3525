use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{WorkerClient, WorkerClientError};
use crate::{config::WorkersConfig, models::Worker};

/// `GET /containers` response from the container runtime.
#[derive(Debug, Deserialize)]
struct ContainerList {
    #[serde(rename = "Handles", default)]
    handles: Vec<String>,
}

/// One entry of the `GET /volumes` response from the volume manager.
#[derive(Debug, Deserialize)]
struct VolumeEntry {
    handle: String,
}

/// [`WorkerClient`] speaking the container runtime and volume manager HTTP
/// APIs directly.
pub struct HttpWorkerClient {
    client: reqwest::Client,
}

impl HttpWorkerClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &WorkersConfig) -> Result<Self, WorkerClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .user_agent(concat!("reclaimer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::new(client))
    }

    fn garden_url(worker: &Worker, path: &str) -> Result<String, WorkerClientError> {
        let addr = worker
            .garden_addr
            .as_deref()
            .ok_or_else(|| WorkerClientError::NoAddress(worker.name.clone()))?;
        Ok(join_url(addr, path))
    }

    fn baggageclaim_url(worker: &Worker, path: &str) -> Result<String, WorkerClientError> {
        let url = worker
            .baggageclaim_url
            .as_deref()
            .ok_or_else(|| WorkerClientError::NoAddress(worker.name.clone()))?;
        Ok(join_url(url, path))
    }

    async fn delete(&self, url: String) -> Result<(), WorkerClientError> {
        let response = self.client.delete(url).send().await.map_err(map_send_error)?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(WorkerClientError::NotFound),
            status => Err(WorkerClientError::Status(status.as_u16())),
        }
    }

    async fn get(&self, url: String) -> Result<reqwest::Response, WorkerClientError> {
        let response = self.client.get(url).send().await.map_err(map_send_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(WorkerClientError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

/// The container runtime address is registered without a scheme.
fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}{path}")
    } else {
        format!("http://{base}{path}")
    }
}

fn map_send_error(e: reqwest::Error) -> WorkerClientError {
    if e.is_timeout() {
        WorkerClientError::Timeout
    } else {
        WorkerClientError::Http(e)
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn list_containers(&self, worker: &Worker) -> Result<Vec<String>, WorkerClientError> {
        let url = Self::garden_url(worker, "/containers")?;
        let list: ContainerList = self.get(url).await?.json().await?;
        Ok(list.handles)
    }

    async fn list_volumes(&self, worker: &Worker) -> Result<Vec<String>, WorkerClientError> {
        let url = Self::baggageclaim_url(worker, "/volumes")?;
        let entries: Vec<VolumeEntry> = self.get(url).await?.json().await?;
        Ok(entries.into_iter().map(|v| v.handle).collect())
    }

    async fn destroy_container(
        &self,
        worker: &Worker,
        handle: &str,
    ) -> Result<(), WorkerClientError> {
        let url = Self::garden_url(worker, &format!("/containers/{handle}"))?;
        self.delete(url).await
    }

    async fn destroy_volume(
        &self,
        worker: &Worker,
        handle: &str,
    ) -> Result<(), WorkerClientError> {
        let url = Self::baggageclaim_url(worker, &format!("/volumes/{handle}"))?;
        self.delete(url).await
    }
}
