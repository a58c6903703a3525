//! In-memory repositories for reclaimer unit tests.
//!
//! Each fake mirrors the conditional semantics of its SQLite counterpart
//! closely enough for the reclaimers' control flow to be exercised, and can
//! be told to fail individual operations.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{
    db::{
        BuildRepo, ContainerRepo, DbError, DbResult, HandleRepo, PipelineRepo,
        ResourceCacheLifecycleRepo, VersionRepo, VersionScope, VolumeRepo, WorkerRepo,
    },
    models::{
        Build, BuildStatus, Container, ContainerState, Job, JobRetention, OrphanedContainers,
        OrphanedVolumes, Page, Pipeline, Transition, Volume, VolumeState, Worker, WorkerState,
    },
    worker_client::{WorkerClient, WorkerClientError},
};

/// Named operations that should return an error.
#[derive(Default)]
pub struct Failures(Mutex<HashSet<&'static str>>);

impl Failures {
    pub fn fail(&self, op: &'static str) {
        self.0.lock().insert(op);
    }

    fn check(&self, op: &'static str) -> DbResult<()> {
        if self.0.lock().contains(op) {
            Err(DbError::Internal(format!("injected failure in {op}")))
        } else {
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Containers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub container: Container,
    pub orphaned: bool,
    pub missing_since: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct FakeContainerRepo {
    rows: Mutex<Vec<FakeContainer>>,
    pub failures: Failures,
}

impl FakeContainerRepo {
    pub fn insert(&self, handle: &str, worker: &str, state: ContainerState) -> i64 {
        self.push(handle, worker, state, false, None)
    }

    pub fn insert_orphan(&self, handle: &str, worker: &str, state: ContainerState) -> i64 {
        self.push(handle, worker, state, true, None)
    }

    pub fn insert_hijacked_orphan(
        &self,
        handle: &str,
        worker: &str,
        state: ContainerState,
        last_hijack: DateTime<Utc>,
    ) -> i64 {
        self.push(handle, worker, state, true, Some(last_hijack))
    }

    fn push(
        &self,
        handle: &str,
        worker: &str,
        state: ContainerState,
        orphaned: bool,
        last_hijack: Option<DateTime<Utc>>,
    ) -> i64 {
        let mut rows = self.rows.lock();
        let id = rows.iter().map(|r| r.container.id).max().unwrap_or(0) + 1;
        rows.push(FakeContainer {
            container: Container {
                id,
                handle: handle.to_string(),
                worker_name: worker.to_string(),
                state,
                last_hijack,
            },
            orphaned,
            missing_since: None,
        });
        id
    }

    pub fn state_of(&self, handle: &str) -> Option<ContainerState> {
        self.rows
            .lock()
            .iter()
            .find(|r| r.container.handle == handle)
            .map(|r| r.container.state)
    }

    pub fn missing_since(&self, handle: &str) -> Option<DateTime<Utc>> {
        self.rows
            .lock()
            .iter()
            .find(|r| r.container.handle == handle)
            .and_then(|r| r.missing_since)
    }

    pub fn set_missing_since(&self, handle: &str, at: DateTime<Utc>) {
        if let Some(row) = self
            .rows
            .lock()
            .iter_mut()
            .find(|r| r.container.handle == handle)
        {
            row.missing_since = Some(at);
        }
    }

    pub fn handles(&self) -> Vec<String> {
        let mut handles: Vec<String> = self
            .rows
            .lock()
            .iter()
            .map(|r| r.container.handle.clone())
            .collect();
        handles.sort();
        handles
    }

    fn transition(
        &self,
        id: i64,
        from: ContainerState,
        to: ContainerState,
    ) -> DbResult<Transition> {
        if !from.can_transition_to(to) {
            return Err(DbError::Validation(format!(
                "container cannot move from {} to {}",
                from, to
            )));
        }
        let mut rows = self.rows.lock();
        let Some(row) = rows.iter_mut().find(|r| r.container.id == id) else {
            return Ok(Transition::NotFound);
        };
        if row.container.state != from {
            return Ok(Transition::AlreadyTransitioned);
        }
        row.container.state = to;
        Ok(Transition::Transitioned)
    }
}

fn container_may_go_missing(state: ContainerState) -> bool {
    matches!(
        state,
        ContainerState::Creating | ContainerState::Created | ContainerState::Discontinued
    )
}

#[async_trait]
impl HandleRepo for FakeContainerRepo {
    async fn destroy_unknown(&self, worker_name: &str, live_handles: &[String]) -> DbResult<u64> {
        self.failures.check("destroy_unknown")?;
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|r| {
            !(r.container.worker_name == worker_name
                && r.container.state == ContainerState::Destroying
                && !live_handles.contains(&r.container.handle))
        });
        Ok((before - rows.len()) as u64)
    }

    async fn update_missing_since(
        &self,
        worker_name: &str,
        live_handles: &[String],
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        self.failures.check("update_missing_since")?;
        for row in self
            .rows
            .lock()
            .iter_mut()
            .filter(|r| r.container.worker_name == worker_name)
        {
            if live_handles.contains(&row.container.handle) {
                row.missing_since = None;
            } else if container_may_go_missing(row.container.state) && row.missing_since.is_none()
            {
                row.missing_since = Some(now);
            }
        }
        Ok(())
    }

    async fn remove_missing(&self, missing_before: DateTime<Utc>) -> DbResult<u64> {
        self.failures.check("remove_missing")?;
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|r| {
            !(container_may_go_missing(r.container.state)
                && r.missing_since.is_some_and(|at| at < missing_before))
        });
        Ok((before - rows.len()) as u64)
    }

    async fn find_destroying(&self, worker_name: &str) -> DbResult<Vec<String>> {
        self.failures.check("find_destroying")?;
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|r| {
                r.container.worker_name == worker_name
                    && r.container.state == ContainerState::Destroying
            })
            .map(|r| r.container.handle.clone())
            .collect())
    }

    async fn register_unknown(&self, worker_name: &str, live_handles: &[String]) -> DbResult<u64> {
        self.failures.check("register_unknown")?;
        let known: HashSet<String> = self
            .rows
            .lock()
            .iter()
            .map(|r| r.container.handle.clone())
            .collect();
        let mut inserted = 0;
        for handle in live_handles.iter().filter(|h| !known.contains(*h)) {
            self.insert(handle, worker_name, ContainerState::Destroying);
            inserted += 1;
        }
        Ok(inserted)
    }
}

#[async_trait]
impl ContainerRepo for FakeContainerRepo {
    async fn find_orphaned(&self) -> DbResult<OrphanedContainers> {
        self.failures.check("find_orphaned")?;
        Ok(OrphanedContainers::partition(
            self.rows
                .lock()
                .iter()
                .filter(|r| r.orphaned)
                .map(|r| r.container.clone()),
        ))
    }

    async fn destroy_failed(&self) -> DbResult<u64> {
        self.failures.check("destroy_failed")?;
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|r| r.container.state != ContainerState::Failed);
        Ok((before - rows.len()) as u64)
    }

    async fn mark_destroying(&self, id: i64, from: ContainerState) -> DbResult<Transition> {
        self.failures.check("mark_destroying")?;
        self.transition(id, from, ContainerState::Destroying)
    }

    async fn mark_discontinued(&self, id: i64) -> DbResult<Transition> {
        self.failures.check("mark_discontinued")?;
        self.transition(id, ContainerState::Created, ContainerState::Discontinued)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Volumes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FakeVolume {
    pub volume: Volume,
    pub orphaned: bool,
    pub parent_id: Option<i64>,
    pub missing_since: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct FakeVolumeRepo {
    rows: Mutex<Vec<FakeVolume>>,
    pub failures: Failures,
}

impl FakeVolumeRepo {
    pub fn insert(&self, handle: &str, worker: &str, state: VolumeState) -> i64 {
        self.push(handle, worker, state, false, None)
    }

    pub fn insert_orphan(&self, handle: &str, worker: &str, state: VolumeState) -> i64 {
        self.push(handle, worker, state, true, None)
    }

    pub fn insert_child(&self, handle: &str, worker: &str, parent_id: i64) -> i64 {
        self.push(handle, worker, VolumeState::Created, false, Some(parent_id))
    }

    fn push(
        &self,
        handle: &str,
        worker: &str,
        state: VolumeState,
        orphaned: bool,
        parent_id: Option<i64>,
    ) -> i64 {
        let mut rows = self.rows.lock();
        let id = rows.iter().map(|r| r.volume.id).max().unwrap_or(0) + 1;
        rows.push(FakeVolume {
            volume: Volume {
                id,
                handle: handle.to_string(),
                worker_name: worker.to_string(),
                state,
            },
            orphaned,
            parent_id,
            missing_since: None,
        });
        id
    }

    pub fn state_of(&self, handle: &str) -> Option<VolumeState> {
        self.rows
            .lock()
            .iter()
            .find(|r| r.volume.handle == handle)
            .map(|r| r.volume.state)
    }

    pub fn handles(&self) -> Vec<String> {
        let mut handles: Vec<String> = self
            .rows
            .lock()
            .iter()
            .map(|r| r.volume.handle.clone())
            .collect();
        handles.sort();
        handles
    }

    pub fn set_missing_since(&self, handle: &str, at: DateTime<Utc>) {
        if let Some(row) = self
            .rows
            .lock()
            .iter_mut()
            .find(|r| r.volume.handle == handle)
        {
            row.missing_since = Some(at);
        }
    }

    fn has_children(rows: &[FakeVolume], id: i64) -> bool {
        rows.iter().any(|r| r.parent_id == Some(id))
    }
}

fn volume_may_go_missing(state: VolumeState) -> bool {
    matches!(state, VolumeState::Creating | VolumeState::Created)
}

#[async_trait]
impl HandleRepo for FakeVolumeRepo {
    async fn destroy_unknown(&self, worker_name: &str, live_handles: &[String]) -> DbResult<u64> {
        self.failures.check("destroy_unknown")?;
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|r| {
            !(r.volume.worker_name == worker_name
                && r.volume.state == VolumeState::Destroying
                && !live_handles.contains(&r.volume.handle))
        });
        Ok((before - rows.len()) as u64)
    }

    async fn update_missing_since(
        &self,
        worker_name: &str,
        live_handles: &[String],
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        self.failures.check("update_missing_since")?;
        for row in self
            .rows
            .lock()
            .iter_mut()
            .filter(|r| r.volume.worker_name == worker_name)
        {
            if live_handles.contains(&row.volume.handle) {
                row.missing_since = None;
            } else if volume_may_go_missing(row.volume.state) && row.missing_since.is_none() {
                row.missing_since = Some(now);
            }
        }
        Ok(())
    }

    async fn remove_missing(&self, missing_before: DateTime<Utc>) -> DbResult<u64> {
        self.failures.check("remove_missing")?;
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|r| {
            !(volume_may_go_missing(r.volume.state)
                && r.missing_since.is_some_and(|at| at < missing_before))
        });
        Ok((before - rows.len()) as u64)
    }

    async fn find_destroying(&self, worker_name: &str) -> DbResult<Vec<String>> {
        self.failures.check("find_destroying")?;
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|r| {
                r.volume.worker_name == worker_name && r.volume.state == VolumeState::Destroying
            })
            .map(|r| r.volume.handle.clone())
            .collect())
    }

    async fn register_unknown(&self, worker_name: &str, live_handles: &[String]) -> DbResult<u64> {
        self.failures.check("register_unknown")?;
        let known: HashSet<String> = self
            .rows
            .lock()
            .iter()
            .map(|r| r.volume.handle.clone())
            .collect();
        let mut inserted = 0;
        for handle in live_handles.iter().filter(|h| !known.contains(*h)) {
            self.insert(handle, worker_name, VolumeState::Destroying);
            inserted += 1;
        }
        Ok(inserted)
    }
}

#[async_trait]
impl VolumeRepo for FakeVolumeRepo {
    async fn find_orphaned(&self) -> DbResult<OrphanedVolumes> {
        self.failures.check("find_orphaned")?;
        let rows = self.rows.lock();
        Ok(OrphanedVolumes::partition(
            rows.iter()
                .filter(|r| r.orphaned && !Self::has_children(&rows, r.volume.id))
                .map(|r| r.volume.clone()),
        ))
    }

    async fn destroy_failed(&self) -> DbResult<u64> {
        self.failures.check("destroy_failed")?;
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|r| r.volume.state != VolumeState::Failed);
        Ok((before - rows.len()) as u64)
    }

    async fn mark_destroying(&self, id: i64) -> DbResult<Transition> {
        self.failures.check("mark_destroying")?;
        let mut rows = self.rows.lock();
        let pinned = Self::has_children(&rows, id);
        let Some(row) = rows.iter_mut().find(|r| r.volume.id == id) else {
            return Ok(Transition::NotFound);
        };
        if row.volume.state != VolumeState::Created || pinned {
            return Ok(Transition::AlreadyTransitioned);
        }
        row.volume.state = VolumeState::Destroying;
        Ok(Transition::Transitioned)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resource caches and versions
// ─────────────────────────────────────────────────────────────────────────────

/// Records the order stages were invoked in and returns a fixed count for
/// each.
#[derive(Default)]
pub struct FakeResourceCacheRepo {
    pub calls: Mutex<Vec<&'static str>>,
    pub failures: Failures,
}

impl FakeResourceCacheRepo {
    fn stage(&self, name: &'static str) -> DbResult<u64> {
        self.calls.lock().push(name);
        self.failures.check(name)?;
        Ok(1)
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ResourceCacheLifecycleRepo for FakeResourceCacheRepo {
    async fn clean_build_image_caches(&self) -> DbResult<u64> {
        self.stage("clean_build_image_caches")
    }

    async fn clean_uses_for_finished_builds(&self) -> DbResult<u64> {
        self.stage("clean_uses_for_finished_builds")
    }

    async fn clean_unreferenced_caches(&self) -> DbResult<u64> {
        self.stage("clean_unreferenced_caches")
    }

    async fn clean_unreferenced_configs(&self) -> DbResult<u64> {
        self.stage("clean_unreferenced_configs")
    }

    async fn clean_expired_check_sessions(&self, _now: DateTime<Utc>) -> DbResult<u64> {
        self.stage("clean_expired_check_sessions")
    }

    async fn clean_inactive_check_sessions(&self) -> DbResult<u64> {
        self.stage("clean_inactive_check_sessions")
    }
}

/// Versions per resource config: `(check_order)` values, baseline is 0.
#[derive(Default)]
pub struct FakeVersionRepo {
    pub versions: Mutex<BTreeMap<i64, Vec<i64>>>,
    pub failures: Failures,
}

impl FakeVersionRepo {
    pub fn insert_scope(&self, resource_config_id: i64, count: i64) {
        self.versions
            .lock()
            .insert(resource_config_id, (0..=count).collect());
    }

    pub fn remaining(&self, resource_config_id: i64) -> Vec<i64> {
        self.versions
            .lock()
            .get(&resource_config_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl VersionRepo for FakeVersionRepo {
    async fn scopes_exceeding(&self, keep: u32) -> DbResult<Vec<VersionScope>> {
        self.failures.check("scopes_exceeding")?;
        Ok(self
            .versions
            .lock()
            .iter()
            .filter_map(|(id, orders)| {
                let count = orders.iter().filter(|o| **o != 0).count() as u64;
                (count > u64::from(keep)).then_some(VersionScope {
                    resource_config_id: *id,
                    version_count: count,
                })
            })
            .collect())
    }

    async fn prune_versions(&self, resource_config_id: i64, keep: u32) -> DbResult<u64> {
        self.failures.check("prune_versions")?;
        let mut versions = self.versions.lock();
        let Some(orders) = versions.get_mut(&resource_config_id) else {
            return Ok(0);
        };
        let mut ranked: Vec<i64> = orders.iter().copied().filter(|o| *o != 0).collect();
        ranked.sort_unstable_by(|a, b| b.cmp(a));
        let kept: HashSet<i64> = ranked.into_iter().take(keep as usize).collect();
        let before = orders.len();
        orders.retain(|o| *o == 0 || kept.contains(o));
        Ok((before - orders.len()) as u64)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipelines and builds
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeBuildStore {
    pub pipelines: Mutex<Vec<Pipeline>>,
    pub jobs: Mutex<Vec<Job>>,
    pub builds: Mutex<Vec<Build>>,
    /// Build ids whose events were deleted, in call order.
    pub reaped: Mutex<Vec<i64>>,
    /// Events each build carries. Unset means one.
    pub events_per_build: Mutex<Option<u64>>,
    pub non_interceptible: Mutex<u64>,
    pub failures: Failures,
}

impl FakeBuildStore {
    pub fn add_pipeline(&self, id: i64, paused: bool) {
        self.pipelines.lock().push(Pipeline {
            id,
            name: format!("pipeline-{id}"),
            paused,
        });
    }

    pub fn add_job(&self, id: i64, pipeline_id: i64, first_logged: i64, retention: JobRetention) {
        self.jobs.lock().push(Job {
            id,
            pipeline_id,
            name: format!("job-{id}"),
            first_logged_build_id: first_logged,
            retention,
        });
    }

    pub fn add_build(&self, job_id: i64, id: i64, status: BuildStatus, end_time: Option<DateTime<Utc>>) {
        self.builds.lock().push(Build {
            id,
            job_id: Some(job_id),
            status,
            end_time,
            drained: false,
            reap_time: None,
        });
    }

    pub fn set_drained(&self, id: i64) {
        if let Some(build) = self.builds.lock().iter_mut().find(|b| b.id == id) {
            build.drained = true;
        }
    }

    pub fn first_logged(&self, job_id: i64) -> i64 {
        self.jobs
            .lock()
            .iter()
            .find(|j| j.id == job_id)
            .map(|j| j.first_logged_build_id)
            .unwrap_or_default()
    }

    pub fn reaped(&self) -> Vec<i64> {
        let mut ids = self.reaped.lock().clone();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl PipelineRepo for FakeBuildStore {
    async fn unpaused_pipelines(&self) -> DbResult<Vec<Pipeline>> {
        self.failures.check("unpaused_pipelines")?;
        Ok(self
            .pipelines
            .lock()
            .iter()
            .filter(|p| !p.paused)
            .cloned()
            .collect())
    }

    async fn jobs(&self, pipeline_id: i64) -> DbResult<Vec<Job>> {
        self.failures.check("jobs")?;
        Ok(self
            .jobs
            .lock()
            .iter()
            .filter(|j| j.pipeline_id == pipeline_id)
            .cloned()
            .collect())
    }

    async fn update_first_logged_build_id(&self, job_id: i64, build_id: i64) -> DbResult<bool> {
        self.failures.check("update_first_logged_build_id")?;
        let mut jobs = self.jobs.lock();
        let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) else {
            return Ok(false);
        };
        if job.first_logged_build_id >= build_id {
            return Ok(false);
        }
        job.first_logged_build_id = build_id;
        Ok(true)
    }
}

#[async_trait]
impl BuildRepo for FakeBuildStore {
    async fn job_builds(&self, job_id: i64, page: Page) -> DbResult<Vec<Build>> {
        self.failures.check("job_builds")?;
        let mut builds: Vec<Build> = self
            .builds
            .lock()
            .iter()
            .filter(|b| b.job_id == Some(job_id))
            .cloned()
            .collect();
        builds.sort_by_key(|b| b.id);
        let limit = page.limit as usize;

        let mut window: Vec<Build> = match (page.since, page.until) {
            (_, Some(until)) => builds
                .into_iter()
                .filter(|b| b.id > until)
                .take(limit)
                .collect(),
            (Some(since), None) => builds
                .into_iter()
                .rev()
                .filter(|b| b.id < since)
                .take(limit)
                .collect(),
            (None, None) => builds.into_iter().rev().take(limit).collect(),
        };
        window.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(window)
    }

    async fn latest_succeeded_build_ids(&self, job_id: i64, limit: u32) -> DbResult<Vec<i64>> {
        self.failures.check("latest_succeeded_build_ids")?;
        let mut ids: Vec<i64> = self
            .builds
            .lock()
            .iter()
            .filter(|b| b.job_id == Some(job_id) && b.status == BuildStatus::Succeeded)
            .map(|b| b.id)
            .collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        ids.truncate(limit as usize);
        Ok(ids)
    }

    async fn delete_build_events(&self, build_ids: &[i64]) -> DbResult<u64> {
        self.failures.check("delete_build_events")?;
        self.reaped.lock().extend_from_slice(build_ids);
        let per_build = self.events_per_build.lock().unwrap_or(1);
        Ok(build_ids.len() as u64 * per_build)
    }

    async fn mark_non_interceptible(&self) -> DbResult<u64> {
        self.failures.check("mark_non_interceptible")?;
        let mut count = self.non_interceptible.lock();
        *count += 1;
        Ok(1)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workers
// ─────────────────────────────────────────────────────────────────────────────

pub fn worker(name: &str) -> Worker {
    Worker {
        name: name.to_string(),
        state: WorkerState::Running,
        garden_addr: Some(format!("{name}:7777")),
        baggageclaim_url: Some(format!("http://{name}:7788")),
    }
}

#[derive(Default)]
pub struct FakeWorkerRepo {
    pub workers: Mutex<Vec<Worker>>,
    pub failures: Failures,
}

#[async_trait]
impl WorkerRepo for FakeWorkerRepo {
    async fn reporting_workers(&self) -> DbResult<Vec<Worker>> {
        self.failures.check("reporting_workers")?;
        Ok(self.workers.lock().clone())
    }
}

/// Live handles per worker, as the worker runtime would report them.
#[derive(Default)]
pub struct FakeWorkerClient {
    pub containers: Mutex<BTreeMap<String, Vec<String>>>,
    pub volumes: Mutex<BTreeMap<String, Vec<String>>>,
    /// Workers whose list calls fail.
    pub unreachable: Mutex<HashSet<String>>,
    pub destroyed_containers: Mutex<Vec<String>>,
    pub destroyed_volumes: Mutex<Vec<String>>,
}

impl FakeWorkerClient {
    pub fn set_containers(&self, worker: &str, handles: &[&str]) {
        self.containers.lock().insert(
            worker.to_string(),
            handles.iter().map(|h| h.to_string()).collect(),
        );
    }

    pub fn set_volumes(&self, worker: &str, handles: &[&str]) {
        self.volumes.lock().insert(
            worker.to_string(),
            handles.iter().map(|h| h.to_string()).collect(),
        );
    }

    fn reachable(&self, worker: &Worker) -> Result<(), WorkerClientError> {
        if self.unreachable.lock().contains(&worker.name) {
            Err(WorkerClientError::Status(502))
        } else {
            Ok(())
        }
    }
}

fn take_handle(
    map: &Mutex<BTreeMap<String, Vec<String>>>,
    worker: &str,
    handle: &str,
) -> Result<(), WorkerClientError> {
    let mut map = map.lock();
    let handles = map.entry(worker.to_string()).or_default();
    match handles.iter().position(|h| h == handle) {
        Some(pos) => {
            handles.remove(pos);
            Ok(())
        }
        None => Err(WorkerClientError::NotFound),
    }
}

#[async_trait]
impl WorkerClient for FakeWorkerClient {
    async fn list_containers(&self, worker: &Worker) -> Result<Vec<String>, WorkerClientError> {
        self.reachable(worker)?;
        Ok(self
            .containers
            .lock()
            .get(&worker.name)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_volumes(&self, worker: &Worker) -> Result<Vec<String>, WorkerClientError> {
        self.reachable(worker)?;
        Ok(self
            .volumes
            .lock()
            .get(&worker.name)
            .cloned()
            .unwrap_or_default())
    }

    async fn destroy_container(
        &self,
        worker: &Worker,
        handle: &str,
    ) -> Result<(), WorkerClientError> {
        self.reachable(worker)?;
        self.destroyed_containers.lock().push(handle.to_string());
        take_handle(&self.containers, &worker.name, handle)
    }

    async fn destroy_volume(&self, worker: &Worker, handle: &str) -> Result<(), WorkerClientError> {
        self.reachable(worker)?;
        self.destroyed_volumes.lock().push(handle.to_string());
        take_handle(&self.volumes, &worker.name, handle)
    }
}
