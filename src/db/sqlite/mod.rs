mod builds;
mod common;
mod containers;
mod pipelines;
mod resource_caches;
mod versions;
mod volumes;
mod workers;

pub use builds::SqliteBuildRepo;
pub use containers::SqliteContainerRepo;
pub use pipelines::SqlitePipelineRepo;
pub use resource_caches::SqliteResourceCacheLifecycleRepo;
pub use versions::SqliteVersionRepo;
pub use volumes::SqliteVolumeRepo;
pub use workers::SqliteWorkerRepo;
