mod builds;
mod containers;
mod handles;
mod pipelines;
mod resource_caches;
mod versions;
mod volumes;
mod workers;

pub use builds::*;
pub use containers::*;
pub use handles::*;
pub use pipelines::*;
pub use resource_caches::*;
pub use versions::*;
pub use volumes::*;
pub use workers::*;
