//! Reclamation configuration.
//!
//! # Example
//!
//! ```toml
//! [gc]
//! missing_grace_period_secs = 300
//! hijack_grace_period_secs = 300
//! register_unknown_handles = true
//!
//! [gc.intervals]
//! containers_secs = 30
//! build_logs_secs = 300
//!
//! [gc.build_logs]
//! batch_size = 500
//! drain_required = false
//! default_builds = 0
//! max_days = 30
//!
//! [gc.versions]
//! max_versions = 100
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Never retain fewer versions per resource config than this.
pub const MIN_RETAINED_VERSIONS: u32 = 100;

/// Reclamation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GcConfig {
    /// Log what the build log and version reapers would delete without
    /// deleting anything.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,

    /// How long a container or volume may be absent from its worker's
    /// reports before its row is removed.
    /// Default: 300 (5 minutes)
    #[serde(default = "default_missing_grace_period_secs")]
    pub missing_grace_period_secs: u64,

    /// How long a hijacked container is kept after its last hijack.
    /// Default: 300 (5 minutes)
    #[serde(default = "default_hijack_grace_period_secs")]
    pub hijack_grace_period_secs: u64,

    /// Insert handles reported by a worker but unknown to the database as
    /// destroying, so the next sweep removes them from the worker.
    /// Default: true
    #[serde(default = "default_true")]
    pub register_unknown_handles: bool,

    /// How often each reclaimer runs.
    #[serde(default)]
    pub intervals: GcIntervals,

    /// Build event log retention.
    #[serde(default)]
    pub build_logs: BuildLogConfig,

    /// Resource version retention.
    #[serde(default)]
    pub versions: VersionConfig,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            missing_grace_period_secs: default_missing_grace_period_secs(),
            hijack_grace_period_secs: default_hijack_grace_period_secs(),
            register_unknown_handles: true,
            intervals: GcIntervals::default(),
            build_logs: BuildLogConfig::default(),
            versions: VersionConfig::default(),
        }
    }
}

fn default_missing_grace_period_secs() -> u64 {
    300
}

fn default_hijack_grace_period_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl GcConfig {
    pub fn missing_grace_period(&self) -> chrono::Duration {
        secs_to_duration(self.missing_grace_period_secs)
    }

    pub fn hijack_grace_period(&self) -> chrono::Duration {
        secs_to_duration(self.hijack_grace_period_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.intervals.validate()?;
        self.build_logs.validate()?;
        Ok(())
    }
}

/// Saturates at the largest representable duration.
fn secs_to_duration(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Per-reclaimer run intervals, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GcIntervals {
    #[serde(default = "default_fast_interval")]
    pub builds_secs: u64,

    #[serde(default = "default_fast_interval")]
    pub containers_secs: u64,

    #[serde(default = "default_fast_interval")]
    pub volumes_secs: u64,

    #[serde(default = "default_fast_interval")]
    pub cache_configs_secs: u64,

    #[serde(default = "default_slow_interval")]
    pub versions_secs: u64,

    #[serde(default = "default_slow_interval")]
    pub build_logs_secs: u64,
}

impl Default for GcIntervals {
    fn default() -> Self {
        Self {
            builds_secs: default_fast_interval(),
            containers_secs: default_fast_interval(),
            volumes_secs: default_fast_interval(),
            cache_configs_secs: default_fast_interval(),
            versions_secs: default_slow_interval(),
            build_logs_secs: default_slow_interval(),
        }
    }
}

fn default_fast_interval() -> u64 {
    30
}

fn default_slow_interval() -> u64 {
    300
}

impl GcIntervals {
    pub fn builds(&self) -> Duration {
        Duration::from_secs(self.builds_secs)
    }

    pub fn containers(&self) -> Duration {
        Duration::from_secs(self.containers_secs)
    }

    pub fn volumes(&self) -> Duration {
        Duration::from_secs(self.volumes_secs)
    }

    pub fn cache_configs(&self) -> Duration {
        Duration::from_secs(self.cache_configs_secs)
    }

    pub fn versions(&self) -> Duration {
        Duration::from_secs(self.versions_secs)
    }

    pub fn build_logs(&self) -> Duration {
        Duration::from_secs(self.build_logs_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            ("builds_secs", self.builds_secs),
            ("containers_secs", self.containers_secs),
            ("volumes_secs", self.volumes_secs),
            ("cache_configs_secs", self.cache_configs_secs),
            ("versions_secs", self.versions_secs),
            ("build_logs_secs", self.build_logs_secs),
        ];
        for (name, secs) in all {
            if secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "gc.intervals.{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

/// Build event log retention.
///
/// Jobs may set their own `builds`/`days`; the defaults below apply when a
/// job leaves a value unset, and the maxima cap whatever the job asks for.
/// Zero means unset for defaults and uncapped for maxima.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildLogConfig {
    /// Builds examined per job per run.
    /// Default: 500
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Only reap logs that have been drained to long-term storage.
    /// Default: false
    #[serde(default)]
    pub drain_required: bool,

    #[serde(default)]
    pub default_builds: u32,

    #[serde(default)]
    pub default_days: u32,

    #[serde(default)]
    pub max_builds: u32,

    #[serde(default)]
    pub max_days: u32,
}

impl Default for BuildLogConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            drain_required: false,
            default_builds: 0,
            default_days: 0,
            max_builds: 0,
            max_days: 0,
        }
    }
}

fn default_batch_size() -> u32 {
    500
}

impl BuildLogConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Validation(
                "gc.build_logs.batch_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Resource version retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionConfig {
    /// Versions kept per resource config, not counting the baseline.
    /// Values below [`MIN_RETAINED_VERSIONS`] are raised to it.
    /// Default: 100
    #[serde(default = "default_max_versions")]
    pub max_versions: u32,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            max_versions: default_max_versions(),
        }
    }
}

fn default_max_versions() -> u32 {
    MIN_RETAINED_VERSIONS
}

impl VersionConfig {
    pub fn effective_max_versions(&self) -> u32 {
        self.max_versions.max(MIN_RETAINED_VERSIONS)
    }
}
