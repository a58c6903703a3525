use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Pending,
    Started,
    Succeeded,
    Failed,
    Errored,
    Aborted,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Started => "started",
            BuildStatus::Succeeded => "succeeded",
            BuildStatus::Failed => "failed",
            BuildStatus::Errored => "errored",
            BuildStatus::Aborted => "aborted",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, BuildStatus::Pending | BuildStatus::Started)
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BuildStatus::Pending),
            "started" => Ok(BuildStatus::Started),
            "succeeded" => Ok(BuildStatus::Succeeded),
            "failed" => Ok(BuildStatus::Failed),
            "errored" => Ok(BuildStatus::Errored),
            "aborted" => Ok(BuildStatus::Aborted),
            _ => Err(format!("Invalid build status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: i64,
    pub job_id: Option<i64>,
    pub status: BuildStatus,
    pub end_time: Option<DateTime<Utc>>,
    /// Event log has been shipped to long-term storage.
    pub drained: bool,
    pub reap_time: Option<DateTime<Utc>>,
}

impl Build {
    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Whether `days` have elapsed since the build ended. Builds without an
    /// end time never qualify, nor do those whose expiry is past the
    /// representable range.
    pub fn ended_before(&self, now: DateTime<Utc>, days: u32) -> bool {
        self.end_time.is_some_and(|end| {
            end.checked_add_signed(Duration::days(i64::from(days)))
                .is_some_and(|expiry| expiry <= now)
        })
    }
}

/// ID window over a job's builds. Results are always newest first.
///
/// - `until = X`: the `limit` builds with id > X closest to X
/// - `since = X`: the `limit` builds with id < X closest to X
/// - neither: the newest `limit` builds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Page {
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: u32,
}

impl Page {
    pub fn newest(limit: u32) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn since(id: i64, limit: u32) -> Self {
        Self {
            since: Some(id),
            until: None,
            limit,
        }
    }

    pub fn until(id: i64, limit: u32) -> Self {
        Self {
            since: None,
            until: Some(id),
            limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    pub name: String,
    pub paused: bool,
}

/// Per-job build log retention as configured on the job. Zero means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRetention {
    pub builds: u32,
    pub days: u32,
    pub min_succeeded_builds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub pipeline_id: i64,
    pub name: String,
    /// Oldest build whose event log has not been reaped.
    pub first_logged_build_id: i64,
    pub retention: JobRetention,
}
