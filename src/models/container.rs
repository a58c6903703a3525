use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a container row.
///
/// States only move forward: `Creating -> Created -> [Discontinued ->] Destroying`.
/// `Failed` is terminal and reached only when creation on the worker errored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    Creating,
    Created,
    /// Orphaned while an operator still had an interactive session attached.
    Discontinued,
    Destroying,
    Failed,
}

impl ContainerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Creating => "creating",
            ContainerState::Created => "created",
            ContainerState::Discontinued => "discontinued",
            ContainerState::Destroying => "destroying",
            ContainerState::Failed => "failed",
        }
    }

    /// Whether a conditional update from `self` to `next` is a legal forward move.
    pub fn can_transition_to(&self, next: ContainerState) -> bool {
        matches!(
            (self, next),
            (ContainerState::Creating, ContainerState::Created)
                | (ContainerState::Creating, ContainerState::Failed)
                | (ContainerState::Created, ContainerState::Discontinued)
                | (ContainerState::Created, ContainerState::Destroying)
                | (ContainerState::Discontinued, ContainerState::Destroying)
        )
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContainerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creating" => Ok(ContainerState::Creating),
            "created" => Ok(ContainerState::Created),
            "discontinued" => Ok(ContainerState::Discontinued),
            "destroying" => Ok(ContainerState::Destroying),
            "failed" => Ok(ContainerState::Failed),
            _ => Err(format!("Invalid container state: {}", s)),
        }
    }
}

/// A container tracked in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: i64,
    pub handle: String,
    pub worker_name: String,
    pub state: ContainerState,
    /// Last time an operator attached an interactive session, if ever.
    pub last_hijack: Option<DateTime<Utc>>,
}

/// What the reclaimer should do with an orphaned container on this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanDisposition {
    /// Hijacked recently; keep it running but stop handing it out.
    Discontinue,
    Destroy,
    Leave,
}

impl Container {
    /// Decide the next step for this container given that it has no owner.
    pub fn orphan_disposition(&self, now: DateTime<Utc>, hijack_grace: Duration) -> OrphanDisposition {
        let within_grace = self
            .last_hijack
            .is_some_and(|hijacked_at| now - hijacked_at < hijack_grace);

        match self.state {
            ContainerState::Created if within_grace => OrphanDisposition::Discontinue,
            ContainerState::Created => OrphanDisposition::Destroy,
            ContainerState::Discontinued if within_grace => OrphanDisposition::Leave,
            ContainerState::Discontinued => OrphanDisposition::Destroy,
            ContainerState::Creating | ContainerState::Destroying | ContainerState::Failed => {
                OrphanDisposition::Leave
            }
        }
    }
}

/// Orphaned containers partitioned by state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanedContainers {
    pub creating: Vec<Container>,
    pub created: Vec<Container>,
    pub discontinued: Vec<Container>,
    pub destroying: Vec<Container>,
}

impl OrphanedContainers {
    /// Sort a flat list into per-state buckets. Failed rows are dropped.
    pub fn partition(containers: impl IntoIterator<Item = Container>) -> Self {
        let mut out = Self::default();
        for container in containers {
            match container.state {
                ContainerState::Creating => out.creating.push(container),
                ContainerState::Created => out.created.push(container),
                ContainerState::Discontinued => out.discontinued.push(container),
                ContainerState::Destroying => out.destroying.push(container),
                ContainerState::Failed => {}
            }
        }
        out
    }

    pub fn total(&self) -> usize {
        self.creating.len() + self.created.len() + self.discontinued.len() + self.destroying.len()
    }
}
