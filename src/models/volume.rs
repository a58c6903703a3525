use serde::{Deserialize, Serialize};

/// Lifecycle state of a volume row. Volumes have no hijack case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeState {
    Creating,
    Created,
    Destroying,
    Failed,
}

impl VolumeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeState::Creating => "creating",
            VolumeState::Created => "created",
            VolumeState::Destroying => "destroying",
            VolumeState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for VolumeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VolumeState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creating" => Ok(VolumeState::Creating),
            "created" => Ok(VolumeState::Created),
            "destroying" => Ok(VolumeState::Destroying),
            "failed" => Ok(VolumeState::Failed),
            _ => Err(format!("Invalid volume state: {}", s)),
        }
    }
}

/// A volume tracked in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: i64,
    pub handle: String,
    pub worker_name: String,
    pub state: VolumeState,
}

/// Orphaned volumes partitioned by state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanedVolumes {
    pub creating: Vec<Volume>,
    pub created: Vec<Volume>,
    pub destroying: Vec<Volume>,
}

impl OrphanedVolumes {
    pub fn partition(volumes: impl IntoIterator<Item = Volume>) -> Self {
        let mut out = Self::default();
        for volume in volumes {
            match volume.state {
                VolumeState::Creating => out.creating.push(volume),
                VolumeState::Created => out.created.push(volume),
                VolumeState::Destroying => out.destroying.push(volume),
                VolumeState::Failed => {}
            }
        }
        out
    }

    pub fn total(&self) -> usize {
        self.creating.len() + self.created.len() + self.destroying.len()
    }
}
