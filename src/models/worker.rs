use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Running,
    /// Missed its heartbeats; its reports cannot be trusted.
    Stalled,
    Landing,
    Landed,
    Retiring,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Running => "running",
            WorkerState::Stalled => "stalled",
            WorkerState::Landing => "landing",
            WorkerState::Landed => "landed",
            WorkerState::Retiring => "retiring",
        }
    }
}

impl std::str::FromStr for WorkerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(WorkerState::Running),
            "stalled" => Ok(WorkerState::Stalled),
            "landing" => Ok(WorkerState::Landing),
            "landed" => Ok(WorkerState::Landed),
            "retiring" => Ok(WorkerState::Retiring),
            _ => Err(format!("Invalid worker state: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub name: String,
    pub state: WorkerState,
    /// Container runtime API address, e.g. `10.0.0.5:7777`.
    pub garden_addr: Option<String>,
    /// Volume manager base URL, e.g. `http://10.0.0.5:7788`.
    pub baggageclaim_url: Option<String>,
}
