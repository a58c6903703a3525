mod build;
mod container;
mod volume;
mod worker;

pub use build::*;
pub use container::*;
use serde::{Deserialize, Serialize};
pub use volume::*;
pub use worker::*;

/// Outcome of a conditional state transition.
///
/// Losing a race to a concurrent reclaimer is not an error: the row either
/// moved on already or disappeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Transitioned,
    AlreadyTransitioned,
    NotFound,
}

impl Transition {
    pub fn applied(&self) -> bool {
        matches!(self, Transition::Transitioned)
    }
}

/// Which kind of worker-side object a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Container,
    Volume,
}

impl HandleKind {
    /// Plural name, used as metric label and log field.
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleKind::Container => "containers",
            HandleKind::Volume => "volumes",
        }
    }
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
