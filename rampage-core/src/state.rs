use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Lifecycle of a run.
///
/// `Pending -> Ramping(0) -> .. -> Ramping(n) -> Draining -> Completed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Pending,
    Ramping(usize),
    Draining,
    Completed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Pending => write!(f, "pending"),
            RunState::Ramping(stage) => write!(f, "ramping (stage {})", stage + 1),
            RunState::Draining => write!(f, "draining"),
            RunState::Completed => write!(f, "completed"),
        }
    }
}

/// Controller state as of its latest tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    pub state: RunState,
    pub elapsed: Duration,
    pub active_users: usize,
    pub desired_users: usize,
}
