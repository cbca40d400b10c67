use std::fmt;

use serde::Serialize;

/// Marker sinfo appends to the state of a node that is not responding
const NOT_RESPONDING_MARKER: char = '*';

/// Normalized node state; mixed nodes are folded into `Allocated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NodeStatus {
    Idle,
    Allocated,
    Drained,
    Down,
    Unknown,
}

impl NodeStatus {
    /// Classifies a raw sinfo state token, ignoring case and the not-responding marker
    pub fn classify(raw: &str) -> Self {
        let (state, _) = strip_not_responding(raw);
        match state.to_ascii_lowercase().as_str() {
            "idle" => NodeStatus::Idle,
            "allocated" | "mixed" => NodeStatus::Allocated,
            "drained" => NodeStatus::Drained,
            "down" => NodeStatus::Down,
            _ => NodeStatus::Unknown,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Idle => write!(f, "idle"),
            NodeStatus::Allocated => write!(f, "allocated"),
            NodeStatus::Drained => write!(f, "drained"),
            NodeStatus::Down => write!(f, "down"),
            NodeStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Strips a single trailing not-responding marker, reporting whether the node responds
pub fn strip_not_responding(raw: &str) -> (&str, bool) {
    match raw.strip_suffix(NOT_RESPONDING_MARKER) {
        Some(state) => (state, false),
        None => (raw, true),
    }
}

/// Normalized job state
///
/// squeue reports compact codes (`R`, `PD`) and sacct the long names (`RUNNING`, `PENDING`),
/// so both alphabets are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum JobStatus {
    Running,
    Pending,
    Suspended,
    Completed,
    Cancelled,
    Failed,
    Timeout,
    /// A catch-all for any state we don't explicitly handle.
    Unknown,
}

impl JobStatus {
    pub fn classify(raw: &str) -> Self {
        let state = raw.trim().to_ascii_uppercase();

        // sacct reports e.g. "CANCELLED by 1234"
        if state.starts_with("CANCELLED") {
            return JobStatus::Cancelled;
        }

        match state.as_str() {
            "R" | "RUNNING" => JobStatus::Running,
            "PD" | "PENDING" => JobStatus::Pending,
            "S" | "SUSPENDED" => JobStatus::Suspended,
            "C" | "CD" | "COMPLETED" => JobStatus::Completed,
            "CA" => JobStatus::Cancelled,
            "F" | "FAILED" => JobStatus::Failed,
            "TO" | "TIMEOUT" => JobStatus::Timeout,
            _ => JobStatus::Unknown,
        }
    }

    /// Jobs that still hold or wait for resources
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Running | JobStatus::Pending)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Running => "running",
            JobStatus::Pending => "pending",
            JobStatus::Suspended => "suspended",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Failed => "failed",
            JobStatus::Timeout => "timeout",
            JobStatus::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}
