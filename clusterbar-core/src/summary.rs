//! Derived views over a snapshot, for status lines and menus.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::jobs::Job;
use crate::monitor::Snapshot;
use crate::nodes::Node;
use crate::states::{JobStatus, NodeStatus};

/// Failed jobs younger than this stay in the recent list
pub const RECENT_FAILURE_WINDOW_SECS: u64 = 24 * 60 * 60;

pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// Node counts for one partition
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionSummary {
    pub partition: String,
    pub total: usize,
    pub idle: usize,
    pub allocated: usize,
    pub drained: usize,
    pub down: usize,
    pub unknown: usize,
}

impl PartitionSummary {
    fn count(&mut self, status: NodeStatus) {
        self.total += 1;
        match status {
            NodeStatus::Idle => self.idle += 1,
            NodeStatus::Allocated => self.allocated += 1,
            NodeStatus::Drained => self.drained += 1,
            NodeStatus::Down => self.down += 1,
            NodeStatus::Unknown => self.unknown += 1,
        }
    }
}

/// Groups nodes by partition, ordered by partition name
pub fn summarize_partitions(nodes: &[Node]) -> Vec<PartitionSummary> {
    let mut by_partition: BTreeMap<&str, PartitionSummary> = BTreeMap::new();

    for node in nodes {
        by_partition
            .entry(node.partition.as_str())
            .or_insert_with(|| PartitionSummary {
                partition: node.partition.clone(),
                ..Default::default()
            })
            .count(node.status);
    }
    by_partition.into_values().collect()
}

/// Jobs split the way a status menu shows them
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JobBuckets<'a> {
    pub running: Vec<&'a Job>,
    pub pending: Vec<&'a Job>,
    /// Finished jobs, longest-running first, capped at the requested limit
    pub recent: Vec<&'a Job>,
}

impl<'a> JobBuckets<'a> {
    /// Buckets `jobs`, keeping only `user`'s jobs when a user is given
    pub fn build(jobs: &'a [Job], user: Option<&str>, recent_limit: usize) -> Self {
        let visible: Vec<&Job> = jobs
            .iter()
            .filter(|job| user.is_none_or(|user| job.user == user))
            .collect();

        let running = visible
            .iter()
            .copied()
            .filter(|job| job.status == JobStatus::Running)
            .collect();
        let pending = visible
            .iter()
            .copied()
            .filter(|job| job.status == JobStatus::Pending)
            .collect();

        let mut recent: Vec<&Job> = visible
            .iter()
            .copied()
            .filter(|job| {
                !job.status.is_active()
                    || (job.status == JobStatus::Failed && job.age < RECENT_FAILURE_WINDOW_SECS)
            })
            .collect();
        recent.sort_by(|a, b| b.age.cmp(&a.age));
        recent.truncate(recent_limit);

        Self {
            running,
            pending,
            recent,
        }
    }
}

/// Overall load, as a traffic light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClusterHealth {
    /// Every node is idle
    Idle,
    /// Some nodes are free and nothing is waiting
    Busy,
    /// Jobs are queued or no node is idle
    Saturated,
    /// No nodes reported
    Unknown,
}

impl ClusterHealth {
    pub fn assess(snapshot: &Snapshot) -> Self {
        if snapshot.nodes.is_empty() {
            return ClusterHealth::Unknown;
        }
        let idle = snapshot
            .nodes
            .iter()
            .filter(|node| node.status == NodeStatus::Idle)
            .count();
        let queued = snapshot
            .jobs
            .iter()
            .any(|job| job.status == JobStatus::Pending);

        if idle == snapshot.nodes.len() {
            ClusterHealth::Idle
        } else if queued || idle == 0 {
            ClusterHealth::Saturated
        } else {
            ClusterHealth::Busy
        }
    }
}

/// Running and pending job counts for one user
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserActivity {
    pub running: usize,
    pub pending: usize,
}

impl UserActivity {
    pub fn for_user(jobs: &[Job], user: &str) -> Self {
        jobs.iter()
            .filter(|job| job.user == user)
            .fold(UserActivity::default(), |mut activity, job| {
                match job.status {
                    JobStatus::Running => activity.running += 1,
                    JobStatus::Pending => activity.pending += 1,
                    _ => {}
                }
                activity
            })
    }

    pub fn is_idle(&self) -> bool {
        self.running == 0 && self.pending == 0
    }
}
