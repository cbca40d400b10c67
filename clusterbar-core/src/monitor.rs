use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::{debug, info, warn};

use crate::commands::{
    JOB_LIST_COMMAND, NODE_LIST_COMMAND, cancel_command, extract_log_path, job_detail_command,
    read_file_command,
};
use crate::error::ClusterError;
use crate::jobs::{Job, parse_job_list};
use crate::nodes::{Node, parse_node_list};
use crate::remote::RemoteExecutor;

/// One consistent view of the cluster, built from a single refresh
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub jobs: Vec<Job>,
    pub fetched_at: DateTime<Utc>,
}

/// Which of a job's output streams to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Stdout,
    Stderr,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogKind::Stdout => write!(f, "stdout"),
            LogKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// Polls the scheduler through a `RemoteExecutor` and publishes snapshots
///
/// A refresh fetches nodes and jobs concurrently and publishes only when both succeed, by a
/// single replace of the shared snapshot. A failed refresh leaves the last published snapshot
/// in place. Refreshes never overlap: `refresh` waits for an in-flight one, `try_refresh`
/// gives up with `ClusterError::Busy`.
pub struct ClusterMonitor<E> {
    executor: E,
    published: watch::Sender<Option<Arc<Snapshot>>>,
    refresh_lock: Mutex<()>,
}

impl<E: RemoteExecutor> ClusterMonitor<E> {
    pub fn new(executor: E) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            executor,
            published,
            refresh_lock: Mutex::new(()),
        }
    }

    /// The last successfully published snapshot, if any
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.published.borrow().clone()
    }

    /// A receiver that is notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.published.subscribe()
    }

    /// Refreshes after any in-flight refresh has finished
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, ClusterError> {
        let guard = self.refresh_lock.lock().await;
        self.refresh_locked(guard).await
    }

    /// Refreshes unless one is already in flight, in which case this returns `Busy` at once
    pub async fn try_refresh(&self) -> Result<Arc<Snapshot>, ClusterError> {
        let guard = self
            .refresh_lock
            .try_lock()
            .map_err(|_| ClusterError::Busy)?;
        self.refresh_locked(guard).await
    }

    async fn refresh_locked(
        &self,
        _guard: MutexGuard<'_, ()>,
    ) -> Result<Arc<Snapshot>, ClusterError> {
        let snapshot = match self.fetch().await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(err) => {
                warn!(error = %err, "refresh failed, keeping previous snapshot");
                return Err(err);
            }
        };

        info!(
            nodes = snapshot.nodes.len(),
            jobs = snapshot.jobs.len(),
            "publishing snapshot"
        );
        self.published.send_replace(Some(Arc::clone(&snapshot)));
        Ok(snapshot)
    }

    /// Fetches and parses a new snapshot without publishing it
    ///
    /// When both fetches fail, the node listing error is the one reported.
    pub async fn fetch(&self) -> Result<Snapshot, ClusterError> {
        let (node_output, job_output) = tokio::join!(
            self.executor.execute(NODE_LIST_COMMAND),
            self.executor.execute(JOB_LIST_COMMAND),
        );
        let node_output = node_output?;
        let job_output = job_output?;

        let nodes = parse_node_list(&node_output);
        let jobs = parse_job_list(&job_output);
        debug!(nodes = nodes.len(), jobs = jobs.len(), "parsed scheduler output");

        Ok(Snapshot {
            nodes,
            jobs,
            fetched_at: Utc::now(),
        })
    }

    pub async fn cancel_job(&self, job_id: &str) -> Result<(), ClusterError> {
        let command = cancel_command(job_id)?;
        self.executor.execute(&command).await?;
        info!(job_id, "cancelled job");
        Ok(())
    }

    /// Reads a job's stdout or stderr file by asking scontrol where it is
    pub async fn fetch_log(&self, job_id: &str, kind: LogKind) -> Result<String, ClusterError> {
        let detail = self.executor.execute(&job_detail_command(job_id)?).await?;

        let path = extract_log_path(&detail, kind).ok_or_else(|| ClusterError::LogNotFound {
            job_id: job_id.trim().to_string(),
            kind,
        })?;
        debug!(job_id, %kind, path, "reading job log");

        Ok(self.executor.execute(&read_file_command(&path)).await?)
    }
}
