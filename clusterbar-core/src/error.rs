use std::time::Duration;

use thiserror::Error;

use crate::monitor::LogKind;

/// Failure of a single remote command, as reported by a `RemoteExecutor`
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Command `{command}` exited with status {}: {stderr}", display_status(.status))]
    ExitStatus {
        status: Option<i32>,
        command: String,
        stderr: String,
    },
    #[error("Command `{command}` did not finish within {after:?}")]
    Timeout { command: String, after: Duration },
    #[error("Command `{command}` produced output that is not valid UTF-8")]
    NonUtf8 { command: String },
}

fn display_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        // killed by a signal
        None => "unknown".to_string(),
    }
}

/// Errors surfaced by the public operations of the reconciliation engine
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("No {kind} log path recorded for job {job_id}")]
    LogNotFound { job_id: String, kind: LogKind },
    #[error("'{0}' is not a valid Slurm job id")]
    InvalidJobId(String),
    #[error("A refresh is already in progress")]
    Busy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_message_names_command_and_status() {
        let err = TransportError::ExitStatus {
            status: Some(1),
            command: "sinfo -h".to_string(),
            stderr: "slurm_load_partitions: Unable to contact slurm controller".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("sinfo -h"));
        assert!(message.contains("status 1"));
    }

    #[test]
    fn signal_exit_has_unknown_status() {
        let err = TransportError::ExitStatus {
            status: None,
            command: "squeue".to_string(),
            stderr: String::new(),
        };
        assert!(err.to_string().contains("status unknown"));
    }

    #[test]
    fn log_not_found_names_the_stream() {
        let err = ClusterError::LogNotFound {
            job_id: "42".to_string(),
            kind: LogKind::Stderr,
        };
        assert_eq!(err.to_string(), "No stderr log path recorded for job 42");
    }
}
