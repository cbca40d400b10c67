//! The shell command lines sent to the cluster, and helpers for reading their output.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ClusterError;
use crate::monitor::LogKind;

/// One line per node group: `NodeList State Partition`
pub const NODE_LIST_COMMAND: &str = "sinfo -h -o '%N %T %P'";

/// Live queue first, then the last week of accounting, both `|`-delimited.
/// The order matters: the job parser lets the first line for an id win.
/// A failing squeue fails the whole listing, so a lost queue never reads as an empty one.
pub const JOB_LIST_COMMAND: &str = "squeue -h -o '%i|%u|%j|%t|%M|%P|%N' && \
     sacct -n -X -P -S now-7days -o JobID,User,JobName,State,Elapsed | tail -n 200";

pub fn cancel_command(job_id: &str) -> Result<String, ClusterError> {
    Ok(format!("scancel {}", validate_job_id(job_id)?))
}

pub fn job_detail_command(job_id: &str) -> Result<String, ClusterError> {
    Ok(format!("scontrol show job {}", validate_job_id(job_id)?))
}

/// Builds the command that prints a log file, single-quoting the path for the remote shell
pub fn read_file_command(path: &str) -> String {
    format!("cat '{}'", path.replace('\'', r"'\''"))
}

/// Accepts plain ids as well as array (`123_4`, `123_[1-5]`), het (`123+1`) and step (`123.0`)
/// forms; everything else is rejected before it reaches a shell.
pub fn validate_job_id(job_id: &str) -> Result<&str, ClusterError> {
    let job_id = job_id.trim();
    let valid = !job_id.is_empty()
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-' | '[' | ']'));

    if valid {
        Ok(job_id)
    } else {
        Err(ClusterError::InvalidJobId(job_id.to_string()))
    }
}

/// Pulls the `StdOut=` or `StdErr=` path out of `scontrol show job` output
pub fn extract_log_path(job_detail: &str, kind: LogKind) -> Option<String> {
    static STDOUT: OnceLock<Regex> = OnceLock::new();
    static STDERR: OnceLock<Regex> = OnceLock::new();

    let re = match kind {
        LogKind::Stdout => STDOUT.get_or_init(|| {
            Regex::new(r"(?:^|\s)StdOut=(\S+)").expect("Failed to compile StdOut regex")
        }),
        LogKind::Stderr => STDERR.get_or_init(|| {
            Regex::new(r"(?:^|\s)StdErr=(\S+)").expect("Failed to compile StdErr regex")
        }),
    };

    re.captures(job_detail)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::remote::{LocalExecutor, RemoteExecutor};
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    const SCONTROL_OUTPUT: &str = "JobId=4242 JobName=train\n   UserId=bob(1001) GroupId=bob(1001)\n   \
        WorkDir=/home/bob\n   StdErr=/home/bob/slurm-4242.err\n   StdIn=/dev/null\n   \
        StdOut=/home/bob/slurm-4242.out\n";

    #[test]
    fn extracts_stdout_and_stderr() {
        assert_eq!(
            extract_log_path(SCONTROL_OUTPUT, LogKind::Stdout).as_deref(),
            Some("/home/bob/slurm-4242.out")
        );
        assert_eq!(
            extract_log_path(SCONTROL_OUTPUT, LogKind::Stderr).as_deref(),
            Some("/home/bob/slurm-4242.err")
        );
    }

    #[test]
    fn missing_field_gives_none() {
        assert_eq!(extract_log_path("JobId=1 JobName=x", LogKind::Stdout), None);
    }

    #[test]
    fn job_ids_are_validated() {
        assert!(validate_job_id("4242").is_ok());
        assert!(validate_job_id("4242_7").is_ok());
        assert!(validate_job_id("4242_[1-5]").is_ok());
        assert!(matches!(
            validate_job_id("42; rm -rf ~"),
            Err(ClusterError::InvalidJobId(_))
        ));
        assert!(matches!(validate_job_id(""), Err(ClusterError::InvalidJobId(_))));
    }

    #[test]
    fn command_lines() -> Result<(), ClusterError> {
        assert_eq!(cancel_command("17")?, "scancel 17");
        assert_eq!(job_detail_command(" 17 ")?, "scontrol show job 17");
        Ok(())
    }

    #[test]
    fn file_paths_are_quoted() {
        assert_eq!(read_file_command("/tmp/a b.out"), "cat '/tmp/a b.out'");
        assert_eq!(read_file_command("/tmp/it's.out"), r"cat '/tmp/it'\''s.out'");
    }

    #[test]
    fn squeue_runs_before_sacct() {
        let squeue = JOB_LIST_COMMAND.find("squeue").unwrap();
        let sacct = JOB_LIST_COMMAND.find("sacct").unwrap();
        assert!(squeue < sacct);
    }

    /// Runs the job listing with fake scheduler binaries first on PATH
    async fn run_job_listing(name: &str, squeue_body: &str) -> Result<String, TransportError> {
        let dir = std::env::temp_dir().join(format!("clusterbar-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for (binary, body) in [
            ("squeue", squeue_body),
            ("sacct", "echo '41|amy|done|COMPLETED|01:00:00'"),
        ] {
            let path = dir.join(binary);
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let executor = LocalExecutor::new(Duration::from_secs(10));
        let command = format!("PATH='{}':\"$PATH\"; {}", dir.display(), JOB_LIST_COMMAND);
        let result = executor.execute(&command).await;
        std::fs::remove_dir_all(&dir).unwrap();
        result
    }

    #[tokio::test]
    async fn failing_squeue_fails_the_job_listing() {
        let result = run_job_listing("squeue-down", "exit 1").await;
        assert!(matches!(
            result,
            Err(TransportError::ExitStatus { status: Some(1), .. })
        ));
    }

    #[tokio::test]
    async fn job_listing_merges_queue_and_accounting() {
        let output = run_job_listing("squeue-up", "echo '42|bob|train|R|00:01:00|gpu|gpu01'")
            .await
            .unwrap();
        assert_eq!(
            output,
            "42|bob|train|R|00:01:00|gpu|gpu01\n41|amy|done|COMPLETED|01:00:00\n"
        );
    }
}
