use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::parser::parse_age;
use crate::states::JobStatus;

/// Placeholder for the columns sacct does not report
pub const UNKNOWN_FIELD: &str = "unknown";

/// Minimum number of `|`-separated fields shared by the squeue and sacct formats
const MIN_JOB_FIELDS: usize = 5;

/// A Slurm job, either still queued (squeue) or recently finished (sacct)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: String,
    pub user: String,
    pub name: String,
    pub status: JobStatus,
    /// The raw elapsed-time token, e.g. `01:02:03`
    pub age_string: String,
    /// Elapsed time in seconds, 0 when `age_string` could not be parsed
    pub age: u64,
    pub partition: String,
    pub node_name: String,
}

impl Job {
    /// The job id as a number, 0 for ids like `1234_5` that are not plain integers
    pub fn numeric_id(&self) -> u64 {
        self.id.parse::<u64>().unwrap_or(0)
    }

    /// A cancellation that never ran is noise left over from the scheduler
    fn is_instant_cancellation(&self) -> bool {
        self.age == 0 && self.status == JobStatus::Cancelled
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
enum LineSkip {
    #[error("expected at least 5 fields, found {0}")]
    TooFewFields(usize),
    #[error("job was cancelled before it started")]
    InstantCancellation,
}

/// Parses the concatenated squeue and sacct output into a deduplicated job list
///
/// Live squeue lines come first in the input, so the first line seen for an id wins and
/// sacct only fills in jobs that have left the queue. The result is sorted by numeric job id,
/// newest first.
pub fn parse_job_list(output: &str) -> Vec<Job> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut jobs: Vec<Job> = Vec::new();

    for line in output.lines().filter(|line| !line.trim().is_empty()) {
        let job = match parse_job_line(line) {
            Ok(job) => job,
            Err(skip) => {
                debug!(line, reason = %skip, "skipping job line");
                continue;
            }
        };

        if seen.insert(job.id.clone()) {
            jobs.push(job);
        }
    }

    // stable, so equal ids (all non-numeric ones) keep their input order
    jobs.sort_by(|a, b| b.numeric_id().cmp(&a.numeric_id()));
    jobs
}

fn parse_job_line(line: &str) -> Result<Job, LineSkip> {
    let fields: Vec<&str> = line.trim_end_matches('\r').split('|').collect();
    if fields.len() < MIN_JOB_FIELDS {
        return Err(LineSkip::TooFewFields(fields.len()));
    }

    let optional = |index: usize| {
        fields
            .get(index)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .unwrap_or(UNKNOWN_FIELD)
            .to_string()
    };

    let age_string = fields[4].trim().to_string();
    let job = Job {
        id: fields[0].trim().to_string(),
        user: fields[1].trim().to_string(),
        name: fields[2].trim().to_string(),
        status: JobStatus::classify(fields[3]),
        age: parse_age(&age_string),
        age_string,
        partition: optional(5),
        node_name: optional(6),
    };

    if job.is_instant_cancellation() {
        return Err(LineSkip::InstantCancellation);
    }
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(jobs: &[Job]) -> Vec<&str> {
        jobs.iter().map(|j| j.id.as_str()).collect()
    }

    #[test]
    fn live_queue_wins_over_accounting() {
        let output = "42|bob|job1|R|00:01:00|part|node1\n42|bob|job1|CD|00:05:00\n";
        let jobs = parse_job_list(output);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Running);
        assert_eq!(jobs[0].age, 60);
        assert_eq!(jobs[0].partition, "part");
        assert_eq!(jobs[0].node_name, "node1");
    }

    #[test]
    fn accounting_fills_in_finished_jobs() {
        let output = "43|bob|live|R|00:00:10|part|node1\n41|amy|done|COMPLETED|01:00:00\n";
        let jobs = parse_job_list(output);
        assert_eq!(ids(&jobs), vec!["43", "41"]);
        assert_eq!(jobs[1].status, JobStatus::Completed);
        assert_eq!(jobs[1].partition, UNKNOWN_FIELD);
        assert_eq!(jobs[1].node_name, UNKNOWN_FIELD);
    }

    #[test]
    fn instant_cancellations_are_dropped() {
        let output = "1|bob|a|CANCELLED by 500|00:00:00\n2|bob|b|R|00:00:00|p|n1\n";
        let jobs = parse_job_list(output);
        assert_eq!(ids(&jobs), vec!["2"]);
        assert_eq!(jobs[0].status, JobStatus::Running);
    }

    #[test]
    fn cancellation_after_running_is_kept() {
        let jobs = parse_job_list("3|bob|a|CA|00:00:05\n");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Cancelled);
    }

    #[test]
    fn sorted_by_numeric_id_descending() {
        let output = "7|u|a|R|0:00:01\n42|u|b|R|0:00:01\n3|u|c|R|0:00:01\n";
        assert_eq!(ids(&parse_job_list(output)), vec!["42", "7", "3"]);
    }

    #[test]
    fn non_numeric_ids_sort_as_zero() {
        let output = "100_2|u|a|R|0:00:01\n5|u|b|R|0:00:01\n";
        assert_eq!(ids(&parse_job_list(output)), vec!["5", "100_2"]);
    }

    #[test]
    fn short_lines_are_skipped() {
        let output = "9|u|a|R\n10|u|b|PD|0:00:00|gpu|\n";
        let jobs = parse_job_list(output);
        assert_eq!(ids(&jobs), vec!["10"]);
        assert_eq!(jobs[0].status, JobStatus::Pending);
        assert_eq!(jobs[0].partition, "gpu");
        assert_eq!(jobs[0].node_name, UNKNOWN_FIELD);
    }

    #[test]
    fn unparseable_age_is_zero() {
        let jobs = parse_job_list("11|u|a|R|1-02:00:00|p|n\n");
        assert_eq!(jobs[0].age, 0);
        assert_eq!(jobs[0].age_string, "1-02:00:00");
    }

    #[test]
    fn unknown_status_does_not_abort() {
        let jobs = parse_job_list("12|u|a|NODE_FAIL|00:10:00\n13|u|b|R|00:00:01|p|n\n");
        assert_eq!(ids(&jobs), vec!["13", "12"]);
        assert_eq!(jobs[1].status, JobStatus::Unknown);
    }

    #[test]
    fn carriage_returns_are_tolerated() {
        let jobs = parse_job_list("14|u|a|R|00:00:01|p|n7\r\n");
        assert_eq!(jobs[0].node_name, "n7");
    }
}
