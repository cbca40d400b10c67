use chrono::Local;
use clusterbar_core::jobs::Job;
use clusterbar_core::states::JobStatus;
use clusterbar_core::summary::{
    ClusterHealth, DEFAULT_RECENT_LIMIT, JobBuckets, PartitionSummary, UserActivity,
    summarize_partitions,
};
use clusterbar_core::utils::bar_segments;
use clusterbar_core::Snapshot;
use colored::*;

const BAR_WIDTH: usize = 20;

/// Whose jobs to show
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// The configured user; their counts drive the status line
    pub user: String,
    /// Show every user's jobs, with a user column
    pub all_users: bool,
}

/// Renders the full status report for a snapshot
pub fn render_report(snapshot: &Snapshot, options: &ReportOptions) -> String {
    let updated = format!(
        "(updated {})",
        snapshot.fetched_at.with_timezone(&Local).format("%H:%M:%S")
    );
    let mut out = format!(
        "{}  {}  {}\n\n",
        health_marker(ClusterHealth::assess(snapshot)),
        status_line(&UserActivity::for_user(&snapshot.jobs, &options.user)).bold(),
        updated.dimmed()
    );

    out.push_str(&render_partitions(&summarize_partitions(&snapshot.nodes)));
    out.push('\n');

    let user_filter = (!options.all_users).then_some(options.user.as_str());
    let buckets = JobBuckets::build(&snapshot.jobs, user_filter, DEFAULT_RECENT_LIMIT);
    out.push_str(&render_jobs(&buckets, options.all_users));

    out
}

fn health_marker(health: ClusterHealth) -> ColoredString {
    match health {
        ClusterHealth::Idle => "●".green(),
        ClusterHealth::Busy => "●".yellow(),
        ClusterHealth::Saturated => "●".red(),
        ClusterHealth::Unknown => "●".white(),
    }
}

/// The short summary a menu bar would show
pub fn status_line(activity: &UserActivity) -> String {
    if activity.is_idle() {
        "🤖 Awaiting Jobs".to_string()
    } else {
        format!("⏳ {} 🏃 {}", activity.pending, activity.running)
    }
}

fn render_partitions(partitions: &[PartitionSummary]) -> String {
    if partitions.is_empty() {
        return format!("{}\n", "No nodes reported".dimmed());
    }

    let name_width = partitions
        .iter()
        .map(|p| p.partition.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for partition in partitions {
        out.push_str(&format!(
            "👥 {:<width$} {} {} available, {} busy",
            partition.partition,
            idle_bar(partition.idle, partition.total),
            partition.idle,
            partition.allocated,
            width = name_width
        ));
        if partition.drained > 0 {
            out.push_str(&format!(", {}", format!("{} drained", partition.drained).yellow()));
        }
        if partition.down > 0 {
            out.push_str(&format!(", {}", format!("{} down", partition.down).red()));
        }
        out.push('\n');
    }
    out
}

/// A bar whose filled part is the idle share of a partition
fn idle_bar(idle: usize, total: usize) -> String {
    if total == 0 {
        return format!("│{}│", " ".repeat(BAR_WIDTH));
    }

    let bar = bar_segments(BAR_WIDTH, idle as f64 / total as f64);
    let mut filled = "█".repeat(bar.full);
    if let Some(partial) = bar.partial {
        filled.push(partial);
    }
    format!("│{}{}│", filled.green(), " ".repeat(bar.empty))
}

fn render_jobs(buckets: &JobBuckets<'_>, show_user: bool) -> String {
    let mut out = String::new();

    if buckets.running.is_empty() {
        out.push_str(&format!("{}\n", "No running jobs".dimmed()));
    } else {
        out.push_str(&format!("{}\n", "🟢 Running".bold()));
        for job in &buckets.running {
            out.push_str(&format!("   {}\n", job_line(job, show_user)));
        }
    }

    if !buckets.pending.is_empty() {
        out.push_str(&format!("{}\n", "⏳ Queued".bold()));
        for job in &buckets.pending {
            out.push_str(&format!("   {}\n", job_line(job, show_user)));
        }
    }

    out.push('\n');

    if buckets.recent.is_empty() {
        out.push_str(&format!("{}\n", "No recent jobs".dimmed()));
    } else {
        out.push_str(&format!("{}\n", "📋 Recent".bold()));
        for job in &buckets.recent {
            out.push_str(&format!(
                "   {} {}\n",
                status_glyph(job.status),
                job_line(job, show_user)
            ));
        }
    }
    out
}

fn job_line(job: &Job, show_user: bool) -> String {
    let line = format!("{}: {} ({})", job.id, job.name, job.age_string);
    if show_user {
        format!("{} (User: {})", line, job.user)
    } else {
        line
    }
}

fn status_glyph(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Completed => "✅",
        JobStatus::Failed => "❌",
        JobStatus::Cancelled => "⛔️",
        JobStatus::Timeout => "⌛",
        _ => "❓",
    }
}
