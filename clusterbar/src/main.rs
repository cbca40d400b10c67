pub mod config;
pub mod logging;
pub mod report;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use clusterbar_core::{
    ClusterError, ClusterMonitor, LocalExecutor, LogKind, RemoteExecutor, SshExecutor, SshTarget,
};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::config::{Config, Connection, Overrides};
use crate::report::{ReportOptions, render_report};

/// The main entry point for the `clusterbar` utility
///
/// Loads the configuration, picks an executor (ssh or local) and runs the requested command
/// against the cluster.
fn main() -> Result<(), String> {
    let args = Args::parse();
    logging::init(args.debug);

    let config = config::load(args.config.as_deref(), args.overrides())?;
    debug!(?config, "resolved configuration");

    if config.no_color {
        colored::control::set_override(false);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {}", e))?;

    match config.connection.clone() {
        Connection::Ssh {
            host,
            port,
            identity_file,
        } => {
            let target = SshTarget {
                host,
                port,
                user: config.user.clone(),
                identity_file,
            };
            let executor = SshExecutor::new(target, config.command_timeout);
            runtime.block_on(run(args.command, &config, executor))
        }
        Connection::Local => {
            let executor = LocalExecutor::new(config.command_timeout);
            runtime.block_on(run(args.command, &config, executor))
        }
    }
}

async fn run<E>(command: Command, config: &Config, executor: E) -> Result<(), String>
where
    E: RemoteExecutor + 'static,
{
    let monitor = Arc::new(ClusterMonitor::new(executor));

    match command {
        Command::Status { all, json } => {
            let snapshot = monitor
                .refresh()
                .await
                .map_err(|e| format!("refresh failed: {}", e))?;
            if json {
                let text = serde_json::to_string_pretty(snapshot.as_ref())
                    .map_err(|e| format!("Failed to serialize snapshot: {}", e))?;
                println!("{}", text);
            } else {
                print!("{}", render_report(&snapshot, &report_options(config, all)));
            }
            Ok(())
        }
        Command::Watch { interval, all } => {
            let period = interval
                .map(std::time::Duration::from_secs)
                .unwrap_or(config.refresh_interval);
            if period.is_zero() {
                return Err("The refresh interval must be at least one second.".to_string());
            }
            watch(monitor, period, report_options(config, all)).await
        }
        Command::Cancel { job_id } => {
            monitor
                .cancel_job(&job_id)
                .await
                .map_err(|e| e.to_string())?;
            println!("Cancelled job {}", job_id);
            Ok(())
        }
        Command::Log { job_id, stderr } => {
            let kind = if stderr { LogKind::Stderr } else { LogKind::Stdout };
            let contents = monitor
                .fetch_log(&job_id, kind)
                .await
                .map_err(|e| e.to_string())?;
            print!("{}", contents);
            Ok(())
        }
    }
}

fn report_options(config: &Config, all: bool) -> ReportOptions {
    ReportOptions {
        user: config.user.clone(),
        all_users: all || config.show_all_users,
    }
}

/// Refreshes on a fixed period and reprints the report whenever a new snapshot is published
///
/// Each tick spawns its refresh, so a slow cluster never delays the timer; a tick that finds
/// a refresh still running is dropped. Failed refreshes are logged and the last report stays.
async fn watch<E>(
    monitor: Arc<ClusterMonitor<E>>,
    period: std::time::Duration,
    options: ReportOptions,
) -> Result<(), String>
where
    E: RemoteExecutor + 'static,
{
    let mut published = monitor.subscribe();
    let renderer = tokio::spawn(async move {
        while published.changed().await.is_ok() {
            let snapshot = published.borrow_and_update().clone();
            if let Some(snapshot) = snapshot {
                // clear the screen and home the cursor
                print!("\x1B[2J\x1B[H{}", render_report(&snapshot, &options));
            }
        }
    });

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let monitor = Arc::clone(&monitor);
                tokio::spawn(async move {
                    match monitor.try_refresh().await {
                        Ok(_) => {}
                        Err(ClusterError::Busy) => debug!("previous refresh still running, skipping tick"),
                        Err(err) => warn!(error = %err, "refresh failed"),
                    }
                });
            }
            result = tokio::signal::ctrl_c() => {
                result.map_err(|e| format!("Failed to listen for Ctrl-C: {}", e))?;
                break;
            }
        }
    }

    renderer.abort();
    Ok(())
}

const HELP: &str = "it polls a Slurm cluster over ssh and shows its partitions and your jobs";

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    after_help = HELP,
    after_long_help = format!("{}\n\n{}", HELP, clusterbar_core::AUTHOR_HELP),
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true)]
    #[arg(help = "Login host of the cluster")]
    host: Option<String>,

    #[arg(short, long, global = true)]
    #[arg(help = "SSH port (default 22)")]
    port: Option<u16>,

    #[arg(short, long, global = true)]
    #[arg(help = "Remote user name; also selects whose jobs are shown. Defaults to the current user.")]
    user: Option<String>,

    #[arg(short, long, global = true)]
    #[arg(value_name = "PATH")]
    #[arg(help = "Private key passed to ssh with -i")]
    identity_file: Option<PathBuf>,

    #[arg(long, global = true)]
    #[arg(value_name = "SECS")]
    #[arg(help = "Give up on a remote command after this many seconds (default 30)")]
    timeout: Option<u64>,

    #[arg(long, global = true)]
    #[arg(help = "Run the Slurm commands on this machine instead of over ssh")]
    local: bool,

    #[arg(short, long, global = true)]
    #[arg(value_name = "PATH")]
    #[arg(help = "Config file (default $XDG_CONFIG_HOME/clusterbar/clusterbar.toml)")]
    config: Option<PathBuf>,

    #[arg(long, hide = true, global = true)]
    #[arg(help = "Prints debug-level logging steps to terminal")]
    debug: bool,

    #[arg(long, global = true)]
    #[arg(help = "Disable colors in output")]
    no_color: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            identity_file: self.identity_file.clone(),
            refresh_interval_secs: match self.command {
                Command::Watch { interval, .. } => interval,
                _ => None,
            },
            command_timeout_secs: self.timeout,
            show_all_users: false,
            no_color: self.no_color,
            local: self.local,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh once and print partitions and jobs
    Status {
        #[arg(short, long)]
        #[arg(help = "Show jobs of all users, not just yours")]
        all: bool,

        #[arg(long)]
        #[arg(help = "Print the snapshot as JSON")]
        json: bool,
    },
    /// Refresh periodically and redraw the report until Ctrl-C
    Watch {
        #[arg(short = 'n', long)]
        #[arg(value_name = "SECS")]
        #[arg(help = "Seconds between refreshes (default 60)")]
        interval: Option<u64>,

        #[arg(short, long)]
        #[arg(help = "Show jobs of all users, not just yours")]
        all: bool,
    },
    /// Cancel a job with scancel
    Cancel {
        #[arg(help = "The job id to cancel")]
        job_id: String,
    },
    /// Print a job's output file
    Log {
        #[arg(help = "The job id whose log to print")]
        job_id: String,

        #[arg(short, long)]
        #[arg(help = "Print the stderr file instead of stdout")]
        stderr: bool,
    },
}
