pub mod commands;
pub mod error;
pub mod jobs;
pub mod monitor;
pub mod nodes;
pub mod parser;
pub mod remote;
pub mod states;
pub mod summary;
pub mod utils;

pub use error::{ClusterError, TransportError};
pub use jobs::{Job, parse_job_list};
pub use monitor::{ClusterMonitor, LogKind, Snapshot};
pub use nodes::{Node, parse_node_list};
pub use remote::{LocalExecutor, RemoteExecutor, SshExecutor, SshTarget};
pub use states::{JobStatus, NodeStatus};

pub static AUTHOR_HELP: &str = "Reports problems and feature requests to the clusterbar maintainers.";
