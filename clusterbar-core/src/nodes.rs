use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::parser::{expand_hostlist, split_node_groups};
use crate::states::{NodeStatus, strip_not_responding};

/// A single compute node as reported by sinfo
///
/// Names are not guaranteed unique: a node listed under several partitions appears once per
/// partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub name: String,
    pub status: NodeStatus,
    pub partition: String,
    /// False when sinfo flagged the node as not responding
    pub responding: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
enum LineSkip {
    #[error("expected at least 3 fields, found {0}")]
    TooFewFields(usize),
}

/// Parses the output of the node listing command into one `Node` per expanded node name
///
/// Lines look like `node[01-04],gpu07 mixed general compute`; everything after the state is
/// the partition. Lines with fewer than three fields are skipped.
pub fn parse_node_list(output: &str) -> Vec<Node> {
    let mut nodes = Vec::new();

    for line in output.lines().filter(|line| !line.trim().is_empty()) {
        match parse_node_line(line) {
            Ok(parsed) => nodes.extend(parsed),
            Err(skip) => debug!(line, reason = %skip, "skipping node line"),
        }
    }
    nodes
}

fn parse_node_line(line: &str) -> Result<Vec<Node>, LineSkip> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [names, state, partition @ ..] = fields.as_slice() else {
        return Err(LineSkip::TooFewFields(fields.len()));
    };
    if partition.is_empty() {
        return Err(LineSkip::TooFewFields(fields.len()));
    }

    // classify strips the marker itself, exactly once
    let (_, responding) = strip_not_responding(state);
    let status = NodeStatus::classify(state);
    let partition = partition.join(" ");

    Ok(split_node_groups(names)
        .iter()
        .flat_map(|group| expand_hostlist(group))
        .map(|name| Node {
            name,
            status,
            partition: partition.clone(),
            responding,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn expands_groups_sharing_status_and_partition() {
        let nodes = parse_node_list("node[1-3,5],gpu7 mixed compute\n");
        assert_eq!(
            names(&nodes),
            vec!["node01", "node02", "node03", "node05", "gpu07"]
        );
        assert!(nodes.iter().all(|n| n.status == NodeStatus::Allocated));
        assert!(nodes.iter().all(|n| n.partition == "compute"));
    }

    #[test]
    fn partition_keeps_embedded_spaces() {
        let nodes = parse_node_list("a01 idle long running pool");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].partition, "long running pool");
    }

    #[test]
    fn short_lines_are_skipped_without_aborting() {
        let output = "a[1-2] idle gpu\nbroken idle\n\nb3 down cpu\n";
        let nodes = parse_node_list(output);
        assert_eq!(names(&nodes), vec!["a01", "a02", "b03"]);
        assert_eq!(nodes[2].status, NodeStatus::Down);
    }

    #[test]
    fn not_responding_marker_is_recorded() {
        let nodes = parse_node_list("c1 idle* cpu\nc2 idle cpu");
        assert_eq!(nodes[0].status, NodeStatus::Idle);
        assert!(!nodes[0].responding);
        assert!(nodes[1].responding);
    }

    #[test]
    fn only_one_marker_is_stripped() {
        let nodes = parse_node_list("c1 idle** cpu");
        assert_eq!(nodes[0].status, NodeStatus::Unknown);
        assert!(!nodes[0].responding);
    }

    #[test]
    fn order_follows_input() {
        let nodes = parse_node_list("z1 idle p\na1 down p");
        assert_eq!(names(&nodes), vec!["z01", "a01"]);
    }

    #[test]
    fn overlapping_partitions_produce_duplicates() {
        let nodes = parse_node_list("n1 idle short\nn1 idle long");
        assert_eq!(names(&nodes), vec!["n01", "n01"]);
    }

    #[test]
    fn empty_output_gives_no_nodes() {
        assert!(parse_node_list("").is_empty());
    }
}
