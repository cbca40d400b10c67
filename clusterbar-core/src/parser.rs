use std::ops::RangeInclusive;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::warn;

/// Node numbers are rendered at this width, whatever width the scheduler printed
const NODE_NUMBER_WIDTH: usize = 2;

/// Larger subranges are skipped; no real partition comes close
const MAX_SUBRANGE_NODES: u64 = 65_536;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostlistError {
    #[error("'{0}' is not a valid range bound")]
    InvalidBound(String),
    #[error("unbalanced brackets in '{0}'")]
    Unbalanced(String),
    #[error("range '{0}' names more than 65536 nodes")]
    TooLarge(String),
}

/// Splits a comma-separated list of node groups, leaving commas inside brackets alone
///
/// # Examples
///
/// * `"node[1-3,5],gpu01"` -> `["node[1-3,5]", "gpu01"]`
pub fn split_node_groups(field: &str) -> Vec<String> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut bracket_level = 0i32;

    for ch in field.chars() {
        match ch {
            '[' => bracket_level += 1,
            ']' => bracket_level -= 1,
            ',' if bracket_level == 0 => {
                if !current.trim().is_empty() {
                    groups.push(current.trim().to_string());
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    if !current.trim().is_empty() {
        groups.push(current.trim().to_string());
    }
    groups
}

/// Expands a single node group in hostlist notation into concrete node names
///
/// Every number is rendered zero-padded to two digits; wider numbers keep their natural width.
/// A malformed subrange is skipped and the rest of the group is still expanded.
///
/// # Examples
///
/// * `"node[1-3,5]"` -> `["node01", "node02", "node03", "node05"]`
/// * `"node7"` -> `["node07"]`
/// * `"a[100-101]"` -> `["a100", "a101"]`
/// * `"login"` -> `["login"]`
pub fn expand_hostlist(group: &str) -> Vec<String> {
    static RANGED: OnceLock<Regex> = OnceLock::new();
    let ranged = RANGED.get_or_init(|| {
        Regex::new(r"^([^\[\]]*)\[([^\[\]]*)\]([^\[\]]*)$").expect("Failed to compile hostlist regex")
    });

    let group = group.trim();
    if group.is_empty() {
        return Vec::new();
    }

    if !group.contains('[') && !group.contains(']') {
        return vec![pad_trailing_number(group)];
    }

    let Some(captures) = ranged.captures(group) else {
        warn!(group, error = %HostlistError::Unbalanced(group.to_string()), "keeping node group as-is");
        return vec![group.to_string()];
    };

    let prefix = captures.get(1).map_or("", |m| m.as_str());
    let range_list = captures.get(2).map_or("", |m| m.as_str());
    let suffix = captures.get(3).map_or("", |m| m.as_str());

    let mut expanded = Vec::new();
    for range_spec in range_list.split(',') {
        match parse_subrange(range_spec) {
            Ok(range) => {
                for number in range {
                    expanded.push(format!(
                        "{}{:0width$}{}",
                        prefix,
                        number,
                        suffix,
                        width = NODE_NUMBER_WIDTH
                    ));
                }
            }
            Err(err) => warn!(group, range_spec, error = %err, "skipping subrange"),
        }
    }
    expanded
}

/// Parses `"7"` or `"3-5"`; a reversed range is accepted and simply yields nothing
fn parse_subrange(range_spec: &str) -> Result<RangeInclusive<u64>, HostlistError> {
    let bound = |text: &str| {
        text.trim()
            .parse::<u64>()
            .map_err(|_| HostlistError::InvalidBound(text.to_string()))
    };

    match range_spec.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (bound(start)?, bound(end)?);
            if end >= start && end - start >= MAX_SUBRANGE_NODES {
                return Err(HostlistError::TooLarge(range_spec.to_string()));
            }
            Ok(start..=end)
        }
        None => {
            let single = bound(range_spec)?;
            Ok(single..=single)
        }
    }
}

/// Re-renders the trailing number of a plain node name at the fixed width
fn pad_trailing_number(name: &str) -> String {
    let digits_start = name
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |idx| idx + 1);
    let (prefix, digits) = name.split_at(digits_start);

    match digits.parse::<u64>() {
        Ok(number) => format!("{}{:0width$}", prefix, number, width = NODE_NUMBER_WIDTH),
        Err(_) => name.to_string(),
    }
}

/// Parses an elapsed-time token of the form `H:MM:SS` into seconds
///
/// Anything that is not exactly three colon-separated integers yields 0; the age is display
/// data, so a bad token is not worth failing over.
pub fn parse_age(age: &str) -> u64 {
    try_parse_age(age).unwrap_or(0)
}

fn try_parse_age(age: &str) -> Option<u64> {
    let components: Vec<&str> = age.trim().split(':').collect();
    let [hours, minutes, seconds] = components.as_slice() else {
        return None;
    };

    let hours = hours.parse::<u64>().ok()?;
    let minutes = minutes.parse::<u64>().ok()?;
    let seconds = seconds.parse::<u64>().ok()?;

    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}
