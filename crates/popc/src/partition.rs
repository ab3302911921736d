//! Reading pre-computed initial assignments: one cluster id per line, in record order.

use snafu::prelude::*;
use std::io::BufRead;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum PartitionError {
    #[snafu(display("too many lines in cluster file for {num_instances} instances"))]
    TooManyLines { num_instances: usize },

    #[snafu(display("cluster file has {found} assignments, expected {expected}"))]
    TooFewLines { expected: usize, found: usize },

    #[snafu(display(
        "cluster identifier {cluster} at line {line} exceeds permitted number of clusters ({num_clusters})"
    ))]
    ClusterOutOfRange {
        line: usize,
        cluster: usize,
        num_clusters: usize,
    },

    #[snafu(display("unexpected content {content:?} at line {line} of cluster file"))]
    InvalidLine { line: usize, content: String },

    #[snafu(display("failed to read cluster file"))]
    Io { source: std::io::Error },
}

/// Read exactly `num_instances` assignments, each below `num_clusters`.
///
/// Trailing blank lines are ignored.
pub fn read_assignments(
    reader: impl BufRead,
    num_instances: usize,
    num_clusters: usize,
) -> Result<Vec<usize>, PartitionError> {
    let mut assignments = Vec::with_capacity(num_instances);
    let mut first_blank_line = None;

    for (i, line) in reader.lines().enumerate() {
        let line_num = i + 1;
        let line = line.context(IoSnafu)?;
        let line = line.strip_suffix('\r').unwrap_or(&line);

        if line.is_empty() {
            first_blank_line.get_or_insert(line_num);
            continue;
        }
        if let Some(blank) = first_blank_line {
            return InvalidLineSnafu {
                line: blank,
                content: "",
            }
            .fail();
        }

        let cluster: usize = line.parse().ok().context(InvalidLineSnafu {
            line: line_num,
            content: line,
        })?;
        ensure!(
            assignments.len() < num_instances,
            TooManyLinesSnafu { num_instances }
        );
        ensure!(
            cluster < num_clusters,
            ClusterOutOfRangeSnafu {
                line: line_num,
                cluster,
                num_clusters
            }
        );
        assignments.push(cluster);
    }

    ensure!(
        assignments.len() == num_instances,
        TooFewLinesSnafu {
            expected: num_instances,
            found: assignments.len()
        }
    );
    Ok(assignments)
}
