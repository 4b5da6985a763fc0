//! Neighbor-selection policies and the fixed algorithm roster.
//!
//! Every policy produces an agent-by-agent action matrix where entry `(i, j)`
//! is 1 iff agent `i` listens to agent `j`'s message this step. Self-pairs
//! are always selected by the heuristic policies.

use anyhow::{Result, bail};
use ndarray::{Array2, ArrayView2};

/// Action-selection algorithm for one episode.
///
/// A closed set: the sweep roster is built from these variants, so there is
/// no "unknown algorithm" path at run time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Algorithm {
    /// Every agent listens to every agent, held fixed for the whole episode.
    FullComm,
    /// Delegate to the configured policy model.
    Learned,
    /// Listen to all agents strictly within the given radius.
    Metric(f32),
    /// Listen to the given number of nearest agents (excluding self).
    Topology(usize),
}

const UNIT_DISTANCE: f32 = 25.0;
const NEIGHBORS_PER_LEVEL: usize = 2;
const N_LEVELS: usize = 9;

/// Labeled radius values for the metric family: 25, 50, ..., 225.
pub fn metric_table() -> Vec<(String, f32)> {
    (1..=N_LEVELS)
        .map(|i| (format!("metric_{}", 10 * i), UNIT_DISTANCE * i as f32))
        .collect()
}

/// Labeled neighbor counts for the topology family: 2, 4, ..., 18.
pub fn topology_table() -> Vec<(String, usize)> {
    (1..=N_LEVELS)
        .map(|i| (format!("topology_{}", 10 * i), NEIGHBORS_PER_LEVEL * i))
        .collect()
}

/// The full labeled algorithm roster swept by a collection run.
///
/// Order is fixed: the two singletons first, then the metric family, then the
/// topology family. The roster is identical on every run.
pub fn roster() -> Vec<(String, Algorithm)> {
    let mut roster = vec![
        ("full_comm".to_string(), Algorithm::FullComm),
        ("learned".to_string(), Algorithm::Learned),
    ];
    roster.extend(
        metric_table()
            .into_iter()
            .map(|(label, radius)| (label, Algorithm::Metric(radius))),
    );
    roster.extend(
        topology_table()
            .into_iter()
            .map(|(label, n_neighbors)| (label, Algorithm::Topology(n_neighbors))),
    );
    roster
}

/// Compute the action matrix of the metric policy.
///
/// Entry `(i, j)` is 1 iff the Euclidean distance between agents `i` and `j`
/// is strictly below `radius`. The result is symmetric and always includes
/// self-pairs (self-distance is 0).
pub fn compute_metric_action(positions: ArrayView2<f32>, radius: f32) -> Result<Array2<i8>> {
    if !(radius > 0.0) {
        bail!("metric radius must be positive, but is {radius}");
    }

    let n_agt = positions.nrows();
    let mut action = Array2::<i8>::zeros((n_agt, n_agt));
    for i_agt in 0..n_agt {
        for j_agt in 0..n_agt {
            if pair_distance(positions, i_agt, j_agt) < radius {
                action[[i_agt, j_agt]] = 1;
            }
        }
    }

    Ok(action)
}

/// Compute the action matrix of the topology (k-nearest) policy.
///
/// Each row selects the `n_neighbors + 1` smallest distances, which always
/// includes the self-pair at distance 0. Ties are broken by agent index, so
/// the result is deterministic for a fixed input. Rows have a fixed sum of
/// `n_neighbors + 1`; columns are unconstrained (the relation is directed).
pub fn compute_topology_action(
    positions: ArrayView2<f32>,
    n_neighbors: usize,
) -> Result<Array2<i8>> {
    let n_agt = positions.nrows();
    if n_neighbors >= n_agt {
        bail!("number of neighbors must be below the number of agents ({n_agt}), but is {n_neighbors}");
    }

    let mut action = Array2::<i8>::zeros((n_agt, n_agt));
    for i_agt in 0..n_agt {
        let mut order: Vec<usize> = (0..n_agt).collect();
        order.sort_by(|&a, &b| {
            pair_distance(positions, i_agt, a)
                .total_cmp(&pair_distance(positions, i_agt, b))
                .then(a.cmp(&b))
        });
        for &j_agt in &order[..=n_neighbors] {
            action[[i_agt, j_agt]] = 1;
        }
    }

    Ok(action)
}

fn pair_distance(positions: ArrayView2<f32>, i_agt: usize, j_agt: usize) -> f32 {
    let dx = positions[[i_agt, 0]] - positions[[j_agt, 0]];
    let dy = positions[[i_agt, 1]] - positions[[j_agt, 1]];
    (dx * dx + dy * dy).sqrt()
}
