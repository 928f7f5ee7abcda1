//! Play-order optimization for queued tracks
//!
//! Finds the permutation of a batch that maximizes the summed transition
//! score over consecutive pairs. Small batches are solved exactly with
//! bitmask dynamic programming over subsets (an open-path maximum-weight
//! Hamiltonian path); batches past [`MAX_EXACT`] fall back to a greedy
//! nearest-neighbor heuristic.
//!
//! The path search itself is pure and operates on a precomputed score
//! matrix; only the feature fetch is async.

use crate::error::Result;
use crate::features::FeatureCache;
use crate::scoring;
use futures::future::try_join_all;
use segue_common::types::QueueItem;
use tracing::debug;

/// Largest batch solved exactly
///
/// The DP needs `O(2^n · n)` memory and `O(2^n · n²)` time, which at 16
/// tracks is a few million transitions and single-digit megabytes. Past
/// that the greedy heuristic takes over.
pub const MAX_EXACT: usize = 16;

/// Computes optimal play orders using cached feature vectors
#[derive(Clone)]
pub struct SequenceOptimizer {
    features: FeatureCache,
}

impl SequenceOptimizer {
    pub fn new(features: FeatureCache) -> Self {
        Self { features }
    }

    /// Reorder `items` for maximal total transition score
    ///
    /// Returns a permutation of the input: no items are added or dropped.
    /// If any feature fetch fails the whole computation aborts with
    /// `AnalysisUnavailable` and the caller keeps the existing order.
    pub async fn optimal_order(&self, items: Vec<QueueItem>) -> Result<Vec<QueueItem>> {
        if items.len() <= 1 {
            return Ok(items);
        }

        let matrix = self.score_matrix(&items).await?;

        let order = if items.len() <= MAX_EXACT {
            debug!(len = items.len(), "Ordering batch with exact subset DP");
            exact_path(&matrix)
        } else {
            debug!(len = items.len(), "Batch too large for exact DP, using greedy order");
            greedy_path(&matrix)
        };

        Ok(order.into_iter().map(|i| items[i].clone()).collect())
    }

    /// Pairwise transition scores for a batch
    async fn score_matrix(&self, items: &[QueueItem]) -> Result<Vec<Vec<f64>>> {
        let features = try_join_all(
            items
                .iter()
                .map(|item| self.features.get(&item.track_id)),
        )
        .await?;

        let n = items.len();
        let mut matrix = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    matrix[i][j] = scoring::score(&features[i], &features[j]);
                }
            }
        }
        Ok(matrix)
    }
}

/// Exact maximum-weight open path over all items
///
/// `dp[mask][last]` holds the best total score of a path visiting exactly
/// the items in `mask` and ending at `last`; parent pointers reconstruct the
/// path from the best full-mask endpoint. Ties always resolve to the lower
/// index, so equal inputs produce identical orders.
pub fn exact_path(matrix: &[Vec<f64>]) -> Vec<usize> {
    let n = matrix.len();
    debug_assert!(n >= 2 && n <= MAX_EXACT);

    let full: usize = (1 << n) - 1;
    let mut dp = vec![vec![f64::NEG_INFINITY; n]; 1 << n];
    let mut prev = vec![vec![usize::MAX; n]; 1 << n];

    for i in 0..n {
        dp[1 << i][i] = 0.0;
    }

    for mask in 1..=full {
        for last in 0..n {
            if mask & (1 << last) == 0 || dp[mask][last] == f64::NEG_INFINITY {
                continue;
            }
            for next in 0..n {
                if mask & (1 << next) != 0 {
                    continue;
                }
                let candidate = dp[mask][last] + matrix[last][next];
                let extended = mask | (1 << next);
                // Strict comparison with ascending iteration keeps the
                // lowest predecessor on ties
                if candidate > dp[extended][next] {
                    dp[extended][next] = candidate;
                    prev[extended][next] = last;
                }
            }
        }
    }

    let mut best_last = 0;
    for last in 1..n {
        if dp[full][last] > dp[full][best_last] {
            best_last = last;
        }
    }

    let mut order = Vec::with_capacity(n);
    let mut mask = full;
    let mut last = best_last;
    while last != usize::MAX {
        order.push(last);
        let parent = prev[mask][last];
        mask &= !(1 << last);
        last = parent;
    }
    order.reverse();
    order
}

/// Greedy nearest-neighbor path for oversized batches
///
/// Starts from the item with the highest best outgoing score and repeatedly
/// appends the unvisited item scoring highest from the current tail. Ties
/// resolve to the lower index.
pub fn greedy_path(matrix: &[Vec<f64>]) -> Vec<usize> {
    let n = matrix.len();
    debug_assert!(n >= 2);

    let best_outgoing = |i: usize| -> f64 {
        (0..n)
            .filter(|&j| j != i)
            .map(|j| matrix[i][j])
            .fold(f64::NEG_INFINITY, f64::max)
    };

    let mut start = 0;
    for i in 1..n {
        if best_outgoing(i) > best_outgoing(start) {
            start = i;
        }
    }

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    visited[start] = true;
    order.push(start);

    while order.len() < n {
        let tail = *order.last().unwrap();
        let mut pick = usize::MAX;
        for j in 0..n {
            if visited[j] {
                continue;
            }
            if pick == usize::MAX || matrix[tail][j] > matrix[tail][pick] {
                pick = j;
            }
        }
        visited[pick] = true;
        order.push(pick);
    }
    order
}

/// Total score of a given visiting order, for comparison and tests
pub fn path_score(matrix: &[Vec<f64>], order: &[usize]) -> f64 {
    order
        .windows(2)
        .map(|pair| matrix[pair[0]][pair[1]])
        .sum()
}
