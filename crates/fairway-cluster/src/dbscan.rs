//! DBSCAN over a precomputed distance matrix.

use std::collections::VecDeque;

use fairway_dtw::DistanceMatrix;
use rayon::prelude::*;

use crate::label::{Assignment, ClusterLabel};

/// Indices of every other voyage within `eps` of voyage `i` (inclusive).
fn neighbourhood(matrix: &DistanceMatrix, i: usize, eps: f64) -> Vec<usize> {
    matrix
        .row(i)
        .into_iter()
        .enumerate()
        .filter(|&(j, d)| j != i && d.value() <= eps)
        .map(|(j, _)| j)
        .collect()
}

/// Label every voyage and flag the core ones.
///
/// Seeds are taken in ascending index order. A border voyage keeps the
/// label of the first cluster whose expansion reaches it.
pub(crate) fn run(
    matrix: &DistanceMatrix,
    eps: f64,
    min_points: usize,
) -> (Vec<Assignment>, Vec<bool>) {
    let n = matrix.len();
    let neighbours: Vec<Vec<usize>> = (0..n)
        .into_par_iter()
        .map(|i| neighbourhood(matrix, i, eps))
        .collect();
    let core: Vec<bool> = neighbours.iter().map(|nb| nb.len() >= min_points).collect();

    let mut labels: Vec<Option<ClusterLabel>> = vec![None; n];
    let mut next = 0;
    let mut queue = VecDeque::new();

    for seed in 0..n {
        if !core[seed] || labels[seed].is_some() {
            continue;
        }
        let label = ClusterLabel::new(next);
        next += 1;
        labels[seed] = Some(label);
        queue.push_back(seed);

        while let Some(p) = queue.pop_front() {
            if !core[p] {
                continue;
            }
            for &q in &neighbours[p] {
                if labels[q].is_none() {
                    labels[q] = Some(label);
                    queue.push_back(q);
                }
            }
        }
    }

    let assignments = labels
        .into_iter()
        .map(|l| l.map_or(Assignment::Noise, Assignment::Cluster))
        .collect();
    (assignments, core)
}
