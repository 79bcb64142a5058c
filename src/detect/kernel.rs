//! Pairwise structural similarity between community graphs

use std::collections::BTreeMap;

use ndarray::Array2;
use rayon::prelude::*;

use crate::graph::CommunityGraph;
use crate::{Result, SeedGrowError};

/// Pairwise similarity oracle over labeled graphs
pub trait GraphKernel: Send + Sync {
    /// Symmetric similarity matrix with one row per graph
    fn similarity(&self, graphs: &[CommunityGraph]) -> Result<Array2<f64>>;
}

/// Shortest-path kernel on unlabeled graphs
///
/// Each graph is summarised by the histogram of its all-pairs shortest-path lengths;
/// the kernel value is the dot product of two histograms.
#[derive(Clone, Copy, Debug)]
pub struct ShortestPathKernel {
    normalize: bool,
}

impl Default for ShortestPathKernel {
    fn default() -> Self {
        ShortestPathKernel { normalize: true }
    }
}

impl ShortestPathKernel {
    /// Normalised kernel, `k(i, j) / sqrt(k(i, i) k(j, j))`
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle normalisation
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    fn histogram(graph: &CommunityGraph) -> BTreeMap<usize, f64> {
        let mut counts = BTreeMap::new();
        for length in graph.shortest_path_lengths() {
            *counts.entry(length).or_insert(0.0) += 1.0;
        }
        counts
    }
}

fn dot(a: &BTreeMap<usize, f64>, b: &BTreeMap<usize, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(length, x)| large.get(length).map(|y| x * y))
        .sum()
}

impl GraphKernel for ShortestPathKernel {
    fn similarity(&self, graphs: &[CommunityGraph]) -> Result<Array2<f64>> {
        let n = graphs.len();
        let features: Vec<BTreeMap<usize, f64>> = graphs.par_iter().map(Self::histogram).collect();

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| dot(&features[i], &features[j])).collect())
            .collect();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let mut gram = Array2::from_shape_vec((n, n), flat).map_err(|e| SeedGrowError::Kernel(e.to_string()))?;

        if self.normalize {
            let diag = gram.diag().to_owned();
            for ((i, j), value) in gram.indexed_iter_mut() {
                let v = *value / (diag[i] * diag[j]).sqrt();
                *value = if v.is_nan() { 0.0 } else { v };
            }
        }
        Ok(gram)
    }
}
