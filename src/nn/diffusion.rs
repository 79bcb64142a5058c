//! Parameter-free diffusion of node indicators over the working graph
//!
//! For an indicator matrix `x` (one column per episode) the encoder returns
//!
//! ```text
//! z = Σ_{h=0..k} αʰ · Pʰ x,    P = D⁻¹ A
//! ```
//!
//! so each hop replaces a node's value with the mean over its neighbours. The map is
//! linear, which lets callers diffuse only the nodes added at each step and sum the
//! results into a running representation. Deltas stay sparse: a step touches only the
//! nodes within `depth` hops of what it added.

use std::collections::BTreeMap;

use ndarray::Array2;
use rayon::prelude::*;
use sprs::{CsMat, TriMat};

use crate::graph::Graph;
use crate::{Result, SeedGrowError};

/// Sparse batch of node indicators, one column per episode
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeIndicators {
    columns: Vec<Vec<usize>>,
}

impl NodeIndicators {
    /// One column per episode, each listing the nodes set to 1
    pub fn new(columns: Vec<Vec<usize>>) -> Self {
        NodeIndicators { columns }
    }

    /// One-hot columns; `None` leaves the column empty
    pub fn from_optional(nodes: &[Option<usize>]) -> Self {
        NodeIndicators {
            columns: nodes.iter().map(|v| v.iter().copied().collect()).collect(),
        }
    }

    /// Number of columns
    pub fn batch_size(&self) -> usize {
        self.columns.len()
    }

    /// Column contents
    pub fn columns(&self) -> &[Vec<usize>] {
        &self.columns
    }

    /// Whether no column has an entry
    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(Vec::is_empty)
    }
}

/// Dense `n_nodes × batch` features tagged with the graph version they match
#[derive(Clone, Debug, PartialEq)]
pub struct DiffusedFeatures {
    values: Array2<f32>,
    version: u64,
}

impl DiffusedFeatures {
    /// Feature matrix
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// Number of node rows
    pub fn n_nodes(&self) -> usize {
        self.values.nrows()
    }

    /// Number of episode columns
    pub fn batch_size(&self) -> usize {
        self.values.ncols()
    }

    /// Graph version the rows correspond to
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Feature of `node` in episode `col`
    pub fn get(&self, node: usize, col: usize) -> f32 {
        self.values.get((node, col)).copied().unwrap_or(0.0)
    }
}

/// Diffusion operator tied to one graph snapshot
#[derive(Clone, Debug)]
pub struct DiffusionEncoder {
    /// Row-normalised adjacency in CSC form, so column `j` lists the rows reached from `j`
    spread: CsMat<f32>,
    /// Number of propagation hops
    depth: usize,
    /// Per-hop decay
    alpha: f32,
    /// Version of the graph `spread` was built from
    version: u64,
}

impl DiffusionEncoder {
    /// Create an encoder for `graph`
    pub fn new(graph: &Graph, depth: usize, alpha: f32) -> Self {
        DiffusionEncoder {
            spread: row_normalized(graph).to_csc(),
            depth,
            alpha,
            version: graph.version(),
        }
    }

    /// Rebuild the operator after the graph grew
    pub fn update_graph(&mut self, graph: &Graph) {
        self.spread = row_normalized(graph).to_csc();
        self.version = graph.version();
    }

    /// Number of nodes of the current snapshot
    pub fn n_nodes(&self) -> usize {
        self.spread.rows()
    }

    /// Graph version of the current snapshot
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether `features` match the current snapshot
    pub fn is_current(&self, features: &DiffusedFeatures) -> bool {
        features.version == self.version && features.n_nodes() == self.n_nodes()
    }

    /// All-zero features for `batch_size` episodes
    pub fn zeros(&self, batch_size: usize) -> DiffusedFeatures {
        DiffusedFeatures {
            values: Array2::zeros((self.n_nodes(), batch_size)),
            version: self.version,
        }
    }

    /// Diffuse a batch of indicators
    pub fn encode(&self, indicators: &NodeIndicators) -> Result<DiffusedFeatures> {
        let values = self.encode_sparse(indicators)?.to_dense();
        Ok(DiffusedFeatures { values, version: self.version })
    }

    /// Diffusion of `indicators` as a sparse `n_nodes × batch` matrix
    ///
    /// Only nodes within `depth` hops of an indicator get an entry.
    pub fn encode_sparse(&self, indicators: &NodeIndicators) -> Result<CsMat<f32>> {
        let n = self.n_nodes();
        if let Some(&v) = indicators.columns().iter().flatten().find(|&&v| v >= n) {
            return Err(SeedGrowError::Precondition(format!(
                "indicator node {} outside graph of {} nodes",
                v, n
            )));
        }

        let columns: Vec<BTreeMap<usize, f32>> = indicators
            .columns()
            .par_iter()
            .map(|nodes| self.diffuse_column(nodes))
            .collect();

        let nnz = columns.iter().map(BTreeMap::len).sum();
        let mut triplets = TriMat::with_capacity((n, indicators.batch_size()), nnz);
        for (col, values) in columns.iter().enumerate() {
            for (&row, &v) in values {
                triplets.add_triplet(row, col, v);
            }
        }
        Ok(triplets.to_csc())
    }

    /// Add the diffusion of `indicators` into `features`
    pub fn accumulate(&self, features: &mut DiffusedFeatures, indicators: &NodeIndicators) -> Result<()> {
        if !self.is_current(features) {
            return Err(SeedGrowError::StaleFeatures {
                expected: self.version,
                found: features.version,
            });
        }
        if indicators.batch_size() != features.batch_size() {
            return Err(SeedGrowError::Precondition(format!(
                "indicator batch {} does not match feature batch {}",
                indicators.batch_size(),
                features.batch_size()
            )));
        }
        if indicators.is_empty() {
            return Ok(());
        }

        let delta = self.encode_sparse(indicators)?;
        for (&v, (row, col)) in delta.iter() {
            features.values[[row, col]] += v;
        }
        Ok(())
    }

    /// Zero-extend `features` to the current node count
    pub fn resize(&self, features: &mut DiffusedFeatures) -> Result<()> {
        let (rows, cols) = features.values.dim();
        let n = self.n_nodes();
        if rows > n {
            return Err(SeedGrowError::Precondition(format!(
                "features have {} rows but the graph only has {} nodes",
                rows, n
            )));
        }
        if rows < n {
            let mut grown = Array2::zeros((n, cols));
            grown.slice_mut(ndarray::s![..rows, ..]).assign(&features.values);
            features.values = grown;
        }
        features.version = self.version;
        Ok(())
    }

    /// `Σ αʰ Pʰ x` for the indicator vector of `nodes`, keyed by node
    fn diffuse_column(&self, nodes: &[usize]) -> BTreeMap<usize, f32> {
        let mut out: BTreeMap<usize, f32> = nodes.iter().map(|&v| (v, 1.0)).collect();
        let mut term = out.clone();
        for _ in 0..self.depth {
            if term.is_empty() {
                break;
            }
            // (P x)_i = Σ_j P_ij x_j, walked from each nonzero x_j down column j of P
            let mut next: BTreeMap<usize, f32> = BTreeMap::new();
            for (&j, &x) in &term {
                if let Some(column) = self.spread.outer_view(j) {
                    for (i, &w) in column.iter() {
                        *next.entry(i).or_insert(0.0) += self.alpha * w * x;
                    }
                }
            }
            for (&i, &v) in &next {
                *out.entry(i).or_insert(0.0) += v;
            }
            term = next;
        }
        out
    }
}

/// `D⁻¹ A` in CSR form; isolated nodes get empty rows
fn row_normalized(graph: &Graph) -> CsMat<f32> {
    let adjacency = graph.adjacency();
    let mut triplets = TriMat::with_capacity(adjacency.shape(), adjacency.nnz());
    for (row, vec) in adjacency.outer_iterator().enumerate() {
        let degree = vec.nnz();
        if degree == 0 {
            continue;
        }
        let w = 1.0 / degree as f32;
        for (col, &a) in vec.iter() {
            triplets.add_triplet(row, col, a * w);
        }
    }
    triplets.to_csr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn path_graph(n: usize) -> Graph {
        let edges: Vec<(usize, usize)> = (0..n - 1).map(|i| (i, i + 1)).collect();
        Graph::from_edges(&edges).unwrap()
    }

    #[test]
    fn test_single_hop_averages_neighbours() {
        let graph = path_graph(3);
        let encoder = DiffusionEncoder::new(&graph, 1, 0.5);
        let z = encoder.encode(&NodeIndicators::new(vec![vec![1]])).unwrap();

        // Node 1 keeps its indicator; 0 and 2 have node 1 as their only neighbour
        assert!((z.get(1, 0) - 1.0).abs() < 1e-6);
        assert!((z.get(0, 0) - 0.5).abs() < 1e-6);
        assert!((z.get(2, 0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_encoding_is_additive() {
        let graph = path_graph(5);
        let encoder = DiffusionEncoder::new(&graph, 3, 0.85);

        let mut running = encoder.zeros(1);
        encoder.accumulate(&mut running, &NodeIndicators::new(vec![vec![0]])).unwrap();
        encoder.accumulate(&mut running, &NodeIndicators::new(vec![vec![1]])).unwrap();
        let full = encoder.encode(&NodeIndicators::new(vec![vec![0, 1]])).unwrap();

        for v in 0..5 {
            assert!((running.get(v, 0) - full.get(v, 0)).abs() < 1e-5);
        }
    }

    #[test]
    fn test_empty_columns_stay_zero() {
        let graph = path_graph(4);
        let encoder = DiffusionEncoder::new(&graph, 2, 0.85);
        let z = encoder.encode(&NodeIndicators::from_optional(&[Some(0), None])).unwrap();
        assert!(z.values().column(1).iter().all(|&v| v == 0.0));
        assert!(z.get(1, 0) > 0.0);
    }

    #[test]
    fn test_resize_after_growth() {
        let mut graph = path_graph(3);
        let mut encoder = DiffusionEncoder::new(&graph, 2, 0.85);
        let mut running = encoder.encode(&NodeIndicators::new(vec![vec![2]])).unwrap();
        let before = running.get(1, 0);

        graph
            .add_nodes_with_neighbors(&BTreeMap::from([(3, BTreeSet::from([2]))]))
            .unwrap();
        encoder.update_graph(&graph);

        let err = encoder.accumulate(&mut running, &NodeIndicators::new(vec![vec![3]]));
        assert!(matches!(err, Err(SeedGrowError::StaleFeatures { .. })));

        encoder.resize(&mut running).unwrap();
        assert_eq!(running.n_nodes(), 4);
        assert_eq!(running.get(1, 0), before);
        assert_eq!(running.get(3, 0), 0.0);
        encoder.accumulate(&mut running, &NodeIndicators::new(vec![vec![3]])).unwrap();
        assert!(running.get(3, 0) >= 1.0);
    }

    #[test]
    fn test_sparse_delta_stays_local() {
        let graph = path_graph(50);
        let encoder = DiffusionEncoder::new(&graph, 2, 0.85);
        let indicators = NodeIndicators::from_optional(&[Some(0), None, Some(25)]);

        let delta = encoder.encode_sparse(&indicators).unwrap();
        assert_eq!(delta.shape(), (50, 3));
        // Two hops from node 0 reach {0, 1, 2}; from node 25 they reach {23..=27}
        assert_eq!(delta.nnz(), 3 + 5);

        let dense = encoder.encode(&indicators).unwrap();
        for (&v, (row, col)) in delta.iter() {
            assert_eq!(dense.get(row, col), v);
        }
        assert!((dense.get(2, 0) - 0.85 * 0.85 * 0.25).abs() < 1e-6);
        assert_eq!(dense.get(3, 0), 0.0);
    }

    #[test]
    fn test_out_of_range_indicator() {
        let graph = path_graph(3);
        let encoder = DiffusionEncoder::new(&graph, 1, 0.85);
        assert!(encoder.encode(&NodeIndicators::new(vec![vec![7]])).is_err());
    }
}
