//! Partition a similarity matrix into k groups
//!
//! Four interchangeable backends behind one closed enum. Every backend takes the same
//! square similarity matrix (entries in `[0, 1]`, larger is closer) and returns one
//! label per row. Labels are renumbered in order of first appearance, so row 0 always
//! carries label 0.
//!
//! | Backend | Input view | Method |
//! |---|---|---|
//! | `Spectral` | affinity `S` | top eigenvectors of `D^-1/2 S D^-1/2` (nalgebra), then k-means (smartcore) |
//! | `KMedoids` | distance `1 - S` | alternating medoid updates |
//! | `GaussianMixture` | Euclidean distances between rows of `S` | diagonal EM |
//! | `Hierarchical` | distance `1 - S` | complete linkage, cut at k clusters |

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Serialize, Deserialize};
use smartcore::cluster::kmeans::{KMeans, KMeansParameters};
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::{Result, SeedGrowError};

const MAX_ITER: usize = 100;
const KMEANS_RESTARTS: u64 = 4;
const EIGEN_MAX_ITER: usize = 1000;
const REG_COVAR: f64 = 1e-6;

/// Clustering algorithm used for curriculum re-selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringBackend {
    /// Spectral clustering on a precomputed affinity
    #[default]
    Spectral,
    /// K-medoids on `1 - S`
    KMedoids,
    /// Diagonal Gaussian mixture
    GaussianMixture,
    /// Agglomerative clustering with complete linkage
    Hierarchical,
}

impl ClusteringBackend {
    /// All backends, in declaration order
    pub const ALL: [ClusteringBackend; 4] = [
        ClusteringBackend::Spectral,
        ClusteringBackend::KMedoids,
        ClusteringBackend::GaussianMixture,
        ClusteringBackend::Hierarchical,
    ];

    /// Configuration name
    pub fn name(&self) -> &'static str {
        match self {
            ClusteringBackend::Spectral => "spectral",
            ClusteringBackend::KMedoids => "k_medoids",
            ClusteringBackend::GaussianMixture => "gaussian_mixture",
            ClusteringBackend::Hierarchical => "hierarchical",
        }
    }

    /// Label each row of `similarity` with one of at most `k` clusters
    ///
    /// `k` larger than the number of rows is clamped. `seed` fixes the random
    /// initialisation of the backends that have one.
    pub fn cluster(&self, similarity: &Array2<f64>, k: usize, seed: u64) -> Result<Vec<usize>> {
        let n = similarity.nrows();
        if n == 0 {
            return Err(SeedGrowError::Clustering("empty similarity matrix".to_string()));
        }
        if similarity.ncols() != n {
            return Err(SeedGrowError::Clustering(format!(
                "similarity matrix is {}x{}, expected square",
                n,
                similarity.ncols()
            )));
        }
        if k == 0 {
            return Err(SeedGrowError::Clustering("k must be positive".to_string()));
        }
        if similarity.iter().any(|v| !v.is_finite()) {
            return Err(SeedGrowError::Clustering("similarity matrix has non-finite entries".to_string()));
        }

        let k = k.min(n);
        let labels = match self {
            ClusteringBackend::Spectral => spectral(similarity, k, seed)?,
            ClusteringBackend::KMedoids => k_medoids(&distances(similarity), k),
            ClusteringBackend::GaussianMixture => gaussian_mixture(similarity, k, seed)?,
            ClusteringBackend::Hierarchical => hierarchical(&distances(similarity), k)?,
        };
        Ok(canonical_labels(&labels))
    }
}

impl fmt::Display for ClusteringBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ClusteringBackend {
    type Err = SeedGrowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "spectral" | "sp" => Ok(ClusteringBackend::Spectral),
            "k_medoids" | "kmedoids" => Ok(ClusteringBackend::KMedoids),
            "gaussian_mixture" | "gmm" => Ok(ClusteringBackend::GaussianMixture),
            "hierarchical" | "complete" => Ok(ClusteringBackend::Hierarchical),
            other => Err(SeedGrowError::Config(format!("unknown clustering backend '{}'", other))),
        }
    }
}

/// Symmetrised `1 - S`, clamped at zero, with a zero diagonal
fn distances(similarity: &Array2<f64>) -> Array2<f64> {
    let n = similarity.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            0.0
        } else {
            (1.0 - 0.5 * (similarity[[i, j]] + similarity[[j, i]])).max(0.0)
        }
    })
}

/// Renumber labels in order of first appearance
fn canonical_labels(labels: &[usize]) -> Vec<usize> {
    let mut seen: BTreeMap<usize, usize> = BTreeMap::new();
    labels
        .iter()
        .map(|&l| {
            let next = seen.len();
            *seen.entry(l).or_insert(next)
        })
        .collect()
}

fn squared_distance(a: &ArrayView1<'_, f64>, b: &ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

// ---------------------------------------------------------------------------
// Spectral
// ---------------------------------------------------------------------------

fn spectral(similarity: &Array2<f64>, k: usize, seed: u64) -> Result<Vec<usize>> {
    kmeans(&spectral_embedding(similarity, k)?, k, seed)
}

/// Row-normalised top-k eigenvectors of `D^-1/2 S D^-1/2`
fn spectral_embedding(similarity: &Array2<f64>, k: usize) -> Result<Array2<f64>> {
    let n = similarity.nrows();
    let affinity = Array2::from_shape_fn((n, n), |(i, j)| {
        (0.5 * (similarity[[i, j]] + similarity[[j, i]])).max(0.0)
    });

    let inv_sqrt_degree: Array1<f64> = affinity
        .sum_axis(Axis(1))
        .mapv(|d| if d > 0.0 { 1.0 / d.sqrt() } else { 0.0 });
    let normalized = DMatrix::from_fn(n, n, |i, j| {
        inv_sqrt_degree[i] * affinity[[i, j]] * inv_sqrt_degree[j]
    });

    let eigen = SymmetricEigen::try_new(normalized, f64::EPSILON, EIGEN_MAX_ITER)
        .ok_or_else(|| SeedGrowError::Clustering("eigen-decomposition did not converge".to_string()))?;

    // Largest eigenvalues of the normalised affinity are the smallest of the Laplacian
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let mut embedding = Array2::<f64>::zeros((n, k));
    for (c, &col) in order.iter().take(k).enumerate() {
        for i in 0..n {
            embedding[[i, c]] = eigen.eigenvectors[(i, col)];
        }
    }
    for mut row in embedding.rows_mut() {
        let norm = row.dot(&row).sqrt();
        if norm > 1e-12 {
            row /= norm;
        }
    }
    Ok(embedding)
}

// ---------------------------------------------------------------------------
// K-means (used on the spectral embedding and to initialise the mixture)
// ---------------------------------------------------------------------------

/// Best of several seeded k-means++ runs by within-cluster sum of squares
fn kmeans(data: &Array2<f64>, k: usize, seed: u64) -> Result<Vec<usize>> {
    let n = data.nrows();
    if k <= 1 || n <= 1 {
        return Ok(vec![0; n]);
    }

    let rows: Vec<Vec<f64>> = data.rows().into_iter().map(|r| r.to_vec()).collect();
    let x = DenseMatrix::from_2d_vec(&rows)
        .map_err(|e| SeedGrowError::Clustering(format!("k-means input: {}", e)))?;

    let mut best: Option<(f64, Vec<usize>)> = None;
    for t in 0..KMEANS_RESTARTS {
        let params = KMeansParameters {
            k,
            max_iter: MAX_ITER,
            seed: Some(seed.wrapping_add(t)),
        };
        let model: KMeans<f64, usize, DenseMatrix<f64>, Vec<usize>> = KMeans::fit(&x, params)
            .map_err(|e| SeedGrowError::Clustering(format!("k-means fit: {}", e)))?;
        let labels = model
            .predict(&x)
            .map_err(|e| SeedGrowError::Clustering(format!("k-means predict: {}", e)))?;

        let wcss = within_cluster_ss(data, &labels, k);
        if best.as_ref().map_or(true, |(b, _)| wcss < *b) {
            best = Some((wcss, labels));
        }
    }
    Ok(best.map(|(_, labels)| labels).unwrap_or_else(|| vec![0; n]))
}

/// Sum of squared distances of each row to the mean of its cluster
fn within_cluster_ss(data: &Array2<f64>, labels: &[usize], k: usize) -> f64 {
    let k = labels.iter().copied().max().map_or(k, |m| k.max(m + 1));
    let mut sums = Array2::<f64>::zeros((k, data.ncols()));
    let mut counts = vec![0usize; k];
    for (point, &l) in data.rows().into_iter().zip(labels) {
        let mut row = sums.row_mut(l);
        row += &point;
        counts[l] += 1;
    }
    for (mut row, &count) in sums.rows_mut().into_iter().zip(&counts) {
        if count > 0 {
            row /= count as f64;
        }
    }
    data.rows()
        .into_iter()
        .zip(labels)
        .map(|(point, &l)| squared_distance(&point, &sums.row(l)))
        .sum()
}

// ---------------------------------------------------------------------------
// K-medoids
// ---------------------------------------------------------------------------

fn k_medoids(dist: &Array2<f64>, k: usize) -> Vec<usize> {
    let n = dist.nrows();

    // Heuristic init: the k points with the smallest total distance
    let totals = dist.sum_axis(Axis(1));
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| totals[a].total_cmp(&totals[b]).then(a.cmp(&b)));
    let mut medoids: Vec<usize> = order.into_iter().take(k).collect();

    let assign = |medoids: &[usize]| -> Vec<usize> {
        (0..n)
            .map(|i| {
                medoids
                    .iter()
                    .enumerate()
                    .min_by(|a, b| dist[[i, *a.1]].total_cmp(&dist[[i, *b.1]]))
                    .map_or(0, |(c, _)| c)
            })
            .collect()
    };

    let mut labels = assign(&medoids);
    for _ in 0..MAX_ITER {
        let mut updated = medoids.clone();
        for (c, medoid) in updated.iter_mut().enumerate() {
            let members: Vec<usize> = (0..n).filter(|&i| labels[i] == c).collect();
            let cost = |candidate: usize| members.iter().map(|&m| dist[[candidate, m]]).sum::<f64>();
            if let Some(&best) = members
                .iter()
                .min_by(|&&a, &&b| cost(a).total_cmp(&cost(b)).then(a.cmp(&b)))
            {
                *medoid = best;
            }
        }
        if updated == medoids {
            break;
        }
        medoids = updated;
        labels = assign(&medoids);
    }

    labels
}

// ---------------------------------------------------------------------------
// Gaussian mixture
// ---------------------------------------------------------------------------

fn log_gaussian(x: &ArrayView1<'_, f64>, mean: &ArrayView1<'_, f64>, var: &ArrayView1<'_, f64>) -> f64 {
    let mut log_prob = -0.5 * x.len() as f64 * (2.0 * std::f64::consts::PI).ln();
    for ((&xi, &mi), &vi) in x.iter().zip(mean.iter()).zip(var.iter()) {
        log_prob -= 0.5 * vi.ln();
        log_prob -= 0.5 * (xi - mi).powi(2) / vi;
    }
    log_prob
}

fn logsumexp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Diagonal-covariance EM on the Euclidean distance rows of the similarity matrix
fn gaussian_mixture(similarity: &Array2<f64>, k: usize, seed: u64) -> Result<Vec<usize>> {
    let n = similarity.nrows();
    let data = Array2::from_shape_fn((n, n), |(i, j)| {
        squared_distance(&similarity.row(i), &similarity.row(j)).sqrt()
    });
    let d = data.ncols();

    // Hard k-means assignment as the starting responsibilities
    let mut resp = Array2::<f64>::zeros((n, k));
    for (i, &l) in kmeans(&data, k, seed)?.iter().enumerate() {
        resp[[i, l]] = 1.0;
    }

    let mut weights = Array1::<f64>::from_elem(k, 1.0 / k as f64);
    let mut means = Array2::<f64>::zeros((k, d));
    let mut variances = Array2::<f64>::from_elem((k, d), 1.0);
    let mut prev_ll = f64::NEG_INFINITY;

    for _ in 0..MAX_ITER {
        // M-step
        let resp_sum = resp.sum_axis(Axis(0));
        let total = resp_sum.sum().max(f64::MIN_POSITIVE);
        for c in 0..k {
            weights[c] = resp_sum[c] / total;
            if resp_sum[c] <= 1e-10 {
                continue;
            }
            let mean = resp.column(c).dot(&data) / resp_sum[c];
            let mut var = Array1::<f64>::zeros(d);
            for (i, point) in data.rows().into_iter().enumerate() {
                let diff = &point - &mean;
                var.scaled_add(resp[[i, c]], &(&diff * &diff));
            }
            var /= resp_sum[c];
            var.mapv_inplace(|v| v + REG_COVAR);
            means.row_mut(c).assign(&mean);
            variances.row_mut(c).assign(&var);
        }

        // E-step
        let mut ll = 0.0;
        for (i, point) in data.rows().into_iter().enumerate() {
            let log_probs: Vec<f64> = (0..k)
                .map(|c| {
                    weights[c].max(f64::MIN_POSITIVE).ln()
                        + log_gaussian(&point, &means.row(c), &variances.row(c))
                })
                .collect();
            let log_sum = logsumexp(&log_probs);
            ll += log_sum;
            for (c, lp) in log_probs.iter().enumerate() {
                resp[[i, c]] = (lp - log_sum).exp();
            }
        }

        if (ll - prev_ll).abs() < 1e-3 * n as f64 {
            break;
        }
        prev_ll = ll;
    }

    Ok(resp
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map_or(0, |(c, _)| c)
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Hierarchical
// ---------------------------------------------------------------------------

/// Complete linkage on a distance matrix, cut where exactly `k` clusters remain
fn hierarchical(dist: &Array2<f64>, k: usize) -> Result<Vec<usize>> {
    let n = dist.nrows();
    if n == 1 {
        return Ok(vec![0]);
    }

    let mut condensed = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            condensed.push(dist[[i, j]]);
        }
    }
    let dendrogram = kodama::linkage(&mut condensed, n, kodama::Method::Complete);

    // Leaves are clusters 0..n; merge step s creates cluster n + s
    let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    let mut active: BTreeSet<usize> = (0..n).collect();
    for step in dendrogram.steps().iter().take(n - k) {
        let (a, b) = (step.cluster1, step.cluster2);
        if !active.remove(&a) || !active.remove(&b) {
            return Err(SeedGrowError::Clustering(format!(
                "dendrogram merges inactive clusters {} and {}",
                a, b
            )));
        }
        let mut merged = std::mem::take(&mut members[a]);
        merged.append(&mut members[b]);
        active.insert(members.len());
        members.push(merged);
    }

    let mut labels = vec![0; n];
    for (label, &cluster) in active.iter().enumerate() {
        for &i in &members[cluster] {
            labels[i] = label;
        }
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two tight groups {0, 1, 2} and {3, 4, 5}, interleaved to catch order effects
    fn two_blocks() -> Array2<f64> {
        let group = [0, 0, 0, 1, 1, 1];
        Array2::from_shape_fn((6, 6), |(i, j)| {
            if i == j {
                1.0
            } else if group[i] == group[j] {
                0.9 - 0.01 * (i + j) as f64
            } else {
                0.05 + 0.01 * ((i * j) % 3) as f64
            }
        })
    }

    #[test]
    fn test_every_backend_separates_blocks() {
        let sim = two_blocks();
        for backend in ClusteringBackend::ALL {
            let labels = backend.cluster(&sim, 2, 7).unwrap();
            assert_eq!(labels, vec![0, 0, 0, 1, 1, 1], "{}", backend);
        }
    }

    #[test]
    fn test_k_clamped_and_single_row() {
        let sim = Array2::from_elem((1, 1), 1.0);
        for backend in ClusteringBackend::ALL {
            assert_eq!(backend.cluster(&sim, 3, 0).unwrap(), vec![0]);
        }

        let labels = ClusteringBackend::Hierarchical.cluster(&two_blocks(), 10, 0).unwrap();
        assert_eq!(labels, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_invalid_input() {
        let backend = ClusteringBackend::Spectral;
        assert!(backend.cluster(&Array2::zeros((0, 0)), 2, 0).is_err());
        assert!(backend.cluster(&Array2::zeros((2, 3)), 2, 0).is_err());
        assert!(backend.cluster(&two_blocks(), 0, 0).is_err());

        let mut sim = two_blocks();
        sim[[0, 1]] = f64::NAN;
        assert!(backend.cluster(&sim, 2, 0).is_err());
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let sim = two_blocks();
        for backend in ClusteringBackend::ALL {
            assert_eq!(backend.cluster(&sim, 3, 11).unwrap(), backend.cluster(&sim, 3, 11).unwrap());
        }
    }

    #[test]
    fn test_spectral_embedding_groups_blocks() {
        let embedding = spectral_embedding(&two_blocks(), 2).unwrap();
        assert_eq!(embedding.dim(), (6, 2));
        for row in embedding.rows() {
            assert!((row.dot(&row) - 1.0).abs() < 1e-9);
        }
        let close = |a: usize, b: usize| squared_distance(&embedding.row(a), &embedding.row(b)) < 0.1;
        assert!(close(0, 1) && close(1, 2) && close(3, 4) && close(4, 5));
        assert!(!close(0, 3));
    }

    #[test]
    fn test_kmeans_restarts() {
        let data = ndarray::array![[0.0, 0.0], [0.1, 0.0], [5.0, 5.0], [5.1, 5.0], [0.0, 0.1]];
        let labels = canonical_labels(&kmeans(&data, 2, 3).unwrap());
        assert_eq!(labels, vec![0, 0, 1, 1, 0]);
        assert!(within_cluster_ss(&data, &labels, 2) < 0.1);
        assert_eq!(kmeans(&data, 1, 3).unwrap(), vec![0; 5]);
    }

    #[test]
    fn test_backend_names_parse() {
        for backend in ClusteringBackend::ALL {
            assert_eq!(backend.name().parse::<ClusteringBackend>().unwrap(), backend);
        }
        assert_eq!("gmm".parse::<ClusteringBackend>().unwrap(), ClusteringBackend::GaussianMixture);
        assert!("dbscan".parse::<ClusteringBackend>().is_err());

        let json = serde_json::to_string(&ClusteringBackend::KMedoids).unwrap();
        assert_eq!(json, "\"k_medoids\"");
    }
}
