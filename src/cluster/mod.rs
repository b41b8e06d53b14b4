//! Clustering: k-means and spectral clustering of similarity graphs.

use crate::error::{EspectroError, Result};
use crate::graph::WeightedGraph;
use crate::primitives::{Matrix, Vector};
use crate::spectra::eigensolver::{solve_nonsymmetric, solve_symmetric, Which};
use crate::spectra::{sparse_laplacian, Normalization};
use crate::traits::UnsupervisedEstimator;

/// K-Means clustering with deterministic k-means++ style
/// initialization.
///
/// # Examples
///
/// ```
/// use espectro::cluster::KMeans;
/// use espectro::primitives::Matrix;
/// use espectro::traits::UnsupervisedEstimator;
///
/// let data = Matrix::from_vec(4, 1, vec![0.0, 0.2, 9.8, 10.0]).unwrap();
/// let mut kmeans = KMeans::new(2).with_random_state(0);
/// kmeans.fit(&data).unwrap();
///
/// let labels = kmeans.labels();
/// assert_eq!(labels[0], labels[1]);
/// assert_ne!(labels[0], labels[2]);
/// ```
#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    max_iter: usize,
    tol: f64,
    random_state: Option<u64>,
    centroids: Option<Matrix<f64>>,
    labels: Option<Vec<usize>>,
    inertia: f64,
    n_iter: usize,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(8)
    }
}

impl KMeans {
    /// Creates a new K-Means with the specified number of clusters.
    #[must_use]
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-6,
            random_state: None,
            centroids: None,
            labels: None,
            inertia: 0.0,
            n_iter: 0,
        }
    }

    /// Sets the maximum number of iterations.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the convergence tolerance on centroid movement.
    #[must_use]
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Sets the seed controlling centroid initialization.
    #[must_use]
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Returns the fitted cluster centroids.
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    #[must_use]
    pub fn centroids(&self) -> &Matrix<f64> {
        self.centroids
            .as_ref()
            .expect("Model not fitted. Call fit() first.")
    }

    /// Returns training labels.
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        self.labels
            .as_ref()
            .expect("Model not fitted. Call fit() first.")
    }

    /// Within-cluster sum of squared distances after fitting.
    #[must_use]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Number of iterations the last fit ran.
    #[must_use]
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Returns true if the model has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.centroids.is_some()
    }

    /// Seed-determined first centroid, then farthest-point selection.
    fn init_centroids(&self, x: &Matrix<f64>) -> Matrix<f64> {
        let (n_samples, n_features) = x.shape();
        let mut data = Vec::with_capacity(self.n_clusters * n_features);

        let seed = self.random_state.unwrap_or(42);
        let first = (seed as usize) % n_samples;
        for j in 0..n_features {
            data.push(x.get(first, j));
        }

        for _ in 1..self.n_clusters {
            let chosen = data.len() / n_features;
            let mut best_idx = 0;
            let mut best_dist = -1.0;

            for i in 0..n_samples {
                let mut nearest = f64::INFINITY;
                for c in 0..chosen {
                    let mut dist_sq = 0.0;
                    for j in 0..n_features {
                        let diff = x.get(i, j) - data[c * n_features + j];
                        dist_sq += diff * diff;
                    }
                    nearest = nearest.min(dist_sq);
                }
                if nearest > best_dist {
                    best_dist = nearest;
                    best_idx = i;
                }
            }

            for j in 0..n_features {
                data.push(x.get(best_idx, j));
            }
        }

        Matrix::from_vec(self.n_clusters, n_features, data)
            .expect("centroid matrix dimensions are consistent by construction")
    }

    fn assign_labels(&self, x: &Matrix<f64>, centroids: &Matrix<f64>) -> Vec<usize> {
        let n_samples = x.n_rows();
        let mut labels = vec![0; n_samples];

        for (i, label) in labels.iter_mut().enumerate() {
            let point = x.row(i);
            let mut min_dist = f64::INFINITY;
            for k in 0..self.n_clusters {
                let centroid = centroids.row(k);
                let dist = (&point - &centroid).norm_squared();
                if dist < min_dist {
                    min_dist = dist;
                    *label = k;
                }
            }
        }
        labels
    }

    fn update_centroids(&self, x: &Matrix<f64>, labels: &[usize], old: &Matrix<f64>) -> Matrix<f64> {
        let (_, n_features) = x.shape();
        let mut sums = vec![0.0; self.n_clusters * n_features];
        let mut counts = vec![0usize; self.n_clusters];

        for (i, &label) in labels.iter().enumerate() {
            counts[label] += 1;
            for j in 0..n_features {
                sums[label * n_features + j] += x.get(i, j);
            }
        }

        for k in 0..self.n_clusters {
            if counts[k] > 0 {
                for j in 0..n_features {
                    sums[k * n_features + j] /= counts[k] as f64;
                }
            } else {
                // empty cluster keeps its previous centroid
                for j in 0..n_features {
                    sums[k * n_features + j] = old.get(k, j);
                }
            }
        }

        Matrix::from_vec(self.n_clusters, n_features, sums)
            .expect("centroid matrix dimensions are consistent by construction")
    }

    fn centroids_converged(&self, old: &Matrix<f64>, new: &Matrix<f64>) -> bool {
        for k in 0..self.n_clusters {
            let movement = (&old.row(k) - &new.row(k)).norm_squared();
            if movement > self.tol * self.tol {
                return false;
            }
        }
        true
    }

    fn compute_inertia(x: &Matrix<f64>, centroids: &Matrix<f64>, labels: &[usize]) -> f64 {
        labels
            .iter()
            .enumerate()
            .map(|(i, &label)| (&x.row(i) - &centroids.row(label)).norm_squared())
            .sum()
    }
}

impl UnsupervisedEstimator for KMeans {
    type Labels = Vec<usize>;

    fn fit(&mut self, x: &Matrix<f64>) -> Result<()> {
        let n_samples = x.n_rows();
        if n_samples == 0 {
            return Err(EspectroError::empty_input("KMeans samples"));
        }
        if n_samples < self.n_clusters {
            return Err(EspectroError::InvalidHyperparameter {
                param: "n_clusters".to_string(),
                value: self.n_clusters.to_string(),
                constraint: format!("must not exceed sample count {n_samples}"),
            });
        }

        let mut centroids = self.init_centroids(x);
        let mut labels = vec![0; n_samples];

        for iter in 0..self.max_iter {
            labels = self.assign_labels(x, &centroids);
            let new_centroids = self.update_centroids(x, &labels, &centroids);
            let converged = self.centroids_converged(&centroids, &new_centroids);
            centroids = new_centroids;
            self.n_iter = iter + 1;
            if converged {
                break;
            }
        }

        self.inertia = Self::compute_inertia(x, &centroids, &labels);
        self.labels = Some(labels);
        self.centroids = Some(centroids);
        Ok(())
    }

    fn predict(&self, x: &Matrix<f64>) -> Vec<usize> {
        self.assign_labels(x, self.centroids())
    }
}

/// Embeds a similarity graph's vertices into `R^k` using the smallest
/// non-trivial Laplacian eigenvectors.
///
/// The `k + 1` smallest eigenpairs are computed and the trivial first
/// one dropped. With `normalize_rows` every embedded vertex is scaled
/// to unit norm, the normalized-spectral-clustering convention.
///
/// # Errors
///
/// Returns an error if `k` is zero or too large for the graph, or if
/// the eigensolver fails.
pub fn spectral_embedding(
    graph: &WeightedGraph,
    normalization: Normalization,
    k: usize,
    normalize_rows: bool,
    bidirectional: bool,
) -> Result<Matrix<f64>> {
    let n = graph.num_vertices();
    if k == 0 || k + 1 > n {
        return Err(EspectroError::InvalidHyperparameter {
            param: "k".to_string(),
            value: k.to_string(),
            constraint: format!("must satisfy 0 < k + 1 <= {n}"),
        });
    }

    let (laplacian, _) = sparse_laplacian(graph, normalization, bidirectional)?;
    let max_iterations = (20 * n).max(1000);
    let (_, vectors) = match normalization {
        Normalization::RandomWalk => {
            solve_nonsymmetric(&laplacian, Which::SmallestAlgebraic, k + 1, max_iterations)?
        }
        _ => solve_symmetric(&laplacian, Which::SmallestAlgebraic, k + 1, max_iterations)?,
    };

    // drop the trivial eigenvector
    let mut embedding = Matrix::zeros(n, k);
    for col in 0..k {
        embedding.set_column(col, &vectors.column(col + 1));
    }

    if normalize_rows {
        for i in 0..n {
            let norm = embedding.row(i).norm();
            if norm > 0.0 {
                for j in 0..k {
                    embedding.set(i, j, embedding.get(i, j) / norm);
                }
            }
        }
    }
    Ok(embedding)
}

/// Spectral clustering: eigen-embed a similarity graph, then run
/// k-means on the embedded vertices.
///
/// # Examples
///
/// ```no_run
/// use espectro::cluster::SpectralClustering;
/// use espectro::graph::WeightedGraph;
/// use espectro::spectra::Normalization;
///
/// let mut g = WeightedGraph::new(4);
/// g.add_edge(0, 1, 1.0).unwrap();
/// g.add_edge(1, 0, 1.0).unwrap();
/// g.add_edge(2, 3, 1.0).unwrap();
/// g.add_edge(3, 2, 1.0).unwrap();
///
/// let mut clustering = SpectralClustering::new(2, Normalization::Symmetric);
/// clustering.fit_graph(&g, true).unwrap();
/// assert_eq!(clustering.labels().len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct SpectralClustering {
    n_clusters: usize,
    normalization: Normalization,
    normalize_rows: bool,
    random_state: Option<u64>,
    labels: Option<Vec<usize>>,
}

impl SpectralClustering {
    /// Creates a spectral clustering model.
    #[must_use]
    pub fn new(n_clusters: usize, normalization: Normalization) -> Self {
        Self {
            n_clusters,
            normalization,
            normalize_rows: false,
            random_state: None,
            labels: None,
        }
    }

    /// Enables unit-norm scaling of the embedded vertices.
    #[must_use]
    pub fn with_normalize_rows(mut self, normalize_rows: bool) -> Self {
        self.normalize_rows = normalize_rows;
        self
    }

    /// Sets the seed forwarded to the k-means step.
    #[must_use]
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Clusters the vertices of a similarity graph.
    ///
    /// # Errors
    ///
    /// Returns an error if `n_clusters` is below 2, or if the
    /// embedding or the k-means step fails.
    pub fn fit_graph(&mut self, graph: &WeightedGraph, bidirectional: bool) -> Result<()> {
        if self.n_clusters < 2 {
            return Err(EspectroError::InvalidHyperparameter {
                param: "n_clusters".to_string(),
                value: self.n_clusters.to_string(),
                constraint: "must be at least 2".to_string(),
            });
        }

        // k clusters are resolved by the k smallest eigenvectors; the
        // trivial constant one carries no information, so the
        // embedding keeps the k - 1 after it
        let embedding = spectral_embedding(
            graph,
            self.normalization,
            self.n_clusters - 1,
            self.normalize_rows,
            bidirectional,
        )?;

        let mut kmeans = KMeans::new(self.n_clusters);
        if let Some(seed) = self.random_state {
            kmeans = kmeans.with_random_state(seed);
        }
        kmeans.fit(&embedding)?;
        self.labels = Some(kmeans.labels().to_vec());
        Ok(())
    }

    /// Per-vertex cluster labels.
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        self.labels
            .as_ref()
            .expect("Model not fitted. Call fit_graph() first.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blob_matrix() -> Matrix<f64> {
        Matrix::from_vec(
            6,
            2,
            vec![
                0.0, 0.0, 0.2, 0.1, 0.1, 0.3, 10.0, 10.0, 10.2, 9.9, 9.8, 10.1,
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_kmeans_two_blobs() {
        let data = two_blob_matrix();
        let mut kmeans = KMeans::new(2).with_random_state(0);
        kmeans.fit(&data).unwrap();

        let labels = kmeans.labels();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[3], labels[5]);
        assert_ne!(labels[0], labels[3]);
        assert!(kmeans.inertia() < 1.0);
        assert!(kmeans.is_fitted());
    }

    #[test]
    fn test_kmeans_predict_matches_training_labels() {
        let data = two_blob_matrix();
        let mut kmeans = KMeans::new(2).with_random_state(0);
        kmeans.fit(&data).unwrap();
        assert_eq!(kmeans.predict(&data), kmeans.labels().to_vec());
    }

    #[test]
    fn test_kmeans_errors() {
        let mut kmeans = KMeans::new(3);
        assert!(kmeans.fit(&Matrix::zeros(0, 2)).is_err());
        let tiny = Matrix::from_vec(2, 1, vec![0.0, 1.0]).unwrap();
        assert!(kmeans.fit(&tiny).is_err());
    }

    #[test]
    fn test_kmeans_k_equals_n() {
        let data = Matrix::from_vec(3, 1, vec![0.0, 5.0, 10.0]).unwrap();
        let mut kmeans = KMeans::new(3).with_random_state(1);
        kmeans.fit(&data).unwrap();
        let mut labels = kmeans.labels().to_vec();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 3);
        assert!(kmeans.inertia() < 1e-12);
    }

    fn two_cluster_graph() -> WeightedGraph {
        // two triangles joined by one weak edge
        let mut g = WeightedGraph::new(6);
        let heavy = [(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)];
        for &(a, b) in &heavy {
            g.add_edge(a, b, 1.0).unwrap();
            g.add_edge(b, a, 1.0).unwrap();
        }
        g.add_edge(2, 3, 0.05).unwrap();
        g.add_edge(3, 2, 0.05).unwrap();
        g
    }

    #[test]
    fn test_spectral_embedding_shape() {
        let g = two_cluster_graph();
        let embedding =
            spectral_embedding(&g, Normalization::Unnormalized, 2, false, true).unwrap();
        assert_eq!(embedding.shape(), (6, 2));
    }

    #[test]
    fn test_spectral_embedding_separates_clusters() {
        let g = two_cluster_graph();
        let embedding =
            spectral_embedding(&g, Normalization::Unnormalized, 1, false, true).unwrap();

        // Fiedler vector: the two triangles get opposite signs
        let sign = |x: f64| x > 0.0;
        assert_eq!(sign(embedding.get(0, 0)), sign(embedding.get(1, 0)));
        assert_eq!(sign(embedding.get(0, 0)), sign(embedding.get(2, 0)));
        assert_eq!(sign(embedding.get(3, 0)), sign(embedding.get(4, 0)));
        assert_eq!(sign(embedding.get(3, 0)), sign(embedding.get(5, 0)));
        assert_ne!(sign(embedding.get(0, 0)), sign(embedding.get(3, 0)));
    }

    #[test]
    fn test_spectral_embedding_row_normalization() {
        let g = two_cluster_graph();
        let embedding = spectral_embedding(&g, Normalization::Symmetric, 2, true, true).unwrap();
        for i in 0..6 {
            let norm = embedding.row(i).norm();
            assert!((norm - 1.0).abs() < 1e-8);
        }
    }

    #[test]
    fn test_spectral_embedding_invalid_k() {
        let g = two_cluster_graph();
        assert!(spectral_embedding(&g, Normalization::Unnormalized, 0, false, true).is_err());
        assert!(spectral_embedding(&g, Normalization::Unnormalized, 6, false, true).is_err());
    }

    #[test]
    fn test_spectral_clustering_two_triangles() {
        let g = two_cluster_graph();
        let mut clustering =
            SpectralClustering::new(2, Normalization::Unnormalized).with_random_state(0);
        clustering.fit_graph(&g, true).unwrap();

        let labels = clustering.labels();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[3], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_spectral_clustering_three_triangles() {
        // chain of three triangles with weak bridges
        let mut g = WeightedGraph::new(9);
        for t in 0..3 {
            let base = 3 * t;
            for &(a, b) in &[(0, 1), (1, 2), (2, 0)] {
                g.add_edge(base + a, base + b, 1.0).unwrap();
                g.add_edge(base + b, base + a, 1.0).unwrap();
            }
        }
        for &(a, b) in &[(2, 3), (5, 6)] {
            g.add_edge(a, b, 0.05).unwrap();
            g.add_edge(b, a, 0.05).unwrap();
        }

        let mut clustering =
            SpectralClustering::new(3, Normalization::Unnormalized).with_random_state(0);
        clustering.fit_graph(&g, true).unwrap();

        let labels = clustering.labels();
        for t in 0..3 {
            assert_eq!(labels[3 * t], labels[3 * t + 1]);
            assert_eq!(labels[3 * t], labels[3 * t + 2]);
        }
        assert_ne!(labels[0], labels[3]);
        assert_ne!(labels[3], labels[6]);
        assert_ne!(labels[0], labels[6]);
    }

    #[test]
    fn test_spectral_clustering_rejects_single_cluster() {
        let g = two_cluster_graph();
        let mut clustering = SpectralClustering::new(1, Normalization::Unnormalized);
        assert!(clustering.fit_graph(&g, true).is_err());
    }
}
