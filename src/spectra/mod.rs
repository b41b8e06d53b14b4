//! Graph Laplacians and spectral utilities.
//!
//! Builders come in dense and sparse form and are pure functions of
//! the edge list. A graph may list each undirected edge once or in
//! both directions; the `bidirectional` flag tells the builders which
//! convention the caller used, so both produce the same symmetric
//! Laplacian. Self-loops contribute nothing.

pub mod eigensolver;

use serde::{Deserialize, Serialize};

use crate::error::{EspectroError, Result};
use crate::graph::WeightedGraph;
use crate::primitives::{Matrix, Vector};
use crate::sparse::SparseMatrix;

/// Degrees below this are treated as isolated, skipping the
/// normalization divide that would otherwise produce NaN.
pub const DEGREE_TOLERANCE: f64 = 1e-8;

/// Laplacian normalization scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Normalization {
    /// `L = D - W`.
    Unnormalized,
    /// `I - D^{-1/2} W D^{-1/2}`.
    Symmetric,
    /// `I - D^{-1} W`.
    RandomWalk,
}

fn accumulate(graph: &WeightedGraph, bidirectional: bool) -> (Vector<f64>, Vec<(usize, usize, f64)>) {
    let n = graph.num_vertices();
    let mut degrees = Vector::zeros(n);
    // symmetric off-diagonal weights, one entry per direction
    let mut weights = Vec::with_capacity(2 * graph.num_edges());

    for edge in graph.edges() {
        if edge.source == edge.destination {
            continue;
        }
        weights.push((edge.source, edge.destination, edge.weight));
        degrees[edge.source] += edge.weight;
        if !bidirectional {
            weights.push((edge.destination, edge.source, edge.weight));
            degrees[edge.destination] += edge.weight;
        }
    }
    (degrees, weights)
}

/// Builds the dense Laplacian of a graph.
///
/// # Errors
///
/// Returns an error if the graph has no vertices.
///
/// # Examples
///
/// ```
/// use espectro::graph::WeightedGraph;
/// use espectro::spectra::{dense_laplacian, Normalization};
///
/// let mut g = WeightedGraph::new(2);
/// g.add_edge(0, 1, 2.0).unwrap();
/// let l = dense_laplacian(&g, Normalization::Unnormalized, false).unwrap();
/// assert_eq!(l.get(0, 0), 2.0);
/// assert_eq!(l.get(0, 1), -2.0);
/// ```
pub fn dense_laplacian(
    graph: &WeightedGraph,
    normalization: Normalization,
    bidirectional: bool,
) -> Result<Matrix<f64>> {
    let n = graph.num_vertices();
    if n == 0 {
        return Err(EspectroError::empty_input("dense_laplacian graph"));
    }

    let (degrees, weights) = accumulate(graph, bidirectional);
    let mut laplacian = Matrix::zeros(n, n);

    match normalization {
        Normalization::Unnormalized => {
            for i in 0..n {
                laplacian.set(i, i, degrees[i]);
            }
            for (s, d, w) in weights {
                let prev = laplacian.get(s, d);
                laplacian.set(s, d, prev - w);
            }
        }
        Normalization::Symmetric | Normalization::RandomWalk => {
            for i in 0..n {
                laplacian.set(i, i, 1.0);
            }
            for (s, d, w) in weights {
                if degrees[s] < DEGREE_TOLERANCE || degrees[d] < DEGREE_TOLERANCE {
                    continue;
                }
                let scaled = match normalization {
                    Normalization::Symmetric => w / (degrees[s] * degrees[d]).sqrt(),
                    _ => w / degrees[s],
                };
                let prev = laplacian.get(s, d);
                laplacian.set(s, d, prev - scaled);
            }
        }
    }
    Ok(laplacian)
}

/// Builds the sparse Laplacian of a graph, returning it with the
/// degree vector.
///
/// Vertices with degree below [`DEGREE_TOLERANCE`] contribute an
/// identity row under the normalized schemes.
///
/// # Errors
///
/// Returns an error if the graph has no vertices.
pub fn sparse_laplacian(
    graph: &WeightedGraph,
    normalization: Normalization,
    bidirectional: bool,
) -> Result<(SparseMatrix, Vector<f64>)> {
    let n = graph.num_vertices();
    if n == 0 {
        return Err(EspectroError::empty_input("sparse_laplacian graph"));
    }

    let (degrees, weights) = accumulate(graph, bidirectional);
    let mut triplets = Vec::with_capacity(weights.len() + n);

    match normalization {
        Normalization::Unnormalized => {
            for i in 0..n {
                if degrees[i] != 0.0 {
                    triplets.push((i, i, degrees[i]));
                }
            }
            for (s, d, w) in weights {
                triplets.push((s, d, -w));
            }
        }
        Normalization::Symmetric | Normalization::RandomWalk => {
            for i in 0..n {
                triplets.push((i, i, 1.0));
            }
            for (s, d, w) in weights {
                if degrees[s] < DEGREE_TOLERANCE || degrees[d] < DEGREE_TOLERANCE {
                    continue;
                }
                let scaled = match normalization {
                    Normalization::Symmetric => w / (degrees[s] * degrees[d]).sqrt(),
                    _ => w / degrees[s],
                };
                triplets.push((s, d, -scaled));
            }
        }
    }

    let matrix = SparseMatrix::from_triplets(n, n, &triplets)?;
    Ok((matrix, degrees))
}

/// Index of the largest consecutive gap in an ascending eigenvalue
/// sequence, used to pick a subspace dimension. A flat or too-short
/// spectrum yields 0.
#[must_use]
pub fn eigen_gap(eigenvalues: &Vector<f64>) -> usize {
    if eigenvalues.len() < 2 {
        return 0;
    }
    let mut best_index = 0;
    let mut best_gap = 0.0;
    for i in 0..eigenvalues.len() - 1 {
        let gap = eigenvalues[i + 1] - eigenvalues[i];
        if gap > best_gap {
            best_gap = gap;
            best_index = i;
        }
    }
    best_index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_graph(bidirectional: bool) -> WeightedGraph {
        let mut g = WeightedGraph::new(3);
        g.add_edge(0, 1, 1.0).unwrap();
        g.add_edge(1, 2, 2.0).unwrap();
        if bidirectional {
            g.add_edge(1, 0, 1.0).unwrap();
            g.add_edge(2, 1, 2.0).unwrap();
        }
        g
    }

    #[test]
    fn test_unnormalized_dense_laplacian() {
        let g = path_graph(false);
        let l = dense_laplacian(&g, Normalization::Unnormalized, false).unwrap();
        assert_eq!(l.get(0, 0), 1.0);
        assert_eq!(l.get(1, 1), 3.0);
        assert_eq!(l.get(2, 2), 2.0);
        assert_eq!(l.get(0, 1), -1.0);
        assert_eq!(l.get(1, 0), -1.0);
        assert_eq!(l.get(1, 2), -2.0);
        assert_eq!(l.get(0, 2), 0.0);
    }

    #[test]
    fn test_directed_and_bidirectional_agree() {
        for normalization in [
            Normalization::Unnormalized,
            Normalization::Symmetric,
            Normalization::RandomWalk,
        ] {
            let once = dense_laplacian(&path_graph(false), normalization, false).unwrap();
            let both = dense_laplacian(&path_graph(true), normalization, true).unwrap();
            assert!(
                once.sub(&both).unwrap().max_abs() < 1e-12,
                "{normalization:?} differs between representations"
            );
        }
    }

    #[test]
    fn test_sparse_matches_dense() {
        for normalization in [
            Normalization::Unnormalized,
            Normalization::Symmetric,
            Normalization::RandomWalk,
        ] {
            let g = path_graph(true);
            let dense = dense_laplacian(&g, normalization, true).unwrap();
            let (sparse, _) = sparse_laplacian(&g, normalization, true).unwrap();
            let diff = dense.sub(&sparse.to_dense()).unwrap().max_abs();
            assert!(diff < 1e-8, "{normalization:?} mismatch {diff}");
        }
    }

    #[test]
    fn test_sparse_laplacian_degrees() {
        let (_, degrees) = sparse_laplacian(
            &path_graph(false),
            Normalization::Unnormalized,
            false,
        )
        .unwrap();
        assert_eq!(degrees.as_slice(), &[1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_all_ones_in_null_space() {
        let g = path_graph(true);
        let l = dense_laplacian(&g, Normalization::Unnormalized, true).unwrap();
        let ones = Vector::ones(3);
        let residual = l.matvec(&ones).unwrap();
        assert!(residual.norm() <= 1e-8);
    }

    #[test]
    fn test_isolated_vertex_identity_row() {
        let mut g = WeightedGraph::new(3);
        g.add_edge(0, 1, 1.0).unwrap();
        // vertex 2 is isolated
        let l = dense_laplacian(&g, Normalization::Symmetric, false).unwrap();
        assert_eq!(l.get(2, 2), 1.0);
        assert_eq!(l.get(2, 0), 0.0);
        assert_eq!(l.get(2, 1), 0.0);
    }

    #[test]
    fn test_self_loops_ignored() {
        let mut g = WeightedGraph::new(2);
        g.add_edge(0, 1, 1.0).unwrap();
        g.add_edge(0, 0, 5.0).unwrap();
        let l = dense_laplacian(&g, Normalization::Unnormalized, false).unwrap();
        assert_eq!(l.get(0, 0), 1.0);
    }

    #[test]
    fn test_symmetric_normalized_diagonal() {
        let g = path_graph(false);
        let l = dense_laplacian(&g, Normalization::Symmetric, false).unwrap();
        for i in 0..3 {
            assert_eq!(l.get(i, i), 1.0);
        }
        // off-diagonal: -w / sqrt(d_s d_d)
        assert!((l.get(0, 1) + 1.0 / 3.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_graph_errors() {
        let g = WeightedGraph::new(0);
        assert!(dense_laplacian(&g, Normalization::Unnormalized, false).is_err());
        assert!(sparse_laplacian(&g, Normalization::Unnormalized, false).is_err());
    }

    #[test]
    fn test_eigen_gap_picks_largest_jump() {
        let values = Vector::from_slice(&[0.0, 0.1, 0.2, 5.0, 5.1]);
        assert_eq!(eigen_gap(&values), 2);
    }

    #[test]
    fn test_eigen_gap_flat_spectrum() {
        let values = Vector::from_slice(&[1.0, 1.0, 1.0]);
        assert_eq!(eigen_gap(&values), 0);
        assert_eq!(eigen_gap(&Vector::from_slice(&[3.0])), 0);
        assert_eq!(eigen_gap(&Vector::zeros(0)), 0);
    }
}
