//! Isoperimetric graph partitioning after Grady & Schwarz (2006).
//!
//! Each connected component is bipartitioned recursively: solve
//! `L0 x0 = d0` with the max-degree ground vertex removed, sweep a
//! threshold over the sorted solution for the cut minimizing the
//! isoperimetric ratio, and stop once the best ratio drops below the
//! caller's bound. Expects a bidirectional graph representation.

use crate::disjoint_set::DisjointSetForest;
use crate::error::{EspectroError, Result};
use crate::graph::{fuse_partitions, WeightedGraph};
use crate::primitives::Vector;
use crate::sparse::conjugate_gradient;
use crate::spectra::{sparse_laplacian, Normalization};

const CG_TOLERANCE: f64 = 1e-8;

/// Partitions a possibly disconnected graph by recursive
/// isoperimetric bipartition.
///
/// `stop` bounds the isoperimetric ratio below which a bipartition is
/// accepted as final; smaller values produce fewer, better-separated
/// segments. `max_recursions` caps the recursion depth, merging
/// whatever remains into single segments once exhausted.
///
/// # Errors
///
/// Returns an error if the graph is empty, or if the reduced linear
/// system turns out not positive definite, which indicates the graph
/// representation was not bidirectional.
pub fn isoperimetric_partition(
    graph: &WeightedGraph,
    stop: f64,
    max_recursions: usize,
) -> Result<DisjointSetForest> {
    if graph.num_vertices() == 0 {
        return Err(EspectroError::empty_input("isoperimetric_partition graph"));
    }

    let (labels, count) = graph.connected_components();
    let (subgraphs, vertex_idx) = graph.induced_subgraphs(&labels, count)?;

    let mut partitions = Vec::with_capacity(count);
    for subgraph in &subgraphs {
        partitions.push(partition_connected(subgraph, stop, max_recursions)?);
    }
    fuse_partitions(graph, &labels, &vertex_idx, &mut partitions)
}

/// Maps a reduced-space vertex back to the full graph, where the
/// ground vertex `v0` still exists.
fn expand(v0: usize, v: usize) -> usize {
    if v < v0 {
        v
    } else {
        v + 1
    }
}

/// Inverse of [`expand`]; `v` must not be the ground vertex.
fn reduce(v0: usize, v: usize) -> usize {
    debug_assert_ne!(v0, v);
    if v < v0 {
        v
    } else {
        v - 1
    }
}

/// Sweeps the sorted solution vector for the cut with the smallest
/// isoperimetric ratio whose volume stays within half the graph.
///
/// Returns the number of reduced-space vertices in the ground-side
/// segment (0 means the ground vertex alone) and the ratio.
fn ratio_cut_threshold(
    graph: &WeightedGraph,
    v0: usize,
    d0: &Vector<f64>,
    degrees: &Vector<f64>,
    order: &[usize],
    graph_volume: f64,
) -> (usize, f64) {
    let mut in_segment = vec![false; order.len()];
    let mut boundary = degrees[v0];
    let mut volume = degrees[v0];

    for (i, &vertex) in order.iter().enumerate() {
        // weight of edges from this vertex into the current segment
        let mut internal = 0.0;
        for half_edge in graph.adjacency(expand(v0, vertex)) {
            if half_edge.destination == v0 {
                internal += half_edge.weight;
            } else if in_segment[reduce(v0, half_edge.destination)] {
                internal += half_edge.weight;
            }
        }

        let new_boundary = boundary + d0[vertex] - 2.0 * internal;
        let new_volume = volume + d0[vertex];

        // the ratio is non-increasing while the volume constraint holds
        if new_volume > graph_volume / 2.0 {
            return (i, boundary / volume);
        }

        boundary = new_boundary;
        volume = new_volume;
        in_segment[vertex] = true;
    }

    (order.len(), boundary / volume)
}

fn partition_connected(
    graph: &WeightedGraph,
    stop: f64,
    max_recursions: usize,
) -> Result<DisjointSetForest> {
    let n = graph.num_vertices();
    if n == 0 {
        return Err(EspectroError::empty_input("partition_connected graph"));
    }
    if n == 1 {
        return Ok(DisjointSetForest::new(1));
    }
    if max_recursions == 0 {
        let mut whole = DisjointSetForest::new(n);
        for vertex in 1..n {
            whole.union(0, vertex)?;
        }
        return Ok(whole);
    }

    let (laplacian, degrees) = sparse_laplacian(graph, Normalization::Unnormalized, true)?;

    let v0 = degrees.argmax().unwrap_or(0);
    let reduced = laplacian.without_row_col(v0)?;

    let mut d0 = Vector::zeros(n - 1);
    for v in 0..n - 1 {
        d0[v] = degrees[expand(v0, v)];
    }

    let max_iterations = (2 * n).max(200);
    let x0 = conjugate_gradient(&reduced, &d0, CG_TOLERANCE, max_iterations)?;
    log::debug!("isoperimetric solve done, n = {n}, ground = {v0}");

    let mut order: Vec<usize> = (0..n - 1).collect();
    order.sort_by(|&a, &b| x0[a].partial_cmp(&x0[b]).unwrap_or(std::cmp::Ordering::Equal));

    let graph_volume = degrees.sum();
    let (count, ratio) = ratio_cut_threshold(graph, v0, &d0, &degrees, &order, graph_volume);

    // a degenerate cut leaves one side empty; stop here instead of
    // recursing forever
    if count >= order.len() {
        let mut whole = DisjointSetForest::new(n);
        for vertex in 1..n {
            whole.union(0, vertex)?;
        }
        return Ok(whole);
    }

    if ratio < stop {
        log::debug!("accepting bipartition with ratio {ratio:.6}");
        let mut bipartition = DisjointSetForest::new(n);
        for &vertex in &order[..count] {
            bipartition.union(v0, expand(v0, vertex))?;
        }
        let complement_head = expand(v0, order[count]);
        for &vertex in &order[count + 1..] {
            bipartition.union(complement_head, expand(v0, vertex))?;
        }
        return Ok(bipartition);
    }

    // ratio not good enough yet, split at the best cut and recurse
    let mut in_segment = vec![1usize; n];
    in_segment[v0] = 0;
    for &vertex in &order[..count] {
        in_segment[expand(v0, vertex)] = 0;
    }

    let (subgraphs, vertex_idx) = graph.induced_subgraphs(&in_segment, 2)?;
    let mut partitions = Vec::with_capacity(2);
    for subgraph in &subgraphs {
        partitions.push(isoperimetric_partition(subgraph, stop, max_recursions - 1)?);
    }
    fuse_partitions(graph, &in_segment, &vertex_idx, &mut partitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_bidirectional(g: &mut WeightedGraph, pairs: &[(usize, usize)]) {
        for &(a, b) in pairs {
            g.add_edge(a, b, 1.0).unwrap();
            g.add_edge(b, a, 1.0).unwrap();
        }
    }

    /// Two triangle-like clusters bridged at vertex 2.
    fn two_cluster_graph() -> WeightedGraph {
        let mut g = WeightedGraph::new(6);
        add_bidirectional(&mut g, &[(0, 1), (0, 2), (2, 1), (2, 3), (3, 4), (4, 5), (5, 3)]);
        g
    }

    #[test]
    fn test_two_clusters_are_separated() {
        let g = two_cluster_graph();
        let mut partition = isoperimetric_partition(&g, 0.5, 10).unwrap();
        assert_eq!(partition.num_components(), 2);
        assert_eq!(partition.find(0).unwrap(), partition.find(1).unwrap());
        assert_eq!(partition.find(0).unwrap(), partition.find(2).unwrap());
        assert_eq!(partition.find(3).unwrap(), partition.find(4).unwrap());
        assert_eq!(partition.find(3).unwrap(), partition.find(5).unwrap());
        assert_ne!(partition.find(0).unwrap(), partition.find(3).unwrap());
    }

    #[test]
    fn test_single_vertex_is_trivial() {
        let g = WeightedGraph::new(1);
        let partition = isoperimetric_partition(&g, 0.5, 10).unwrap();
        assert_eq!(partition.num_components(), 1);
    }

    #[test]
    fn test_empty_graph_is_an_error() {
        let g = WeightedGraph::new(0);
        assert!(isoperimetric_partition(&g, 0.5, 10).is_err());
    }

    #[test]
    fn test_disconnected_components_partitioned_independently() {
        // two copies of the two-cluster graph, never merged across
        let mut g = WeightedGraph::new(12);
        let pairs = [(0, 1), (0, 2), (2, 1), (2, 3), (3, 4), (4, 5), (5, 3)];
        add_bidirectional(&mut g, &pairs);
        for &(a, b) in &pairs {
            g.add_edge(a + 6, b + 6, 1.0).unwrap();
            g.add_edge(b + 6, a + 6, 1.0).unwrap();
        }

        let mut partition = isoperimetric_partition(&g, 0.5, 10).unwrap();
        assert_eq!(partition.num_components(), 4);
        assert_eq!(partition.find(0).unwrap(), partition.find(1).unwrap());
        assert_eq!(partition.find(6).unwrap(), partition.find(7).unwrap());
        assert_ne!(partition.find(0).unwrap(), partition.find(6).unwrap());
        assert_ne!(partition.find(3).unwrap(), partition.find(9).unwrap());
    }

    #[test]
    fn test_recursion_budget_zero_merges_each_component() {
        let g = two_cluster_graph();
        let partition = isoperimetric_partition(&g, 0.5, 0).unwrap();
        assert_eq!(partition.num_components(), 1);
    }

    #[test]
    fn test_tight_stop_still_terminates() {
        let g = two_cluster_graph();
        // stop = 0 means no bipartition is ever accepted, recursion
        // must bottom out on trivial subgraphs
        let partition = isoperimetric_partition(&g, 0.0, 20);
        assert!(partition.is_ok());
    }
}
