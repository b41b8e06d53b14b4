//! Weighted graphs as edge lists with per-vertex adjacency.
//!
//! Graphs here have a fixed vertex count and are append-only: the
//! builders construct them once and the algorithms read them. A graph
//! may be stored directed (each undirected edge listed once) or
//! bidirectional (listed both ways); callers track which, and the
//! Laplacian builders in [`crate::spectra`] accept a flag for it.

pub mod build;

use serde::{Deserialize, Serialize};

use crate::disjoint_set::DisjointSetForest;
use crate::error::{EspectroError, Result};
use crate::primitives::Vector;

/// A weighted edge between two vertices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: usize,
    pub destination: usize,
    pub weight: f64,
}

/// Outgoing half of an edge, stored in the source's adjacency list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HalfEdge {
    pub destination: usize,
    pub weight: f64,
}

/// Weighted graph over vertices `0..num_vertices`.
///
/// Every edge appended through [`add_edge`](Self::add_edge) appears
/// both in the flat edge list and as a half-edge in the source
/// vertex's adjacency list.
///
/// # Examples
///
/// ```
/// use espectro::graph::WeightedGraph;
///
/// let mut g = WeightedGraph::new(3);
/// g.add_edge(0, 1, 2.0).unwrap();
/// g.add_edge(1, 2, 1.0).unwrap();
/// assert_eq!(g.num_edges(), 2);
/// assert_eq!(g.adjacency(1)[0].destination, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedGraph {
    adjacency: Vec<Vec<HalfEdge>>,
    edges: Vec<Edge>,
}

impl WeightedGraph {
    /// Creates a graph with `num_vertices` vertices and no edges.
    #[must_use]
    pub fn new(num_vertices: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); num_vertices],
            edges: Vec::new(),
        }
    }

    /// Number of vertices.
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of listed edges. Bidirectional graphs count each
    /// undirected edge twice.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// All edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Half-edges going out of `vertex`, in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if `vertex` is out of range.
    #[must_use]
    pub fn adjacency(&self, vertex: usize) -> &[HalfEdge] {
        &self.adjacency[vertex]
    }

    /// Appends an edge.
    ///
    /// # Errors
    ///
    /// Returns an error if either endpoint is out of range.
    pub fn add_edge(&mut self, source: usize, destination: usize, weight: f64) -> Result<()> {
        let n = self.num_vertices();
        if source >= n {
            return Err(EspectroError::index_out_of_bounds(source, n));
        }
        if destination >= n {
            return Err(EspectroError::index_out_of_bounds(destination, n));
        }
        self.edges.push(Edge {
            source,
            destination,
            weight,
        });
        self.adjacency[source].push(HalfEdge {
            destination,
            weight,
        });
        Ok(())
    }

    /// Per-vertex degree, the sum of outgoing half-edge weights. For
    /// a bidirectional graph this is the usual weighted degree.
    #[must_use]
    pub fn degrees(&self) -> Vector<f64> {
        let mut degrees = Vector::zeros(self.num_vertices());
        for edge in &self.edges {
            degrees[edge.source] += edge.weight;
        }
        degrees
    }

    /// Labels each vertex with its connected component and returns
    /// the component count. Edge direction is ignored, so the result
    /// is the same for directed and bidirectional storage.
    #[must_use]
    pub fn connected_components(&self) -> (Vec<usize>, usize) {
        let n = self.num_vertices();
        let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for edge in &self.edges {
            neighbors[edge.source].push(edge.destination);
            neighbors[edge.destination].push(edge.source);
        }

        let mut labels = vec![usize::MAX; n];
        let mut count = 0;
        let mut stack = Vec::new();
        for start in 0..n {
            if labels[start] != usize::MAX {
                continue;
            }
            labels[start] = count;
            stack.push(start);
            while let Some(vertex) = stack.pop() {
                for &next in &neighbors[vertex] {
                    if labels[next] == usize::MAX {
                        labels[next] = count;
                        stack.push(next);
                    }
                }
            }
            count += 1;
        }
        (labels, count)
    }

    /// Splits the graph into the subgraphs induced by a vertex
    /// labeling with labels in `0..num_subgraphs`. Returns the
    /// subgraphs and, for each original vertex, its index within its
    /// subgraph. Edges crossing between labels are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the labeling length doesn't match the
    /// vertex count or a label is out of range.
    pub fn induced_subgraphs(
        &self,
        labels: &[usize],
        num_subgraphs: usize,
    ) -> Result<(Vec<WeightedGraph>, Vec<usize>)> {
        let n = self.num_vertices();
        if labels.len() != n {
            return Err(EspectroError::dimension_mismatch("labels", n, labels.len()));
        }

        let mut sizes = vec![0usize; num_subgraphs];
        let mut vertex_idx = vec![0usize; n];
        for (vertex, &label) in labels.iter().enumerate() {
            if label >= num_subgraphs {
                return Err(EspectroError::index_out_of_bounds(label, num_subgraphs));
            }
            vertex_idx[vertex] = sizes[label];
            sizes[label] += 1;
        }

        let mut subgraphs: Vec<WeightedGraph> =
            sizes.iter().map(|&s| WeightedGraph::new(s)).collect();
        for edge in &self.edges {
            if labels[edge.source] == labels[edge.destination] {
                subgraphs[labels[edge.source]].add_edge(
                    vertex_idx[edge.source],
                    vertex_idx[edge.destination],
                    edge.weight,
                )?;
            }
        }
        Ok((subgraphs, vertex_idx))
    }
}

/// Combines partitions of disjoint subgraphs into one partition of
/// the parent graph.
///
/// Two parent vertices end up in the same component exactly when they
/// share a subgraph and their subgraph images share a component.
/// `labels` and `vertex_idx` are the outputs of
/// [`WeightedGraph::induced_subgraphs`].
///
/// # Errors
///
/// Returns an error if the label or index vectors don't match the
/// graph, or if a subgraph partition is smaller than its subgraph.
pub fn fuse_partitions(
    graph: &WeightedGraph,
    labels: &[usize],
    vertex_idx: &[usize],
    partitions: &mut [DisjointSetForest],
) -> Result<DisjointSetForest> {
    let n = graph.num_vertices();
    if labels.len() != n {
        return Err(EspectroError::dimension_mismatch("labels", n, labels.len()));
    }
    if vertex_idx.len() != n {
        return Err(EspectroError::dimension_mismatch(
            "vertex_idx",
            n,
            vertex_idx.len(),
        ));
    }

    let mut fused = DisjointSetForest::new(n);
    for edge in graph.edges() {
        if labels[edge.source] != labels[edge.destination] {
            continue;
        }
        let label = labels[edge.source];
        if label >= partitions.len() {
            return Err(EspectroError::index_out_of_bounds(label, partitions.len()));
        }
        let sub = &mut partitions[label];
        if sub.find(vertex_idx[edge.source])? == sub.find(vertex_idx[edge.destination])? {
            fused.union(edge.source, edge.destination)?;
        }
    }
    Ok(fused)
}

/// Drops vertices with an empty adjacency list, renumbering the rest.
///
/// Returns the reduced graph and a per-vertex map to the reduced
/// index, `None` for dropped vertices. Expects a bidirectional
/// representation, since only outgoing half-edges are inspected.
///
/// # Errors
///
/// Returns an error if rebuilding an edge fails, which cannot happen
/// for a bidirectional input.
pub fn remove_isolated_vertices(
    graph: &WeightedGraph,
) -> Result<(WeightedGraph, Vec<Option<usize>>)> {
    let n = graph.num_vertices();
    let mut vertex_map: Vec<Option<usize>> = Vec::with_capacity(n);
    let mut kept = 0;
    for vertex in 0..n {
        if graph.adjacency(vertex).is_empty() {
            vertex_map.push(None);
        } else {
            vertex_map.push(Some(kept));
            kept += 1;
        }
    }

    let mut reduced = WeightedGraph::new(kept);
    for edge in graph.edges() {
        if let (Some(s), Some(d)) = (vertex_map[edge.source], vertex_map[edge.destination]) {
            reduced.add_edge(s, d, edge.weight)?;
        }
    }
    Ok((reduced, vertex_map))
}

/// Lifts a partition of the reduced graph back to the full vertex
/// set, fusing all previously removed vertices into one component.
///
/// `vertex_map` is the map returned by [`remove_isolated_vertices`].
///
/// # Errors
///
/// Returns an error if the map length doesn't match the graph.
pub fn add_isolated_vertices(
    graph: &WeightedGraph,
    segmentation: &mut DisjointSetForest,
    vertex_map: &[Option<usize>],
) -> Result<DisjointSetForest> {
    let n = graph.num_vertices();
    if vertex_map.len() != n {
        return Err(EspectroError::dimension_mismatch(
            "vertex_map",
            n,
            vertex_map.len(),
        ));
    }

    let mut result = DisjointSetForest::new(n);
    for edge in graph.edges() {
        if let (Some(s), Some(d)) = (vertex_map[edge.source], vertex_map[edge.destination]) {
            if segmentation.find(s)? == segmentation.find(d)? {
                result.union(edge.source, edge.destination)?;
            }
        }
    }

    let mut first_isolated = None;
    for (vertex, mapped) in vertex_map.iter().enumerate() {
        if mapped.is_none() {
            match first_isolated {
                None => first_isolated = Some(vertex),
                Some(first) => {
                    result.union(first, vertex)?;
                }
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_components() -> WeightedGraph {
        // triangle {0,1,2} and edge {3,4}, vertex 5 isolated
        let mut g = WeightedGraph::new(6);
        g.add_edge(0, 1, 1.0).unwrap();
        g.add_edge(1, 2, 1.0).unwrap();
        g.add_edge(2, 0, 1.0).unwrap();
        g.add_edge(3, 4, 2.0).unwrap();
        g
    }

    #[test]
    fn test_add_edge_updates_both_views() {
        let mut g = WeightedGraph::new(2);
        g.add_edge(0, 1, 3.0).unwrap();
        assert_eq!(g.num_edges(), 1);
        assert_eq!(g.edges()[0].weight, 3.0);
        assert_eq!(g.adjacency(0).len(), 1);
        assert!(g.adjacency(1).is_empty());
    }

    #[test]
    fn test_add_edge_out_of_range() {
        let mut g = WeightedGraph::new(2);
        assert!(g.add_edge(0, 2, 1.0).is_err());
        assert!(g.add_edge(5, 0, 1.0).is_err());
    }

    #[test]
    fn test_degrees_bidirectional() {
        let mut g = WeightedGraph::new(3);
        g.add_edge(0, 1, 2.0).unwrap();
        g.add_edge(1, 0, 2.0).unwrap();
        g.add_edge(1, 2, 1.0).unwrap();
        g.add_edge(2, 1, 1.0).unwrap();
        let d = g.degrees();
        assert_eq!(d.as_slice(), &[2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_connected_components() {
        let g = two_components();
        let (labels, count) = g.connected_components();
        assert_eq!(count, 3);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
        assert_ne!(labels[5], labels[0]);
        assert_ne!(labels[5], labels[3]);
    }

    #[test]
    fn test_connected_components_ignores_direction() {
        let mut g = WeightedGraph::new(3);
        g.add_edge(2, 0, 1.0).unwrap();
        let (labels, count) = g.connected_components();
        assert_eq!(count, 2);
        assert_eq!(labels[0], labels[2]);
    }

    #[test]
    fn test_induced_subgraphs() {
        let g = two_components();
        let (labels, count) = g.connected_components();
        let (subgraphs, vertex_idx) = g.induced_subgraphs(&labels, count).unwrap();
        assert_eq!(subgraphs.len(), 3);

        let triangle = &subgraphs[labels[0]];
        assert_eq!(triangle.num_vertices(), 3);
        assert_eq!(triangle.num_edges(), 3);

        let pair = &subgraphs[labels[3]];
        assert_eq!(pair.num_vertices(), 2);
        assert_eq!(pair.num_edges(), 1);
        assert_eq!(vertex_idx[3], 0);
        assert_eq!(vertex_idx[4], 1);

        assert_eq!(subgraphs[labels[5]].num_vertices(), 1);
    }

    #[test]
    fn test_induced_subgraphs_bad_labeling() {
        let g = two_components();
        assert!(g.induced_subgraphs(&[0, 0], 1).is_err());
        assert!(g.induced_subgraphs(&[2; 6], 2).is_err());
    }

    #[test]
    fn test_fuse_partitions_round_trip() {
        let g = two_components();
        let (labels, count) = g.connected_components();
        let (subgraphs, vertex_idx) = g.induced_subgraphs(&labels, count).unwrap();

        // fully merge each subgraph
        let mut partitions: Vec<DisjointSetForest> = subgraphs
            .iter()
            .map(|sub| {
                let mut forest = DisjointSetForest::new(sub.num_vertices());
                for v in 1..sub.num_vertices() {
                    forest.union(0, v).unwrap();
                }
                forest
            })
            .collect();

        let mut fused = fuse_partitions(&g, &labels, &vertex_idx, &mut partitions).unwrap();
        assert_eq!(fused.num_components(), 3);
        assert_eq!(fused.find(0).unwrap(), fused.find(2).unwrap());
        assert_eq!(fused.find(3).unwrap(), fused.find(4).unwrap());
        assert_ne!(fused.find(0).unwrap(), fused.find(3).unwrap());
    }

    #[test]
    fn test_remove_and_add_isolated_vertices() {
        let mut g = WeightedGraph::new(5);
        // bidirectional edge between 1 and 3; vertices 0, 2, 4 isolated
        g.add_edge(1, 3, 1.0).unwrap();
        g.add_edge(3, 1, 1.0).unwrap();

        let (reduced, vertex_map) = remove_isolated_vertices(&g).unwrap();
        assert_eq!(reduced.num_vertices(), 2);
        assert_eq!(reduced.num_edges(), 2);
        assert_eq!(vertex_map[1], Some(0));
        assert_eq!(vertex_map[3], Some(1));
        assert_eq!(vertex_map[0], None);

        let mut seg = DisjointSetForest::new(2);
        seg.union(0, 1).unwrap();
        let mut lifted = add_isolated_vertices(&g, &mut seg, &vertex_map).unwrap();

        // one component for {1,3}, one for the isolated {0,2,4}
        assert_eq!(lifted.num_components(), 2);
        assert_eq!(lifted.find(1).unwrap(), lifted.find(3).unwrap());
        assert_eq!(lifted.find(0).unwrap(), lifted.find(2).unwrap());
        assert_eq!(lifted.find(0).unwrap(), lifted.find(4).unwrap());
        assert_ne!(lifted.find(0).unwrap(), lifted.find(1).unwrap());
    }
}
