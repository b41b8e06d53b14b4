//! Graph segmentation by the method of Felzenszwalb & Huttenlocher.
//!
//! Components are merged greedily along edges sorted by ascending
//! weight, controlled by a scale parameter trading off under- and
//! over-segmentation. Equal-weight edges keep their relative order
//! (the sort is stable), so results are reproducible for a given edge
//! insertion order.

pub mod isoperimetric;

use crate::disjoint_set::DisjointSetForest;
use crate::error::{EspectroError, Result};
use crate::graph::{Edge, WeightedGraph};
use crate::primitives::Matrix;

/// Segments a graph with Felzenszwalb's method.
///
/// `scale` is the k parameter: larger values allow larger components.
/// A post-pass fuses every component of size at most `min_comp_size`
/// into a neighboring component, choosing the first qualifying edge
/// in insertion order.
///
/// # Errors
///
/// Returns an error if the graph has no vertices.
///
/// # Examples
///
/// ```
/// use espectro::graph::WeightedGraph;
/// use espectro::segmentation::felzenszwalb_segment;
///
/// let mut g = WeightedGraph::new(3);
/// g.add_edge(0, 1, 0.1).unwrap();
/// g.add_edge(1, 2, 5.0).unwrap();
///
/// let seg = felzenszwalb_segment(1.0, &g, 0).unwrap();
/// assert_eq!(seg.num_components(), 2);
/// ```
pub fn felzenszwalb_segment(
    scale: f64,
    graph: &WeightedGraph,
    min_comp_size: usize,
) -> Result<DisjointSetForest> {
    let n = graph.num_vertices();
    if n == 0 {
        return Err(EspectroError::empty_input("felzenszwalb_segment graph"));
    }

    let mut edges: Vec<Edge> = graph.edges().to_vec();
    edges.sort_by(|a, b| {
        a.weight
            .partial_cmp(&b.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut segmentation = DisjointSetForest::new(n);
    // max weight allowed inside each component, indexed by root
    let mut internal_difference = vec![0.0f64; n];

    for edge in &edges {
        let root1 = segmentation.find(edge.source)?;
        let root2 = segmentation.find(edge.destination)?;
        if root1 == root2 {
            continue;
        }

        let size1 = segmentation.component_size(root1)? as f64;
        let size2 = segmentation.component_size(root2)? as f64;
        let min_internal = f64::min(
            internal_difference[root1] + scale / size1,
            internal_difference[root2] + scale / size2,
        );

        if edge.weight <= min_internal {
            let new_root = segmentation.union(root1, root2)?;
            internal_difference[new_root] = edge.weight;
        }
    }

    // fuse undersized components into the first neighbor seen
    if min_comp_size > 0 {
        for edge in &edges {
            let root1 = segmentation.find(edge.source)?;
            let root2 = segmentation.find(edge.destination)?;
            if root1 != root2
                && (segmentation.component_size(root1)? <= min_comp_size
                    || segmentation.component_size(root2)? <= min_comp_size)
            {
                segmentation.union(root1, root2)?;
            }
        }
    }

    Ok(segmentation)
}

/// Masked variant of [`felzenszwalb_segment`] for pixel-grid graphs.
///
/// After segmentation, all background pixels (mask value below 0.5)
/// are fused into a single component, whether or not they are
/// adjacent, so exactly one background segment remains.
///
/// # Errors
///
/// Returns an error if the mask size doesn't match the vertex count.
pub fn felzenszwalb_segment_masked(
    scale: f64,
    graph: &WeightedGraph,
    min_comp_size: usize,
    mask: &Matrix<f64>,
) -> Result<DisjointSetForest> {
    let n = graph.num_vertices();
    if mask.n_rows() * mask.n_cols() != n {
        return Err(EspectroError::dimension_mismatch(
            "mask pixels",
            n,
            mask.n_rows() * mask.n_cols(),
        ));
    }

    let mut segmentation = felzenszwalb_segment(scale, graph, min_comp_size)?;

    let mut first_background = None;
    for vertex in 0..n {
        let (row, col) = (vertex / mask.n_cols(), vertex % mask.n_cols());
        if mask.get(row, col) < 0.5 {
            match first_background {
                None => first_background = Some(vertex),
                Some(first) => {
                    segmentation.union(first, vertex)?;
                }
            }
        }
    }
    Ok(segmentation)
}

/// Intersects segmentations of the same graph: two adjacent vertices
/// share a component in the result exactly when they share one in
/// every input segmentation. Edge weights are ignored.
///
/// # Errors
///
/// Returns an error if any segmentation size doesn't match the graph.
pub fn combine_segmentations(
    graph: &WeightedGraph,
    segmentations: &mut [DisjointSetForest],
) -> Result<DisjointSetForest> {
    let n = graph.num_vertices();
    for segmentation in segmentations.iter() {
        if segmentation.len() != n {
            return Err(EspectroError::dimension_mismatch(
                "segmentation",
                n,
                segmentation.len(),
            ));
        }
    }

    let mut combination = DisjointSetForest::new(n);
    for edge in graph.edges() {
        let mut same_everywhere = true;
        for segmentation in segmentations.iter_mut() {
            if segmentation.find(edge.source)? != segmentation.find(edge.destination)? {
                same_everywhere = false;
                break;
            }
        }
        if same_everywhere {
            combination.union(edge.source, edge.destination)?;
        }
    }
    Ok(combination)
}
