//! Graph builders: pixel grids, nearest-neighbor graphs and
//! segmentation adjacency graphs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::disjoint_set::DisjointSetForest;
use crate::error::{EspectroError, Result};
use crate::graph::WeightedGraph;
use crate::index::KnnIndex;
use crate::primitives::Matrix;

/// Multi-channel raster image stored row-major, one vertex per pixel
/// in the graphs built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
    channels: usize,
}

impl Image {
    /// Creates an image from row-major interleaved channel data.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer length is not
    /// `rows * cols * channels`.
    pub fn from_vec(rows: usize, cols: usize, channels: usize, data: Vec<f64>) -> Result<Self> {
        let expected = rows * cols * channels;
        if data.len() != expected {
            return Err(EspectroError::dimension_mismatch(
                "image data",
                expected,
                data.len(),
            ));
        }
        Ok(Self {
            data,
            rows,
            cols,
            channels,
        })
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Channel values of the pixel at (row, col).
    ///
    /// # Panics
    ///
    /// Panics if the position is out of range.
    #[must_use]
    pub fn pixel(&self, row: usize, col: usize) -> &[f64] {
        let start = (row * self.cols + col) * self.channels;
        &self.data[start..start + self.channels]
    }

    /// Row-major vertex index of the pixel at (row, col).
    #[must_use]
    pub fn vertex(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }
}

/// Pixel neighborhood used by [`grid_graph`]. Only forward offsets
/// are listed so each undirected pixel pair is visited once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectivity {
    Four,
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &[(1, 0), (0, 1)],
            Connectivity::Eight => &[(1, -1), (1, 0), (1, 1), (0, 1)],
        }
    }
}

/// Edge-weight function between two neighboring pixels.
///
/// The `floor` addend keeps weights strictly positive; zero-weight
/// edges would defeat Felzenszwalb's scale comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PixelSimilarity {
    /// Euclidean distance between channel vectors, plus `floor`.
    EuclideanColor { floor: f64 },
    /// Absolute difference of the first channel, plus `floor`.
    IntensityDifference { floor: f64 },
    /// The same weight for every edge.
    Constant(f64),
}

impl PixelSimilarity {
    /// Weight of the edge between pixels with channel values `a`, `b`.
    #[must_use]
    pub fn weight(&self, a: &[f64], b: &[f64]) -> f64 {
        match *self {
            PixelSimilarity::EuclideanColor { floor } => {
                let squared: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                squared.sqrt() + floor
            }
            PixelSimilarity::IntensityDifference { floor } => (a[0] - b[0]).abs() + floor,
            PixelSimilarity::Constant(weight) => weight,
        }
    }
}

/// Builds the pixel-grid graph of an image.
///
/// Vertices are all pixels in row-major order; edges connect each
/// in-mask pixel (mask value at least 0.5) to its in-mask forward
/// neighbors, weighted by `similarity`. With `bidirectional` each
/// edge is also listed in the reverse direction.
///
/// # Errors
///
/// Returns an error if the mask shape doesn't match the image.
pub fn grid_graph(
    image: &Image,
    mask: &Matrix<f64>,
    connectivity: Connectivity,
    similarity: PixelSimilarity,
    bidirectional: bool,
) -> Result<WeightedGraph> {
    if mask.n_rows() != image.rows() || mask.n_cols() != image.cols() {
        return Err(EspectroError::dimension_mismatch(
            "mask rows",
            image.rows(),
            mask.n_rows(),
        ));
    }

    let mut grid = WeightedGraph::new(image.rows() * image.cols());
    for row in 0..image.rows() {
        for col in 0..image.cols() {
            if mask.get(row, col) < 0.5 {
                continue;
            }
            let center = image.vertex(row, col);
            for &(dr, dc) in connectivity.offsets() {
                let nr = row as isize + dr;
                let nc = col as isize + dc;
                if nr < 0 || nr >= image.rows() as isize || nc < 0 || nc >= image.cols() as isize {
                    continue;
                }
                let (nr, nc) = (nr as usize, nc as usize);
                if mask.get(nr, nc) < 0.5 {
                    continue;
                }
                let neighbor = image.vertex(nr, nc);
                let weight = similarity.weight(image.pixel(row, col), image.pixel(nr, nc));
                grid.add_edge(center, neighbor, weight)?;
                if bidirectional {
                    grid.add_edge(neighbor, center, weight)?;
                }
            }
        }
    }
    Ok(grid)
}

/// Builds a k-nearest-neighbor graph over the rows of a feature
/// matrix, using an approximate index for the neighbor queries.
///
/// Each sample contributes edges to its `k` closest other samples,
/// weighted by feature distance, with reverse duplicates skipped.
///
/// # Errors
///
/// Returns an error if `k` is zero or not smaller than the sample
/// count, or if the index cannot be built.
pub fn k_nearest_graph(features: &Matrix<f64>, k: usize, bidirectional: bool) -> Result<WeightedGraph> {
    let n = features.n_rows();
    validate_k(k, n)?;

    let index = KnnIndex::build(features)?;
    let mut graph = WeightedGraph::new(n);
    let mut seen: HashSet<(usize, usize)> = HashSet::new();

    for i in 0..n {
        let row = features.row(i);
        // one extra so the query point itself can be skipped
        for (neighbor, distance) in index.search(row.as_slice(), k + 1) {
            if neighbor == i {
                continue;
            }
            let key = ordered_pair(i, neighbor);
            if seen.insert(key) {
                graph.add_edge(i, neighbor, distance)?;
                if bidirectional {
                    graph.add_edge(neighbor, i, distance)?;
                }
            }
        }
    }
    Ok(graph)
}

/// Builds a mutual k-nearest-neighbor graph: an edge appears only
/// when each endpoint ranks the other among its `k` closest samples.
///
/// # Errors
///
/// Returns an error if `k` is zero or not smaller than the sample
/// count, or if the index cannot be built.
pub fn mutual_k_nearest_graph(
    features: &Matrix<f64>,
    k: usize,
    bidirectional: bool,
) -> Result<WeightedGraph> {
    let n = features.n_rows();
    validate_k(k, n)?;

    let index = KnnIndex::build(features)?;
    let mut neighbor_lists: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
    for i in 0..n {
        let row = features.row(i);
        let neighbors = index
            .search(row.as_slice(), k + 1)
            .into_iter()
            .filter(|&(neighbor, _)| neighbor != i)
            .take(k)
            .collect();
        neighbor_lists.push(neighbors);
    }

    let mut graph = WeightedGraph::new(n);
    for i in 0..n {
        for &(j, distance) in &neighbor_lists[i] {
            // mutual test, counted once per unordered pair
            if j < i {
                continue;
            }
            if neighbor_lists[j].iter().any(|&(back, _)| back == i) {
                graph.add_edge(i, j, distance)?;
                if bidirectional {
                    graph.add_edge(j, i, distance)?;
                }
            }
        }
    }
    Ok(graph)
}

/// Builds the complete graph over samples, one edge per unordered
/// pair weighted by `similarity` on the feature rows.
///
/// # Errors
///
/// Returns an error if the feature matrix is empty.
pub fn complete_graph<F>(features: &Matrix<f64>, similarity: F) -> Result<WeightedGraph>
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    let n = features.n_rows();
    if n == 0 {
        return Err(EspectroError::empty_input("complete_graph features"));
    }
    let mut graph = WeightedGraph::new(n);
    for i in 0..n {
        let row_i = features.row(i);
        for j in (i + 1)..n {
            let row_j = features.row(j);
            let weight = similarity(row_i.as_slice(), row_j.as_slice());
            graph.add_edge(i, j, weight)?;
        }
    }
    Ok(graph)
}

/// Collapses a partitioned base graph into one vertex per segment,
/// with an unweighted edge per pair of adjacent distinct segments.
///
/// Segment adjacency is deduplicated through a dense boolean matrix;
/// each segment edge is listed in both directions.
///
/// # Errors
///
/// Returns an error if the partition size doesn't match the graph.
pub fn segmentation_graph(
    base: &WeightedGraph,
    partition: &mut DisjointSetForest,
) -> Result<WeightedGraph> {
    if partition.len() != base.num_vertices() {
        return Err(EspectroError::dimension_mismatch(
            "partition",
            base.num_vertices(),
            partition.len(),
        ));
    }

    let num_segments = partition.num_components();
    let mut graph = WeightedGraph::new(num_segments);
    let mut adjacent = vec![false; num_segments * num_segments];

    for edge in base.edges() {
        let src = partition.component_index(edge.source)?;
        let dst = partition.component_index(edge.destination)?;
        if src != dst && !adjacent[src * num_segments + dst] && !adjacent[dst * num_segments + src]
        {
            adjacent[src * num_segments + dst] = true;
            graph.add_edge(src, dst, 1.0)?;
            graph.add_edge(dst, src, 1.0)?;
        }
    }
    Ok(graph)
}

fn validate_k(k: usize, n: usize) -> Result<()> {
    if k == 0 || k >= n {
        return Err(EspectroError::InvalidHyperparameter {
            param: "k".to_string(),
            value: k.to_string(),
            constraint: format!("must satisfy 0 < k < {n}"),
        });
    }
    Ok(())
}

fn ordered_pair(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
