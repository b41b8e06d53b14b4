//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use espectro::prelude::*;
//! ```

pub use crate::cluster::{spectral_embedding, KMeans, SpectralClustering};
pub use crate::disjoint_set::DisjointSetForest;
pub use crate::error::{EspectroError, Result};
pub use crate::graph::build::{
    complete_graph, grid_graph, k_nearest_graph, mutual_k_nearest_graph, segmentation_graph,
    Connectivity, Image, PixelSimilarity,
};
pub use crate::graph::{Edge, WeightedGraph};
pub use crate::pattern::pattern_vectors;
pub use crate::primitives::{Matrix, Vector};
pub use crate::segmentation::isoperimetric::isoperimetric_partition;
pub use crate::segmentation::{felzenszwalb_segment, felzenszwalb_segment_masked};
pub use crate::spectra::{dense_laplacian, eigen_gap, sparse_laplacian, Normalization};
pub use crate::subspace::{canonical_angles, subspace_distance, subspaces_intersection};
pub use crate::traits::UnsupervisedEstimator;
