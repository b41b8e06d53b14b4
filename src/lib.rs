//! Espectro: graph segmentation and spectral graph analysis in pure Rust.
//!
//! Espectro builds weighted similarity graphs from images and feature
//! sets, partitions them with Felzenszwalb and isoperimetric
//! segmentation, and analyzes their Laplacian spectra: eigensolvers,
//! canonical angles between eigenspaces, permutation-invariant pattern
//! vectors, and spectral clustering.
//!
//! # Quick Start
//!
//! ```
//! use espectro::prelude::*;
//!
//! // Two similar triangles joined by one dissimilar bridge edge.
//! let mut graph = WeightedGraph::new(6);
//! for &(a, b, w) in &[
//!     (0, 1, 0.1), (1, 2, 0.1), (2, 0, 0.1),
//!     (3, 4, 0.1), (4, 5, 0.1), (5, 3, 0.1),
//!     (2, 3, 10.0),
//! ] {
//!     graph.add_edge(a, b, w).unwrap();
//!     graph.add_edge(b, a, w).unwrap();
//! }
//!
//! // Felzenszwalb segmentation splits along the dissimilar edge.
//! let forest = felzenszwalb_segment(0.5, &graph, 0).unwrap();
//! assert_eq!(forest.num_components(), 2);
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Core Vector and Matrix types
//! - [`linalg`]: Dense factorizations (QR, symmetric eigen, SVD)
//! - [`sparse`]: CSR sparse matrices and conjugate gradient
//! - [`disjoint_set`]: Union-find forest with component bookkeeping
//! - [`graph`]: Weighted graphs and graph builders (grid, k-NN, complete)
//! - [`index`]: Approximate nearest neighbor search (HNSW)
//! - [`segmentation`]: Felzenszwalb and isoperimetric partitioning
//! - [`spectra`]: Graph Laplacians and iterative eigensolvers
//! - [`subspace`]: Canonical angles, null spaces, Procrustes rotation
//! - [`pattern`]: Permutation-invariant spectral pattern vectors
//! - [`cluster`]: K-Means and spectral clustering

pub mod cluster;
pub mod disjoint_set;
pub mod error;
pub mod graph;
pub mod index;
pub mod linalg;
pub mod pattern;
pub mod prelude;
pub mod primitives;
pub mod segmentation;
pub mod sparse;
pub mod spectra;
pub mod subspace;
pub mod traits;

pub use error::{EspectroError, Result};
