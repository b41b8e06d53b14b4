//! Approximate nearest-neighbor index for the k-NN graph builders.
//!
//! A navigable small-world graph in the style of Malkov & Yashunin
//! (2018): multi-layer, sparse navigation layers on top of a dense
//! bottom layer, greedy descent at query time. Samples are identified
//! by their row index in the feature matrix, distances are Euclidean,
//! and layer assignment draws from a seeded generator so index
//! construction is reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

use crate::error::{EspectroError, Result};
use crate::primitives::Matrix;

const DEFAULT_M: usize = 16;
const DEFAULT_EF_CONSTRUCTION: usize = 200;
const DEFAULT_SEED: u64 = 42;

/// Approximate k-nearest-neighbor index over feature rows.
///
/// # Examples
///
/// ```
/// use espectro::index::KnnIndex;
/// use espectro::primitives::Matrix;
///
/// let features = Matrix::from_vec(3, 2, vec![
///     0.0, 0.0,
///     1.0, 0.0,
///     10.0, 10.0,
/// ]).unwrap();
/// let index = KnnIndex::build(&features).unwrap();
///
/// let hits = index.search(&[0.2, 0.0], 1);
/// assert_eq!(hits[0].0, 0);
/// ```
#[derive(Debug)]
pub struct KnnIndex {
    m: usize,
    max_m0: usize,
    ef_construction: usize,
    ml: f64,
    nodes: Vec<Node>,
    entry_point: Option<usize>,
    rng: StdRng,
}

#[derive(Debug, Clone)]
struct Node {
    vector: Vec<f64>,
    // neighbor indexes per layer
    connections: Vec<Vec<usize>>,
}

impl KnnIndex {
    /// Creates an empty index with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            m: DEFAULT_M,
            max_m0: 2 * DEFAULT_M,
            ef_construction: DEFAULT_EF_CONSTRUCTION,
            ml: 1.0 / 2.0_f64.ln(),
            nodes: Vec::new(),
            entry_point: None,
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
        }
    }

    /// Sets the per-node connection budget.
    #[must_use]
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self.max_m0 = 2 * m;
        self
    }

    /// Sets the construction-time candidate list size.
    #[must_use]
    pub fn with_ef_construction(mut self, ef_construction: usize) -> Self {
        self.ef_construction = ef_construction;
        self
    }

    /// Sets the layer-assignment seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Indexes every row of a feature matrix, sample id = row index.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrix has no rows.
    pub fn build(features: &Matrix<f64>) -> Result<Self> {
        if features.n_rows() == 0 {
            return Err(EspectroError::empty_input("KnnIndex features"));
        }
        let mut index = Self::new();
        for i in 0..features.n_rows() {
            index.add(features.row(i).as_slice().to_vec());
        }
        Ok(index)
    }

    /// Number of indexed samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no samples are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds one sample; its id is the insertion order.
    pub fn add(&mut self, vector: Vec<f64>) {
        let layer = self.random_layer();
        let node_idx = self.nodes.len();
        self.nodes.push(Node {
            vector,
            connections: vec![Vec::new(); layer + 1],
        });

        if self.entry_point.is_none() {
            self.entry_point = Some(node_idx);
            return;
        }
        self.insert_node(node_idx, layer);
    }

    /// Returns up to `k` (sample id, Euclidean distance) pairs,
    /// closest first. Empty when the index is empty.
    #[must_use]
    pub fn search(&self, query: &[f64], k: usize) -> Vec<(usize, f64)> {
        let Some(ep) = self.entry_point else {
            return Vec::new();
        };

        let top_layer = self.nodes[ep].connections.len().saturating_sub(1);
        let mut curr = ep;
        for layer in (1..=top_layer).rev() {
            curr = self
                .search_layer(query, curr, 1, layer)
                .into_iter()
                .next()
                .unwrap_or(curr);
        }

        let candidates = self.search_layer(query, curr, k.max(self.ef_construction), 0);
        let mut results: Vec<(usize, f64)> = candidates
            .into_iter()
            .map(|idx| (idx, euclidean(query, &self.nodes[idx].vector)))
            .collect();
        results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        results
    }

    // P(layer = l) ~ exp(-l / ml)
    fn random_layer(&mut self) -> usize {
        let r: f64 = self.rng.gen_range(0.0..1.0);
        (-r.ln() * self.ml).floor() as usize
    }

    fn insert_node(&mut self, node_idx: usize, layer: usize) {
        let Some(ep) = self.entry_point else {
            return;
        };
        let top_layer = self.nodes[ep].connections.len().saturating_sub(1);

        let mut curr = ep;
        for lc in (layer + 1..=top_layer).rev() {
            let query = self.nodes[node_idx].vector.clone();
            curr = self
                .search_layer(&query, curr, 1, lc)
                .into_iter()
                .next()
                .unwrap_or(curr);
        }

        for lc in (0..=layer.min(top_layer)).rev() {
            let query = self.nodes[node_idx].vector.clone();
            let candidates = self.search_layer(&query, curr, self.ef_construction, lc);

            let budget = if lc == 0 { self.max_m0 } else { self.m };
            let neighbors: Vec<usize> = candidates.into_iter().take(budget).collect();

            for &neighbor in &neighbors {
                self.nodes[node_idx].connections[lc].push(neighbor);
                if lc < self.nodes[neighbor].connections.len() {
                    self.nodes[neighbor].connections[lc].push(node_idx);
                    self.prune_connections(neighbor, lc, budget);
                }
            }
            if let Some(&first) = neighbors.first() {
                curr = first;
            }
        }

        if layer > top_layer {
            self.entry_point = Some(node_idx);
        }
    }

    fn search_layer(&self, query: &[f64], entry: usize, ef: usize, layer: usize) -> Vec<usize> {
        let mut visited = HashSet::new();
        let mut candidates = Vec::new();
        let mut best = Vec::new();

        let entry_dist = euclidean(query, &self.nodes[entry].vector);
        candidates.push((entry, entry_dist));
        best.push((entry, entry_dist));
        visited.insert(entry);

        while let Some((curr, curr_dist)) = candidates.pop() {
            let worst_best = best
                .iter()
                .map(|&(_, d)| d)
                .fold(f64::NEG_INFINITY, f64::max);
            if curr_dist > worst_best && best.len() >= ef {
                break;
            }

            if layer < self.nodes[curr].connections.len() {
                for &neighbor in &self.nodes[curr].connections[layer] {
                    if visited.insert(neighbor) {
                        let dist = euclidean(query, &self.nodes[neighbor].vector);
                        if dist < worst_best || best.len() < ef {
                            candidates.push((neighbor, dist));
                            best.push((neighbor, dist));
                            // candidates pop closest first, best keeps the ef closest
                            candidates.sort_by(|a, b| {
                                b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
                            });
                            best.sort_by(|a, b| {
                                a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)
                            });
                            best.truncate(ef);
                        }
                    }
                }
            }
        }

        best.into_iter().map(|(idx, _)| idx).collect()
    }

    fn prune_connections(&mut self, node_idx: usize, layer: usize, budget: usize) {
        if self.nodes[node_idx].connections[layer].len() <= budget {
            return;
        }

        let node_vec = self.nodes[node_idx].vector.clone();
        let mut neighbors: Vec<(usize, f64)> = self.nodes[node_idx].connections[layer]
            .iter()
            .map(|&neighbor| (neighbor, euclidean(&node_vec, &self.nodes[neighbor].vector)))
            .collect();
        neighbors.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        self.nodes[node_idx].connections[layer] = neighbors
            .into_iter()
            .take(budget)
            .map(|(idx, _)| idx)
            .collect();
    }
}

impl Default for KnnIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
