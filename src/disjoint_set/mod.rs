//! Union-find over dense element indexes.
//!
//! The forest backs the graph segmentation pipeline: Felzenszwalb
//! merges components through it, and the fused partitions are read
//! back out as compact per-root labels.

use crate::error::{EspectroError, Result};

/// Disjoint-set forest with union by rank and path compression.
///
/// Elements are `0..len`. Each component tracks its size, and roots
/// can be mapped to compact indexes `0..num_components` through a
/// lazily rebuilt cache, so label extraction after a merge phase is
/// O(n) rather than O(n log n).
///
/// # Examples
///
/// ```
/// use espectro::disjoint_set::DisjointSetForest;
///
/// let mut forest = DisjointSetForest::new(4);
/// forest.union(0, 1).unwrap();
/// assert_eq!(forest.num_components(), 3);
/// assert_eq!(forest.find(0).unwrap(), forest.find(1).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct DisjointSetForest {
    parent: Vec<usize>,
    rank: Vec<u32>,
    component_size: Vec<usize>,
    num_components: usize,
    root_index: Vec<usize>,
    root_index_dirty: bool,
}

impl DisjointSetForest {
    /// Creates a forest of `len` singleton components.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
            component_size: vec![1; len],
            num_components: len,
            root_index: vec![0; len],
            root_index_dirty: true,
        }
    }

    /// Number of elements in the forest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Returns true if the forest has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Number of distinct components.
    #[must_use]
    pub fn num_components(&self) -> usize {
        self.num_components
    }

    /// Finds the root of the component containing `element`, with
    /// path compression.
    ///
    /// # Errors
    ///
    /// Returns an error if `element` is out of range.
    pub fn find(&mut self, element: usize) -> Result<usize> {
        if element >= self.parent.len() {
            return Err(EspectroError::index_out_of_bounds(element, self.parent.len()));
        }

        let mut root = element;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = element;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        Ok(root)
    }

    /// Merges the components containing `a` and `b`, returning the
    /// root of the merged component. A no-op (returning the shared
    /// root) when they are already joined.
    ///
    /// # Errors
    ///
    /// Returns an error if either element is out of range.
    pub fn union(&mut self, a: usize, b: usize) -> Result<usize> {
        let root_a = self.find(a)?;
        let root_b = self.find(b)?;
        if root_a == root_b {
            return Ok(root_a);
        }

        let (winner, loser) = if self.rank[root_a] >= self.rank[root_b] {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent[loser] = winner;
        if self.rank[winner] == self.rank[loser] {
            self.rank[winner] += 1;
        }
        self.component_size[winner] += self.component_size[loser];
        self.num_components -= 1;
        self.root_index_dirty = true;
        Ok(winner)
    }

    /// Size of the component containing `element`.
    ///
    /// # Errors
    ///
    /// Returns an error if `element` is out of range.
    pub fn component_size(&mut self, element: usize) -> Result<usize> {
        let root = self.find(element)?;
        Ok(self.component_size[root])
    }

    /// Compact index of the component containing `element`, in
    /// `0..num_components()`. Indexes are assigned by ascending root,
    /// so they are stable for a given merge history.
    ///
    /// # Errors
    ///
    /// Returns an error if `element` is out of range.
    pub fn component_index(&mut self, element: usize) -> Result<usize> {
        let root = self.find(element)?;
        if self.root_index_dirty {
            self.rebuild_root_index();
        }
        Ok(self.root_index[root])
    }

    /// One compact label per element, equivalent to calling
    /// [`component_index`](Self::component_index) for every element.
    pub fn labels(&mut self) -> Vec<usize> {
        let len = self.len();
        let mut labels = Vec::with_capacity(len);
        for element in 0..len {
            // in-range by construction
            let root = self.find(element).unwrap_or(element);
            if self.root_index_dirty {
                self.rebuild_root_index();
            }
            labels.push(self.root_index[root]);
        }
        labels
    }

    fn rebuild_root_index(&mut self) {
        let mut next = 0;
        for element in 0..self.parent.len() {
            if self.parent[element] == element {
                self.root_index[element] = next;
                next += 1;
            }
        }
        self.root_index_dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_singletons() {
        let mut forest = DisjointSetForest::new(3);
        assert_eq!(forest.len(), 3);
        assert_eq!(forest.num_components(), 3);
        for i in 0..3 {
            assert_eq!(forest.find(i).unwrap(), i);
            assert_eq!(forest.component_size(i).unwrap(), 1);
        }
    }

    #[test]
    fn test_union_merges() {
        let mut forest = DisjointSetForest::new(4);
        forest.union(0, 1).unwrap();
        forest.union(2, 3).unwrap();
        assert_eq!(forest.num_components(), 2);
        assert_eq!(forest.find(0).unwrap(), forest.find(1).unwrap());
        assert_ne!(forest.find(0).unwrap(), forest.find(2).unwrap());
        assert_eq!(forest.component_size(0).unwrap(), 2);
    }

    #[test]
    fn test_union_idempotent() {
        let mut forest = DisjointSetForest::new(2);
        let r1 = forest.union(0, 1).unwrap();
        let r2 = forest.union(1, 0).unwrap();
        assert_eq!(r1, r2);
        assert_eq!(forest.num_components(), 1);
        assert_eq!(forest.component_size(0).unwrap(), 2);
    }

    #[test]
    fn test_find_out_of_range() {
        let mut forest = DisjointSetForest::new(2);
        assert!(forest.find(2).is_err());
        assert!(forest.union(0, 5).is_err());
    }

    #[test]
    fn test_component_index_compact() {
        let mut forest = DisjointSetForest::new(5);
        forest.union(0, 4).unwrap();
        forest.union(1, 2).unwrap();
        assert_eq!(forest.num_components(), 3);

        let mut seen: Vec<usize> = (0..5)
            .map(|e| forest.component_index(e).unwrap())
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|&i| i < 3));
    }

    #[test]
    fn test_component_index_cache_invalidated_by_union() {
        let mut forest = DisjointSetForest::new(3);
        let before = forest.component_index(2).unwrap();
        assert_eq!(before, 2);
        forest.union(0, 1).unwrap();
        // roots shrank to two, so indexes must be reassigned
        assert_eq!(forest.component_index(2).unwrap(), 1);
    }

    #[test]
    fn test_labels_match_component_index() {
        let mut forest = DisjointSetForest::new(6);
        forest.union(0, 3).unwrap();
        forest.union(3, 5).unwrap();
        let labels = forest.labels();
        for (element, &label) in labels.iter().enumerate() {
            assert_eq!(label, forest.component_index(element).unwrap());
        }
        assert_eq!(labels[0], labels[3]);
        assert_eq!(labels[0], labels[5]);
    }

    #[test]
    fn test_chain_unions_single_component() {
        let n = 100;
        let mut forest = DisjointSetForest::new(n);
        for i in 1..n {
            forest.union(i - 1, i).unwrap();
        }
        assert_eq!(forest.num_components(), 1);
        assert_eq!(forest.component_size(42).unwrap(), n);
        assert!(forest.labels().iter().all(|&l| l == 0));
    }
}
