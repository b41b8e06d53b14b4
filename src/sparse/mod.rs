//! Sparse matrices in CSR form and matrix-free linear operators.
//!
//! Grid graphs and nearest-neighbor graphs have O(V) edges, so their
//! Laplacians are stored as triplets finalized into Compressed Sparse
//! Row format. The [`LinearOperator`] trait lets the iterative solvers
//! (conjugate gradient, the sparse eigensolver) consume either a
//! materialized sparse matrix or a caller-supplied multiply without
//! any shared module-level state.

use crate::error::{EspectroError, Result};
use crate::primitives::{Matrix, Vector};

/// A matrix-free linear map `y = A x` over `R^n`.
///
/// The solvers only ever multiply, so callers can pass a closure-like
/// operator carrying whatever context it needs.
pub trait LinearOperator {
    /// Dimension n of the (square) operator.
    fn dim(&self) -> usize;

    /// Computes `y = A x`. Both slices have length `dim()`.
    fn apply(&self, x: &[f64], y: &mut [f64]);
}

/// Sparse square-or-rectangular matrix in CSR format.
///
/// Built from (row, col, value) triplets; duplicate coordinates are
/// summed, mirroring the accumulation semantics the Laplacian builders
/// rely on.
///
/// # Examples
///
/// ```
/// use espectro::sparse::SparseMatrix;
///
/// let m = SparseMatrix::from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, 2.0), (0, 0, 1.0)]).unwrap();
/// assert_eq!(m.nnz(), 2);
/// assert_eq!(m.get(0, 0), 2.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    rows: usize,
    cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl SparseMatrix {
    /// Builds a CSR matrix from coordinate triplets, summing duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error if any coordinate is out of range.
    pub fn from_triplets(rows: usize, cols: usize, triplets: &[(usize, usize, f64)]) -> Result<Self> {
        for &(r, c, _) in triplets {
            if r >= rows {
                return Err(EspectroError::index_out_of_bounds(r, rows));
            }
            if c >= cols {
                return Err(EspectroError::index_out_of_bounds(c, cols));
            }
        }

        let mut sorted: Vec<(usize, usize, f64)> = triplets.to_vec();
        sorted.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut row_counts = vec![0usize; rows];
        let mut col_idx = Vec::with_capacity(sorted.len());
        let mut values: Vec<f64> = Vec::with_capacity(sorted.len());
        let mut last: Option<(usize, usize)> = None;

        for &(r, c, v) in &sorted {
            if last == Some((r, c)) {
                if let Some(last_v) = values.last_mut() {
                    *last_v += v;
                }
            } else {
                row_counts[r] += 1;
                col_idx.push(c);
                values.push(v);
                last = Some((r, c));
            }
        }

        let mut row_ptr = vec![0usize; rows + 1];
        for i in 0..rows {
            row_ptr[i + 1] = row_ptr[i] + row_counts[i];
        }

        Ok(Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        })
    }

    /// Returns the shape as (rows, cols).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of stored (non-zero) entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Value at (row, col); zero if not stored.
    ///
    /// # Panics
    ///
    /// Panics if the row is out of range.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        for k in start..end {
            if self.col_idx[k] == col {
                return self.values[k];
            }
        }
        0.0
    }

    /// Sparse matrix-vector product.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector length doesn't match.
    pub fn matvec(&self, x: &Vector<f64>) -> Result<Vector<f64>> {
        if x.len() != self.cols {
            return Err(EspectroError::dimension_mismatch("cols", self.cols, x.len()));
        }
        let mut y = Vector::zeros(self.rows);
        self.apply(x.as_slice(), y.as_mut_slice());
        Ok(y)
    }

    /// Materializes the matrix densely. Intended for tests and small
    /// systems.
    #[must_use]
    pub fn to_dense(&self) -> Matrix<f64> {
        let mut dense = Matrix::zeros(self.rows, self.cols);
        for row in 0..self.rows {
            for k in self.row_ptr[row]..self.row_ptr[row + 1] {
                let prev = dense.get(row, self.col_idx[k]);
                dense.set(row, self.col_idx[k], prev + self.values[k]);
            }
        }
        dense
    }

    /// Returns a copy with the given row and column removed. Used by
    /// the isoperimetric partitioning to ground the system.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range or the matrix is
    /// not square.
    pub fn without_row_col(&self, idx: usize) -> Result<SparseMatrix> {
        if self.rows != self.cols {
            return Err(EspectroError::dimension_mismatch(
                "square rows",
                self.rows,
                self.cols,
            ));
        }
        if idx >= self.rows {
            return Err(EspectroError::index_out_of_bounds(idx, self.rows));
        }

        let mut triplets = Vec::with_capacity(self.nnz());
        for row in 0..self.rows {
            if row == idx {
                continue;
            }
            for k in self.row_ptr[row]..self.row_ptr[row + 1] {
                let col = self.col_idx[k];
                if col == idx {
                    continue;
                }
                let r = if row < idx { row } else { row - 1 };
                let c = if col < idx { col } else { col - 1 };
                triplets.push((r, c, self.values[k]));
            }
        }
        SparseMatrix::from_triplets(self.rows - 1, self.cols - 1, &triplets)
    }

    /// Checks symmetry of stored values up to the given tolerance.
    #[must_use]
    pub fn is_symmetric(&self, tol: f64) -> bool {
        if self.rows != self.cols {
            return false;
        }
        for row in 0..self.rows {
            for k in self.row_ptr[row]..self.row_ptr[row + 1] {
                let col = self.col_idx[k];
                if (self.values[k] - self.get(col, row)).abs() > tol {
                    return false;
                }
            }
        }
        true
    }
}

impl LinearOperator for SparseMatrix {
    fn dim(&self) -> usize {
        self.rows
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        for (row, out) in y.iter_mut().enumerate() {
            let mut sum = 0.0;
            for k in self.row_ptr[row]..self.row_ptr[row + 1] {
                sum += self.values[k] * x[self.col_idx[k]];
            }
            *out = sum;
        }
    }
}

/// Solves `A x = b` for symmetric positive definite `A` by the
/// conjugate gradient method.
///
/// Convergence is governed by the residual tolerance rather than a
/// fixed iteration count; `max_iterations` is only a safety bound for
/// ill-conditioned inputs.
///
/// # Errors
///
/// - [`EspectroError::NotPositiveDefinite`] if a search direction has
///   non-positive curvature, which for the isoperimetric system means
///   the graph was not connected.
/// - [`EspectroError::ConvergenceFailure`] if the iteration bound is
///   exhausted before the residual drops below `tol`.
pub fn conjugate_gradient<O: LinearOperator>(
    op: &O,
    b: &Vector<f64>,
    tol: f64,
    max_iterations: usize,
) -> Result<Vector<f64>> {
    let n = op.dim();
    if b.len() != n {
        return Err(EspectroError::dimension_mismatch("dim", n, b.len()));
    }

    let mut x = Vector::zeros(n);
    let mut r = b.clone();
    let mut p = r.clone();
    let mut rs_old = r.dot(&r);

    if rs_old.sqrt() <= tol {
        return Ok(x);
    }

    let mut ap = Vector::zeros(n);
    for iteration in 0..max_iterations {
        op.apply(p.as_slice(), ap.as_mut_slice());
        let curvature = p.dot(&ap);
        if curvature <= 0.0 {
            return Err(EspectroError::NotPositiveDefinite {
                context: format!("conjugate gradient curvature {curvature:e} at iteration {iteration}"),
            });
        }

        let alpha = rs_old / curvature;
        for i in 0..n {
            x[i] += alpha * p[i];
            r[i] -= alpha * ap[i];
        }

        let rs_new = r.dot(&r);
        log::trace!("cg iteration {iteration}, residual {:e}", rs_new.sqrt());
        if rs_new.sqrt() <= tol {
            return Ok(x);
        }

        let beta = rs_new / rs_old;
        for i in 0..n {
            p[i] = r[i] + beta * p[i];
        }
        rs_old = rs_new;
    }

    Err(EspectroError::ConvergenceFailure {
        iterations: max_iterations,
        residual: rs_old.sqrt(),
    })
}
