//! Matrix type for 2D numeric data.

use super::Vector;
use crate::error::{EspectroError, Result};
use serde::{Deserialize, Serialize};

/// A 2D matrix of floating-point values (row-major storage).
///
/// # Examples
///
/// ```
/// use espectro::primitives::Matrix;
///
/// let m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("data length matches rows * cols");
/// assert_eq!(m.shape(), (2, 3));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T: Copy> Matrix<T> {
    /// Creates a new matrix from a vector of data.
    ///
    /// # Errors
    ///
    /// Returns an error if data length doesn't match rows * cols.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(EspectroError::DimensionMismatch {
                expected: format!("{rows}x{cols} = {} elements", rows * cols),
                actual: format!("{} elements", data.len()),
            });
        }
        Ok(Self { data, rows, cols })
    }

    /// Returns the shape as (rows, cols).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.cols
    }

    /// Gets element at (row, col).
    ///
    /// # Panics
    ///
    /// Panics if indices are out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.cols + col]
    }

    /// Sets element at (row, col).
    ///
    /// # Panics
    ///
    /// Panics if indices are out of bounds.
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.data[row * self.cols + col] = value;
    }

    /// Returns a row as a Vector.
    #[must_use]
    pub fn row(&self, row_idx: usize) -> Vector<T> {
        let start = row_idx * self.cols;
        let end = start + self.cols;
        Vector::from_slice(&self.data[start..end])
    }

    /// Returns a column as a Vector.
    #[must_use]
    pub fn column(&self, col_idx: usize) -> Vector<T> {
        let data: Vec<T> = (0..self.rows)
            .map(|row| self.data[row * self.cols + col_idx])
            .collect();
        Vector::from_vec(data)
    }

    /// Returns the underlying data as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl Matrix<f64> {
    /// Creates a matrix of zeros.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Creates an identity matrix.
    #[must_use]
    pub fn eye(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self {
            data,
            rows: n,
            cols: n,
        }
    }

    /// Builds a matrix whose columns are the given vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if the columns have inconsistent lengths or the
    /// list is empty.
    pub fn from_columns(columns: &[Vector<f64>]) -> Result<Self> {
        let first = columns
            .first()
            .ok_or_else(|| EspectroError::empty_input("column list"))?;
        let rows = first.len();
        let cols = columns.len();
        let mut m = Self::zeros(rows, cols);
        for (j, col) in columns.iter().enumerate() {
            if col.len() != rows {
                return Err(EspectroError::dimension_mismatch("rows", rows, col.len()));
            }
            for i in 0..rows {
                m.set(i, j, col[i]);
            }
        }
        Ok(m)
    }

    /// Overwrites a column with the given vector.
    ///
    /// # Panics
    ///
    /// Panics if the vector length doesn't match the row count.
    pub fn set_column(&mut self, col_idx: usize, values: &Vector<f64>) {
        assert_eq!(values.len(), self.rows, "set_column: length mismatch");
        for i in 0..self.rows {
            self.set(i, col_idx, values[i]);
        }
    }

    /// Returns the sub-matrix of the given column range.
    #[must_use]
    pub fn columns_range(&self, start: usize, count: usize) -> Self {
        let mut out = Self::zeros(self.rows, count);
        for i in 0..self.rows {
            for j in 0..count {
                out.set(i, j, self.get(i, start + j));
            }
        }
        out
    }

    /// Transposes the matrix.
    #[must_use]
    pub fn transpose(&self) -> Self {
        let mut data = vec![0.0; self.rows * self.cols];
        for i in 0..self.rows {
            for j in 0..self.cols {
                data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        Self {
            data,
            rows: self.cols,
            cols: self.rows,
        }
    }

    /// Matrix-matrix multiplication.
    ///
    /// # Errors
    ///
    /// Returns an error if dimensions don't match.
    pub fn matmul(&self, other: &Self) -> Result<Self> {
        if self.cols != other.rows {
            return Err(EspectroError::dimension_mismatch(
                "inner dimension",
                self.cols,
                other.rows,
            ));
        }

        let mut result = vec![0.0; self.rows * other.cols];
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.get(i, k);
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    result[i * other.cols + j] += a * other.get(k, j);
                }
            }
        }

        Ok(Self {
            data: result,
            rows: self.rows,
            cols: other.cols,
        })
    }

    /// Matrix-vector multiplication.
    ///
    /// # Errors
    ///
    /// Returns an error if dimensions don't match.
    pub fn matvec(&self, vec: &Vector<f64>) -> Result<Vector<f64>> {
        if self.cols != vec.len() {
            return Err(EspectroError::dimension_mismatch(
                "cols",
                self.cols,
                vec.len(),
            ));
        }

        let result: Vec<f64> = (0..self.rows)
            .map(|i| {
                let row = self.row(i);
                row.dot(vec)
            })
            .collect();

        Ok(Vector::from_vec(result))
    }

    /// Subtracts another matrix element-wise.
    ///
    /// # Errors
    ///
    /// Returns an error if dimensions don't match.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(EspectroError::DimensionMismatch {
                expected: format!("{}x{}", self.rows, self.cols),
                actual: format!("{}x{}", other.rows, other.cols),
            });
        }

        let data: Vec<f64> = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a - b)
            .collect();

        Ok(Self {
            data,
            rows: self.rows,
            cols: self.cols,
        })
    }

    /// Multiplies each element by a scalar.
    #[must_use]
    pub fn mul_scalar(&self, scalar: f64) -> Self {
        Self {
            data: self.data.iter().map(|x| x * scalar).collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Maximum absolute element.
    #[must_use]
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |m, &x| m.max(x.abs()))
    }

    /// Copies this matrix into the top-left block of a larger zero matrix.
    ///
    /// # Errors
    ///
    /// Returns an error if the target size is smaller than this matrix.
    pub fn zero_padded(&self, rows: usize, cols: usize) -> Result<Self> {
        if rows < self.rows || cols < self.cols {
            return Err(EspectroError::DimensionMismatch {
                expected: format!(">= {}x{}", self.rows, self.cols),
                actual: format!("{rows}x{cols}"),
            });
        }
        let mut padded = Self::zeros(rows, cols);
        for i in 0..self.rows {
            for j in 0..self.cols {
                padded.set(i, j, self.get(i, j));
            }
        }
        Ok(padded)
    }

    /// Solves the linear system Ax = b using Cholesky decomposition.
    ///
    /// The matrix must be symmetric positive definite.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrix is not square, the dimensions
    /// don't match, or the matrix is not positive definite.
    pub fn cholesky_solve(&self, b: &Vector<f64>) -> Result<Vector<f64>> {
        if self.rows != self.cols {
            return Err(EspectroError::dimension_mismatch(
                "square rows",
                self.rows,
                self.cols,
            ));
        }
        if self.rows != b.len() {
            return Err(EspectroError::dimension_mismatch(
                "rows",
                self.rows,
                b.len(),
            ));
        }

        let n = self.rows;

        // Cholesky decomposition: A = L * L^T
        let mut l = vec![0.0; n * n];

        for i in 0..n {
            for j in 0..=i {
                let mut sum = 0.0;

                if i == j {
                    for k in 0..j {
                        sum += l[j * n + k] * l[j * n + k];
                    }
                    let diag = self.get(j, j) - sum;
                    if diag <= 0.0 {
                        return Err(EspectroError::NotPositiveDefinite {
                            context: format!("Cholesky pivot {j} = {diag:e}"),
                        });
                    }
                    l[j * n + j] = diag.sqrt();
                } else {
                    for k in 0..j {
                        sum += l[i * n + k] * l[j * n + k];
                    }
                    l[i * n + j] = (self.get(i, j) - sum) / l[j * n + j];
                }
            }
        }

        // Forward substitution: L * y = b
        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut sum = 0.0;
            for j in 0..i {
                sum += l[i * n + j] * y[j];
            }
            y[i] = (b[i] - sum) / l[i * n + i];
        }

        // Backward substitution: L^T * x = y
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut sum = 0.0;
            for j in (i + 1)..n {
                sum += l[j * n + i] * x[j];
            }
            x[i] = (y[i] - sum) / l[i * n + i];
        }

        Ok(Vector::from_vec(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_shape() {
        let m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.get(1, 2), 6.0);
    }

    #[test]
    fn test_from_vec_wrong_len() {
        assert!(Matrix::from_vec(2, 3, vec![1.0]).is_err());
    }

    #[test]
    fn test_eye() {
        let m = Matrix::eye(3);
        assert_eq!(m.get(0, 0), 1.0);
        assert_eq!(m.get(0, 1), 0.0);
    }

    #[test]
    fn test_transpose() {
        let m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let t = m.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.get(2, 1), 6.0);
    }

    #[test]
    fn test_matmul() {
        let a = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Matrix::eye(2);
        let c = a.matmul(&b).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn test_matmul_dimension_mismatch() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(2, 3);
        assert!(a.matmul(&b).is_err());
    }

    #[test]
    fn test_matvec() {
        let a = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let v = Vector::from_slice(&[1.0, 1.0]);
        let r = a.matvec(&v).unwrap();
        assert_eq!(r.as_slice(), &[3.0, 7.0]);
    }

    #[test]
    fn test_from_columns() {
        let cols = vec![
            Vector::from_slice(&[1.0, 0.0]),
            Vector::from_slice(&[0.0, 1.0]),
        ];
        let m = Matrix::from_columns(&cols).unwrap();
        assert_eq!(m, Matrix::eye(2));
    }

    #[test]
    fn test_zero_padded() {
        let m = Matrix::eye(2);
        let p = m.zero_padded(4, 4).unwrap();
        assert_eq!(p.get(1, 1), 1.0);
        assert_eq!(p.get(3, 3), 0.0);
        assert!(m.zero_padded(1, 1).is_err());
    }

    #[test]
    fn test_cholesky_solve() {
        // A = [[4, 2], [2, 3]], b = [10, 8] -> x = [1.75, 1.5]
        let a = Matrix::from_vec(2, 2, vec![4.0, 2.0, 2.0, 3.0]).unwrap();
        let b = Vector::from_slice(&[10.0, 8.0]);
        let x = a.cholesky_solve(&b).unwrap();
        assert!((x[0] - 1.75).abs() < 1e-12);
        assert!((x[1] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_cholesky_not_positive_definite() {
        let a = Matrix::from_vec(2, 2, vec![0.0, 1.0, 1.0, 0.0]).unwrap();
        let b = Vector::from_slice(&[1.0, 1.0]);
        let err = a.cholesky_solve(&b).unwrap_err();
        assert!(err.to_string().contains("not positive definite"));
    }

    #[test]
    fn test_columns_range() {
        let m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let sub = m.columns_range(1, 2);
        assert_eq!(sub.shape(), (2, 2));
        assert_eq!(sub.get(0, 0), 2.0);
        assert_eq!(sub.get(1, 1), 6.0);
    }
}
