//! Dense linear-algebra kernels used by the spectral routines.
//!
//! Self-contained implementations (no external BLAS/LAPACK):
//!
//! - Thin QR via modified Gram-Schmidt with re-orthogonalization
//! - Symmetric eigendecomposition via the cyclic Jacobi algorithm
//! - Singular value decomposition via one-sided Jacobi rotations
//!
//! All routines operate on [`Matrix<f64>`](crate::primitives::Matrix)
//! and favor numerical robustness over speed; the matrices involved in
//! subspace comparison and pattern-vector computation are small
//! (hundreds of rows at most).

use crate::error::{EspectroError, Result};
use crate::primitives::{Matrix, Vector};

/// Maximum number of sweeps for the Jacobi algorithms. Each sweep
/// visits all n(n-1)/2 off-diagonal pairs once; well-conditioned
/// matrices converge in 5-10 sweeps.
const MAX_JACOBI_SWEEPS: usize = 60;

/// Convergence threshold on off-diagonal mass, relative to the
/// Frobenius norm.
const JACOBI_TOL: f64 = 1e-14;

/// Result of a symmetric eigendecomposition.
///
/// Eigenvalues are sorted ascending; eigenvector `i` is the column `i`
/// of `eigenvectors`.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    pub eigenvalues: Vector<f64>,
    pub eigenvectors: Matrix<f64>,
}

/// Result of a singular value decomposition `A = U * diag(s) * V^T`.
///
/// Singular values are sorted descending. `U` is m x r and `V` is
/// n x r where r = min(m, n).
#[derive(Debug, Clone)]
pub struct Svd {
    pub u: Matrix<f64>,
    pub singular_values: Vector<f64>,
    pub v: Matrix<f64>,
}

impl Svd {
    /// Number of singular values greater than the given threshold.
    #[must_use]
    pub fn rank(&self, tol: f64) -> usize {
        self.singular_values.iter().filter(|&&s| s > tol).count()
    }
}

/// Thin QR factorization `A = Q * R` with Q m x n orthonormal
/// (n <= m required) and R n x n upper triangular.
///
/// Uses modified Gram-Schmidt with one re-orthogonalization pass,
/// which keeps `Q^T Q` close to identity even for mildly
/// ill-conditioned inputs. A column that cancels to (near) zero is
/// kept as a zero column with a zero diagonal in R.
///
/// # Errors
///
/// Returns an error if the matrix has more columns than rows or is
/// empty.
pub fn qr_thin(a: &Matrix<f64>) -> Result<(Matrix<f64>, Matrix<f64>)> {
    let (m, n) = a.shape();
    if m == 0 || n == 0 {
        return Err(EspectroError::empty_input("QR input matrix"));
    }
    if n > m {
        return Err(EspectroError::dimension_mismatch("rows >= cols", n, m));
    }

    let mut q = a.clone();
    let mut r = Matrix::zeros(n, n);

    for j in 0..n {
        let mut v = q.column(j);

        // two orthogonalization passes against the previous columns
        for _ in 0..2 {
            for i in 0..j {
                let qi = q.column(i);
                let proj = qi.dot(&v);
                r.set(i, j, r.get(i, j) + proj);
                for row in 0..m {
                    v[row] -= proj * qi[row];
                }
            }
        }

        let norm = v.norm();
        r.set(j, j, norm);
        if norm > 1e-13 {
            for row in 0..m {
                q.set(row, j, v[row] / norm);
            }
        } else {
            for row in 0..m {
                q.set(row, j, 0.0);
            }
        }
    }

    Ok((q, r))
}

/// Symmetric eigendecomposition via cyclic Jacobi rotations.
///
/// Returns eigenvalues in ascending order with aligned eigenvector
/// columns. Off-diagonal asymmetry below 1e-9 (relative) is tolerated
/// and symmetrized away; anything larger is rejected.
///
/// # Errors
///
/// Returns an error if the matrix is not square, is empty, or the
/// rotations fail to converge within the sweep budget.
pub fn eigh(a: &Matrix<f64>) -> Result<SymmetricEigen> {
    let (n, cols) = a.shape();
    if n != cols {
        return Err(EspectroError::dimension_mismatch("square rows", n, cols));
    }
    if n == 0 {
        return Err(EspectroError::empty_input("eigendecomposition input"));
    }

    let scale = a.max_abs().max(1.0);
    let mut work = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            let v = 0.5 * (a.get(i, j) + a.get(j, i));
            if (a.get(i, j) - a.get(j, i)).abs() > 1e-9 * scale {
                return Err(EspectroError::Other(format!(
                    "matrix not symmetric at ({i},{j})"
                )));
            }
            work[i * n + j] = v;
        }
    }

    let mut v = vec![0.0; n * n];
    for i in 0..n {
        v[i * n + i] = 1.0;
    }

    let frobenius: f64 = work.iter().map(|x| x * x).sum::<f64>().sqrt();
    let threshold = JACOBI_TOL * frobenius.max(f64::MIN_POSITIVE);

    let mut converged = false;
    for sweep in 0..MAX_JACOBI_SWEEPS {
        let mut off_diag = 0.0_f64;
        for p in 0..n {
            for q in (p + 1)..n {
                off_diag += work[p * n + q].abs();
            }
        }
        if off_diag <= threshold {
            log::trace!("jacobi eigh converged after {sweep} sweeps");
            converged = true;
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = work[p * n + q];
                if apq.abs() <= threshold / (n * n) as f64 {
                    continue;
                }
                let app = work[p * n + p];
                let aqq = work[q * n + q];
                let theta = (aqq - app) / (2.0 * apq);
                let t = if theta >= 0.0 {
                    1.0 / (theta + (1.0 + theta * theta).sqrt())
                } else {
                    -1.0 / (-theta + (1.0 + theta * theta).sqrt())
                };
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = work[k * n + p];
                    let akq = work[k * n + q];
                    work[k * n + p] = c * akp - s * akq;
                    work[k * n + q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = work[p * n + k];
                    let aqk = work[q * n + k];
                    work[p * n + k] = c * apk - s * aqk;
                    work[q * n + k] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[k * n + p];
                    let vkq = v[k * n + q];
                    v[k * n + p] = c * vkp - s * vkq;
                    v[k * n + q] = s * vkp + c * vkq;
                }
            }
        }
    }

    if !converged {
        // final check: the sweep budget may have converged on the last pass
        let mut off_diag = 0.0_f64;
        for p in 0..n {
            for q in (p + 1)..n {
                off_diag += work[p * n + q].abs();
            }
        }
        if off_diag > threshold {
            return Err(EspectroError::ConvergenceFailure {
                iterations: MAX_JACOBI_SWEEPS,
                residual: off_diag,
            });
        }
    }

    // sort ascending, permuting eigenvector columns along
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| work[i * n + i].total_cmp(&work[j * n + j]));

    let mut eigenvalues = Vector::zeros(n);
    let mut eigenvectors = Matrix::zeros(n, n);
    for (dst, &src) in order.iter().enumerate() {
        eigenvalues[dst] = work[src * n + src];
        for row in 0..n {
            eigenvectors.set(row, dst, v[row * n + src]);
        }
    }

    Ok(SymmetricEigen {
        eigenvalues,
        eigenvectors,
    })
}

/// Singular value decomposition via one-sided Jacobi rotations.
///
/// Returns `U`, singular values (descending) and `V` with
/// `A = U * diag(s) * V^T`. For m < n the decomposition is computed on
/// the transpose and the factors swapped back.
///
/// # Errors
///
/// Returns an error if the matrix is empty or rotations fail to
/// converge.
pub fn svd(a: &Matrix<f64>) -> Result<Svd> {
    let (m, n) = a.shape();
    if m == 0 || n == 0 {
        return Err(EspectroError::empty_input("SVD input matrix"));
    }
    if m < n {
        let t = svd(&a.transpose())?;
        return Ok(Svd {
            u: t.v,
            singular_values: t.singular_values,
            v: t.u,
        });
    }

    // one-sided Jacobi: orthogonalize the columns of U in place
    let mut u = a.clone();
    let mut v = Matrix::eye(n);

    let mut converged = false;
    for sweep in 0..MAX_JACOBI_SWEEPS {
        let mut rotated = false;
        for p in 0..n {
            for q in (p + 1)..n {
                let up = u.column(p);
                let uq = u.column(q);
                let alpha = up.dot(&up);
                let beta = uq.dot(&uq);
                let gamma = up.dot(&uq);

                if gamma.abs() <= 1e-15 * (alpha * beta).sqrt().max(f64::MIN_POSITIVE) {
                    continue;
                }
                rotated = true;

                let zeta = (beta - alpha) / (2.0 * gamma);
                let t = if zeta >= 0.0 {
                    1.0 / (zeta + (1.0 + zeta * zeta).sqrt())
                } else {
                    -1.0 / (-zeta + (1.0 + zeta * zeta).sqrt())
                };
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = c * t;

                for row in 0..m {
                    let a_rp = u.get(row, p);
                    let a_rq = u.get(row, q);
                    u.set(row, p, c * a_rp - s * a_rq);
                    u.set(row, q, s * a_rp + c * a_rq);
                }
                for row in 0..n {
                    let v_rp = v.get(row, p);
                    let v_rq = v.get(row, q);
                    v.set(row, p, c * v_rp - s * v_rq);
                    v.set(row, q, s * v_rp + c * v_rq);
                }
            }
        }
        if !rotated {
            log::trace!("jacobi svd converged after {sweep} sweeps");
            converged = true;
            break;
        }
    }

    if !converged {
        return Err(EspectroError::ConvergenceFailure {
            iterations: MAX_JACOBI_SWEEPS,
            residual: f64::NAN,
        });
    }

    // singular values are the column norms of the rotated U
    let mut sigma: Vec<(usize, f64)> = (0..n).map(|j| (j, u.column(j).norm())).collect();
    sigma.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut u_out = Matrix::zeros(m, n);
    let mut v_out = Matrix::zeros(n, n);
    let mut singular_values = Vector::zeros(n);
    for (dst, &(src, s)) in sigma.iter().enumerate() {
        singular_values[dst] = s;
        let col = u.column(src);
        if s > 1e-13 {
            for row in 0..m {
                u_out.set(row, dst, col[row] / s);
            }
        }
        let vcol = v.column(src);
        for row in 0..n {
            v_out.set(row, dst, vcol[row]);
        }
    }

    Ok(Svd {
        u: u_out,
        singular_values,
        v: v_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "expected {b}, got {a}");
    }

    #[test]
    fn test_qr_orthonormal_columns() {
        let a = Matrix::from_vec(3, 2, vec![1.0, 1.0, 1.0, 0.0, 0.0, 1.0]).unwrap();
        let (q, r) = qr_thin(&a).unwrap();

        // Q^T Q = I
        let qtq = q.transpose().matmul(&q).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                let expect = if i == j { 1.0 } else { 0.0 };
                assert_close(qtq.get(i, j), expect, 1e-12);
            }
        }

        // A = Q R
        let qr = q.matmul(&r).unwrap();
        for i in 0..3 {
            for j in 0..2 {
                assert_close(qr.get(i, j), a.get(i, j), 1e-12);
            }
        }
    }

    #[test]
    fn test_qr_rejects_wide_matrix() {
        let a = Matrix::zeros(2, 3);
        assert!(qr_thin(&a).is_err());
    }

    #[test]
    fn test_eigh_known_2x2() {
        // [[2, 1], [1, 2]] has eigenvalues 1 and 3
        let a = Matrix::from_vec(2, 2, vec![2.0, 1.0, 1.0, 2.0]).unwrap();
        let eig = eigh(&a).unwrap();
        assert_close(eig.eigenvalues[0], 1.0, 1e-10);
        assert_close(eig.eigenvalues[1], 3.0, 1e-10);
    }

    #[test]
    fn test_eigh_reconstruction() {
        let a = Matrix::from_vec(3, 3, vec![4.0, 2.0, 0.0, 2.0, 5.0, 3.0, 0.0, 3.0, 6.0]).unwrap();
        let eig = eigh(&a).unwrap();

        // A v = lambda v for each pair
        for j in 0..3 {
            let v = eig.eigenvectors.column(j);
            let av = a.matvec(&v).unwrap();
            for i in 0..3 {
                assert_close(av[i], eig.eigenvalues[j] * v[i], 1e-9);
            }
        }
    }

    #[test]
    fn test_eigh_ascending_order() {
        let a = Matrix::from_vec(3, 3, vec![3.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0]).unwrap();
        let eig = eigh(&a).unwrap();
        assert!(eig.eigenvalues[0] <= eig.eigenvalues[1]);
        assert!(eig.eigenvalues[1] <= eig.eigenvalues[2]);
    }

    #[test]
    fn test_eigh_rejects_nonsymmetric() {
        let a = Matrix::from_vec(2, 2, vec![1.0, 5.0, 0.0, 1.0]).unwrap();
        assert!(eigh(&a).is_err());
    }

    #[test]
    fn test_svd_diagonal() {
        let a = Matrix::from_vec(2, 2, vec![3.0, 0.0, 0.0, 2.0]).unwrap();
        let f = svd(&a).unwrap();
        assert_close(f.singular_values[0], 3.0, 1e-12);
        assert_close(f.singular_values[1], 2.0, 1e-12);
    }

    #[test]
    fn test_svd_reconstruction() {
        let a = Matrix::from_vec(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let f = svd(&a).unwrap();

        // A = U S V^T
        let mut s = Matrix::zeros(2, 2);
        for i in 0..2 {
            s.set(i, i, f.singular_values[i]);
        }
        let recon = f.u.matmul(&s).unwrap().matmul(&f.v.transpose()).unwrap();
        for i in 0..3 {
            for j in 0..2 {
                assert_close(recon.get(i, j), a.get(i, j), 1e-10);
            }
        }
    }

    #[test]
    fn test_svd_wide_matrix() {
        let a = Matrix::from_vec(2, 3, vec![1.0, 0.0, 0.0, 0.0, 2.0, 0.0]).unwrap();
        let f = svd(&a).unwrap();
        assert_close(f.singular_values[0], 2.0, 1e-10);
        assert_close(f.singular_values[1], 1.0, 1e-10);
    }

    #[test]
    fn test_svd_rank() {
        let a = Matrix::from_vec(2, 2, vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        let f = svd(&a).unwrap();
        assert_eq!(f.rank(1e-8), 1);
    }
}
