//! Comparison of linear subspaces through canonical angles.
//!
//! Subspaces are given as matrices whose columns span them (not
//! necessarily orthonormal). Canonical angles generalize the angle
//! between two vectors: their cosines are the singular values of the
//! cross-Gram matrix of orthonormalized bases, in descending order.

use crate::error::{EspectroError, Result};
use crate::linalg::{eigh, qr_thin, svd};
use crate::primitives::{Matrix, Vector};

/// Cosines at least `1 - INTERSECTION_TOLERANCE` count as a shared
/// direction between two subspaces.
pub const INTERSECTION_TOLERANCE: f64 = 1e-7;

/// Canonical angles between two subspaces.
///
/// `cosines` are descending; `principal_a` and `principal_b` hold the
/// paired principal vectors as columns, aligned with the cosines.
#[derive(Debug, Clone)]
pub struct CanonicalAngles {
    pub principal_a: Matrix<f64>,
    pub principal_b: Matrix<f64>,
    pub cosines: Vector<f64>,
}

/// Computes the canonical angles between the column spans of `a` and
/// `b`.
///
/// When `a` spans fewer dimensions than `b` the operands are swapped
/// internally; the cosines are symmetric under the swap, only the
/// pairing of principal vectors changes sides.
///
/// # Errors
///
/// Returns an error if the matrices are empty or their row counts
/// differ.
///
/// # Examples
///
/// ```
/// use espectro::primitives::Matrix;
/// use espectro::subspace::canonical_angles;
///
/// let a = Matrix::from_vec(3, 1, vec![1.0, 0.0, 0.0]).unwrap();
/// let b = Matrix::from_vec(3, 1, vec![0.0, 1.0, 0.0]).unwrap();
/// let angles = canonical_angles(&a, &b).unwrap();
/// assert!(angles.cosines[0].abs() < 1e-10);
/// ```
pub fn canonical_angles(a: &Matrix<f64>, b: &Matrix<f64>) -> Result<CanonicalAngles> {
    if a.n_rows() != b.n_rows() {
        return Err(EspectroError::dimension_mismatch(
            "rows",
            a.n_rows(),
            b.n_rows(),
        ));
    }
    if a.n_cols() == 0 || b.n_cols() == 0 {
        return Err(EspectroError::empty_input("canonical_angles basis"));
    }

    if a.n_cols() < b.n_cols() {
        let swapped = canonical_angles(b, a)?;
        return Ok(CanonicalAngles {
            principal_a: swapped.principal_b,
            principal_b: swapped.principal_a,
            cosines: swapped.cosines,
        });
    }

    let q = b.n_cols();
    let (qa, _) = qr_thin(a)?;
    let (qb, _) = qr_thin(b)?;

    // cross-Gram of the orthonormal factors, p x q
    let cross = qa.transpose().matmul(&qb)?;
    let decomposition = svd(&cross)?;

    let principal_a = qa.matmul(&decomposition.u)?.columns_range(0, q);
    let principal_b = qb.matmul(&decomposition.v)?;

    // numerical SVD can overshoot 1 by rounding
    let mut cosines = decomposition.singular_values.clone();
    for i in 0..cosines.len() {
        cosines[i] = cosines[i].clamp(-1.0, 1.0);
    }

    Ok(CanonicalAngles {
        principal_a,
        principal_b,
        cosines,
    })
}

/// Distance between two subspaces, the sine of their largest
/// canonical angle.
///
/// # Errors
///
/// Same conditions as [`canonical_angles`].
pub fn subspace_distance(a: &Matrix<f64>, b: &Matrix<f64>) -> Result<f64> {
    let angles = canonical_angles(a, b)?;
    let smallest_cosine = angles.cosines[angles.cosines.len() - 1];
    Ok((1.0 - smallest_cosine * smallest_cosine).max(0.0).sqrt())
}

/// Basis of the intersection of two subspaces, `None` when the
/// intersection is trivial.
///
/// Directions whose canonical-angle cosine reaches
/// `1 - INTERSECTION_TOLERANCE` are considered shared.
///
/// # Errors
///
/// Same conditions as [`canonical_angles`].
pub fn subspaces_intersection(
    a: &Matrix<f64>,
    b: &Matrix<f64>,
) -> Result<Option<Matrix<f64>>> {
    let angles = canonical_angles(a, b)?;

    let mut shared = 0;
    while shared < angles.cosines.len()
        && angles.cosines[shared] >= 1.0 - INTERSECTION_TOLERANCE
    {
        shared += 1;
    }

    if shared == 0 {
        Ok(None)
    } else {
        Ok(Some(angles.principal_a.columns_range(0, shared)))
    }
}

/// Orthonormal basis of the null space of `a`, `None` when `a` has
/// full column rank.
///
/// Computed from the eigendecomposition of the Gram matrix, so it
/// handles wide matrices whose null space the thin SVD cannot reach.
///
/// # Errors
///
/// Returns an error if `a` is empty or the eigendecomposition fails.
pub fn null_space(a: &Matrix<f64>) -> Result<Option<Matrix<f64>>> {
    if a.n_rows() == 0 || a.n_cols() == 0 {
        return Err(EspectroError::empty_input("null_space matrix"));
    }

    let gram = a.transpose().matmul(a)?;
    let decomposition = eigh(&gram)?;

    let n = a.n_cols();
    let largest = decomposition.eigenvalues[n - 1].max(0.0);
    let tolerance = largest * 1e-10 + 1e-12;

    // eigenvalues ascending, null directions come first
    let mut dim = 0;
    while dim < n && decomposition.eigenvalues[dim] <= tolerance {
        dim += 1;
    }

    if dim == 0 {
        Ok(None)
    } else {
        Ok(Some(decomposition.eigenvectors.columns_range(0, dim)))
    }
}

/// Basis of the intersection of the null spaces of `a` and `b`,
/// `None` when it is trivial.
///
/// # Errors
///
/// Returns an error if the matrices are empty or their column counts
/// differ.
pub fn null_spaces_intersection(
    a: &Matrix<f64>,
    b: &Matrix<f64>,
) -> Result<Option<Matrix<f64>>> {
    if a.n_cols() != b.n_cols() {
        return Err(EspectroError::dimension_mismatch(
            "cols",
            a.n_cols(),
            b.n_cols(),
        ));
    }

    let Some(basis_a) = null_space(a)? else {
        return Ok(None);
    };

    // restrict b to null(a) and take the null space of the restriction
    let restricted = b.matmul(&basis_a)?;
    let Some(inner) = null_space(&restricted)? else {
        return Ok(None);
    };

    Ok(Some(basis_a.matmul(&inner)?))
}

/// Orthogonal Procrustes rotation: the orthogonal `Q` minimizing
/// `||B Q - A||`, so `b * Q` is the best rotation of `b` onto `a`.
///
/// # Errors
///
/// Returns an error if the shapes differ or the SVD fails.
pub fn procrustes_rotation(a: &Matrix<f64>, b: &Matrix<f64>) -> Result<Matrix<f64>> {
    if a.shape() != b.shape() {
        return Err(EspectroError::dimension_mismatch(
            "rows",
            a.n_rows(),
            b.n_rows(),
        ));
    }

    let cross = b.transpose().matmul(a)?;
    let decomposition = svd(&cross)?;
    decomposition.u.matmul(&decomposition.v.transpose())
}
