//! Permutation-invariant spectral pattern vectors for graph batches.
//!
//! Following Wilson, Hancock & Luo, each graph is described by
//! elementary symmetric polynomials evaluated over scaled Laplacian
//! eigenvectors. Symmetric polynomials are invariant under any
//! permutation of their inputs, so the descriptor does not depend on
//! vertex order. Laplacians are zero-padded to a common size first,
//! which only adds zero eigenvalues and keeps spectra comparable
//! across graphs of different sizes.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{EspectroError, Result};
use crate::graph::WeightedGraph;
use crate::linalg::eigh;
use crate::primitives::{Matrix, Vector};
use crate::spectra::{dense_laplacian, Normalization};

/// Power sums `p_r = sum_i x_i^r` for `r = 1..=n`.
///
/// # Examples
///
/// ```
/// use espectro::pattern::evaluate_power_symmetric_polynomials;
/// use espectro::primitives::Vector;
///
/// let p = evaluate_power_symmetric_polynomials(&Vector::from_slice(&[1.0, 2.0]));
/// assert_eq!(p.as_slice(), &[3.0, 5.0]);
/// ```
#[must_use]
pub fn evaluate_power_symmetric_polynomials(inputs: &Vector<f64>) -> Vector<f64> {
    let n = inputs.len();
    let mut terms = vec![1.0; n];
    let mut results = Vector::zeros(n);

    for r in 0..n {
        let mut sum = 0.0;
        for (term, &x) in terms.iter_mut().zip(inputs.iter()) {
            *term *= x;
            sum += *term;
        }
        results[r] = sum;
    }
    results
}

/// Elementary symmetric polynomials `e_1..e_n` of the inputs, via
/// Newton's identities on the power sums.
///
/// The result is invariant under any permutation of the inputs.
#[must_use]
pub fn evaluate_symmetric_polynomials(inputs: &Vector<f64>) -> Vector<f64> {
    let n = inputs.len();
    if n == 0 {
        return Vector::zeros(0);
    }

    let power_sums = evaluate_power_symmetric_polynomials(inputs);

    // s[0] = 1 is the recursion anchor, dropped from the result
    let mut s = vec![0.0; n + 1];
    s[0] = 1.0;
    s[1] = power_sums[0];

    // e_r = (1/r) * sum_{k=1..r} (-1)^(k-1) p_k e_{r-k}
    for r in 2..=n {
        let mut sign = 1.0;
        let mut sum = 0.0;
        for k in 1..=r {
            sum += sign * power_sums[k - 1] * s[r - k];
            sign = -sign;
        }
        s[r] = sum / r as f64;
    }

    Vector::from_vec(s[1..].to_vec())
}

/// Signed logarithmic compression `sign(x) * ln(1 + |x|)`.
#[must_use]
pub fn signed_log(x: f64) -> f64 {
    x.signum() * (1.0 + x.abs()).ln()
}

fn pattern_vector_of(
    graph: &WeightedGraph,
    k: usize,
    max_size: usize,
    bidirectional: bool,
) -> Result<Vector<f64>> {
    let n = graph.num_vertices();
    if n > max_size {
        return Err(EspectroError::dimension_mismatch("max_size", n, max_size));
    }

    let laplacian = dense_laplacian(graph, Normalization::Unnormalized, bidirectional)?;
    let padded = laplacian.zero_padded(max_size, max_size)?;
    let decomposition = eigh(&padded)?;

    // k largest eigenpairs, largest first; the zero block added by
    // padding only contributes zero eigenvalues at the low end
    let mut spectral = Matrix::zeros(max_size, k);
    for j in 0..k {
        let idx = max_size - 1 - j;
        let eigenvalue = decomposition.eigenvalues[idx];
        // clip tiny negative values the solver can produce near zero
        let scale = if eigenvalue > 0.0 { eigenvalue.sqrt() } else { 0.0 };

        let column = decomposition.eigenvectors.column(idx).scale(scale);
        let polynomials = evaluate_symmetric_polynomials(&column);
        spectral.set_column(j, &polynomials);
    }

    let mut pattern = Vector::zeros(max_size * k);
    for i in 0..max_size {
        for j in 0..k {
            pattern[i * k + j] = signed_log(spectral.get(i, j));
        }
    }
    Ok(pattern)
}

/// Computes one pattern vector per graph in a batch.
///
/// Every Laplacian is zero-padded to `max_size` so descriptors are
/// comparable across graph sizes; each descriptor has length
/// `max_size * k`. All graphs must share the representation indicated
/// by `bidirectional`. With the `parallel` feature the batch is
/// processed across threads, one graph per task.
///
/// # Errors
///
/// Returns an error if the batch is empty, `k` is zero or exceeds
/// `max_size`, any graph is larger than `max_size`, or an
/// eigendecomposition fails.
pub fn pattern_vectors(
    graphs: &[WeightedGraph],
    k: usize,
    max_size: usize,
    bidirectional: bool,
) -> Result<Vec<Vector<f64>>> {
    if graphs.is_empty() {
        return Err(EspectroError::empty_input("pattern_vectors batch"));
    }
    if k == 0 || k > max_size {
        return Err(EspectroError::InvalidHyperparameter {
            param: "k".to_string(),
            value: k.to_string(),
            constraint: format!("must satisfy 0 < k <= {max_size}"),
        });
    }

    #[cfg(feature = "parallel")]
    {
        graphs
            .par_iter()
            .map(|graph| pattern_vector_of(graph, k, max_size, bidirectional))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        graphs
            .iter()
            .map(|graph| pattern_vector_of(graph, k, max_size, bidirectional))
            .collect()
    }
}
