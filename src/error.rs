//! Error types for espectro operations.
//!
//! Provides rich error context for library consumers. Numeric
//! non-convergence and indefinite linear systems are surfaced as
//! recoverable errors so batch callers can skip or retry a sample
//! instead of aborting the whole run.

use std::fmt;

/// Main error type for espectro operations.
///
/// # Examples
///
/// ```
/// use espectro::error::EspectroError;
///
/// let err = EspectroError::DimensionMismatch {
///     expected: "6x3".to_string(),
///     actual: "6x2".to_string(),
/// };
/// assert!(err.to_string().contains("dimension mismatch"));
/// ```
#[derive(Debug)]
pub enum EspectroError {
    /// Matrix/vector/graph dimensions don't match for the operation.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Vertex or element index outside the valid range.
    IndexOutOfBounds {
        /// Offending index
        index: usize,
        /// Container length
        len: usize,
    },

    /// Invalid hyperparameter value provided.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Iterative method failed to converge within its iteration limit.
    ConvergenceFailure {
        /// Number of iterations attempted
        iterations: usize,
        /// Final residual norm
        residual: f64,
    },

    /// A linear system assumed symmetric positive definite turned out
    /// not to be. For a connected graph the reduced isoperimetric
    /// system is guaranteed definite, so this signals a configuration
    /// error (disconnected input, corrupted weights).
    NotPositiveDefinite {
        /// Description of where definiteness broke down
        context: String,
    },

    /// The sparse eigensolver reported an unrecoverable condition.
    EigenSolver {
        /// Diagnostic message
        message: String,
    },

    /// Empty input where at least one element is required.
    EmptyInput {
        /// What was empty
        context: String,
    },

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for EspectroError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EspectroError::DimensionMismatch { expected, actual } => {
                write!(f, "dimension mismatch: expected {expected}, got {actual}")
            }
            EspectroError::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds (len={len})")
            }
            EspectroError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
            EspectroError::ConvergenceFailure {
                iterations,
                residual,
            } => {
                write!(
                    f,
                    "convergence failure after {iterations} iterations, residual = {residual:e}"
                )
            }
            EspectroError::NotPositiveDefinite { context } => {
                write!(f, "linear system not positive definite: {context}")
            }
            EspectroError::EigenSolver { message } => {
                write!(f, "eigensolver error: {message}")
            }
            EspectroError::EmptyInput { context } => {
                write!(f, "empty input: {context}")
            }
            EspectroError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for EspectroError {}

impl From<&str> for EspectroError {
    fn from(msg: &str) -> Self {
        EspectroError::Other(msg.to_string())
    }
}

impl From<String> for EspectroError {
    fn from(msg: String) -> Self {
        EspectroError::Other(msg)
    }
}

impl EspectroError {
    /// Create a dimension mismatch error with descriptive context.
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Create an index out of bounds error.
    #[must_use]
    pub fn index_out_of_bounds(index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds { index, len }
    }

    /// Create an empty input error.
    #[must_use]
    pub fn empty_input(context: &str) -> Self {
        Self::EmptyInput {
            context: context.to_string(),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, EspectroError>;
