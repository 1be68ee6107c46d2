//! permglm-linalg: Linear algebra wrappers for permglm
//!
//! Provides the dense matrix type and the decompositions used by the
//! GLM engine: pseudo-inverse, rank, null space, condition number and
//! Cholesky-based inversion of small symmetric systems.

pub mod decomposition;
pub mod dense;

pub use decomposition::{
    condition_number, independent_rows, inverse_spd, kernel, pinv, rank, LinalgError,
};
pub use dense::DenseMatrix;
