//! Configuration errors raised while setting up a GLM test.
//!
//! Numerical degeneracy during testing is never reported through these
//! types; it is written into the output as zeros.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GlmError {
    #[error("Cannot specify a contrast that consists entirely of zeroes ({name})")]
    ZeroContrast { name: String },

    #[error("Dimension mismatch in {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error(
        "Number of columns in F-test matrix ({got}) does not match number of rows in contrast matrix ({expected})"
    )]
    FTestColumns { expected: usize, got: usize },

    #[error("F-test matrix must contain ones and zeros only")]
    FTestEntries,

    #[error("Row {row} of F-test matrix does not contain any ones")]
    EmptyFTest { row: usize },

    #[error("Cannot perform F-tests exclusively: no F-test matrix was provided")]
    NoFTests,

    #[error("No hypotheses to test")]
    NoHypotheses,

    #[error("Minimum variance group index needs to be either zero or one (found {0})")]
    VarianceGroupBase(usize),

    #[error("No entries found for variance group {0}")]
    EmptyVarianceGroup(usize),

    #[error("Shuffling matrix does not map the retained inputs of element {element} onto themselves")]
    InvalidShuffle { element: usize },
}

pub type Result<T> = std::result::Result<T, GlmError>;
