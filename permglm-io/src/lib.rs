//! permglm-io: file loaders for permglm
//!
//! Plain-text matrices, hypotheses (contrasts and F-test selections),
//! variance groups, externally generated shuffles, and memory-mapped
//! per-subject data used as element-wise design columns.

pub mod cohort;
pub mod hypotheses;
pub mod matrix;
pub mod shuffle;
pub mod variance;

pub use cohort::MappedCohortImporter;
pub use hypotheses::load_hypotheses;
pub use matrix::{load_index_vector, load_matrix, load_vector, parse_matrix};
pub use shuffle::{load_shuffles, Shuffle};
pub use variance::load_variance_groups;
