//! permglm-core: permutation testing for the general linear model
//!
//! Hypotheses and their Freedman-Lane partitions, the four testers
//! ({fixed, element-wise} design x {homoscedastic, heteroscedastic} errors),
//! observed-model statistics and design diagnostics.

pub mod design;
pub mod error;
pub mod hypothesis;
pub mod importer;
pub mod stats;
pub mod tester;
pub mod variance;

pub use design::{check_design, DesignDiagnostic};
pub use error::{GlmError, Result};
pub use hypothesis::{hypotheses_from_matrices, Hypothesis, HypothesisKind, Partition};
pub use importer::{ColumnImporter, MatrixImporter};
pub use stats::{all_stats, all_stats_variable, AllStats};
pub use tester::{
    select_tester, GlmTest, TestFixedHeteroscedastic, TestFixedHomoscedastic, TestOptions,
    TestVariableHeteroscedastic, TestVariableHomoscedastic,
};
pub use variance::VarianceGroups;
