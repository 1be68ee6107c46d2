//! Contrast and F-test matrix files.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use permglm_core::{hypotheses_from_matrices, Hypothesis};

use crate::matrix::load_matrix;

/// Load t-tests from a contrast matrix file and F-tests from an optional
/// selection file (one row of 0/1 flags over the contrast rows per F-test).
///
/// With `f_only`, only the F-tests are returned.
pub fn load_hypotheses(
    contrast_path: &Path,
    ftests_path: Option<&Path>,
    f_only: bool,
) -> Result<Vec<Hypothesis>> {
    let contrast = load_matrix(contrast_path)?;
    let ftests = ftests_path.map(load_matrix).transpose()?;
    let hypotheses = hypotheses_from_matrices(&contrast, ftests.as_ref(), f_only).with_context(|| {
        format!(
            "Invalid hypotheses in contrast file {}{}",
            contrast_path.display(),
            ftests_path
                .map(|p| format!(" / F-test file {}", p.display()))
                .unwrap_or_default()
        )
    })?;
    let num_f = hypotheses.iter().filter(|h| h.is_f()).count();
    info!(
        "Loaded {} hypotheses ({} t-tests, {} F-tests) over {} factors",
        hypotheses.len(),
        hypotheses.len() - num_f,
        num_f,
        contrast.ncols()
    );
    Ok(hypotheses)
}
