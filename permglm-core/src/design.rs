//! Advisory checks on a design matrix before fitting.

use serde::Serialize;
use tracing::{info, warn};

use permglm_linalg::{condition_number, rank, DenseMatrix};

/// Condition number above which a design is reported as poorly conditioned.
pub const POOR_CONDITION_NUMBER: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignDiagnostic {
    pub rank: usize,
    pub num_factors: usize,
    /// Only computed for full-rank designs.
    pub condition_number: Option<f64>,
    /// The reported design excludes element-wise columns still to be added.
    pub extra_factors: bool,
}

impl DesignDiagnostic {
    pub fn is_rank_deficient(&self) -> bool {
        self.rank < self.num_factors
    }

    pub fn is_poorly_conditioned(&self) -> bool {
        self.condition_number
            .map_or(false, |c| !c.is_finite() || c > POOR_CONDITION_NUMBER)
    }
}

/// Report rank deficiency or the condition number of `design`.
///
/// Never fails: a problematic design is only logged. With `extra_factors`
/// the design is the fixed block before element-wise columns are added, so
/// problems are reported at info level only.
pub fn check_design(design: &DenseMatrix, extra_factors: bool) -> DesignDiagnostic {
    let rank = rank(design);
    let num_factors = design.ncols();
    let condition_number = (rank >= num_factors).then(|| condition_number(design));
    let diagnostic = DesignDiagnostic {
        rank,
        num_factors,
        condition_number,
        extra_factors,
    };

    match diagnostic.condition_number {
        None if extra_factors => {
            info!("Design matrix is rank-deficient before addition of element-wise columns")
        }
        None => warn!(
            "Design matrix is rank-deficient (rank {} of {}); processing may proceed, but manually checking your matrix is advised",
            rank, num_factors
        ),
        Some(cond) if diagnostic.is_poorly_conditioned() => {
            if extra_factors {
                info!(
                    "Design matrix conditioning is poor (condition number: {:.6}) before the addition of element-wise columns",
                    cond
                );
            } else {
                warn!(
                    "Design matrix conditioning is poor (condition number: {:.6}); model fitting may be highly influenced by noise",
                    cond
                );
            }
        }
        Some(cond) => info!(
            "Design matrix condition number{}: {:.6}",
            if extra_factors {
                " (without element-wise columns)"
            } else {
                ""
            },
            cond
        ),
    }
    diagnostic
}
