//! Basic properties of the unpermuted model fit.
//!
//! These are reported alongside the test statistic: fitted coefficients,
//! absolute and standardised effect sizes per t-test, and the residual
//! standard deviation. Effect sizes are undefined for F-tests and are NaN.
//!
//! Variance groups are not taken into account here: the standard deviation
//! is a single pooled estimate even when the test itself is heteroscedastic.

use rayon::prelude::*;
use tracing::{debug, trace};

use permglm_linalg::{condition_number, pinv, rank, DenseMatrix};

use crate::error::{GlmError, Result};
use crate::hypothesis::Hypothesis;
use crate::importer::ColumnImporter;
use crate::tester::DEFAULT_MAX_CONDITION_NUMBER;

/// Observed-model properties for every element.
#[derive(Debug, Clone)]
pub struct AllStats {
    /// Condition number of the design used at each element.
    pub cond: Vec<f64>,
    /// Fitted coefficients, factors x elements.
    pub betas: DenseMatrix,
    /// `C beta` per element and hypothesis; NaN for F-tests.
    pub abs_effect_size: DenseMatrix,
    /// Absolute effect size over residual standard deviation.
    pub std_effect_size: DenseMatrix,
    pub stdev: Vec<f64>,
}

/// Least-squares coefficients, factors x elements.
pub fn solve_betas(measurements: &DenseMatrix, design: &DenseMatrix) -> DenseMatrix {
    pinv(design).mat_mul(measurements)
}

/// Effect size of one hypothesis at every element.
pub fn abs_effect_size(
    measurements: &DenseMatrix,
    design: &DenseMatrix,
    hypothesis: &Hypothesis,
) -> Vec<f64> {
    effect_from_betas(&solve_betas(measurements, design), hypothesis)
}

/// Residual standard deviation at every element, with `n - rank(M)` degrees of freedom.
pub fn stdev(measurements: &DenseMatrix, design: &DenseMatrix) -> Vec<f64> {
    let betas = solve_betas(measurements, design);
    stdev_from_betas(measurements, design, &betas)
}

/// Effect size in units of the residual standard deviation.
pub fn std_effect_size(
    measurements: &DenseMatrix,
    design: &DenseMatrix,
    hypothesis: &Hypothesis,
) -> Vec<f64> {
    let betas = solve_betas(measurements, design);
    let sd = stdev_from_betas(measurements, design, &betas);
    effect_from_betas(&betas, hypothesis)
        .iter()
        .zip(&sd)
        .map(|(e, s)| e / s)
        .collect()
}

fn effect_from_betas(betas: &DenseMatrix, hypothesis: &Hypothesis) -> Vec<f64> {
    if hypothesis.is_f() {
        vec![f64::NAN; betas.ncols()]
    } else {
        hypothesis.matrix().mat_mul(betas).row(0)
    }
}

fn stdev_from_betas(measurements: &DenseMatrix, design: &DenseMatrix, betas: &DenseMatrix) -> Vec<f64> {
    let residuals = measurements.sub(&design.mat_mul(betas));
    let dof = design.nrows() as f64 - rank(design) as f64;
    residuals
        .col_squared_norms()
        .iter()
        .map(|sse| (sse / dof).sqrt())
        .collect()
}

fn check_contrasts(hypotheses: &[Hypothesis], num_factors: usize) -> Result<()> {
    if hypotheses.is_empty() {
        return Err(GlmError::NoHypotheses);
    }
    match hypotheses.iter().find(|h| h.cols() != num_factors) {
        Some(h) => Err(GlmError::DimensionMismatch {
            what: "contrast matrix columns",
            expected: num_factors,
            got: h.cols(),
        }),
        None => Ok(()),
    }
}

/// Observed properties for a design shared by every element.
pub fn all_stats(
    measurements: &DenseMatrix,
    design: &DenseMatrix,
    hypotheses: &[Hypothesis],
) -> Result<AllStats> {
    check_contrasts(hypotheses, design.ncols())?;
    if measurements.nrows() != design.nrows() {
        return Err(GlmError::DimensionMismatch {
            what: "design matrix rows",
            expected: measurements.nrows(),
            got: design.nrows(),
        });
    }

    let num_elements = measurements.ncols();
    let betas = solve_betas(measurements, design);
    let stdev = stdev_from_betas(measurements, design, &betas);

    let mut abs_effect_size = DenseMatrix::zeros(num_elements, hypotheses.len());
    let mut std_effect_size = DenseMatrix::zeros(num_elements, hypotheses.len());
    for (ih, h) in hypotheses.iter().enumerate() {
        let effect = effect_from_betas(&betas, h);
        let standardised: Vec<f64> = effect.iter().zip(&stdev).map(|(e, s)| e / s).collect();
        abs_effect_size.set_col(ih, &effect);
        std_effect_size.set_col(ih, &standardised);
    }

    let cond = condition_number(design);
    debug!(
        "Observed fit: {} elements, {} factors, design condition number {:.3}",
        num_elements,
        design.ncols(),
        cond
    );
    Ok(AllStats {
        cond: vec![cond; num_elements],
        betas,
        abs_effect_size,
        std_effect_size,
        stdev,
    })
}

/// One element's contribution to [`AllStats`].
struct ElementStats {
    cond: f64,
    betas: Vec<f64>,
    abs_effect_size: Vec<f64>,
    std_effect_size: Vec<f64>,
    stdev: f64,
}

impl ElementStats {
    fn zeroed(num_factors: usize, num_hypotheses: usize, cond: f64) -> Self {
        Self {
            cond,
            betas: vec![0.0; num_factors],
            abs_effect_size: vec![0.0; num_hypotheses],
            std_effect_size: vec![0.0; num_hypotheses],
            stdev: 0.0,
        }
    }

    fn fit(
        data: Vec<f64>,
        design: &DenseMatrix,
        hypotheses: &[Hypothesis],
        cond: f64,
    ) -> Result<Self> {
        let stats = all_stats(&DenseMatrix::from_vec(&data), design, hypotheses)?;
        Ok(Self {
            cond,
            betas: stats.betas.col(0),
            abs_effect_size: stats.abs_effect_size.row(0),
            std_effect_size: stats.std_effect_size.row(0),
            stdev: stats.stdev[0],
        })
    }
}

/// Observed properties when the design varies between elements.
///
/// Each element's design is the fixed block plus one column per importer.
/// Inputs with non-finite data or covariates are dropped from that element's
/// fit. Elements with fewer finite inputs than factors, or whose design has a
/// condition number above 1e5, are reported as zeros. Falls back to
/// [`all_stats`] when there is nothing element-specific to do.
pub fn all_stats_variable(
    measurements: &DenseMatrix,
    fixed_design: &DenseMatrix,
    importers: &[Box<dyn ColumnImporter>],
    hypotheses: &[Hypothesis],
) -> Result<AllStats> {
    if importers.is_empty() && measurements.is_all_finite() {
        return all_stats(measurements, fixed_design, hypotheses);
    }
    let n = measurements.nrows();
    let num_factors = fixed_design.ncols() + importers.len();
    check_contrasts(hypotheses, num_factors)?;

    let per_element = (0..measurements.ncols())
        .into_par_iter()
        .map(|ie| {
            let mut extra = DenseMatrix::zeros(n, importers.len());
            for (col, importer) in importers.iter().enumerate() {
                let values = importer.import(ie);
                if values.len() != n {
                    return Err(GlmError::DimensionMismatch {
                        what: "imported design column",
                        expected: n,
                        got: values.len(),
                    });
                }
                extra.set_col(col, &values);
            }
            let design = fixed_design.hstack(&extra);
            let data = measurements.col(ie);
            let valid: Vec<usize> = (0..n)
                .filter(|&row| data[row].is_finite() && design.row_is_finite(row))
                .collect();

            let (data, design) = if valid.len() == n {
                (data, design)
            } else if valid.len() >= num_factors {
                (
                    valid.iter().map(|&row| data[row]).collect(),
                    design.select_rows(&valid),
                )
            } else {
                trace!("Element {}: {} finite inputs for {} factors", ie, valid.len(), num_factors);
                return Ok(ElementStats::zeroed(num_factors, hypotheses.len(), 0.0));
            };

            let cond = condition_number(&design);
            if !cond.is_finite() || cond > DEFAULT_MAX_CONDITION_NUMBER {
                trace!("Element {}: design condition number {}", ie, cond);
                return Ok(ElementStats::zeroed(num_factors, hypotheses.len(), cond));
            }
            ElementStats::fit(data, &design, hypotheses, cond)
        })
        .collect::<Result<Vec<_>>>()?;

    let num_elements = per_element.len();
    let mut stats = AllStats {
        cond: Vec::with_capacity(num_elements),
        betas: DenseMatrix::zeros(num_factors, num_elements),
        abs_effect_size: DenseMatrix::zeros(num_elements, hypotheses.len()),
        std_effect_size: DenseMatrix::zeros(num_elements, hypotheses.len()),
        stdev: Vec::with_capacity(num_elements),
    };
    for (ie, element) in per_element.into_iter().enumerate() {
        stats.cond.push(element.cond);
        stats.betas.set_col(ie, &element.betas);
        stats.abs_effect_size.set_row(ie, &element.abs_effect_size);
        stats.std_effect_size.set_row(ie, &element.std_effect_size);
        stats.stdev.push(element.stdev);
    }
    Ok(stats)
}
