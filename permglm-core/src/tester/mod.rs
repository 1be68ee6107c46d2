//! Permutation testers for the general linear model.
//!
//! Four strategies cover {fixed, element-wise} design x {homoscedastic,
//! heteroscedastic} errors. All share one contract: given a shuffling
//! matrix, return an elements x hypotheses matrix holding
//! `sign(effect) * sqrt(F)` for t-tests and `sqrt(F)` (or `sqrt(G)`) for
//! F-tests, with zeros wherever the statistic cannot be computed.
//!
//! Testers hold only immutable state, so a single tester can be evaluated
//! for many shuffles concurrently; per-element work inside one evaluation
//! is spread across the rayon pool.

pub mod fixed;
mod mask;
mod statistic;
pub mod variable;

use tracing::debug;

use permglm_linalg::DenseMatrix;

use crate::error::{GlmError, Result};
use crate::hypothesis::Hypothesis;
use crate::importer::ColumnImporter;
use crate::variance::VarianceGroups;

pub use fixed::{TestFixedHeteroscedastic, TestFixedHomoscedastic};
pub use variable::{TestVariableHeteroscedastic, TestVariableHomoscedastic};

/// Largest design condition number accepted for an element-wise fit.
pub const DEFAULT_MAX_CONDITION_NUMBER: f64 = 1e5;

/// Settings for the element-wise testers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOptions {
    /// Measurements may contain non-finite values that must be masked.
    pub nans_in_data: bool,
    /// Imported design columns may contain non-finite values that must be masked.
    pub nans_in_columns: bool,
    /// Elements whose (masked) design exceeds this condition number are zeroed.
    pub max_condition_number: f64,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            nans_in_data: true,
            nans_in_columns: true,
            max_condition_number: DEFAULT_MAX_CONDITION_NUMBER,
        }
    }
}

impl TestOptions {
    /// Only enable masking where non-finite values can actually occur.
    pub fn detect(measurements: &DenseMatrix, importers: &[Box<dyn ColumnImporter>]) -> Self {
        Self {
            nans_in_data: !measurements.is_all_finite(),
            nans_in_columns: importers.iter().any(|imp| !imp.all_finite()),
            ..Self::default()
        }
    }
}

/// Data shared by every tester: measurements, base design and hypotheses.
pub struct TestBase<'a> {
    y: &'a DenseMatrix,
    m: &'a DenseMatrix,
    hypotheses: &'a [Hypothesis],
}

impl<'a> TestBase<'a> {
    /// Check that measurements, design and hypotheses agree in shape.
    ///
    /// `num_factors` is the width of the full design, which exceeds the
    /// base design when element-wise columns are imported.
    pub fn new(
        measurements: &'a DenseMatrix,
        design: &'a DenseMatrix,
        hypotheses: &'a [Hypothesis],
        num_factors: usize,
    ) -> Result<Self> {
        if hypotheses.is_empty() {
            return Err(GlmError::NoHypotheses);
        }
        if measurements.nrows() != design.nrows() {
            return Err(GlmError::DimensionMismatch {
                what: "design matrix rows",
                expected: measurements.nrows(),
                got: design.nrows(),
            });
        }
        if let Some(h) = hypotheses.iter().find(|h| h.cols() != num_factors) {
            return Err(GlmError::DimensionMismatch {
                what: "contrast matrix columns",
                expected: num_factors,
                got: h.cols(),
            });
        }
        Ok(Self {
            y: measurements,
            m: design,
            hypotheses,
        })
    }

    pub fn measurements(&self) -> &DenseMatrix {
        self.y
    }

    pub fn design(&self) -> &DenseMatrix {
        self.m
    }

    pub fn hypotheses(&self) -> &[Hypothesis] {
        self.hypotheses
    }

    pub fn num_inputs(&self) -> usize {
        self.y.nrows()
    }

    pub fn num_elements(&self) -> usize {
        self.y.ncols()
    }

    pub fn num_hypotheses(&self) -> usize {
        self.hypotheses.len()
    }

    pub(crate) fn check_shuffle(&self, shuffling: &DenseMatrix) -> Result<()> {
        let n = self.num_inputs();
        if shuffling.nrows() != n || shuffling.ncols() != n {
            return Err(GlmError::DimensionMismatch {
                what: "shuffling matrix",
                expected: n,
                got: if shuffling.nrows() != n {
                    shuffling.nrows()
                } else {
                    shuffling.ncols()
                },
            });
        }
        Ok(())
    }

    /// Assemble per-element output rows into the elements x hypotheses result.
    pub(crate) fn collect_rows(&self, rows: Vec<Vec<f64>>) -> DenseMatrix {
        let mut output = DenseMatrix::zeros(self.num_elements(), self.num_hypotheses());
        for (ie, row) in rows.iter().enumerate() {
            output.set_row(ie, row);
        }
        output
    }
}

/// Contract shared by the four testers.
pub trait GlmTest: Send + Sync {
    fn base(&self) -> &TestBase<'_>;

    /// Evaluate every hypothesis at every element for one shuffle.
    ///
    /// `shuffling` is square with one row per input; element-wise testers
    /// reduce it to the inputs retained at each element.
    fn evaluate(&self, shuffling: &DenseMatrix) -> Result<DenseMatrix>;

    fn num_inputs(&self) -> usize {
        self.base().num_inputs()
    }

    fn num_elements(&self) -> usize {
        self.base().num_elements()
    }

    fn num_hypotheses(&self) -> usize {
        self.base().num_hypotheses()
    }

    /// Columns of the full design, including element-wise columns.
    fn num_factors(&self) -> usize {
        self.base().design().ncols()
    }

    fn hypotheses(&self) -> &[Hypothesis] {
        self.base().hypotheses()
    }

    /// The statistic for the data as observed (identity shuffle).
    fn evaluate_default(&self) -> Result<DenseMatrix> {
        self.evaluate(&DenseMatrix::identity(self.num_inputs()))
    }
}

/// Pick the tester for this combination of inputs.
///
/// Element-wise testing is needed when there are imported columns or the
/// measurements hold non-finite values; heteroscedastic testing when
/// variance groups are given.
pub fn select_tester<'a>(
    measurements: &'a DenseMatrix,
    design: &'a DenseMatrix,
    hypotheses: &'a [Hypothesis],
    importers: &'a [Box<dyn ColumnImporter>],
    variance_groups: Option<&'a VarianceGroups>,
    options: TestOptions,
) -> Result<Box<dyn GlmTest + 'a>> {
    let variable = !importers.is_empty() || options.nans_in_data;
    debug!(
        "Selecting {} {} tester",
        if variable { "element-wise" } else { "fixed" },
        if variance_groups.is_some() {
            "heteroscedastic"
        } else {
            "homoscedastic"
        }
    );
    Ok(match (variable, variance_groups) {
        (false, None) => Box::new(TestFixedHomoscedastic::new(measurements, design, hypotheses)?),
        (false, Some(vg)) => Box::new(TestFixedHeteroscedastic::new(
            measurements,
            design,
            hypotheses,
            vg,
        )?),
        (true, None) => Box::new(TestVariableHomoscedastic::new(
            importers,
            measurements,
            design,
            hypotheses,
            options,
        )?),
        (true, Some(vg)) => Box::new(TestVariableHeteroscedastic::new(
            importers,
            measurements,
            design,
            hypotheses,
            vg,
            options,
        )?),
    })
}
