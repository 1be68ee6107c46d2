//! Testers whose design matrix differs between elements.
//!
//! The design is the fixed block plus one column per importer, filled for
//! each element on demand. Inputs with non-finite data or covariates at an
//! element are masked out of that element's fit, so the pseudo-inverse,
//! residual-forming matrix and partitions all have to be rebuilt per element.
//!
//! An element yields an all-zero output row when too few inputs survive
//! masking, when its masked design is ill-conditioned, or (heteroscedastic
//! case) when masking empties a variance group.

use rayon::prelude::*;
use tracing::trace;

use permglm_linalg::{condition_number, pinv, DenseMatrix};

use super::mask::{apply_mask, fill_mask, ElementScratch, MaskedElement};
use super::statistic::{f_statistic, g_statistic, gamma_weight, output_value, GroupTerms};
use super::{GlmTest, TestBase, TestOptions};
use crate::error::{GlmError, Result};
use crate::hypothesis::Hypothesis;
use crate::importer::ColumnImporter;
use crate::variance::VarianceGroups;

/// Element-wise design, equal error variance for all inputs.
pub struct TestVariableHomoscedastic<'a> {
    base: TestBase<'a>,
    importers: &'a [Box<dyn ColumnImporter>],
    options: TestOptions,
}

/// A masked element that passed the sample-size and conditioning checks.
struct ElementFit<'s> {
    masked: MaskedElement<'s>,
    pinv_m: DenseMatrix,
    rm: DenseMatrix,
}

impl<'a> TestVariableHomoscedastic<'a> {
    pub fn new(
        importers: &'a [Box<dyn ColumnImporter>],
        measurements: &'a DenseMatrix,
        design: &'a DenseMatrix,
        hypotheses: &'a [Hypothesis],
        options: TestOptions,
    ) -> Result<Self> {
        let base = TestBase::new(
            measurements,
            design,
            hypotheses,
            design.ncols() + importers.len(),
        )?;
        Ok(Self {
            base,
            importers,
            options,
        })
    }

    /// Fewest retained inputs for which an element is tested at all.
    fn min_retained(&self) -> usize {
        self.num_inputs().min(2 * self.num_factors())
    }

    /// Import, mask and compact one element, then check its conditioning.
    ///
    /// `Ok(None)` means the element is to be zeroed.
    fn prepare<'s>(
        &self,
        ie: usize,
        shuffling: &'s DenseMatrix,
        scratch: &mut ElementScratch,
    ) -> Result<Option<ElementFit<'s>>> {
        let n = self.num_inputs();
        for (col, importer) in self.importers.iter().enumerate() {
            let values = importer.import(ie);
            if values.len() != n {
                return Err(GlmError::DimensionMismatch {
                    what: "imported design column",
                    expected: n,
                    got: values.len(),
                });
            }
            scratch.extra.set_col(col, &values);
        }

        let data = self.base.measurements().col(ie);
        let finite_count = fill_mask(
            &mut scratch.mask,
            &data,
            &scratch.extra,
            self.options.nans_in_data,
            self.options.nans_in_columns,
        );
        if finite_count < self.min_retained() {
            trace!("Element {}: only {} of {} inputs retained", ie, finite_count, n);
            return Ok(None);
        }

        let masked = apply_mask(
            ie,
            &scratch.mask,
            &data,
            shuffling,
            self.base.design(),
            &scratch.extra,
        )?;
        let cond = condition_number(&masked.design);
        if !cond.is_finite() || cond > self.options.max_condition_number {
            trace!("Element {}: design condition number {}", ie, cond);
            return Ok(None);
        }

        let pinv_m = pinv(&masked.design);
        let rm = masked.design.mat_mul(&pinv_m).identity_minus();
        Ok(Some(ElementFit { masked, pinv_m, rm }))
    }

    fn evaluate_element(
        &self,
        ie: usize,
        shuffling: &DenseMatrix,
        scratch: &mut ElementScratch,
    ) -> Result<Vec<f64>> {
        let mut row = vec![0.0; self.num_hypotheses()];
        let Some(fit) = self.prepare(ie, shuffling, scratch)? else {
            return Ok(row);
        };
        let retained = fit.masked.retained.len();

        for (ih, h) in self.base.hypotheses().iter().enumerate() {
            let partition = h.partition(&fit.masked.design);
            let dof = retained as isize - (partition.rank_x + partition.rank_z) as isize;
            if dof < 1 {
                continue;
            }
            let xtx = partition.x.t_mat_mul(&partition.x);
            let sy = fit
                .masked
                .shuffling
                .mat_vec(&partition.rz.mat_vec(&fit.masked.data));
            let lambda = fit.pinv_m.mat_vec(&sy);
            let beta = h.matrix().mat_vec(&lambda);
            let sse: f64 = fit.rm.mat_vec(&sy).iter().map(|r| r * r).sum();
            let f = f_statistic(h, &xtx, &beta, sse, 1.0 / dof as f64);
            row[ih] = output_value(f, h, beta.iter().sum());
        }
        Ok(row)
    }
}

impl GlmTest for TestVariableHomoscedastic<'_> {
    fn base(&self) -> &TestBase<'_> {
        &self.base
    }

    fn num_factors(&self) -> usize {
        self.base.design().ncols() + self.importers.len()
    }

    fn evaluate(&self, shuffling: &DenseMatrix) -> Result<DenseMatrix> {
        self.base.check_shuffle(shuffling)?;
        let rows = (0..self.num_elements())
            .into_par_iter()
            .map_init(
                || ElementScratch::new(self.num_inputs(), self.importers.len()),
                |scratch, ie| self.evaluate_element(ie, shuffling, scratch),
            )
            .collect::<Result<Vec<_>>>()?;
        Ok(self.base.collect_rows(rows))
    }
}

/// Element-wise design with a separate error variance per variance group.
pub struct TestVariableHeteroscedastic<'a> {
    inner: TestVariableHomoscedastic<'a>,
    vg: &'a VarianceGroups,
    gamma_weights: Vec<f64>,
}

impl<'a> TestVariableHeteroscedastic<'a> {
    pub fn new(
        importers: &'a [Box<dyn ColumnImporter>],
        measurements: &'a DenseMatrix,
        design: &'a DenseMatrix,
        hypotheses: &'a [Hypothesis],
        variance_groups: &'a VarianceGroups,
        options: TestOptions,
    ) -> Result<Self> {
        let inner =
            TestVariableHomoscedastic::new(importers, measurements, design, hypotheses, options)?;
        if variance_groups.num_inputs() != inner.num_inputs() {
            return Err(GlmError::DimensionMismatch {
                what: "variance group assignment",
                expected: inner.num_inputs(),
                got: variance_groups.num_inputs(),
            });
        }
        Ok(Self {
            inner,
            vg: variance_groups,
            gamma_weights: hypotheses.iter().map(gamma_weight).collect(),
        })
    }

    pub fn num_variance_groups(&self) -> usize {
        self.vg.num_groups()
    }

    fn evaluate_element(
        &self,
        ie: usize,
        shuffling: &DenseMatrix,
        scratch: &mut ElementScratch,
    ) -> Result<Vec<f64>> {
        let mut row = vec![0.0; self.num_hypotheses()];
        let Some(fit) = self.inner.prepare(ie, shuffling, scratch)? else {
            return Ok(row);
        };
        let (groups, counts) = self.vg.masked(&fit.masked.retained);
        if counts.contains(&0) {
            trace!("Element {}: a variance group has no retained inputs", ie);
            return Ok(row);
        }
        let terms = GroupTerms::new(&groups, counts, &fit.rm.diag());

        for (ih, h) in self.inner.base.hypotheses().iter().enumerate() {
            let partition = h.partition(&fit.masked.design);
            let sy = fit
                .masked
                .shuffling
                .mat_vec(&partition.rz.mat_vec(&fit.masked.data));
            let lambda = fit.pinv_m.mat_vec(&sy);
            let residuals = fit.rm.mat_vec(&sy);
            let g = g_statistic(
                &fit.masked.design,
                h,
                self.gamma_weights[ih],
                &lambda,
                &residuals,
                &groups,
                &terms,
            );
            row[ih] = output_value(g, h, h.matrix().mat_vec(&lambda).iter().sum());
        }
        Ok(row)
    }
}

impl GlmTest for TestVariableHeteroscedastic<'_> {
    fn base(&self) -> &TestBase<'_> {
        &self.inner.base
    }

    fn num_factors(&self) -> usize {
        self.inner.num_factors()
    }

    fn evaluate(&self, shuffling: &DenseMatrix) -> Result<DenseMatrix> {
        self.inner.base.check_shuffle(shuffling)?;
        let rows = (0..self.num_elements())
            .into_par_iter()
            .map_init(
                || ElementScratch::new(self.num_inputs(), self.inner.importers.len()),
                |scratch, ie| self.evaluate_element(ie, shuffling, scratch),
            )
            .collect::<Result<Vec<_>>>()?;
        Ok(self.inner.base.collect_rows(rows))
    }
}
