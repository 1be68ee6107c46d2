//! Testers for a design matrix shared by every element.
//!
//! Everything that depends only on the design (its pseudo-inverse, the
//! residual-forming matrix and each hypothesis' partition) is computed once
//! at construction. Each evaluation then applies Freedman-Lane: permute the
//! data with nuisance regressed out, refit the full model, and form the
//! statistic from the refitted parameters and residuals.

use rayon::prelude::*;
use tracing::debug;

use permglm_linalg::{pinv, DenseMatrix};

use super::statistic::{f_statistic, g_statistic, gamma_weight, output_value, GroupTerms};
use super::{GlmTest, TestBase};
use crate::error::{GlmError, Result};
use crate::hypothesis::{Hypothesis, Partition};
use crate::variance::VarianceGroups;

/// Per-hypothesis invariants of a fixed design.
struct HypothesisTerms {
    partition: Partition,
    xtx: DenseMatrix,
    one_over_dof: f64,
}

/// Shuffled data refitted against the full model, for one hypothesis.
struct Refit {
    /// Full-model parameters, factors x elements.
    lambdas: DenseMatrix,
    /// Residuals, inputs x elements.
    residuals: DenseMatrix,
}

/// Ordinary least squares with equal error variance for all inputs.
pub struct TestFixedHomoscedastic<'a> {
    base: TestBase<'a>,
    pinv_m: DenseMatrix,
    rm: DenseMatrix,
    terms: Vec<HypothesisTerms>,
}

impl<'a> TestFixedHomoscedastic<'a> {
    pub fn new(
        measurements: &'a DenseMatrix,
        design: &'a DenseMatrix,
        hypotheses: &'a [Hypothesis],
    ) -> Result<Self> {
        let base = TestBase::new(measurements, design, hypotheses, design.ncols())?;
        let pinv_m = pinv(design);
        let rm = design.mat_mul(&pinv_m).identity_minus();
        let n = base.num_inputs() as f64;
        let terms = hypotheses
            .iter()
            .map(|h| {
                let partition = h.partition(design);
                let xtx = partition.x.t_mat_mul(&partition.x);
                let one_over_dof = 1.0 / (n - (partition.rank_x + partition.rank_z) as f64);
                debug!(
                    "{}: rank(X) = {}, rank(Z) = {}",
                    h.name(),
                    partition.rank_x,
                    partition.rank_z
                );
                HypothesisTerms {
                    partition,
                    xtx,
                    one_over_dof,
                }
            })
            .collect();
        Ok(Self {
            base,
            pinv_m,
            rm,
            terms,
        })
    }

    /// Residual-forming matrix of the full design, I - M pinv(M).
    pub fn residual_forming(&self) -> &DenseMatrix {
        &self.rm
    }

    fn refit(&self, shuffling: &DenseMatrix, ih: usize) -> Refit {
        // Sy = S Rz Y; (S Rz) first since it is only inputs x inputs
        let sy = shuffling
            .mat_mul(&self.terms[ih].partition.rz)
            .mat_mul(self.base.measurements());
        Refit {
            lambdas: self.pinv_m.mat_mul(&sy),
            residuals: self.rm.mat_mul(&sy),
        }
    }
}

impl GlmTest for TestFixedHomoscedastic<'_> {
    fn base(&self) -> &TestBase<'_> {
        &self.base
    }

    fn evaluate(&self, shuffling: &DenseMatrix) -> Result<DenseMatrix> {
        self.base.check_shuffle(shuffling)?;
        let mut output = DenseMatrix::zeros(self.num_elements(), self.num_hypotheses());

        for (ih, h) in self.base.hypotheses().iter().enumerate() {
            let refit = self.refit(shuffling, ih);
            let sse = refit.residuals.col_squared_norms();
            let terms = &self.terms[ih];
            let column: Vec<f64> = (0..self.num_elements())
                .into_par_iter()
                .map(|ie| {
                    let beta = h.matrix().mat_vec(&refit.lambdas.col(ie));
                    let f = f_statistic(h, &terms.xtx, &beta, sse[ie], terms.one_over_dof);
                    output_value(f, h, beta.iter().sum())
                })
                .collect();
            output.set_col(ih, &column);
        }

        Ok(output)
    }
}

/// Fixed design with a separate error variance per variance group (G-statistic).
pub struct TestFixedHeteroscedastic<'a> {
    inner: TestFixedHomoscedastic<'a>,
    vg: &'a VarianceGroups,
    group_terms: GroupTerms,
    gamma_weights: Vec<f64>,
}

impl<'a> TestFixedHeteroscedastic<'a> {
    pub fn new(
        measurements: &'a DenseMatrix,
        design: &'a DenseMatrix,
        hypotheses: &'a [Hypothesis],
        variance_groups: &'a VarianceGroups,
    ) -> Result<Self> {
        let inner = TestFixedHomoscedastic::new(measurements, design, hypotheses)?;
        if variance_groups.num_inputs() != inner.num_inputs() {
            return Err(GlmError::DimensionMismatch {
                what: "variance group assignment",
                expected: inner.num_inputs(),
                got: variance_groups.num_inputs(),
            });
        }
        let group_terms = GroupTerms::new(
            variance_groups.assignments(),
            variance_groups.counts().to_vec(),
            &inner.rm.diag(),
        );
        debug!(
            "Inputs per variance group: {:?}; Rnn sums: {:?}",
            group_terms.counts, group_terms.rnn_sums
        );
        let gamma_weights = hypotheses.iter().map(gamma_weight).collect();
        Ok(Self {
            inner,
            vg: variance_groups,
            group_terms,
            gamma_weights,
        })
    }

    pub fn num_variance_groups(&self) -> usize {
        self.vg.num_groups()
    }
}

impl GlmTest for TestFixedHeteroscedastic<'_> {
    fn base(&self) -> &TestBase<'_> {
        &self.inner.base
    }

    fn evaluate(&self, shuffling: &DenseMatrix) -> Result<DenseMatrix> {
        self.inner.base.check_shuffle(shuffling)?;
        let design = self.inner.base.design();
        let groups = self.vg.assignments();
        let mut output = DenseMatrix::zeros(self.num_elements(), self.num_hypotheses());

        for (ih, h) in self.inner.base.hypotheses().iter().enumerate() {
            let refit = self.inner.refit(shuffling, ih);
            let gamma_weight = self.gamma_weights[ih];
            let column: Vec<f64> = (0..self.num_elements())
                .into_par_iter()
                .map(|ie| {
                    let lambda = refit.lambdas.col(ie);
                    let g = g_statistic(
                        design,
                        h,
                        gamma_weight,
                        &lambda,
                        &refit.residuals.col(ie),
                        groups,
                        &self.group_terms,
                    );
                    output_value(g, h, h.matrix().mat_vec(&lambda).iter().sum())
                })
                .collect();
            output.set_col(ih, &column);
        }

        Ok(output)
    }
}
