//! Per-element statistic kernels shared by the fixed and element-wise testers.

use permglm_linalg::{inverse_spd, DenseMatrix};

use crate::hypothesis::Hypothesis;

/// Convert a statistic to the stored output value.
///
/// t-tests keep the sign of the effect, F-tests are unsigned; anything
/// non-finite becomes zero.
pub(crate) fn output_value(statistic: f64, hypothesis: &Hypothesis, effect: f64) -> f64 {
    if !statistic.is_finite() || statistic < 0.0 {
        return 0.0;
    }
    let root = statistic.sqrt();
    if hypothesis.is_f() || effect > 0.0 {
        root
    } else {
        -root
    }
}

/// `2(s-1) / (s(s+2))` for a contrast of rank s.
pub(crate) fn gamma_weight(hypothesis: &Hypothesis) -> f64 {
    let s = hypothesis.rank() as f64;
    2.0 * (s - 1.0) / (s * (s + 2.0))
}

/// Residual-forming matrix diagonal summed within each variance group.
#[derive(Debug, Clone)]
pub(crate) struct GroupTerms {
    pub counts: Vec<usize>,
    pub rnn_sums: Vec<f64>,
    pub inv_rnn_sums: Vec<f64>,
}

impl GroupTerms {
    pub fn new(groups: &[usize], counts: Vec<usize>, rm_diag: &[f64]) -> Self {
        let mut rnn_sums = vec![0.0; counts.len()];
        for (&g, &r) in groups.iter().zip(rm_diag) {
            rnn_sums[g] += r;
        }
        let inv_rnn_sums = rnn_sums.iter().map(|r| 1.0 / r).collect();
        Self {
            counts,
            rnn_sums,
            inv_rnn_sums,
        }
    }
}

/// F statistic of one element from refitted parameters and residual sum of squares.
pub(crate) fn f_statistic(
    hypothesis: &Hypothesis,
    xtx: &DenseMatrix,
    beta: &[f64],
    sse: f64,
    one_over_dof: f64,
) -> f64 {
    (xtx.quad_form(beta) / hypothesis.rank() as f64) / (one_over_dof * sse)
}

/// G statistic of one element.
///
/// `lambda` are the full-model parameters fitted to the shuffled data and
/// `residuals` the matching residuals, one per input, with `groups` giving
/// the variance group of each input.
pub(crate) fn g_statistic(
    design: &DenseMatrix,
    hypothesis: &Hypothesis,
    gamma_weight: f64,
    lambda: &[f64],
    residuals: &[f64],
    groups: &[usize],
    terms: &GroupTerms,
) -> f64 {
    let num_groups = terms.counts.len();
    let mut sse = vec![0.0; num_groups];
    for (&r, &g) in residuals.iter().zip(groups) {
        sse[g] += r * r;
    }
    let w_terms: Vec<f64> = terms
        .rnn_sums
        .iter()
        .zip(&sse)
        .map(|(rnn, s)| {
            let w = rnn / s;
            if w.is_finite() {
                w
            } else {
                0.0
            }
        })
        .collect();
    let w: Vec<f64> = groups.iter().map(|&g| w_terms[g]).collect();
    let w_trace: f64 = w.iter().sum();

    let c = hypothesis.matrix();
    let Ok(inv_mwm) = inverse_spd(&design.xtwx(&w)) else {
        return f64::NAN;
    };
    let Ok(inv_cmc) = inverse_spd(&c.mat_mul(&inv_mwm).mat_mul(&c.transpose())) else {
        return f64::NAN;
    };
    let numerator = inv_cmc.quad_form(&c.mat_vec(lambda));

    let gamma_sum: f64 = (0..num_groups)
        .map(|g| {
            terms.inv_rnn_sums[g]
                * (1.0 - (w_terms[g] * terms.counts[g] as f64) / w_trace).powi(2)
        })
        .sum();
    let gamma = 1.0 + gamma_weight * gamma_sum;

    numerator / (gamma * hypothesis.rank() as f64)
}
