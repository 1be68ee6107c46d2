//! Hypotheses and the Freedman-Lane model partition.
//!
//! A hypothesis is a contrast matrix C over the design factors: one row for
//! a t-test, one or more rows for an F-test. Partitioning a design M against
//! C splits it into regressors of interest X and nuisance regressors Z with
//! `[X | Z]` spanning the column space of M (the same partitioning used by
//! FSL randomise):
//!
//!   D      = pinv(M'M)
//!   Cu     = null(C)
//!   Cv     = Cu - C' pinv(C D C') C D Cu
//!   X      = M D C' pinv(C D C')
//!   Z      = M D Cv pinv(Cv' D Cv)
//!
//! D is formed as pinv(M) pinv(M)' and M D as pinv(M)', so the condition
//! number of M is never squared.

use serde::Serialize;
use tracing::{debug, warn};

use permglm_linalg::{independent_rows, kernel, pinv, rank, DenseMatrix};

use crate::error::{GlmError, Result};

/// Whether a hypothesis is reported as a signed t-like or unsigned F-like value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HypothesisKind {
    T,
    F,
}

/// One testable linear combination of model parameters.
#[derive(Debug, Clone)]
pub struct Hypothesis {
    c: DenseMatrix,
    rank: usize,
    kind: HypothesisKind,
    index: usize,
}

impl Hypothesis {
    /// A t-test from a single contrast row.
    pub fn t_test(row: &[f64], index: usize) -> Result<Self> {
        Self::new(DenseMatrix::from_row_major(1, row.len(), row), HypothesisKind::T, index)
    }

    /// An F-test over every row of `matrix`.
    ///
    /// Rank-deficient matrices are replaced by a maximal linearly independent
    /// subset of their rows, which spans the same row space.
    pub fn f_test(matrix: DenseMatrix, index: usize) -> Result<Self> {
        Self::new(matrix, HypothesisKind::F, index)
    }

    fn new(c: DenseMatrix, kind: HypothesisKind, index: usize) -> Result<Self> {
        let name = display_name(kind, index);
        if c.nrows() == 0 || c.is_zero() {
            return Err(GlmError::ZeroContrast { name });
        }
        let rows = independent_rows(&c);
        let c = if rows.len() == c.nrows() {
            c
        } else {
            warn!(
                "{} is rank-deficient; row-space matrix decomposition will instead be used",
                name
            );
            debug!("Original matrix:\n{}", c);
            let reduced = c.select_rows(&rows);
            debug!("Decomposed matrix:\n{}", reduced);
            reduced
        };
        Ok(Self {
            rank: c.nrows(),
            c,
            kind,
            index,
        })
    }

    /// The (full row rank) contrast matrix.
    pub fn matrix(&self) -> &DenseMatrix {
        &self.c
    }

    /// Rank of the contrast, equal to its number of rows.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of design factors the contrast spans.
    pub fn cols(&self) -> usize {
        self.c.ncols()
    }

    pub fn kind(&self) -> HypothesisKind {
        self.kind
    }

    pub fn is_f(&self) -> bool {
        self.kind == HypothesisKind::F
    }

    /// Position of this hypothesis among those of its kind.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Display name, e.g. `t1` or `F2`.
    pub fn name(&self) -> String {
        display_name(self.kind, self.index)
    }

    /// Partition `design` into effect-of-interest and nuisance regressors.
    pub fn partition(&self, design: &DenseMatrix) -> Partition {
        let c = &self.c;
        let ct = c.transpose();
        let pinv_m = pinv(design);
        let design_d = pinv_m.transpose();
        let d = pinv_m.mat_mul(&design_d);
        let cu = kernel(c);
        let inv_cdc = pinv(&c.mat_mul(&d).mat_mul(&ct));
        let cv = cu.sub(&ct.mat_mul(&inv_cdc).mat_mul(c).mat_mul(&d).mat_mul(&cu));
        let x = design_d.mat_mul(&ct).mat_mul(&inv_cdc);
        let z = design_d
            .mat_mul(&cv)
            .mat_mul(&pinv(&cv.t_mat_mul(&d.mat_mul(&cv))));
        Partition::new(x, z)
    }
}

fn display_name(kind: HypothesisKind, index: usize) -> String {
    match kind {
        HypothesisKind::T => format!("t{}", index + 1),
        HypothesisKind::F => format!("F{}", index + 1),
    }
}

/// Decomposition of a design matrix for one hypothesis.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Effect-of-interest regressors.
    pub x: DenseMatrix,
    /// Nuisance regressors.
    pub z: DenseMatrix,
    /// Residual-forming matrix of the nuisance regressors, I - Z pinv(Z).
    pub rz: DenseMatrix,
    pub rank_x: usize,
    pub rank_z: usize,
}

impl Partition {
    fn new(x: DenseMatrix, z: DenseMatrix) -> Self {
        let n = x.nrows();
        let rz = if z.ncols() == 0 {
            DenseMatrix::identity(n)
        } else {
            z.mat_mul(&pinv(&z)).identity_minus()
        };
        Self {
            rank_x: rank(&x),
            rank_z: rank(&z),
            x,
            z,
            rz,
        }
    }
}

/// Build the hypothesis set from a contrast matrix and optional F-test selection.
///
/// Every contrast row becomes a t-test. Each row of `ftests` holds one 0/1
/// flag per contrast row and defines an F-test over the flagged rows. With
/// `f_only`, the t-tests are validated but dropped from the result.
pub fn hypotheses_from_matrices(
    contrast: &DenseMatrix,
    ftests: Option<&DenseMatrix>,
    f_only: bool,
) -> Result<Vec<Hypothesis>> {
    let mut hypotheses = (0..contrast.nrows())
        .map(|row| Hypothesis::t_test(&contrast.row(row), row))
        .collect::<Result<Vec<_>>>()?;

    match ftests {
        Some(ftests) => {
            if ftests.ncols() != contrast.nrows() {
                return Err(GlmError::FTestColumns {
                    expected: contrast.nrows(),
                    got: ftests.ncols(),
                });
            }
            let binary = (0..ftests.nrows())
                .all(|i| ftests.row(i).iter().all(|&v| v == 0.0 || v == 1.0));
            if !binary {
                return Err(GlmError::FTestEntries);
            }
            let mut f_hypotheses = Vec::with_capacity(ftests.nrows());
            for ftest_index in 0..ftests.nrows() {
                let selected: Vec<usize> = ftests
                    .row(ftest_index)
                    .iter()
                    .enumerate()
                    .filter(|(_, &v)| v == 1.0)
                    .map(|(i, _)| i)
                    .collect();
                if selected.is_empty() {
                    return Err(GlmError::EmptyFTest {
                        row: ftest_index + 1,
                    });
                }
                f_hypotheses.push(Hypothesis::f_test(
                    contrast.select_rows(&selected),
                    ftest_index,
                )?);
            }
            if f_only {
                hypotheses = f_hypotheses;
            } else {
                hypotheses.extend(f_hypotheses);
            }
        }
        None if f_only => return Err(GlmError::NoFTests),
        None => {}
    }

    if hypotheses.is_empty() {
        return Err(GlmError::NoHypotheses);
    }
    Ok(hypotheses)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn design() -> DenseMatrix {
        // intercept, group indicator, continuous covariate
        DenseMatrix::from_row_major(
            6,
            3,
            &[
                1.0, 0.0, 0.3, 1.0, 0.0, -1.2, 1.0, 0.0, 0.8, 1.0, 1.0, 0.1, 1.0, 1.0, 2.0, 1.0,
                1.0, -0.4,
            ],
        )
    }

    #[test]
    fn test_zero_contrast_rejected() {
        let err = Hypothesis::t_test(&[0.0, 0.0, 0.0], 0).unwrap_err();
        assert_eq!(err, GlmError::ZeroContrast { name: "t1".into() });
    }

    #[test]
    fn test_rank_deficient_f_test_reduced() {
        let c = DenseMatrix::from_row_major(3, 3, &[0.0, 1.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0]);
        let h = Hypothesis::f_test(c, 0).unwrap();
        assert_eq!(h.rank(), 2);
        assert_eq!(h.matrix().row(0), vec![0.0, 1.0, 0.0]);
        assert_eq!(h.matrix().row(1), vec![0.0, 0.0, 1.0]);
        assert!(h.is_f());
        assert_eq!(h.name(), "F1");
    }

    #[test]
    fn test_collapsed_f_test_stays_f() {
        let c = DenseMatrix::from_row_major(2, 2, &[0.0, 1.0, 0.0, 3.0]);
        let h = Hypothesis::f_test(c, 1).unwrap();
        assert_eq!(h.rank(), 1);
        assert_eq!(h.kind(), HypothesisKind::F);
    }

    #[test]
    fn test_partition_ranks() {
        let m = design();
        let h = Hypothesis::t_test(&[0.0, 1.0, 0.0], 0).unwrap();
        let p = h.partition(&m);
        assert_eq!(p.x.ncols(), 1);
        assert_eq!(p.z.ncols(), 2);
        assert_eq!(p.rank_x, 1);
        assert_eq!(p.rank_z, 2);
        assert_eq!(rank(&p.x.hstack(&p.z)), 3);
    }

    #[test]
    fn test_partition_full_contrast_has_no_nuisance() {
        let m = design();
        let h = Hypothesis::f_test(DenseMatrix::identity(3), 0).unwrap();
        let p = h.partition(&m);
        assert_eq!(p.z.ncols(), 0);
        assert_eq!(p.rank_z, 0);
        assert_eq!(p.rank_x, 3);
        let id = DenseMatrix::identity(6);
        for i in 0..6 {
            for j in 0..6 {
                assert_eq!(p.rz.get(i, j), id.get(i, j));
            }
        }
    }

    #[test]
    fn test_rz_annihilates_nuisance() {
        let m = design();
        let h = Hypothesis::t_test(&[0.0, 0.0, 1.0], 0).unwrap();
        let p = h.partition(&m);
        let rzz = p.rz.mat_mul(&p.z);
        assert!(rzz.frobenius_norm() < 1e-10);
    }

    #[test]
    fn test_hypotheses_from_matrices() {
        let contrast = DenseMatrix::from_row_major(2, 3, &[0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let ftests = DenseMatrix::from_row_major(1, 2, &[1.0, 1.0]);
        let all = hypotheses_from_matrices(&contrast, Some(&ftests), false).unwrap();
        let names: Vec<String> = all.iter().map(|h| h.name()).collect();
        assert_eq!(names, vec!["t1", "t2", "F1"]);
        assert_eq!(all[2].rank(), 2);

        let f_only = hypotheses_from_matrices(&contrast, Some(&ftests), true).unwrap();
        assert_eq!(f_only.len(), 1);
        assert!(f_only[0].is_f());
    }

    #[test]
    fn test_ftest_validation() {
        let contrast = DenseMatrix::from_row_major(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let wrong_cols = DenseMatrix::from_row_major(1, 3, &[1.0, 0.0, 1.0]);
        assert_eq!(
            hypotheses_from_matrices(&contrast, Some(&wrong_cols), false).unwrap_err(),
            GlmError::FTestColumns {
                expected: 2,
                got: 3
            }
        );
        let non_binary = DenseMatrix::from_row_major(1, 2, &[1.0, 0.5]);
        assert_eq!(
            hypotheses_from_matrices(&contrast, Some(&non_binary), false).unwrap_err(),
            GlmError::FTestEntries
        );
        let empty_row = DenseMatrix::from_row_major(2, 2, &[1.0, 1.0, 0.0, 0.0]);
        assert_eq!(
            hypotheses_from_matrices(&contrast, Some(&empty_row), false).unwrap_err(),
            GlmError::EmptyFTest { row: 2 }
        );
        assert_eq!(
            hypotheses_from_matrices(&contrast, None, true).unwrap_err(),
            GlmError::NoFTests
        );
    }

    #[test]
    fn test_zero_row_in_contrast_matrix_fails() {
        let contrast = DenseMatrix::from_row_major(2, 2, &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(
            hypotheses_from_matrices(&contrast, None, false).unwrap_err(),
            GlmError::ZeroContrast { name: "t2".into() }
        );
    }
}
