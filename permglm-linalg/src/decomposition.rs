#![allow(clippy::needless_range_loop)]
//! Matrix decompositions and the derived quantities the GLM needs.
//!
//! Pseudo-inverse, rank, null space and condition number are all read off
//! the singular value decomposition of the matrix itself (faer), never off a
//! Gram matrix, so poorly scaled designs keep their full precision.

use crate::dense::DenseMatrix;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinalgError {
    #[error("Matrix is not positive definite")]
    NotPositiveDefinite,

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Result of a Cholesky decomposition.
pub struct CholeskyDecomp {
    /// Lower triangular factor L such that A = L * L'.
    pub l: DenseMatrix,
}

impl CholeskyDecomp {
    /// Compute the Cholesky decomposition of a symmetric positive definite matrix.
    pub fn new(a: &DenseMatrix) -> Result<Self, LinalgError> {
        let n = a.nrows();
        if n != a.ncols() {
            return Err(LinalgError::DimensionMismatch {
                expected: n,
                got: a.ncols(),
            });
        }
        let mut l = DenseMatrix::zeros(n, n);

        for j in 0..n {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l.get(j, k) * l.get(j, k);
            }
            let diag = a.get(j, j) - sum;
            // Negated comparison so that NaN diagonals are rejected too
            if !(diag > 0.0) {
                return Err(LinalgError::NotPositiveDefinite);
            }
            l.set(j, j, diag.sqrt());

            for i in (j + 1)..n {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += l.get(i, k) * l.get(j, k);
                }
                l.set(i, j, (a.get(i, j) - sum) / l.get(j, j));
            }
        }

        Ok(CholeskyDecomp { l })
    }

    /// Solve L * L' * x = b.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.l.nrows();
        assert_eq!(b.len(), n);

        // Forward substitution: L * y = b
        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut sum = 0.0;
            for j in 0..i {
                sum += self.l.get(i, j) * y[j];
            }
            y[i] = (b[i] - sum) / self.l.get(i, i);
        }

        // Backward substitution: L' * x = y
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut sum = 0.0;
            for j in (i + 1)..n {
                sum += self.l.get(j, i) * x[j];
            }
            x[i] = (y[i] - sum) / self.l.get(i, i);
        }

        x
    }

    /// Compute the inverse of the original matrix A^{-1} = (L L')^{-1}.
    pub fn inverse(&self) -> DenseMatrix {
        let n = self.l.nrows();
        let mut inv = DenseMatrix::zeros(n, n);
        let mut e = vec![0.0; n];
        for j in 0..n {
            e.iter_mut().for_each(|v| *v = 0.0);
            e[j] = 1.0;
            inv.set_col(j, &self.solve(&e));
        }
        inv
    }
}

/// Compute the inverse of a symmetric positive definite matrix.
pub fn inverse_spd(a: &DenseMatrix) -> Result<DenseMatrix, LinalgError> {
    Ok(CholeskyDecomp::new(a)?.inverse())
}

/// Thin singular value decomposition, A = U diag(s) V'.
struct Svd {
    u: DenseMatrix,
    s: Vec<f64>,
    v: DenseMatrix,
}

impl Svd {
    fn new(a: &DenseMatrix) -> Self {
        let svd = a.as_faer().thin_svd();
        let (u, s, v) = (svd.u(), svd.s_diagonal(), svd.v());
        Self {
            u: DenseMatrix::from_fn(u.nrows(), u.ncols(), |i, j| u.read(i, j)),
            s: (0..s.nrows()).map(|k| s.read(k)).collect(),
            v: DenseMatrix::from_fn(v.nrows(), v.ncols(), |i, j| v.read(i, j)),
        }
    }

    fn max_singular_value(&self) -> f64 {
        self.s.iter().copied().fold(0.0, f64::max)
    }
}

/// Singular values at or below this are treated as zero: eps * max(m, n) * s_max.
fn singular_value_tolerance(a: &DenseMatrix, max_singular_value: f64) -> f64 {
    f64::EPSILON * a.nrows().max(a.ncols()) as f64 * max_singular_value
}

/// Moore-Penrose pseudo-inverse of an arbitrary m x n matrix, V diag(1/s) U'
/// over the singular values above tolerance.
///
/// Non-finite input gives an all-NaN result.
pub fn pinv(a: &DenseMatrix) -> DenseMatrix {
    let (m, n) = (a.nrows(), a.ncols());
    if m == 0 || n == 0 {
        return DenseMatrix::zeros(n, m);
    }
    if !a.is_all_finite() {
        return DenseMatrix::full(n, m, f64::NAN);
    }
    let svd = Svd::new(a);
    let tol = singular_value_tolerance(a, svd.max_singular_value());
    let mut out = DenseMatrix::zeros(n, m);
    for (k, &s) in svd.s.iter().enumerate() {
        if s <= tol {
            continue;
        }
        for j in 0..m {
            let ujk = svd.u.get(j, k) / s;
            if ujk == 0.0 {
                continue;
            }
            for i in 0..n {
                out.set(i, j, out.get(i, j) + svd.v.get(i, k) * ujk);
            }
        }
    }
    out
}

/// Numerical rank: the number of singular values above tolerance.
pub fn rank(a: &DenseMatrix) -> usize {
    if a.nrows() == 0 || a.ncols() == 0 || !a.is_all_finite() {
        return 0;
    }
    let svd = Svd::new(a);
    let tol = singular_value_tolerance(a, svd.max_singular_value());
    svd.s.iter().filter(|&&s| s > tol).count()
}

/// Orthonormal basis of the null space of `a`, one basis vector per column.
///
/// The result has `a.ncols()` rows and `a.ncols() - rank(a)` columns.
pub fn kernel(a: &DenseMatrix) -> DenseMatrix {
    let n = a.ncols();
    if n == 0 {
        return DenseMatrix::zeros(0, 0);
    }
    if a.nrows() == 0 {
        return DenseMatrix::identity(n);
    }
    // Full V: right singular vectors beyond min(m, n) span part of the kernel
    let svd = a.as_faer().svd();
    let (s, v) = (svd.s_diagonal(), svd.v());
    let s: Vec<f64> = (0..s.nrows()).map(|k| s.read(k)).collect();
    let tol = singular_value_tolerance(a, s.iter().copied().fold(0.0, f64::max));
    let null_cols: Vec<usize> = (0..n).filter(|&k| s.get(k).map_or(true, |&sk| sk <= tol)).collect();
    DenseMatrix::from_fn(n, null_cols.len(), |i, j| v.read(i, null_cols[j]))
}

/// Indices of a maximal linearly independent subset of the rows of `a`,
/// scanning rows in order and keeping each one that is not in the span of
/// those already kept.
pub fn independent_rows(a: &DenseMatrix) -> Vec<usize> {
    let scale = (0..a.nrows())
        .map(|i| DenseMatrix::dot(&a.row(i), &a.row(i)).sqrt())
        .fold(0.0, f64::max);
    if scale == 0.0 {
        return Vec::new();
    }
    let tol = scale * 1e-10;

    let mut basis: Vec<Vec<f64>> = Vec::new();
    let mut kept = Vec::new();
    for i in 0..a.nrows() {
        let mut v = a.row(i);
        for q in &basis {
            let proj = DenseMatrix::dot(q, &v);
            for (vk, qk) in v.iter_mut().zip(q.iter()) {
                *vk -= proj * qk;
            }
        }
        let norm = DenseMatrix::dot(&v, &v).sqrt();
        if norm > tol {
            v.iter_mut().for_each(|x| *x /= norm);
            basis.push(v);
            kept.push(i);
        }
    }
    kept
}

/// Ratio of the largest to the smallest singular value.
///
/// Infinite (or NaN, for non-finite input) when the matrix is singular.
pub fn condition_number(a: &DenseMatrix) -> f64 {
    if a.nrows() == 0 || a.ncols() == 0 {
        return f64::INFINITY;
    }
    if !a.is_all_finite() {
        return f64::NAN;
    }
    let svd = Svd::new(a);
    let max = svd.max_singular_value();
    let min = svd.s.iter().copied().fold(f64::INFINITY, f64::min);
    if max == 0.0 || min <= 0.0 {
        return f64::INFINITY;
    }
    max / min
}
