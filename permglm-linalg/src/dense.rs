#![allow(clippy::needless_range_loop)]
//! Dense matrix operations backed by faer.
//!
//! Wraps faer's column-major `Mat<f64>` with the handful of operations the
//! GLM engine leans on: products, transposes, row/column selection for
//! masking, and column-wise reductions over elements.

use faer::Mat;

/// A dense matrix wrapper around faer's `Mat<f64>`.
///
/// Measurement matrices are stored inputs x elements, design matrices
/// inputs x factors.
#[derive(Debug, Clone)]
pub struct DenseMatrix {
    inner: Mat<f64>,
}

impl DenseMatrix {
    /// Create a new dense matrix filled with zeros.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            inner: Mat::zeros(nrows, ncols),
        }
    }

    /// Create a new dense matrix filled with a constant value.
    pub fn full(nrows: usize, ncols: usize, value: f64) -> Self {
        Self {
            inner: Mat::from_fn(nrows, ncols, |_, _| value),
        }
    }

    /// Create a matrix whose entries are produced by `f(row, col)`.
    pub fn from_fn(nrows: usize, ncols: usize, f: impl FnMut(usize, usize) -> f64) -> Self {
        Self {
            inner: Mat::from_fn(nrows, ncols, f),
        }
    }

    /// Create a dense matrix from a 2D slice (row-major input).
    pub fn from_row_major(nrows: usize, ncols: usize, data: &[f64]) -> Self {
        assert_eq!(data.len(), nrows * ncols);
        Self::from_fn(nrows, ncols, |i, j| data[i * ncols + j])
    }

    /// Build a matrix from equal-length rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, |r| r.len());
        assert!(rows.iter().all(|r| r.len() == ncols), "ragged rows");
        Self::from_fn(nrows, ncols, |i, j| rows[i][j])
    }

    /// Create an identity matrix of size n x n.
    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.0 })
    }

    /// Create a column vector from a slice.
    pub fn from_vec(data: &[f64]) -> Self {
        Self::from_fn(data.len(), 1, |i, _| data[i])
    }

    /// Create a diagonal matrix from a vector.
    pub fn from_diag(diag: &[f64]) -> Self {
        let n = diag.len();
        Self::from_fn(n, n, |i, j| if i == j { diag[i] } else { 0.0 })
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.inner.ncols()
    }

    /// Get element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.inner.read(row, col)
    }

    /// Set element at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.inner.write(row, col, value);
    }

    /// Get a reference to the underlying faer matrix.
    pub fn as_faer(&self) -> &Mat<f64> {
        &self.inner
    }

    /// Matrix-vector product: self * v -> result vector.
    pub fn mat_vec(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(self.ncols(), v.len());
        let n = self.nrows();
        let mut result = vec![0.0; n];
        for j in 0..self.ncols() {
            let vj = v[j];
            if vj == 0.0 {
                continue;
            }
            for i in 0..n {
                result[i] += self.inner.read(i, j) * vj;
            }
        }
        result
    }

    /// Transposed matrix-vector product: self' * v.
    pub fn t_mat_vec(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(self.nrows(), v.len());
        (0..self.ncols())
            .map(|j| (0..self.nrows()).map(|i| self.inner.read(i, j) * v[i]).sum())
            .collect()
    }

    /// Matrix-matrix product: self * other.
    pub fn mat_mul(&self, other: &DenseMatrix) -> DenseMatrix {
        assert_eq!(self.ncols(), other.nrows());
        DenseMatrix {
            inner: &self.inner * &other.inner,
        }
    }

    /// Gram-style product: self' * other, without materialising the transpose.
    pub fn t_mat_mul(&self, other: &DenseMatrix) -> DenseMatrix {
        assert_eq!(self.nrows(), other.nrows());
        DenseMatrix {
            inner: self.inner.as_ref().transpose() * other.inner.as_ref(),
        }
    }

    /// Transpose.
    pub fn transpose(&self) -> DenseMatrix {
        DenseMatrix {
            inner: self.inner.transpose().to_owned(),
        }
    }

    /// Extract column as a Vec<f64>.
    pub fn col(&self, j: usize) -> Vec<f64> {
        (0..self.nrows()).map(|i| self.inner.read(i, j)).collect()
    }

    /// Extract row as a Vec<f64>.
    pub fn row(&self, i: usize) -> Vec<f64> {
        (0..self.ncols()).map(|j| self.inner.read(i, j)).collect()
    }

    /// Set an entire column from a slice.
    pub fn set_col(&mut self, j: usize, data: &[f64]) {
        assert_eq!(data.len(), self.nrows());
        for i in 0..self.nrows() {
            self.inner.write(i, j, data[i]);
        }
    }

    /// Set an entire row from a slice.
    pub fn set_row(&mut self, i: usize, data: &[f64]) {
        assert_eq!(data.len(), self.ncols());
        for j in 0..self.ncols() {
            self.inner.write(i, j, data[j]);
        }
    }

    /// Keep only the listed rows, in the order given.
    pub fn select_rows(&self, rows: &[usize]) -> DenseMatrix {
        Self::from_fn(rows.len(), self.ncols(), |i, j| self.inner.read(rows[i], j))
    }

    /// Keep only the listed columns, in the order given.
    pub fn select_cols(&self, cols: &[usize]) -> DenseMatrix {
        Self::from_fn(self.nrows(), cols.len(), |i, j| self.inner.read(i, cols[j]))
    }

    /// Horizontal concatenation `[self | other]`.
    pub fn hstack(&self, other: &DenseMatrix) -> DenseMatrix {
        assert_eq!(self.nrows(), other.nrows());
        let left = self.ncols();
        Self::from_fn(self.nrows(), left + other.ncols(), |i, j| {
            if j < left {
                self.inner.read(i, j)
            } else {
                other.inner.read(i, j - left)
            }
        })
    }

    /// Element-wise subtraction: self - other.
    pub fn sub(&self, other: &DenseMatrix) -> DenseMatrix {
        assert_eq!(self.nrows(), other.nrows());
        assert_eq!(self.ncols(), other.ncols());
        Self::from_fn(self.nrows(), self.ncols(), |i, j| {
            self.inner.read(i, j) - other.inner.read(i, j)
        })
    }

    /// Scalar multiplication.
    pub fn scale(&self, s: f64) -> DenseMatrix {
        Self::from_fn(self.nrows(), self.ncols(), |i, j| self.inner.read(i, j) * s)
    }

    /// `I - self`, for square `self`; turns a hat matrix into a residual-forming one.
    pub fn identity_minus(&self) -> DenseMatrix {
        assert_eq!(self.nrows(), self.ncols());
        Self::from_fn(self.nrows(), self.ncols(), |i, j| {
            let id = if i == j { 1.0 } else { 0.0 };
            id - self.inner.read(i, j)
        })
    }

    /// Diagonal of a square matrix.
    pub fn diag(&self) -> Vec<f64> {
        let n = self.nrows().min(self.ncols());
        (0..n).map(|i| self.inner.read(i, i)).collect()
    }

    /// Squared Euclidean norm of every column.
    pub fn col_squared_norms(&self) -> Vec<f64> {
        (0..self.ncols())
            .map(|j| {
                (0..self.nrows())
                    .map(|i| {
                        let v = self.inner.read(i, j);
                        v * v
                    })
                    .sum()
            })
            .collect()
    }

    /// Frobenius norm.
    pub fn frobenius_norm(&self) -> f64 {
        self.col_squared_norms().iter().sum::<f64>().sqrt()
    }

    /// True when every entry is finite.
    pub fn is_all_finite(&self) -> bool {
        (0..self.ncols()).all(|j| (0..self.nrows()).all(|i| self.inner.read(i, j).is_finite()))
    }

    /// True when every entry is exactly zero.
    pub fn is_zero(&self) -> bool {
        (0..self.ncols()).all(|j| (0..self.nrows()).all(|i| self.inner.read(i, j) == 0.0))
    }

    /// True when every entry of the given row is finite.
    pub fn row_is_finite(&self, i: usize) -> bool {
        (0..self.ncols()).all(|j| self.inner.read(i, j).is_finite())
    }

    /// Dot product of two vectors.
    pub fn dot(a: &[f64], b: &[f64]) -> f64 {
        assert_eq!(a.len(), b.len());
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    /// Quadratic form v' * self * v.
    pub fn quad_form(&self, v: &[f64]) -> f64 {
        assert_eq!(self.nrows(), self.ncols());
        Self::dot(v, &self.mat_vec(v))
    }

    /// Compute X' * diag(w) * X for design matrix X and weight vector w.
    /// Returns a p x p matrix where p = X.ncols().
    pub fn xtwx(&self, w: &[f64]) -> DenseMatrix {
        let n = self.nrows();
        let p = self.ncols();
        assert_eq!(w.len(), n);
        let mut result = DenseMatrix::zeros(p, p);
        for j in 0..p {
            for k in j..p {
                let mut s = 0.0;
                for i in 0..n {
                    s += self.inner.read(i, j) * w[i] * self.inner.read(i, k);
                }
                result.set(j, k, s);
                if j != k {
                    result.set(k, j, s);
                }
            }
        }
        result
    }
}

impl std::fmt::Display for DenseMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.nrows() {
            for j in 0..self.ncols() {
                if j > 0 {
                    write!(f, "\t")?;
                }
                write!(f, "{}", self.inner.read(i, j))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
