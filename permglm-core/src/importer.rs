//! Element-wise design matrix columns.
//!
//! An importer supplies one extra design column per element, e.g. a
//! per-subject measurement at the same spatial location as the data. It is
//! called from many worker threads at once, each with a different element.

/// Source of one element-dependent design matrix column.
pub trait ColumnImporter: Send + Sync {
    /// Values of this column for every input, at the given element.
    /// Missing values are NaN.
    fn import(&self, element: usize) -> Vec<f64>;

    /// Whether every value across every element is known to be finite.
    /// When false, the testers check each element for non-finite entries.
    fn all_finite(&self) -> bool {
        false
    }
}

impl<F> ColumnImporter for F
where
    F: Fn(usize) -> Vec<f64> + Send + Sync,
{
    fn import(&self, element: usize) -> Vec<f64> {
        self(element)
    }
}

/// An importer backed by an in-memory inputs x elements matrix.
#[derive(Debug, Clone)]
pub struct MatrixImporter {
    data: permglm_linalg::DenseMatrix,
    finite: bool,
}

impl MatrixImporter {
    pub fn new(data: permglm_linalg::DenseMatrix) -> Self {
        let finite = data.is_all_finite();
        Self { data, finite }
    }
}

impl ColumnImporter for MatrixImporter {
    fn import(&self, element: usize) -> Vec<f64> {
        self.data.col(element)
    }

    fn all_finite(&self) -> bool {
        self.finite
    }
}
