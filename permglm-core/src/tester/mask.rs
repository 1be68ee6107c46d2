//! Per-element masking of non-finite inputs.
//!
//! When an input has a non-finite measurement or imported covariate at an
//! element, that input is dropped from the element's fit: from the design,
//! from the data, and from the shuffling matrix. The shuffling matrix is
//! reduced in two steps: first every row that draws from an excluded input
//! is removed, then the excluded inputs' columns. For a permutation or
//! sign-flip matrix this leaves a valid operator over the retained inputs.

use std::borrow::Cow;

use permglm_linalg::DenseMatrix;

use crate::error::{GlmError, Result};

/// Reusable per-worker storage for one element at a time.
pub(crate) struct ElementScratch {
    /// Imported columns for the current element, inputs x importers.
    pub extra: DenseMatrix,
    /// Retained inputs of the current element.
    pub mask: Vec<bool>,
}

impl ElementScratch {
    pub fn new(num_inputs: usize, num_importers: usize) -> Self {
        Self {
            extra: DenseMatrix::zeros(num_inputs, num_importers),
            mask: vec![true; num_inputs],
        }
    }
}

/// One element's data restricted to its retained inputs.
pub(crate) struct MaskedElement<'s> {
    pub design: DenseMatrix,
    pub shuffling: Cow<'s, DenseMatrix>,
    pub data: Vec<f64>,
    /// Original indices of the retained inputs.
    pub retained: Vec<usize>,
}

/// Mark inputs whose measurement and imported columns are all finite.
///
/// Each check is skipped when the caller has declared that source complete.
pub(crate) fn fill_mask(
    mask: &mut [bool],
    data: &[f64],
    extra: &DenseMatrix,
    check_data: bool,
    check_columns: bool,
) -> usize {
    for (row, keep) in mask.iter_mut().enumerate() {
        *keep = (!check_data || data[row].is_finite())
            && (!check_columns || extra.row_is_finite(row));
    }
    mask.iter().filter(|&&keep| keep).count()
}

/// Restrict design, shuffling matrix and data to the retained inputs.
pub(crate) fn apply_mask<'s>(
    element: usize,
    mask: &[bool],
    data: &[f64],
    shuffling: &'s DenseMatrix,
    fixed_design: &DenseMatrix,
    extra: &DenseMatrix,
) -> Result<MaskedElement<'s>> {
    let retained: Vec<usize> = (0..mask.len()).filter(|&i| mask[i]).collect();
    let full_design = fixed_design.hstack(extra);

    if retained.len() == mask.len() {
        return Ok(MaskedElement {
            design: full_design,
            shuffling: Cow::Borrowed(shuffling),
            data: data.to_vec(),
            retained,
        });
    }

    Ok(MaskedElement {
        design: full_design.select_rows(&retained),
        shuffling: Cow::Owned(compact_shuffling(element, mask, shuffling, retained.len())?),
        data: retained.iter().map(|&i| data[i]).collect(),
        retained,
    })
}

fn compact_shuffling(
    element: usize,
    mask: &[bool],
    shuffling: &DenseMatrix,
    finite_count: usize,
) -> Result<DenseMatrix> {
    let excluded: Vec<usize> = (0..mask.len()).filter(|&i| !mask[i]).collect();
    let rows: Vec<usize> = (0..shuffling.nrows())
        .filter(|&row| excluded.iter().all(|&col| shuffling.get(row, col) == 0.0))
        .collect();
    if rows.len() != finite_count {
        return Err(GlmError::InvalidShuffle { element });
    }
    let cols: Vec<usize> = (0..mask.len()).filter(|&i| mask[i]).collect();
    Ok(shuffling.select_rows(&rows).select_cols(&cols))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permutation(perm: &[usize]) -> DenseMatrix {
        let n = perm.len();
        DenseMatrix::from_fn(n, n, |i, j| if perm[i] == j { 1.0 } else { 0.0 })
    }

    #[test]
    fn test_fill_mask() {
        let data = [1.0, f64::NAN, 2.0, 3.0];
        let extra = DenseMatrix::from_row_major(4, 1, &[0.0, 1.0, f64::INFINITY, 2.0]);
        let mut mask = vec![true; 4];
        assert_eq!(fill_mask(&mut mask, &data, &extra, true, true), 2);
        assert_eq!(mask, vec![true, false, false, true]);
        assert_eq!(fill_mask(&mut mask, &data, &extra, false, true), 3);
        assert_eq!(fill_mask(&mut mask, &data, &extra, false, false), 4);
    }

    #[test]
    fn test_compacted_permutation_stays_permutation() {
        // input 0 <- 2, 1 <- 0, 2 <- 1, 3 <- 3
        let s = permutation(&[2, 0, 1, 3]);
        let mask = [true, false, true, true];
        let fixed = DenseMatrix::full(4, 1, 1.0);
        let extra = DenseMatrix::zeros(4, 0);
        let data = [10.0, 11.0, 12.0, 13.0];
        let masked = apply_mask(0, &mask, &data, &s, &fixed, &extra).unwrap();
        assert_eq!(masked.retained, vec![0, 2, 3]);
        assert_eq!(masked.data, vec![10.0, 12.0, 13.0]);
        assert_eq!(masked.design.nrows(), 3);
        let sm = masked.shuffling.as_ref();
        assert_eq!(sm.nrows(), 3);
        assert_eq!(sm.ncols(), 3);
        for i in 0..3 {
            assert_eq!(sm.row(i).iter().sum::<f64>(), 1.0);
        }
        for j in 0..3 {
            assert_eq!(sm.col(j).iter().sum::<f64>(), 1.0);
        }
    }

    #[test]
    fn test_unmasked_shuffle_is_borrowed() {
        let s = DenseMatrix::identity(3);
        let mask = [true; 3];
        let masked = apply_mask(
            0,
            &mask,
            &[1.0, 2.0, 3.0],
            &s,
            &DenseMatrix::full(3, 1, 1.0),
            &DenseMatrix::zeros(3, 0),
        )
        .unwrap();
        assert!(matches!(masked.shuffling, Cow::Borrowed(_)));
    }

    #[test]
    fn test_dense_shuffle_rejected() {
        let s = DenseMatrix::full(3, 3, 1.0 / 3.0);
        let mask = [true, false, true];
        let result = apply_mask(
            5,
            &mask,
            &[1.0, 2.0, 3.0],
            &s,
            &DenseMatrix::full(3, 1, 1.0),
            &DenseMatrix::zeros(3, 0),
        );
        assert!(matches!(result, Err(GlmError::InvalidShuffle { element: 5 })));
    }
}
