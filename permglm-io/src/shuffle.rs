//! Externally generated permutation and sign-flip schemes.
//!
//! A permutation file holds one shuffle per line: a permutation of the
//! input indices, numbered from 0 or from 1 consistently across the file.
//! A sign-flip file holds one shuffle per line of `+1`/`-1` values. When
//! both are given they are paired line by line.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use permglm_linalg::DenseMatrix;

use crate::matrix::load_matrix;

/// One shuffle: input `i` of the shuffled data takes the value of input
/// `permutation[i]`, multiplied by `signs[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Shuffle {
    pub permutation: Vec<usize>,
    pub signs: Vec<f64>,
}

impl Shuffle {
    pub fn identity(num_inputs: usize) -> Self {
        Self {
            permutation: (0..num_inputs).collect(),
            signs: vec![1.0; num_inputs],
        }
    }

    /// Shuffling matrix `diag(signs) * P`.
    pub fn matrix(&self) -> DenseMatrix {
        let n = self.permutation.len();
        DenseMatrix::from_fn(n, n, |i, j| {
            if self.permutation[i] == j {
                self.signs[i]
            } else {
                0.0
            }
        })
    }
}

fn load_permutations(path: &Path, num_inputs: usize) -> Result<Vec<Vec<usize>>> {
    let m = load_matrix(path)?;
    if m.nrows() > 0 && m.ncols() != num_inputs {
        bail!(
            "Permutation file {} has {} columns; expected one per input ({})",
            path.display(),
            m.ncols(),
            num_inputs
        );
    }
    let min = (0..m.nrows())
        .flat_map(|i| m.row(i))
        .fold(f64::INFINITY, f64::min);
    let offset = if min == 1.0 { 1 } else { 0 };

    (0..m.nrows())
        .map(|i| {
            let mut seen = vec![false; num_inputs];
            m.row(i)
                .into_iter()
                .map(|v| {
                    let index = v - offset as f64;
                    if !(index >= 0.0 && index < num_inputs as f64 && index.fract() == 0.0) {
                        bail!("Invalid input index {} on line {}", v, i + 1);
                    }
                    let index = index as usize;
                    if std::mem::replace(&mut seen[index], true) {
                        bail!("Line {} is not a permutation: index {} repeats", i + 1, v);
                    }
                    Ok(index)
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Invalid permutation file: {}", path.display()))
}

fn load_signflips(path: &Path, num_inputs: usize) -> Result<Vec<Vec<f64>>> {
    let m = load_matrix(path)?;
    if m.nrows() > 0 && m.ncols() != num_inputs {
        bail!(
            "Sign-flip file {} has {} columns; expected one per input ({})",
            path.display(),
            m.ncols(),
            num_inputs
        );
    }
    let rows: Vec<Vec<f64>> = (0..m.nrows()).map(|i| m.row(i)).collect();
    if let Some(line) = rows
        .iter()
        .position(|row| row.iter().any(|&v| v != 1.0 && v != -1.0))
    {
        bail!(
            "Sign-flip file {} line {} contains values other than +1 and -1",
            path.display(),
            line + 1
        );
    }
    Ok(rows)
}

/// Load shuffles from a permutation file, a sign-flip file, or both.
pub fn load_shuffles(
    permutations: Option<&Path>,
    signflips: Option<&Path>,
    num_inputs: usize,
) -> Result<Vec<Shuffle>> {
    let perms = permutations
        .map(|p| load_permutations(p, num_inputs))
        .transpose()?;
    let signs = signflips
        .map(|p| load_signflips(p, num_inputs))
        .transpose()?;

    let shuffles: Vec<Shuffle> = match (perms, signs) {
        (None, None) => Vec::new(),
        (Some(perms), None) => perms
            .into_iter()
            .map(|permutation| Shuffle {
                permutation,
                signs: vec![1.0; num_inputs],
            })
            .collect(),
        (None, Some(signs)) => signs
            .into_iter()
            .map(|signs| Shuffle {
                permutation: (0..num_inputs).collect(),
                signs,
            })
            .collect(),
        (Some(perms), Some(signs)) => {
            if perms.len() != signs.len() {
                bail!(
                    "Permutation file has {} shuffles but sign-flip file has {}",
                    perms.len(),
                    signs.len()
                );
            }
            perms
                .into_iter()
                .zip(signs)
                .map(|(permutation, signs)| Shuffle { permutation, signs })
                .collect()
        }
    };
    if !shuffles.is_empty() {
        info!("Loaded {} shuffles over {} inputs", shuffles.len(), num_inputs);
    }
    Ok(shuffles)
}
