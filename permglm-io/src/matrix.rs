//! Plain-text numeric matrix files.
//!
//! One matrix row per line, values separated by whitespace and/or commas.
//! Everything after `#` is a comment and blank lines are skipped. Missing
//! values (`NA`, `nan`, ...) are read as NaN.

use std::path::Path;

use anyhow::{bail, Context, Result};

use permglm_linalg::DenseMatrix;

/// Parse matrix text; rows must all have the same number of columns.
pub fn parse_matrix(contents: &str) -> Result<DenseMatrix> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (line_num, line) in contents.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let row = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty())
            .map(|field| {
                parse_value(field)
                    .with_context(|| format!("Invalid value '{}' on line {}", field, line_num + 1))
            })
            .collect::<Result<Vec<f64>>>()?;
        if let Some(first) = rows.first() {
            if row.len() != first.len() {
                bail!(
                    "Line {} has {} columns (expected {})",
                    line_num + 1,
                    row.len(),
                    first.len()
                );
            }
        }
        rows.push(row);
    }
    Ok(DenseMatrix::from_rows(&rows))
}

/// Parse a number, treating NA/missing as NaN.
fn parse_value(s: &str) -> Result<f64> {
    match s {
        "NA" | "na" | "Na" | "NaN" | "nan" | "NAN" => Ok(f64::NAN),
        _ => Ok(s.parse::<f64>()?),
    }
}

pub fn load_matrix(path: &Path) -> Result<DenseMatrix> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read matrix file: {}", path.display()))?;
    parse_matrix(&contents)
        .with_context(|| format!("Failed to parse matrix file: {}", path.display()))
}

/// Load a vector stored either as a single row or a single column.
pub fn load_vector(path: &Path) -> Result<Vec<f64>> {
    let m = load_matrix(path)?;
    if m.ncols() == 1 {
        Ok(m.col(0))
    } else if m.nrows() == 1 {
        Ok(m.row(0))
    } else if m.nrows() == 0 {
        Ok(Vec::new())
    } else {
        bail!(
            "File {} holds a {} x {} matrix where a vector was expected",
            path.display(),
            m.nrows(),
            m.ncols()
        )
    }
}

/// Load a vector of non-negative integer indices.
pub fn load_index_vector(path: &Path) -> Result<Vec<usize>> {
    load_vector(path)?
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
                Ok(v as usize)
            } else {
                bail!("Entry {} of {} is not a non-negative integer: {}", i + 1, path.display(), v)
            }
        })
        .collect()
}
