//! Subcommands and the model inputs they share.

pub mod check_design;
pub mod stats;
pub mod test;

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::info;

use permglm_core::{check_design, ColumnImporter, DesignDiagnostic, Hypothesis, HypothesisKind};
use permglm_io::{load_hypotheses, load_matrix, MappedCohortImporter};
use permglm_linalg::DenseMatrix;

/// Measurements, design and hypotheses common to `stats` and `test`.
#[derive(Args)]
pub struct ModelArgs {
    /// Measurement matrix: one row per input, one column per element
    #[arg(long)]
    data: PathBuf,

    /// Design matrix: one row per input, one column per factor
    #[arg(long)]
    design: PathBuf,

    /// Contrast matrix: one row per t-test
    #[arg(long)]
    contrast: PathBuf,

    /// F-test matrix: one row of 0/1 flags over the contrast rows per F-test
    #[arg(long)]
    ftests: Option<PathBuf>,

    /// Only test the F-tests, not the individual contrast rows
    #[arg(long, default_value = "false")]
    fonly: bool,

    /// Element-wise design column: a list of per-input data files.
    /// Columns are appended to the design in the order given.
    #[arg(long = "column")]
    columns: Vec<PathBuf>,
}

/// Loaded and cross-checked model inputs.
pub struct Model {
    pub measurements: DenseMatrix,
    pub design: DenseMatrix,
    pub hypotheses: Vec<Hypothesis>,
    pub importers: Vec<Box<dyn ColumnImporter>>,
    pub diagnostic: DesignDiagnostic,
}

impl Model {
    pub fn load(args: &ModelArgs) -> Result<Self> {
        let measurements = load_matrix(&args.data)?;
        let design = load_matrix(&args.design)?;
        let n = measurements.nrows();
        info!(
            "Loaded {} inputs x {} elements; design has {} factors",
            n,
            measurements.ncols(),
            design.ncols()
        );
        if design.nrows() != n {
            bail!(
                "Design matrix has {} rows but data has {} inputs",
                design.nrows(),
                n
            );
        }
        if !design.is_all_finite() {
            bail!("Design matrix {} contains non-finite values", args.design.display());
        }

        let mut importers: Vec<Box<dyn ColumnImporter>> = Vec::with_capacity(args.columns.len());
        for path in &args.columns {
            let importer = MappedCohortImporter::open(path)?;
            if importer.num_inputs() != n {
                bail!(
                    "Element-wise column {} lists {} inputs; expected {}",
                    path.display(),
                    importer.num_inputs(),
                    n
                );
            }
            if importer.num_elements() < measurements.ncols() {
                bail!(
                    "Element-wise column {} holds {} elements; data has {}",
                    path.display(),
                    importer.num_elements(),
                    measurements.ncols()
                );
            }
            importers.push(Box::new(importer));
        }

        let hypotheses = load_hypotheses(&args.contrast, args.ftests.as_deref(), args.fonly)?;
        let num_factors = design.ncols() + importers.len();
        if let Some(h) = hypotheses.iter().find(|h| h.cols() != num_factors) {
            bail!(
                "{} has {} columns but the model has {} factors ({} in design, {} element-wise)",
                h.name(),
                h.cols(),
                num_factors,
                design.ncols(),
                importers.len()
            );
        }

        let diagnostic = check_design(&design, !importers.is_empty());
        Ok(Self {
            measurements,
            design,
            hypotheses,
            importers,
            diagnostic,
        })
    }

    pub fn hypothesis_names(&self) -> Vec<String> {
        self.hypotheses.iter().map(Hypothesis::name).collect()
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            num_inputs: self.measurements.nrows(),
            num_elements: self.measurements.ncols(),
            num_factors: self.design.ncols() + self.importers.len(),
            element_wise_columns: self.importers.len(),
            hypotheses: self
                .hypotheses
                .iter()
                .map(|h| HypothesisSummary {
                    name: h.name(),
                    kind: h.kind(),
                    rank: h.rank(),
                })
                .collect(),
            design: self.diagnostic.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct HypothesisSummary {
    pub name: String,
    pub kind: HypothesisKind,
    pub rank: usize,
}

#[derive(Serialize)]
pub struct ModelSummary {
    pub num_inputs: usize,
    pub num_elements: usize,
    pub num_factors: usize,
    pub element_wise_columns: usize,
    pub hypotheses: Vec<HypothesisSummary>,
    pub design: DesignDiagnostic,
}

/// `PREFIX_suffix`, keeping the prefix's directory.
pub fn output_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push("_");
    name.push(suffix);
    PathBuf::from(name)
}

/// Write one row per element: the element index, then one column per header entry.
pub fn write_table(path: &Path, header: &[String], rows: &DenseMatrix) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "element\t{}", header.join("\t"))?;
    for i in 0..rows.nrows() {
        let values: Vec<String> = rows.row(i).iter().map(|v| format!("{}", v)).collect();
        writeln!(writer, "{}\t{}", i, values.join("\t"))?;
    }
    writer.flush()?;
    info!("Wrote {}", path.display());
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("out/run1"), "stat.tsv"),
            PathBuf::from("out/run1_stat.tsv")
        );
    }
}
