//! Permutation testing of every hypothesis at every element.
//!
//! permglm test --data ... --design ... --contrast ... [--variance FILE]
//!     [--permutations FILE] [--signflips FILE] --output PREFIX

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::info;

use permglm_core::{select_tester, GlmTest, Hypothesis, TestOptions};
use permglm_io::{load_shuffles, load_variance_groups};
use permglm_linalg::DenseMatrix;

use super::{output_path, write_json, write_table, Model, ModelArgs, ModelSummary};

#[derive(Args)]
pub struct TestArgs {
    #[command(flatten)]
    model: ModelArgs,

    /// Variance group of each input, numbered from 0 or 1
    #[arg(long)]
    variance: Option<PathBuf>,

    /// Permutations, one per line
    #[arg(long)]
    permutations: Option<PathBuf>,

    /// Sign-flips, one per line
    #[arg(long)]
    signflips: Option<PathBuf>,

    /// Largest design condition number accepted at an element
    #[arg(long, default_value = "1e5")]
    max_condition_number: f64,

    /// Output prefix
    #[arg(long)]
    output: PathBuf,
}

#[derive(Serialize)]
struct TestSummary {
    model: ModelSummary,
    variance_groups: Option<Vec<usize>>,
    shuffles: usize,
    /// Elements with a zero statistic for every hypothesis.
    zeroed_elements: usize,
}

/// Square F-type columns so they hold F (or G) rather than its root.
fn reported_statistic(default: &DenseMatrix, hypotheses: &[Hypothesis]) -> DenseMatrix {
    DenseMatrix::from_fn(default.nrows(), default.ncols(), |ie, ih| {
        let v = default.get(ie, ih);
        if hypotheses[ih].is_f() {
            v * v
        } else {
            v
        }
    })
}

/// Per element and hypothesis, count shuffles whose statistic reaches the observed one.
fn accumulate_exceedances(counts: &mut [Vec<usize>], observed: &DenseMatrix, shuffled: &DenseMatrix) {
    for (ie, row) in counts.iter_mut().enumerate() {
        for (ih, count) in row.iter_mut().enumerate() {
            if shuffled.get(ie, ih) >= observed.get(ie, ih) {
                *count += 1;
            }
        }
    }
}

fn uncorrected_p(counts: &[Vec<usize>], num_shuffles: usize) -> DenseMatrix {
    let rows: Vec<Vec<f64>> = counts
        .iter()
        .map(|row| {
            row.iter()
                .map(|&c| (c as f64 + 1.0) / (num_shuffles as f64 + 1.0))
                .collect()
        })
        .collect();
    DenseMatrix::from_rows(&rows)
}

pub fn run(args: TestArgs) -> Result<()> {
    info!("=== permglm: permutation testing ===");
    let model = Model::load(&args.model)?;
    let n = model.measurements.nrows();

    let variance_groups = args
        .variance
        .as_deref()
        .map(|path| load_variance_groups(path, n))
        .transpose()?
        .flatten();
    let shuffles = load_shuffles(args.permutations.as_deref(), args.signflips.as_deref(), n)?;

    let options = TestOptions {
        max_condition_number: args.max_condition_number,
        ..TestOptions::detect(&model.measurements, &model.importers)
    };
    let tester = select_tester(
        &model.measurements,
        &model.design,
        &model.hypotheses,
        &model.importers,
        variance_groups.as_ref(),
        options,
    )?;

    let observed = tester.evaluate_default()?;
    let names = model.hypothesis_names();
    write_table(
        &output_path(&args.output, "stat.tsv"),
        &names,
        &reported_statistic(&observed, &model.hypotheses),
    )?;

    if !shuffles.is_empty() {
        let mut counts = vec![vec![0usize; tester.num_hypotheses()]; tester.num_elements()];
        for (i, shuffle) in shuffles.iter().enumerate() {
            let shuffled = tester.evaluate(&shuffle.matrix())?;
            accumulate_exceedances(&mut counts, &observed, &shuffled);
            if (i + 1) % 100 == 0 {
                info!("Evaluated {} of {} shuffles", i + 1, shuffles.len());
            }
        }
        write_table(
            &output_path(&args.output, "uncorrected_p.tsv"),
            &names,
            &uncorrected_p(&counts, shuffles.len()),
        )?;
    }

    let zeroed_elements = (0..observed.nrows())
        .filter(|&ie| observed.row(ie).iter().all(|&v| v == 0.0))
        .count();
    let summary = TestSummary {
        model: model.summary(),
        variance_groups: variance_groups.as_ref().map(|vg| vg.counts().to_vec()),
        shuffles: shuffles.len(),
        zeroed_elements,
    };
    write_json(&output_path(&args.output, "summary.json"), &summary)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_statistic_squares_f_columns() {
        let h = vec![
            Hypothesis::t_test(&[1.0], 0).unwrap(),
            Hypothesis::f_test(DenseMatrix::identity(1), 0).unwrap(),
        ];
        let default = DenseMatrix::from_row_major(1, 2, &[-2.0, 3.0]);
        let reported = reported_statistic(&default, &h);
        assert_eq!(reported.row(0), vec![-2.0, 9.0]);
    }

    #[test]
    fn test_uncorrected_p() {
        let observed = DenseMatrix::from_row_major(2, 1, &[2.0, 0.5]);
        let mut counts = vec![vec![0usize]; 2];
        for v in [1.0, 3.0, 0.4] {
            let shuffled = DenseMatrix::from_row_major(2, 1, &[v, v]);
            accumulate_exceedances(&mut counts, &observed, &shuffled);
        }
        assert_eq!(counts, vec![vec![1], vec![2]]);
        let p = uncorrected_p(&counts, 3);
        assert_eq!(p.get(0, 0), 0.5);
        assert_eq!(p.get(1, 0), 0.75);
    }
}
