//! Observed-model properties: coefficients, effect sizes, residual spread.
//!
//! permglm stats --data ... --design ... --contrast ... --output PREFIX

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::info;

use permglm_core::all_stats_variable;
use permglm_linalg::DenseMatrix;

use super::{output_path, write_json, write_table, Model, ModelArgs, ModelSummary};

#[derive(Args)]
pub struct StatsArgs {
    #[command(flatten)]
    model: ModelArgs,

    /// Output prefix
    #[arg(long)]
    output: PathBuf,
}

#[derive(Serialize)]
struct StatsSummary {
    model: ModelSummary,
    /// Elements whose fit was rejected and reported as zeros.
    rejected_elements: usize,
    max_condition_number: f64,
}

pub fn run(args: StatsArgs) -> Result<()> {
    info!("=== permglm: observed statistics ===");
    let model = Model::load(&args.model)?;
    let stats = all_stats_variable(
        &model.measurements,
        &model.design,
        &model.importers,
        &model.hypotheses,
    )?;

    let names = model.hypothesis_names();
    let beta_names: Vec<String> = (1..=stats.betas.nrows()).map(|i| format!("beta{}", i)).collect();
    write_table(&output_path(&args.output, "betas.tsv"), &beta_names, &stats.betas.transpose())?;
    write_table(&output_path(&args.output, "abs_effect.tsv"), &names, &stats.abs_effect_size)?;
    write_table(&output_path(&args.output, "std_effect.tsv"), &names, &stats.std_effect_size)?;
    write_table(
        &output_path(&args.output, "stdev.tsv"),
        &["stdev".to_string()],
        &DenseMatrix::from_vec(&stats.stdev),
    )?;
    write_table(
        &output_path(&args.output, "cond.tsv"),
        &["cond".to_string()],
        &DenseMatrix::from_vec(&stats.cond),
    )?;

    let rejected_elements = stats.stdev.iter().filter(|&&s| s == 0.0).count();
    if rejected_elements > 0 {
        info!("{} elements could not be fitted and are reported as zeros", rejected_elements);
    }
    let summary = StatsSummary {
        model: model.summary(),
        rejected_elements,
        max_condition_number: stats.cond.iter().copied().fold(0.0, f64::max),
    };
    write_json(&output_path(&args.output, "summary.json"), &summary)?;
    Ok(())
}
