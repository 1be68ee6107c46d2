//! Report rank and conditioning of a design matrix.
//!
//! permglm check-design --design design.txt [--element-wise-columns]

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use permglm_core::check_design;
use permglm_io::load_matrix;

#[derive(Args)]
pub struct CheckDesignArgs {
    /// Design matrix file
    #[arg(long)]
    design: PathBuf,

    /// The design will be extended with element-wise columns
    #[arg(long, default_value = "false")]
    element_wise_columns: bool,
}

pub fn run(args: CheckDesignArgs) -> Result<()> {
    let design = load_matrix(&args.design)?;
    let diagnostic = check_design(&design, args.element_wise_columns);

    println!("Design: {}", args.design.display());
    println!("Inputs: {}", design.nrows());
    println!("Factors: {}", diagnostic.num_factors);
    println!("Rank: {}", diagnostic.rank);
    match diagnostic.condition_number {
        Some(cond) => println!("Condition number: {:.6}", cond),
        None => println!("Condition number: undefined (rank-deficient)"),
    }
    Ok(())
}
