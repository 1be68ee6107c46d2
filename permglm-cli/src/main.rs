//! permglm: permutation testing for the general linear model.
//!
//! CLI entry point using clap for argument parsing.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "permglm",
    version,
    about = "Permutation testing for the general linear model",
    long_about = "Element-wise GLM hypothesis testing with Freedman-Lane permutation,\n\
                   element-wise design columns, missing data and variance groups."
)]
struct Cli {
    /// Number of threads to use
    #[arg(long, default_value = "1", global = true)]
    threads: usize,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report rank and condition number of a design matrix
    CheckDesign(commands::check_design::CheckDesignArgs),

    /// Compute coefficients, effect sizes and residual standard deviation
    Stats(commands::stats::StatsArgs),

    /// Compute the test statistic and, given shuffles, uncorrected p-values
    Test(commands::test::TestArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()
        .ok();

    tracing::info!("permglm v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Using {} threads", cli.threads);

    match cli.command {
        Commands::CheckDesign(args) => commands::check_design::run(args),
        Commands::Stats(args) => commands::stats::run(args),
        Commands::Test(args) => commands::test::run(args),
    }
}
