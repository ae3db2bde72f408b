mod run_assign;
mod run_fit;
mod run_simulate;

use run_assign::*;
use run_fit::*;
use run_simulate::*;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "LENTIL",
    long_about = "Latent topic assignment of genes and cells in single-cell count data.\n\
		  Counts are read as `gene x cell` TSV/CSV files with row and\n\
		  column names; `.gz` compression is handled transparently."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Fit a latent topic model over the counts",
        long_about = "Fit an LDA topic model by variational EM with multiple\n\
		      random restarts, keeping the best-scoring fit.\n\
		      Writes the latent topic weights and the topic dictionary."
    )]
    Fit(FitArgs),

    #[command(
        about = "Assign genes or cells to latent topics",
        long_about = "Fit the topic model, then resolve one topic (or none) per\n\
		      item by intersecting four criteria: negative-binomial\n\
		      association (FDR-adjusted), effect size, specificity,\n\
		      and cosine similarity."
    )]
    Assign(AssignArgs),

    /// simulate counts with a planted factored structure
    Simulate(SimulateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Fit(args) => {
            run_fit(args)?;
        }
        Commands::Assign(args) => {
            run_assign(args)?;
        }
        Commands::Simulate(args) => {
            run_simulate(args)?;
        }
    }

    Ok(())
}
