use lentil::common::*;
use lentil::simulate::*;

use clap::Args;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// output header for `{out}.counts.tsv`, `{out}.dictionary.tsv`,
    /// and `{out}.proportions.tsv`
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// number of genes
    #[arg(long, default_value_t = 100)]
    rows: usize,

    /// number of cells
    #[arg(long, default_value_t = 500)]
    cols: usize,

    /// number of planted topics
    #[arg(long, short = 'k', default_value_t = DEFAULT_NUM_TOPICS)]
    factors: usize,

    /// expected total count per cell
    #[arg(long, default_value_t = 1e3)]
    depth: f64,

    /// random seed
    #[arg(long, default_value_t = 42)]
    rseed: u64,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

pub fn run_simulate(args: &SimulateArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let sim = generate_factored_poisson_gamma_data(&SimArgs {
        rows: args.rows,
        cols: args.cols,
        factors: args.factors,
        depth: args.depth,
        rseed: args.rseed,
    })?;

    let gene_names: Vec<Box<str>> = (1..=args.rows)
        .map(|g| format!("g{}", g).into_boxed_str())
        .collect();
    let cell_names: Vec<Box<str>> = (1..=args.cols)
        .map(|c| format!("c{}", c).into_boxed_str())
        .collect();

    let counts_file = format!("{}.counts.tsv", args.out);
    sim.counts_gc.to_tsv_with_names(
        &counts_file,
        (Some(gene_names.as_slice()), Some("gene")),
        Some(cell_names.as_slice()),
    )?;
    info!(
        "wrote {} x {} counts to {}",
        args.rows, args.cols, counts_file
    );

    let dict_file = format!("{}.dictionary.tsv", args.out);
    sim.beta_gk.to_tsv_with_names(
        &dict_file,
        (Some(gene_names.as_slice()), Some("gene")),
        None,
    )?;

    let prop_file = format!("{}.proportions.tsv", args.out);
    sim.theta_kc.transpose().to_tsv_with_names(
        &prop_file,
        (Some(cell_names.as_slice()), Some("cell")),
        None,
    )?;

    info!(
        "wrote ground-truth parameters to {} and {}",
        dict_file, prop_file
    );
    Ok(())
}
