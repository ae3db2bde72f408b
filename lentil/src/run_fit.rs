use lentil::common::*;
use lentil::topic_fit::*;

use clap::Args;

#[derive(Args, Debug)]
pub struct FitArgs {
    /// counts matrix file (`gene x cell` TSV/CSV with row and column
    /// names; `.gz` is fine)
    #[arg(required = true)]
    data_file: Box<str>,

    /// output header for `{out}.latent.tsv` and `{out}.dictionary.tsv`
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// axis to assign: `genes` or `cells`
    #[arg(long, short = 't', value_enum, default_value_t = Orientation::Genes)]
    orientation: Orientation,

    /// number of latent topics
    #[arg(long, short = 'k', default_value_t = DEFAULT_NUM_TOPICS)]
    n_topics: usize,

    /// number of independent restarts
    #[arg(long, short = 'r', default_value_t = DEFAULT_NUM_RESTARTS)]
    n_restarts: usize,

    /// one seed per restart (comma-separated); default `1..=restarts`
    #[arg(long, short = 's', value_delimiter(','))]
    seeds: Vec<u64>,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

pub fn run_fit(args: &FitArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let MatWithNames {
        rows: gene_names,
        cols: cell_names,
        mat: counts_gc,
    } = Mat::read_data_with_names(&args.data_file, &['\t', ','])?;

    info!(
        "read counts {} genes x {} cells",
        counts_gc.nrows(),
        counts_gc.ncols()
    );

    let fit = fit_topic_model(
        &counts_gc,
        &TopicFitOpts {
            orientation: args.orientation,
            n_topics: args.n_topics,
            n_restarts: args.n_restarts,
            seeds: args.seeds.clone(),
            verbose: args.verbose,
        },
    )?;

    let (doc_names, doc_label, item_names, item_label) = match args.orientation {
        Orientation::Genes => (&cell_names, "cell", &gene_names, "gene"),
        Orientation::Cells => (&gene_names, "gene", &cell_names, "cell"),
    };

    let latent_file = format!("{}.latent.tsv", args.out);
    fit.doc_topic().to_tsv_with_names(
        &latent_file,
        (Some(doc_names.as_slice()), Some(doc_label)),
        None,
    )?;
    info!("wrote latent topic weights to {}", latent_file);

    let dict_file = format!("{}.dictionary.tsv", args.out);
    fit.topic_term().transpose().to_tsv_with_names(
        &dict_file,
        (Some(item_names.as_slice()), Some(item_label)),
        None,
    )?;
    info!("wrote topic dictionary to {}", dict_file);

    info!(
        "done: bound {:.4}, alpha {:.4}",
        fit.log_evidence(),
        fit.alpha()
    );
    Ok(())
}
