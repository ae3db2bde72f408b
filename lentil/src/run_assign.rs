use lentil::assign_stats::AssignThresholds;
use lentil::common::*;
use lentil::topic_assignment::*;
use lentil::topic_fit::Orientation;

use clap::Args;
use rayon::ThreadPoolBuilder;

#[derive(Args, Debug)]
pub struct AssignArgs {
    /// counts matrix file (`gene x cell` TSV/CSV with row and column
    /// names; `.gz` is fine)
    #[arg(required = true)]
    data_file: Box<str>,

    /// output header for `{out}.assignment.tsv`
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

    /// FDR q-value must fall strictly below this
    #[arg(long, default_value_t = 0.05)]
    max_qval: f64,

    /// regression coefficient must rise strictly above this
    #[arg(long, default_value_t = 1.0)]
    min_coef: f64,

    /// specificity must rise strictly above this
    #[arg(long, default_value_t = 0.1)]
    min_spec: f64,

    /// cosine similarity must rise strictly above this
    #[arg(long, default_value_t = 0.0)]
    min_sim: f64,

    /// also write `{out}.latent.tsv` and `{out}.dictionary.tsv`
    #[arg(long, default_value_t = false)]
    save_model: bool,

    /// maximum number of worker threads
    #[arg(long, default_value_t = 16)]
    max_threads: usize,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

pub fn run_assign(args: &AssignArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let max_threads = num_cpus::get().min(args.max_threads);
    ThreadPoolBuilder::new()
        .num_threads(max_threads)
        .build_global()?;
    info!("will use {} threads", rayon::current_num_threads());

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

    let (item_names, item_label) = match args.orientation {
        Orientation::Genes => (&gene_names, "gene"),
        Orientation::Cells => (&cell_names, "cell"),
    };

    let out = run_topic_assignment(
        &counts_gc,
        Some(item_names.as_slice()),
        &AssignOpts {
            orientation: args.orientation,
            n_topics: args.n_topics,
            n_restarts: args.n_restarts,
            seeds: args.seeds.clone(),
            thresholds: AssignThresholds {
                max_qval: args.max_qval,
                min_coef: args.min_coef,
                min_specificity: args.min_spec,
                min_similarity: args.min_sim,
            },
            max_glm_iter: DEFAULT_MAX_GLM_ITER,
            return_model: args.save_model,
            verbose: args.verbose,
        },
    )?;

    let assignment_file = format!("{}.assignment.tsv", args.out);
    out.stats.to_tsv(&assignment_file, item_label)?;
    info!("wrote assignment table to {}", assignment_file);

    if let Some(fit) = out.model {
        let (doc_names, doc_label) = match args.orientation {
            Orientation::Genes => (&cell_names, "cell"),
            Orientation::Cells => (&gene_names, "gene"),
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
    }

    info!("done");
    Ok(())
}
