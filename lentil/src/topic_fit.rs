//! Fit an LDA topic model over a counts matrix, oriented by the axis
//! being assigned, with multiple random restarts.

use crate::common::*;

use clap::ValueEnum;
use lda_util::model::LdaModel;
use lda_util::vem::{fit_lda_vem, VemArgs};

/// Which axis of the counts matrix receives topic assignments.
///
/// The items are modelled as the vocabulary of the topic model and
/// the complementary axis as the documents: with `genes` the counts
/// matrix (`gene x cell`) is transposed so cells become documents
/// over gene terms; with `cells` it is used as-is, genes being
/// documents over cell terms.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[clap(rename_all = "lowercase")]
pub enum Orientation {
    Genes,
    Cells,
}

impl std::str::FromStr for Orientation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "genes" => Ok(Orientation::Genes),
            "cells" => Ok(Orientation::Cells),
            _ => Err(anyhow::anyhow!(
                "unrecognized orientation: {} (expected `genes` or `cells`)",
                s
            )),
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Genes => write!(f, "genes"),
            Orientation::Cells => write!(f, "cells"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopicFitOpts {
    pub orientation: Orientation,
    pub n_topics: usize,
    pub n_restarts: usize,
    /// one seed per restart; empty means `1..=n_restarts`
    pub seeds: Vec<u64>,
    pub verbose: bool,
}

impl Default for TopicFitOpts {
    fn default() -> Self {
        Self {
            orientation: Orientation::Genes,
            n_topics: DEFAULT_NUM_TOPICS,
            n_restarts: DEFAULT_NUM_RESTARTS,
            seeds: vec![],
            verbose: false,
        }
    }
}

impl TopicFitOpts {
    pub fn resolve_seeds(&self) -> anyhow::Result<Vec<u64>> {
        if self.seeds.is_empty() {
            return Ok((1..=self.n_restarts as u64).collect());
        }
        if self.seeds.len() != self.n_restarts {
            anyhow::bail!(
                "{} seeds for {} restarts",
                self.seeds.len(),
                self.n_restarts
            );
        }
        Ok(self.seeds.clone())
    }
}

/// A fitted topic model tied to the orientation it was fitted under.
pub struct TopicModelFit {
    orientation: Orientation,
    model: LdaModel,
}

impl TopicModelFit {
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// `document x topic` weights; the documents are cells under
    /// `genes` orientation and genes under `cells`
    pub fn doc_topic(&self) -> &Mat {
        self.model.doc_topic()
    }

    /// `topic x item` weights; the terms of the model are exactly the
    /// items being assigned
    pub fn topic_term(&self) -> &Mat {
        self.model.topic_term()
    }

    pub fn alpha(&self) -> f64 {
        self.model.alpha()
    }

    pub fn log_evidence(&self) -> f64 {
        self.model.log_evidence()
    }

    pub fn num_topics(&self) -> usize {
        self.model.num_topics()
    }

    pub fn num_items(&self) -> usize {
        self.model.num_terms()
    }
}

pub fn validate_counts(counts_gc: &Mat) -> anyhow::Result<()> {
    if counts_gc.nrows() == 0 || counts_gc.ncols() == 0 {
        anyhow::bail!("empty counts matrix");
    }
    if counts_gc
        .iter()
        .any(|&x| !x.is_finite() || x < 0_f64 || x.fract() != 0_f64)
    {
        anyhow::bail!("counts must be non-negative integers");
    }
    Ok(())
}

/// Fit the topic model with one independent restart per seed and keep
/// the best-scoring restart.
///
/// * `counts_gc` - `gene x cell` counts
///
/// Fails fast on malformed inputs; a solver failure is propagated
/// only when every restart fails.
pub fn fit_topic_model(counts_gc: &Mat, opts: &TopicFitOpts) -> anyhow::Result<TopicModelFit> {
    validate_counts(counts_gc)?;

    if opts.n_topics < 1 {
        anyhow::bail!("need at least one topic");
    }
    if opts.n_restarts < 1 {
        anyhow::bail!("need at least one restart");
    }
    let seeds = opts.resolve_seeds()?;

    let docs_nd = match opts.orientation {
        Orientation::Genes => counts_gc.transpose(),
        Orientation::Cells => counts_gc.clone(),
    };

    if opts.verbose {
        info!(
            "fitting {} topics over {} documents x {} terms ({} restarts)",
            opts.n_topics,
            docs_nd.nrows(),
            docs_nd.ncols(),
            seeds.len()
        );
    }

    let mut best: Option<LdaModel> = None;
    let mut failures: Vec<String> = vec![];

    for (restart, &seed) in seeds.iter().enumerate() {
        let vem_args = VemArgs::with_topics(opts.n_topics, seed);
        match fit_lda_vem(&docs_nd, &vem_args) {
            Ok(model) => {
                if opts.verbose {
                    info!(
                        "restart {} (seed {}): bound {:.4}",
                        restart + 1,
                        seed,
                        model.log_evidence()
                    );
                }
                let better = best
                    .as_ref()
                    .map(|b| model.log_evidence() > b.log_evidence())
                    .unwrap_or(true);
                if better {
                    best = Some(model);
                }
            }
            Err(err) => {
                failures.push(format!("restart {} (seed {}): {}", restart + 1, seed, err));
            }
        }
    }

    let model = best.ok_or_else(|| {
        anyhow::anyhow!("all {} restarts failed:\n{}", seeds.len(), failures.join("\n"))
    })?;

    if opts.verbose {
        info!(
            "selected fit with bound {:.4} (alpha = {:.4})",
            model.log_evidence(),
            model.alpha()
        );
    }

    Ok(TopicModelFit {
        orientation: opts.orientation,
        model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_counts() -> Mat {
        Mat::from_row_slice(
            3,
            4,
            &[
                5., 0., 3., 1., //
                0., 4., 1., 2., //
                2., 2., 0., 6., //
            ],
        )
    }

    #[test]
    fn seed_count_must_match_restarts() {
        let opts = TopicFitOpts {
            n_restarts: 3,
            seeds: vec![1, 2],
            ..Default::default()
        };
        assert!(fit_topic_model(&small_counts(), &opts).is_err());
    }

    #[test]
    fn default_seeds_cover_each_restart() -> anyhow::Result<()> {
        let opts = TopicFitOpts {
            n_restarts: 4,
            ..Default::default()
        };
        assert_eq!(opts.resolve_seeds()?, vec![1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn rejects_fractional_counts() {
        let mat = Mat::from_row_slice(2, 2, &[1., 2.5, 0., 3.]);
        assert!(fit_topic_model(&mat, &TopicFitOpts::default()).is_err());
    }

    #[test]
    fn orientation_sets_the_item_axis() -> anyhow::Result<()> {
        let counts = small_counts();

        let genes = fit_topic_model(
            &counts,
            &TopicFitOpts {
                orientation: Orientation::Genes,
                n_topics: 2,
                n_restarts: 1,
                seeds: vec![1],
                verbose: false,
            },
        )?;
        assert_eq!(genes.num_items(), counts.nrows());
        assert_eq!(genes.doc_topic().nrows(), counts.ncols());

        let cells = fit_topic_model(
            &counts,
            &TopicFitOpts {
                orientation: Orientation::Cells,
                n_topics: 2,
                n_restarts: 1,
                seeds: vec![1],
                verbose: false,
            },
        )?;
        assert_eq!(cells.num_items(), counts.ncols());
        assert_eq!(cells.doc_topic().nrows(), counts.nrows());
        Ok(())
    }

    #[test]
    fn orientation_parses_from_strings() {
        assert_eq!(
            "genes".parse::<Orientation>().unwrap(),
            Orientation::Genes
        );
        assert_eq!(
            "Cells".parse::<Orientation>().unwrap(),
            Orientation::Cells
        );
        assert!("columns".parse::<Orientation>().is_err());
    }
}
