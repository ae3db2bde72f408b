//! The full assignment pipeline: fit the topic model, test each
//! item-topic association, correct for multiple testing, score
//! specificity and similarity, and reduce to one topic per item.

use crate::assign_stats::*;
use crate::common::*;
use crate::fdr::benjamini_hochberg;
use crate::nb_glm::fit_nb_regression;
use crate::topic_fit::*;

use indicatif::ParallelProgressIterator;
use matrix_util::dmatrix_util::cosine_similarity;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
pub struct AssignOpts {
    pub orientation: Orientation,
    pub n_topics: usize,
    pub n_restarts: usize,
    /// one seed per restart; empty means `1..=n_restarts`
    pub seeds: Vec<u64>,
    pub thresholds: AssignThresholds,
    /// iteration cap for each negative-binomial fit
    pub max_glm_iter: usize,
    /// keep the fitted model in the output bundle
    pub return_model: bool,
    pub verbose: bool,
}

impl Default for AssignOpts {
    fn default() -> Self {
        Self {
            orientation: Orientation::Genes,
            n_topics: DEFAULT_NUM_TOPICS,
            n_restarts: DEFAULT_NUM_RESTARTS,
            seeds: vec![],
            thresholds: AssignThresholds::default(),
            max_glm_iter: DEFAULT_MAX_GLM_ITER,
            return_model: false,
            verbose: false,
        }
    }
}

pub struct AssignOut {
    pub stats: AssignStats,
    /// present when `return_model` was requested
    pub model: Option<TopicModelFit>,
}

/// Run the end-to-end assignment over `counts_gc` (`gene x cell`).
///
/// `item_names` must match the item axis of the chosen orientation;
/// when absent, the items are numbered.
pub fn run_topic_assignment(
    counts_gc: &Mat,
    item_names: Option<&[Box<str>]>,
    opts: &AssignOpts,
) -> anyhow::Result<AssignOut> {
    // 1. fit the topic model (fails fast on malformed inputs)
    let fit = fit_topic_model(
        counts_gc,
        &TopicFitOpts {
            orientation: opts.orientation,
            n_topics: opts.n_topics,
            n_restarts: opts.n_restarts,
            seeds: opts.seeds.clone(),
            verbose: opts.verbose,
        },
    )?;

    let n_items = fit.num_items();
    let n_topics = fit.num_topics();

    let item_names: Vec<Box<str>> = match item_names {
        Some(names) => {
            if names.len() != n_items {
                anyhow::bail!("{} item names for {} items", names.len(), n_items);
            }
            names.to_vec()
        }
        None => {
            let prefix = match opts.orientation {
                Orientation::Genes => "g",
                Orientation::Cells => "c",
            };
            (1..=n_items)
                .map(|i| format!("{}{}", prefix, i).into_boxed_str())
                .collect()
        }
    };

    let mut stats = AssignStats::new(item_names, n_topics);

    // 2. association tests, one independent regression per item and
    // topic; failed fits leave the cell missing
    for k in 0..n_topics {
        if opts.verbose {
            info!("testing association with topic {} / {}", k + 1, n_topics);
        }

        let topic_weight: Vec<f64> = fit.doc_topic().column(k).iter().copied().collect();
        let n_done = AtomicUsize::new(0);

        let fitted: Vec<Option<(f64, f64)>> = (0..n_items)
            .into_par_iter()
            .progress_count(n_items as u64)
            .map(|i| {
                let response: Vec<f64> = match opts.orientation {
                    Orientation::Genes => counts_gc.row(i).iter().copied().collect(),
                    Orientation::Cells => counts_gc.column(i).iter().copied().collect(),
                };

                let done = n_done.fetch_add(1, Ordering::Relaxed) + 1;
                if opts.verbose && done % REPORT_INTERVAL == 0 {
                    info!("topic {}: tested {} / {} items", k + 1, done, n_items);
                }

                fit_nb_regression(&response, &topic_weight, opts.max_glm_iter)
                    .ok()
                    .map(|fit| (fit.pvalue, fit.coef))
            })
            .collect();

        for (i, cell) in fitted.into_iter().enumerate() {
            if let Some((pvalue, coef)) = cell {
                stats.topics[k].pvalue[i] = pvalue;
                stats.topics[k].coef[i] = coef;
            }
        }
    }

    // 3. FDR correction within each topic column
    for k in 0..n_topics {
        stats.topics[k].qvalue = benjamini_hochberg(&stats.topics[k].pvalue);
    }

    // 4. specificity from the topic-term posterior
    let spec_kd = specificity_from_topic_terms(fit.topic_term());
    for k in 0..n_topics {
        for i in 0..n_items {
            stats.topics[k].specificity[i] = spec_kd[(k, i)];
        }
    }

    // 5. cosine similarity against per-cell relative expression
    let rel_gc = relative_expression(counts_gc);
    let item_profiles: Vec<Vec<f64>> = (0..n_items)
        .map(|i| match opts.orientation {
            Orientation::Genes => rel_gc.row(i).iter().copied().collect(),
            Orientation::Cells => rel_gc.column(i).iter().copied().collect(),
        })
        .collect();

    for k in 0..n_topics {
        let topic_weight: Vec<f64> = fit.doc_topic().column(k).iter().copied().collect();
        for i in 0..n_items {
            stats.topics[k].similarity[i] = cosine_similarity(&item_profiles[i], &topic_weight);
        }
    }

    // 6. reduce the four criteria to one topic (or none) per item
    stats.reduce_assignments(&opts.thresholds);

    if opts.verbose {
        let n_assigned = stats.assignment.iter().filter(|a| a.is_some()).count();
        info!("assigned {} / {} items", n_assigned, n_items);
    }

    // 7. hand back the table, with the model when requested
    Ok(AssignOut {
        stats,
        model: opts.return_model.then_some(fit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_counts() -> Mat {
        // two gene blocks expressed in two disjoint cell blocks
        let mut counts = Mat::zeros(6, 10);
        for i in 0..3 {
            for j in 0..5 {
                counts[(i, j)] = 8.0 + ((i + j) % 3) as f64;
                counts[(i + 3, j + 5)] = 9.0 + ((i * j) % 4) as f64;
            }
        }
        counts
    }

    #[test]
    fn produces_a_full_table_per_item() -> anyhow::Result<()> {
        let opts = AssignOpts {
            n_topics: 2,
            n_restarts: 1,
            seeds: vec![1],
            ..Default::default()
        };
        let out = run_topic_assignment(&block_counts(), None, &opts)?;

        assert_eq!(out.stats.num_items(), 6);
        assert_eq!(out.stats.num_topics(), 2);
        assert!(out.model.is_none());

        // FDR dominates the raw p-values wherever both exist
        for col in out.stats.topics.iter() {
            for (p, q) in col.pvalue.iter().zip(col.qvalue.iter()) {
                if p.is_finite() {
                    assert!(q >= p);
                } else {
                    assert!(q.is_nan());
                }
            }
        }
        Ok(())
    }

    #[test]
    fn model_is_returned_on_request() -> anyhow::Result<()> {
        let opts = AssignOpts {
            n_topics: 2,
            n_restarts: 1,
            seeds: vec![1],
            return_model: true,
            ..Default::default()
        };
        let out = run_topic_assignment(&block_counts(), None, &opts)?;
        let model = out.model.expect("requested model");
        assert_eq!(model.num_topics(), 2);
        assert_eq!(model.num_items(), out.stats.num_items());
        Ok(())
    }

    #[test]
    fn item_name_length_is_checked() {
        let names: Vec<Box<str>> = vec!["only_one".into()];
        let opts = AssignOpts {
            n_topics: 2,
            n_restarts: 1,
            seeds: vec![1],
            ..Default::default()
        };
        assert!(run_topic_assignment(&block_counts(), Some(names.as_slice()), &opts).is_err());
    }
}
