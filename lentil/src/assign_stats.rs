//! Per-item, per-topic statistics and the threshold reduction that
//! turns them into a categorical assignment.

use crate::common::*;
use matrix_util::dmatrix_util::format_scalar;
use std::io::Write;

/// Strict lower/upper cutoffs applied to each topic's statistics.
#[derive(Debug, Clone, Copy)]
pub struct AssignThresholds {
    /// topics must have FDR q strictly below this
    pub max_qval: f64,
    /// topics must have a regression coefficient strictly above this
    pub min_coef: f64,
    /// topics must have specificity strictly above this
    pub min_specificity: f64,
    /// topics must have cosine similarity strictly above this
    pub min_similarity: f64,
}

impl Default for AssignThresholds {
    fn default() -> Self {
        Self {
            max_qval: 0.05,
            min_coef: 1.0,
            min_specificity: 0.1,
            min_similarity: 0.0,
        }
    }
}

/// One topic's statistics across all items; missing cells are `NaN`
/// and never satisfy a threshold.
pub struct TopicColumn {
    pub pvalue: Vec<f64>,
    pub qvalue: Vec<f64>,
    pub coef: Vec<f64>,
    pub specificity: Vec<f64>,
    pub similarity: Vec<f64>,
}

impl TopicColumn {
    fn with_items(n_items: usize) -> Self {
        Self {
            pvalue: vec![f64::NAN; n_items],
            qvalue: vec![f64::NAN; n_items],
            coef: vec![f64::NAN; n_items],
            specificity: vec![f64::NAN; n_items],
            similarity: vec![f64::NAN; n_items],
        }
    }

    /// whether item `i` passes all four cutoffs; `NaN` fails every
    /// comparison
    fn passes(&self, i: usize, cutoff: &AssignThresholds) -> bool {
        self.qvalue[i] < cutoff.max_qval
            && self.coef[i] > cutoff.min_coef
            && self.specificity[i] > cutoff.min_specificity
            && self.similarity[i] > cutoff.min_similarity
    }
}

/// The per-item statistics table, one `TopicColumn` per topic plus
/// the final assignment (`None` = unassigned).
pub struct AssignStats {
    pub item_names: Vec<Box<str>>,
    pub topics: Vec<TopicColumn>,
    pub assignment: Vec<Option<usize>>,
}

impl AssignStats {
    pub fn new(item_names: Vec<Box<str>>, n_topics: usize) -> Self {
        let n_items = item_names.len();
        Self {
            item_names,
            topics: (0..n_topics).map(|_| TopicColumn::with_items(n_items)).collect(),
            assignment: vec![None; n_items],
        }
    }

    pub fn num_items(&self) -> usize {
        self.item_names.len()
    }

    pub fn num_topics(&self) -> usize {
        self.topics.len()
    }

    /// Resolve each item to the single topic passing all four
    /// cutoffs; among several eligible topics the smallest q-value
    /// wins, with q ties broken by the lowest topic index.
    pub fn reduce_assignments(&mut self, cutoff: &AssignThresholds) {
        for i in 0..self.num_items() {
            let eligible: Vec<usize> = (0..self.num_topics())
                .filter(|&k| self.topics[k].passes(i, cutoff))
                .collect();

            self.assignment[i] = match eligible.as_slice() {
                [] => None,
                [only] => Some(*only),
                _ => {
                    let mut best = eligible[0];
                    for &k in eligible.iter().skip(1) {
                        if self.topics[k].qvalue[i] < self.topics[best].qvalue[i] {
                            best = k;
                        }
                    }
                    Some(best)
                }
            };
        }
    }

    /// Column names of the rendered table: five per topic (1-based
    /// labels) plus the assignment.
    pub fn column_names(&self) -> Vec<Box<str>> {
        let mut names: Vec<Box<str>> = vec![];
        for k in 1..=self.num_topics() {
            names.push(format!("{} p", k).into_boxed_str());
            names.push(format!("{} FDR q", k).into_boxed_str());
            names.push(format!("{} Coef", k).into_boxed_str());
            names.push(format!("{} Spec", k).into_boxed_str());
            names.push(format!("{} Sim", k).into_boxed_str());
        }
        names.push("Assignment".into());
        names
    }

    pub fn write_delim(&self, writer: &mut dyn Write, item_label: &str, delim: &str) -> anyhow::Result<()> {
        writeln!(
            writer,
            "{}{}{}",
            item_label,
            delim,
            self.column_names().join(delim)
        )?;

        for i in 0..self.num_items() {
            let mut fields: Vec<String> = vec![self.item_names[i].to_string()];
            for col in self.topics.iter() {
                fields.push(format_scalar(col.pvalue[i]));
                fields.push(format_scalar(col.qvalue[i]));
                fields.push(format_scalar(col.coef[i]));
                fields.push(format_scalar(col.specificity[i]));
                fields.push(format_scalar(col.similarity[i]));
            }
            fields.push(match self.assignment[i] {
                Some(k) => (k + 1).to_string(),
                None => "NA".to_string(),
            });
            writeln!(writer, "{}", fields.join(delim))?;
        }
        Ok(())
    }

    pub fn to_tsv(&self, file: &str, item_label: &str) -> anyhow::Result<()> {
        let mut writer = matrix_util::common_io::open_buf_writer(file)?;
        self.write_delim(&mut writer, item_label, "\t")?;
        writer.flush()?;
        Ok(())
    }
}

/// Normalize the `topic x item` weights across topics at each item:
/// `spec(k, i) = weight(k, i) / sum_k' weight(k', i)`.
pub fn specificity_from_topic_terms(topic_term_kd: &Mat) -> Mat {
    let mut spec = topic_term_kd.clone();
    for j in 0..spec.ncols() {
        let tot: f64 = spec.column(j).iter().sum();
        for k in 0..spec.nrows() {
            if tot > 0_f64 {
                spec[(k, j)] /= tot;
            } else {
                spec[(k, j)] = f64::NAN;
            }
        }
    }
    spec
}

/// Per-cell relative expression: each column of the `gene x cell`
/// counts divided by its total, regardless of orientation.
pub fn relative_expression(counts_gc: &Mat) -> Mat {
    counts_gc.sum_to_one_columns()
}
