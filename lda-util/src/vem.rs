//! Variational EM estimation for latent Dirichlet allocation over a
//! dense `document x term` count matrix.
//!
//! The E-step optimizes per-document Dirichlet posteriors and topic
//! responsibilities; the M-step re-estimates the topic-term
//! distributions and (optionally) the symmetric Dirichlet
//! concentration by Newton's method on the log scale.

use crate::model::{LdaModel, Mat};
use matrix_util::traits::MatOps;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::function::gamma::{digamma, ln_gamma};

const BETA_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct VemArgs {
    /// number of latent topics
    pub n_topics: usize,
    /// maximum number of outer EM iterations
    pub max_em_iter: usize,
    /// relative tolerance on the variational bound
    pub em_rel_tol: f64,
    /// maximum number of per-document E-step iterations
    pub max_doc_iter: usize,
    /// mean absolute tolerance on the Dirichlet posterior update
    pub doc_tol: f64,
    /// re-estimate the Dirichlet concentration each M-step
    pub estimate_alpha: bool,
    /// seed for the topic-term initialization
    pub seed: u64,
}

impl Default for VemArgs {
    fn default() -> Self {
        Self {
            n_topics: 1,
            max_em_iter: 100,
            em_rel_tol: 1e-5,
            max_doc_iter: 50,
            doc_tol: 1e-4,
            estimate_alpha: true,
            seed: 1,
        }
    }
}

impl VemArgs {
    pub fn with_topics(n_topics: usize, seed: u64) -> Self {
        Self {
            n_topics,
            seed,
            ..Default::default()
        }
    }
}

/// Fit an LDA topic model on `counts_nd` (`document x term`, counts)
/// and return the posterior pair along with the final bound.
///
/// Fails when the input is degenerate or the bound diverges; the
/// caller decides what to do with a failed restart.
pub fn fit_lda_vem(counts_nd: &Mat, args: &VemArgs) -> anyhow::Result<LdaModel> {
    let nn = counts_nd.nrows();
    let dd = counts_nd.ncols();
    let kk = args.n_topics;

    if kk < 1 {
        anyhow::bail!("need at least one topic");
    }
    if nn < 1 || dd < 1 {
        anyhow::bail!("empty count matrix");
    }
    if counts_nd.iter().any(|&x| !x.is_finite() || x < 0_f64) {
        anyhow::bail!("count matrix must be finite and non-negative");
    }

    // sparse view of each document
    let docs: Vec<Vec<(usize, f64)>> = (0..nn)
        .map(|i| {
            (0..dd)
                .filter(|&j| counts_nd[(i, j)] > 0_f64)
                .map(|j| (j, counts_nd[(i, j)]))
                .collect()
        })
        .collect();

    let totals: Vec<f64> = docs
        .iter()
        .map(|doc| doc.iter().map(|&(_, c)| c).sum())
        .collect();

    if totals.iter().all(|&t| t <= 0_f64) {
        anyhow::bail!("count matrix has no positive entries");
    }

    // seeded initialization of the topic-term distributions
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut beta_kd = Mat::from_fn(kk, dd, |_, _| 1_f64 + rng.random::<f64>());
    beta_kd.sum_to_one_rows_inplace();

    let mut alpha = 50_f64 / kk as f64;
    let mut gamma_nk = Mat::zeros(nn, kk);
    let mut bound = f64::NEG_INFINITY;

    for em_iter in 0..args.max_em_iter {
        let log_beta_kd = beta_kd.map(|b| b.max(BETA_FLOOR).ln());

        let mut ss_kd = Mat::zeros(kk, dd);
        let mut alpha_ss = 0_f64;
        let mut bound_new = 0_f64;

        for (di, doc) in docs.iter().enumerate() {
            let doc_out = infer_document(
                doc,
                totals[di],
                &log_beta_kd,
                alpha,
                args,
                &mut ss_kd,
            );
            for (k, &g) in doc_out.gamma.iter().enumerate() {
                gamma_nk[(di, k)] = g;
            }
            alpha_ss += doc_out.alpha_ss;
            bound_new += doc_out.bound;
        }

        if !bound_new.is_finite() {
            anyhow::bail!("variational bound diverged at iteration {}", em_iter + 1);
        }

        // M-step: topic-term distributions
        beta_kd = ss_kd.map(|s| s + BETA_FLOOR).sum_to_one_rows();

        // M-step: Dirichlet concentration
        if args.estimate_alpha && kk > 1 {
            alpha = update_alpha(alpha, alpha_ss, nn, kk);
        }

        let rel_change = (bound_new - bound).abs() / bound.abs().max(1_f64);
        let converged = em_iter > 0 && rel_change < args.em_rel_tol;
        bound = bound_new;
        if converged {
            break;
        }
    }

    let doc_topic_nk = gamma_nk.sum_to_one_rows();
    Ok(LdaModel::new(doc_topic_nk, beta_kd, alpha, bound))
}

struct DocOut {
    gamma: Vec<f64>,
    /// `sum_k psi(gamma_k) - psi(gamma_0)`, used for the alpha update
    alpha_ss: f64,
    bound: f64,
}

/// Per-document variational inference; accumulates the topic-term
/// sufficient statistics of the converged responsibilities into
/// `ss_kd`.
fn infer_document(
    doc: &[(usize, f64)],
    total: f64,
    log_beta_kd: &Mat,
    alpha: f64,
    args: &VemArgs,
    ss_kd: &mut Mat,
) -> DocOut {
    let kk = log_beta_kd.nrows();

    let mut gamma: Vec<f64> = vec![alpha + total / kk as f64; kk];
    let mut dig: Vec<f64> = gamma.iter().map(|&g| digamma(g)).collect();
    let mut phi = vec![0_f64; kk];

    for _ in 0..args.max_doc_iter {
        let mut gamma_new = vec![alpha; kk];

        for &(w, count) in doc.iter() {
            normalize_phi(&mut phi, &dig, log_beta_kd, w);
            for k in 0..kk {
                gamma_new[k] += count * phi[k];
            }
        }

        let diff: f64 = gamma
            .iter()
            .zip(gamma_new.iter())
            .map(|(a, b)| (a - b).abs())
            .sum::<f64>()
            / kk as f64;

        gamma = gamma_new;
        for k in 0..kk {
            dig[k] = digamma(gamma[k]);
        }

        if diff < args.doc_tol {
            break;
        }
    }

    let gamma0: f64 = gamma.iter().sum();
    let digsum = digamma(gamma0);

    // final responsibilities: sufficient statistics and the
    // word-level part of the bound
    let mut bound = ln_gamma(kk as f64 * alpha) - kk as f64 * ln_gamma(alpha) - ln_gamma(gamma0);
    for k in 0..kk {
        bound += (alpha - gamma[k]) * (dig[k] - digsum) + ln_gamma(gamma[k]);
    }

    for &(w, count) in doc.iter() {
        let log_norm = normalize_phi(&mut phi, &dig, log_beta_kd, w);
        for k in 0..kk {
            ss_kd[(k, w)] += count * phi[k];
        }
        // sum_k phi_k ((psi(gamma_k) - digsum) + log beta - log phi_k)
        // collapses to the softmax normalizer minus digsum
        bound += count * (log_norm - digsum);
    }

    let alpha_ss: f64 = dig.iter().map(|&d| d - digsum).sum();

    DocOut {
        gamma,
        alpha_ss,
        bound,
    }
}

/// `phi_k ∝ exp(psi(gamma_k) + log beta_kw)` via log-sum-exp;
/// returns the log normalizer
fn normalize_phi(phi: &mut [f64], dig: &[f64], log_beta_kd: &Mat, w: usize) -> f64 {
    let kk = phi.len();
    let mut vmax = f64::NEG_INFINITY;
    for k in 0..kk {
        phi[k] = dig[k] + log_beta_kd[(k, w)];
        if phi[k] > vmax {
            vmax = phi[k];
        }
    }
    let mut sum = 0_f64;
    for value in phi.iter_mut() {
        *value = (*value - vmax).exp();
        sum += *value;
    }
    for value in phi.iter_mut() {
        *value /= sum;
    }
    vmax + sum.ln()
}

/// Newton update of the symmetric Dirichlet concentration on the log
/// scale, maximizing
/// `D (ln Γ(Kα) − K ln Γ(α)) + (α − 1) ss`
fn update_alpha(init: f64, ss: f64, n_docs: usize, kk: usize) -> f64 {
    let dd = n_docs as f64;
    let kf = kk as f64;

    let mut log_a = init.max(1e-10).ln();
    for _ in 0..100 {
        let a = log_a.exp();
        let df = dd * (kf * digamma(kf * a) - kf * digamma(a)) + ss;
        let d2f = dd * (kf * kf * trigamma(kf * a) - kf * trigamma(a));
        let step = df / (d2f * a + df);
        if !step.is_finite() {
            return init;
        }
        log_a -= step;
        if df.abs() < 1e-6 {
            break;
        }
    }

    let a = log_a.exp();
    if a.is_finite() {
        a.clamp(1e-8, 1e4)
    } else {
        init
    }
}

fn trigamma(mut x: f64) -> f64 {
    let mut value = 0_f64;
    while x < 6_f64 {
        value += 1_f64 / (x * x);
        x += 1_f64;
    }
    let inv = 1_f64 / x;
    let inv2 = inv * inv;
    value
        + inv
            * (1_f64
                + inv
                    * (0.5
                        + inv
                            * (1_f64 / 6_f64
                                - inv2
                                    * (1_f64 / 30_f64
                                        - inv2 * (1_f64 / 42_f64 - inv2 / 30_f64)))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn toy_counts() -> Mat {
        // two blocks of documents preferring disjoint terms
        Mat::from_row_slice(
            6,
            4,
            &[
                9., 7., 0., 1., //
                8., 9., 1., 0., //
                7., 8., 0., 0., //
                0., 1., 9., 8., //
                1., 0., 8., 9., //
                0., 0., 7., 9., //
            ],
        )
    }

    #[test]
    fn posterior_rows_are_simplexes() -> anyhow::Result<()> {
        let model = fit_lda_vem(&toy_counts(), &VemArgs::with_topics(2, 1))?;

        for r in 0..model.doc_topic().nrows() {
            assert_relative_eq!(
                model.doc_topic().row(r).iter().sum::<f64>(),
                1.0,
                epsilon = 1e-8
            );
        }
        for r in 0..model.topic_term().nrows() {
            assert_relative_eq!(
                model.topic_term().row(r).iter().sum::<f64>(),
                1.0,
                epsilon = 1e-8
            );
        }
        assert!(model
            .doc_topic()
            .iter()
            .chain(model.topic_term().iter())
            .all(|&x| (0.0..=1.0).contains(&x)));
        assert!(model.log_evidence().is_finite());
        assert!(model.alpha() > 0.0);
        Ok(())
    }

    #[test]
    fn same_seed_same_fit() -> anyhow::Result<()> {
        let a = fit_lda_vem(&toy_counts(), &VemArgs::with_topics(2, 42))?;
        let b = fit_lda_vem(&toy_counts(), &VemArgs::with_topics(2, 42))?;

        assert_relative_eq!(
            (a.doc_topic() - b.doc_topic()).abs().max(),
            0.0,
            epsilon = 0.0
        );
        assert_relative_eq!(
            (a.topic_term() - b.topic_term()).abs().max(),
            0.0,
            epsilon = 0.0
        );
        assert_eq!(a.log_evidence(), b.log_evidence());
        Ok(())
    }

    #[test]
    fn separates_block_structure() -> anyhow::Result<()> {
        let model = fit_lda_vem(&toy_counts(), &VemArgs::with_topics(2, 7))?;

        // the first and last documents should be dominated by
        // different topics
        let argmax = |i: usize| -> usize {
            let row = model.doc_topic().row(i);
            (0..row.ncols())
                .max_by(|&a, &b| row[a].partial_cmp(&row[b]).unwrap())
                .unwrap()
        };
        assert_ne!(argmax(0), argmax(5));
        Ok(())
    }

    #[test]
    fn single_topic_is_degenerate_but_valid() -> anyhow::Result<()> {
        let model = fit_lda_vem(&toy_counts(), &VemArgs::with_topics(1, 1))?;
        for r in 0..model.doc_topic().nrows() {
            assert_relative_eq!(model.doc_topic()[(r, 0)], 1.0, epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn rejects_negative_counts() {
        let mat = Mat::from_row_slice(2, 2, &[1., -1., 0., 2.]);
        assert!(fit_lda_vem(&mat, &VemArgs::with_topics(2, 1)).is_err());
    }
}
