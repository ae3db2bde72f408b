//! Simulate counts with a planted factored structure:
//!
//! ```text
//! Y(g, c) ~ Poisson( depth * sum_k beta(g, k) * theta(k, c) )
//! ```
//!
//! where the dictionary `beta` and the proportions `theta` are
//! column-normalized gamma draws.

use crate::common::*;

use matrix_util::dmatrix_util::rgamma_seeded;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson};

#[derive(Debug, Clone)]
pub struct SimArgs {
    /// number of genes
    pub rows: usize,
    /// number of cells
    pub cols: usize,
    /// number of planted topics
    pub factors: usize,
    /// expected total count per cell
    pub depth: f64,
    pub rseed: u64,
}

impl Default for SimArgs {
    fn default() -> Self {
        Self {
            rows: 100,
            cols: 500,
            factors: DEFAULT_NUM_TOPICS,
            depth: 1e3,
            rseed: 42,
        }
    }
}

pub struct SimOut {
    /// `gene x cell` counts
    pub counts_gc: Mat,
    /// `gene x topic` dictionary, columns sum to one
    pub beta_gk: Mat,
    /// `topic x cell` proportions, columns sum to one
    pub theta_kc: Mat,
}

pub fn generate_factored_poisson_gamma_data(args: &SimArgs) -> anyhow::Result<SimOut> {
    let dd = args.rows;
    let nn = args.cols;
    let kk = args.factors;

    if dd < 1 || nn < 1 || kk < 1 {
        anyhow::bail!("empty simulation dimensions");
    }
    if !(args.depth.is_finite() && args.depth > 0_f64) {
        anyhow::bail!("sequencing depth must be positive");
    }

    let mut rng = StdRng::seed_from_u64(args.rseed);

    // sparse-ish dictionary over genes, dense proportions over cells
    let mut beta_gk = rgamma_seeded(dd, kk, (0.5, 1.0), &mut rng);
    beta_gk.sum_to_one_columns_inplace();

    let mut theta_kc = rgamma_seeded(kk, nn, (1.0, 1.0), &mut rng);
    theta_kc.sum_to_one_columns_inplace();

    let lambda_gc = (&beta_gk * &theta_kc) * args.depth;

    let counts_gc = Mat::from_fn(dd, nn, |g, c| {
        let rate = lambda_gc[(g, c)].max(1e-8);
        let pois = Poisson::new(rate).expect("poisson rate");
        pois.sample(&mut rng)
    });

    Ok(SimOut {
        counts_gc,
        beta_gk,
        theta_kc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn counts_are_non_negative_integers() -> anyhow::Result<()> {
        let sim = generate_factored_poisson_gamma_data(&SimArgs {
            rows: 20,
            cols: 30,
            factors: 2,
            depth: 100.0,
            rseed: 1,
        })?;

        assert_eq!(sim.counts_gc.nrows(), 20);
        assert_eq!(sim.counts_gc.ncols(), 30);
        assert!(sim
            .counts_gc
            .iter()
            .all(|&x| x >= 0.0 && x.fract() == 0.0));

        for k in 0..2 {
            assert_relative_eq!(
                sim.beta_gk.column(k).iter().sum::<f64>(),
                1.0,
                epsilon = 1e-8
            );
        }
        Ok(())
    }

    #[test]
    fn same_seed_same_data() -> anyhow::Result<()> {
        let args = SimArgs {
            rows: 10,
            cols: 10,
            factors: 2,
            depth: 50.0,
            rseed: 7,
        };
        let a = generate_factored_poisson_gamma_data(&args)?;
        let b = generate_factored_poisson_gamma_data(&args)?;
        assert_eq!(a.counts_gc, b.counts_gc);
        Ok(())
    }
}
