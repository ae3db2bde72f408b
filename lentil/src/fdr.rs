//! Benjamini-Hochberg false-discovery-rate adjustment.

/// Adjust a vector of p-values; `NaN` entries stay `NaN` and do not
/// count toward the number of tests.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..pvalues.len())
        .filter(|&i| pvalues[i].is_finite())
        .collect();
    order.sort_by(|&a, &b| pvalues[a].partial_cmp(&pvalues[b]).unwrap());

    let mm = order.len() as f64;
    let mut qvalues = vec![f64::NAN; pvalues.len()];

    let mut running_min = 1_f64;
    for (rank, &idx) in order.iter().enumerate().rev() {
        let q = (pvalues[idx] * mm / (rank as f64 + 1_f64)).min(1_f64);
        running_min = running_min.min(q);
        qvalues[idx] = running_min;
    }

    qvalues
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn matches_the_textbook_example() {
        // p.adjust(c(0.01, 0.02, 0.03, 0.04), method = "BH")
        let q = benjamini_hochberg(&[0.01, 0.02, 0.03, 0.04]);
        assert_relative_eq!(q[0], 0.04, epsilon = 1e-12);
        assert_relative_eq!(q[1], 0.04, epsilon = 1e-12);
        assert_relative_eq!(q[2], 0.04, epsilon = 1e-12);
        assert_relative_eq!(q[3], 0.04, epsilon = 1e-12);

        let q = benjamini_hochberg(&[0.001, 0.1, 0.5]);
        assert_relative_eq!(q[0], 0.003, epsilon = 1e-12);
        assert_relative_eq!(q[1], 0.15, epsilon = 1e-12);
        assert_relative_eq!(q[2], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn qvalues_dominate_pvalues_and_keep_order() {
        let p = [0.2, 0.004, 0.9, 0.031, 0.0007];
        let q = benjamini_hochberg(&p);

        for (pi, qi) in p.iter().zip(q.iter()) {
            assert!(qi >= pi);
            assert!(*qi <= 1.0);
        }

        // BH never reorders: smaller p never gets a larger q
        for i in 0..p.len() {
            for j in 0..p.len() {
                if p[i] < p[j] {
                    assert!(q[i] <= q[j]);
                }
            }
        }
    }

    #[test]
    fn missing_pvalues_stay_missing() {
        let p = [0.01, f64::NAN, 0.02];
        let q = benjamini_hochberg(&p);
        assert!(q[1].is_nan());
        // the NaN is not counted as a test
        assert_relative_eq!(q[0], 0.02, epsilon = 1e-12);
        assert_relative_eq!(q[2], 0.02, epsilon = 1e-12);
    }

    #[test]
    fn all_missing_is_a_noop() {
        let q = benjamini_hochberg(&[f64::NAN, f64::NAN]);
        assert!(q.iter().all(|v| v.is_nan()));
    }
}
