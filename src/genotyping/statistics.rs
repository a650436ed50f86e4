use statrs::distribution::{Binomial, Discrete, DiscreteCDF};

/// Relative tolerance when comparing outcome probabilities against the observed one.
const PMF_RELATIVE_TOLERANCE: f64 = 1e-7;

/// Two-sided exact binomial test.
///
/// Returns the probability, under `Binomial(trials, p)`, of an outcome at
/// least as unlikely as `successes`. Returns `None` when `successes > trials`
/// or `p` is not a probability. Zero trials give a p-value of 1.
pub fn binomial_test(successes: u64, trials: u64, p: f64) -> Option<f64> {
    if successes > trials || !(0.0..=1.0).contains(&p) {
        return None;
    }
    if trials == 0 {
        return Some(1.0);
    }
    let distribution = Binomial::new(p, trials).ok()?;

    if p == 0.5 {
        let tail = successes.min(trials - successes);
        return Some((2.0 * distribution.cdf(tail)).min(1.0));
    }

    let observed = distribution.pmf(successes) * (1.0 + PMF_RELATIVE_TOLERANCE);
    let pvalue: f64 = (0..=trials)
        .map(|k| distribution.pmf(k))
        .filter(|&prob| prob <= observed)
        .sum();
    Some(pvalue.min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_counts_give_unit_pvalue() {
        assert_eq!(binomial_test(50, 100, 0.5), Some(1.0));
        assert_eq!(binomial_test(1, 2, 0.5), Some(1.0));
    }

    #[test]
    fn lopsided_counts_are_significant() {
        // 2 * (1 + 21) / 2^21
        let pvalue = binomial_test(20, 21, 0.5).unwrap();
        let expected = 44.0 / 2f64.powi(21);
        assert!((pvalue / expected - 1.0).abs() < 1e-9);
        assert_eq!(binomial_test(1, 21, 0.5), Some(pvalue));
    }

    #[test]
    fn known_value_for_small_sample() {
        // scipy.stats.binomtest(3, 10, 0.5) -> 0.34375
        let pvalue = binomial_test(3, 10, 0.5).unwrap();
        assert!((pvalue - 0.34375).abs() < 1e-9);
    }

    #[test]
    fn asymmetric_null_sums_unlikely_outcomes() {
        // pmf = [0.3164, 0.4219, 0.2109, 0.0469, 0.0039]; outcomes <= pmf(0) sum to 0.578125
        let pvalue = binomial_test(0, 4, 0.25).unwrap();
        assert!((pvalue - 0.578125).abs() < 1e-9);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert_eq!(binomial_test(5, 4, 0.5), None);
        assert_eq!(binomial_test(1, 4, 1.5), None);
        assert_eq!(binomial_test(0, 0, 0.5), Some(1.0));
    }
}
