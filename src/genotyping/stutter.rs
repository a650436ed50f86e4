use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::genotyping::statistics::binomial_test;
use crate::genotyping::AlleleSummary;
use crate::GenotypingError;

/// Significance threshold used when none is configured.
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// How reads are attributed to polymerase stutter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StutterPolicy {
    /// Binomial test on the two best-supported alleles; the rest is stutter.
    #[default]
    Binomial,
    /// Every read off the best-supported allele is stutter.
    AllButTop,
}

/// Outcome of stutter discrimination at a locus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StutterClass {
    /// A single allele was observed.
    Homozygous,
    /// The two best alleles are consistent with equal support.
    Heterozygous,
    /// Secondary alleles are attributed to stutter.
    Stutter,
}

impl StutterClass {
    /// Lowercase label used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            StutterClass::Homozygous => "hom",
            StutterClass::Heterozygous => "het",
            StutterClass::Stutter => "stutter",
        }
    }
}

impl fmt::Display for StutterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StutterClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hom" => Ok(StutterClass::Homozygous),
            "het" => Ok(StutterClass::Heterozygous),
            "stutter" => Ok(StutterClass::Stutter),
            other => Err(format!("unknown stutter class '{other}'")),
        }
    }
}

/// Stutter classification plus the reads it attributes to stutter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StutterVerdict {
    /// Locus classification.
    pub class: StutterClass,
    /// Binomial p-value for the top two alleles, when a test was run.
    pub p_value: Option<f64>,
    /// Reads attributed to stutter.
    pub stutter_reads: u32,
}

impl StutterVerdict {
    fn homozygous() -> Self {
        Self {
            class: StutterClass::Homozygous,
            p_value: None,
            stutter_reads: 0,
        }
    }
}

/// Reject thresholds outside [0, 1].
pub fn validate_threshold(significance_threshold: f64) -> Result<(), GenotypingError> {
    if (0.0..=1.0).contains(&significance_threshold) {
        Ok(())
    } else {
        Err(GenotypingError::InvalidThreshold(significance_threshold))
    }
}

/// Two-sided p-value that `obs_a` and `obs_b` reads came from equally
/// supported alleles.
fn top_two_p_value(obs_a: u32, obs_b: u32) -> Result<f64, GenotypingError> {
    let successes = u64::from(obs_a);
    let trials = successes + u64::from(obs_b);
    binomial_test(successes, trials, 0.5)
        .ok_or(GenotypingError::UndefinedStutterTest { successes, trials })
}

/// Decide whether a locus's secondary alleles look like stutter.
///
/// Alleles are ranked by descending read count (ascending key on ties).
/// Under [`StutterPolicy::Binomial`], the top two counts are tested against
/// equal support; a p-value below `significance_threshold` marks the weaker
/// of the two as stutter. Alleles ranked third or lower are always stutter.
pub fn classify_stutter(
    alleles: &AlleleSummary,
    significance_threshold: f64,
    policy: StutterPolicy,
) -> Result<StutterVerdict, GenotypingError> {
    validate_threshold(significance_threshold)?;

    let ranked = alleles.ranked_by_support();
    if ranked.len() < 2 {
        return Ok(StutterVerdict::homozygous());
    }

    match policy {
        StutterPolicy::AllButTop => Ok(StutterVerdict {
            class: StutterClass::Stutter,
            p_value: None,
            stutter_reads: ranked[1..].iter().map(|(_, stats)| stats.count).sum(),
        }),
        StutterPolicy::Binomial => {
            let obs_a = ranked[0].1.count;
            let obs_b = ranked[1].1.count;
            let tail: u32 = ranked[2..].iter().map(|(_, stats)| stats.count).sum();

            let p_value = top_two_p_value(obs_a, obs_b)?;

            let (class, top_two_stutter) = if p_value < significance_threshold {
                (StutterClass::Stutter, obs_a.min(obs_b))
            } else {
                (StutterClass::Heterozygous, 0)
            };
            Ok(StutterVerdict {
                class,
                p_value: Some(p_value),
                stutter_reads: top_two_stutter + tail,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotyping::{AlleleKey, AlleleStats};

    fn summary(counts: &[(AlleleKey, u32)]) -> AlleleSummary {
        let mut summary = AlleleSummary::new();
        for &(key, count) in counts {
            summary.insert(
                key,
                AlleleStats {
                    count,
                    frac_forward: 1.0,
                    mean_mapq: 60.0,
                },
            );
        }
        summary
    }

    #[test]
    fn single_allele_is_homozygous() {
        let verdict = classify_stutter(&summary(&[(0, 10)]), 0.05, StutterPolicy::Binomial).unwrap();
        assert_eq!(verdict.class, StutterClass::Homozygous);
        assert_eq!(verdict.stutter_reads, 0);
        assert_eq!(verdict.p_value, None);
    }

    #[test]
    fn balanced_pair_is_heterozygous() {
        let verdict =
            classify_stutter(&summary(&[(0, 50), (2, 50)]), 0.05, StutterPolicy::Binomial).unwrap();
        assert_eq!(verdict.class, StutterClass::Heterozygous);
        assert_eq!(verdict.p_value, Some(1.0));
        assert_eq!(verdict.stutter_reads, 0);
    }

    #[test]
    fn lopsided_pair_is_stutter() {
        let verdict =
            classify_stutter(&summary(&[(0, 100), (-1, 1)]), 0.05, StutterPolicy::Binomial).unwrap();
        assert_eq!(verdict.class, StutterClass::Stutter);
        assert!(verdict.p_value.unwrap() < 0.05);
        assert_eq!(verdict.stutter_reads, 1);
    }

    #[test]
    fn alleles_past_the_top_two_are_always_stutter() {
        let alleles = summary(&[(-2, 3), (0, 12), (2, 10), (4, 1)]);
        let verdict = classify_stutter(&alleles, 0.05, StutterPolicy::Binomial).unwrap();
        assert_eq!(verdict.class, StutterClass::Heterozygous);
        assert_eq!(verdict.stutter_reads, 4);
    }

    #[test]
    fn all_but_top_counts_every_secondary_read() {
        let alleles = summary(&[(-2, 3), (0, 12), (2, 10), (4, 1)]);
        let verdict = classify_stutter(&alleles, 0.05, StutterPolicy::AllButTop).unwrap();
        assert_eq!(verdict.class, StutterClass::Stutter);
        assert_eq!(verdict.p_value, None);
        assert_eq!(verdict.stutter_reads, 14);
    }

    #[test]
    fn top_two_p_value_matches_exact_test() {
        assert_eq!(top_two_p_value(50, 50), Ok(1.0));
        let p_value = top_two_p_value(20, 1).unwrap();
        let expected = 44.0 / f64::from(1u32 << 21);
        assert!((p_value - expected).abs() <= 1e-9 * expected);
    }

    #[test]
    fn threshold_is_validated() {
        let alleles = summary(&[(0, 1)]);
        for threshold in [-0.01, 1.01, f64::NAN] {
            assert!(matches!(
                classify_stutter(&alleles, threshold, StutterPolicy::Binomial),
                Err(GenotypingError::InvalidThreshold(_))
            ));
        }
        assert!(classify_stutter(&alleles, 0.0, StutterPolicy::Binomial).is_ok());
        assert!(classify_stutter(&alleles, 1.0, StutterPolicy::Binomial).is_ok());
    }
}
