use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::genotyping::combinatorics::pairs_with_replacement;
use crate::genotyping::{AlleleKey, AlleleSummary};
use crate::GenotypingError;

/// Error rate used when none is configured.
pub const DEFAULT_TOTAL_ERROR_RATE: f64 = 0.01;

/// Kind of diploid call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CallKind {
    /// Both alleles match the reference.
    Ref,
    /// Both alleles share one non-reference length.
    Hom,
    /// The two alleles differ.
    Het,
}

impl CallKind {
    /// Classify an ordered allele pair.
    pub fn from_pair(a: AlleleKey, b: AlleleKey) -> Self {
        match (a == b, a == 0) {
            (true, true) => CallKind::Ref,
            (true, false) => CallKind::Hom,
            (false, _) => CallKind::Het,
        }
    }

    /// Lowercase label used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            CallKind::Ref => "ref",
            CallKind::Hom => "hom",
            CallKind::Het => "het",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ref" => Ok(CallKind::Ref),
            "hom" => Ok(CallKind::Hom),
            "het" => Ok(CallKind::Het),
            other => Err(format!("unknown call kind '{other}'")),
        }
    }
}

/// Maximum-likelihood diploid genotype at a locus.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GenotypeCall {
    /// Classification of the winning pair.
    pub kind: CallKind,
    /// Winning allele pair with `pair.0 <= pair.1`.
    pub pair: (AlleleKey, AlleleKey),
    /// Likelihood of the summary under the winning pair.
    pub likelihood: f64,
}

impl GenotypeCall {
    /// Genotype rendered as `a/b`.
    pub fn genotype(&self) -> String {
        format!("{}/{}", self.pair.0, self.pair.1)
    }
}

/// Uniform per-allele error model for a locus with `num_alleles` observed keys.
#[derive(Debug, Clone, Copy)]
struct ErrorModel {
    correct: f64,
    per_wrong_allele: f64,
}

impl ErrorModel {
    fn new(total_error_rate: f64, num_alleles: usize) -> Self {
        if num_alleles <= 1 {
            // nowhere for error mass to go
            return Self {
                correct: 1.0,
                per_wrong_allele: 0.0,
            };
        }
        Self {
            correct: 1.0 - total_error_rate,
            per_wrong_allele: total_error_rate / (num_alleles - 1) as f64,
        }
    }

    /// P(observe `observed` | true haplotype `truth`).
    fn haploid(&self, observed: AlleleKey, truth: AlleleKey) -> f64 {
        if observed == truth {
            self.correct
        } else {
            self.per_wrong_allele
        }
    }

    /// P(observe `observed` | genotype `{hap_a, hap_b}`), each haplotype equally likely.
    fn diploid(&self, observed: AlleleKey, hap_a: AlleleKey, hap_b: AlleleKey) -> f64 {
        0.5 * self.haploid(observed, hap_a) + 0.5 * self.haploid(observed, hap_b)
    }
}

/// Reject error rates outside the open interval (0, 1).
pub fn validate_error_rate(total_error_rate: f64) -> Result<(), GenotypingError> {
    if total_error_rate > 0.0 && total_error_rate < 1.0 {
        Ok(())
    } else {
        Err(GenotypingError::InvalidErrorRate(total_error_rate))
    }
}

/// Relative slack under which two log-likelihoods count as tied.
const TIE_TOLERANCE: f64 = 1e-12;

/// Natural-log likelihood of `alleles` under genotype `{hap_a, hap_b}`.
///
/// Terms are summed in sorted order so hypotheses with the same multiset of
/// per-allele terms score bit-identically.
fn log_likelihood(
    alleles: &AlleleSummary,
    model: &ErrorModel,
    hap_a: AlleleKey,
    hap_b: AlleleKey,
    terms: &mut Vec<f64>,
) -> f64 {
    terms.clear();
    terms.extend(
        alleles
            .iter()
            .map(|(&key, stats)| f64::from(stats.count) * model.diploid(key, hap_a, hap_b).ln()),
    );
    terms.sort_by(f64::total_cmp);
    terms.iter().sum()
}

fn beats(score: f64, best_score: f64) -> bool {
    score - best_score > TIE_TOLERANCE * best_score.abs().max(1.0)
}

/// Pick the maximum-likelihood diploid genotype from an allele summary.
///
/// Every unordered pair of observed keys (with repetition) is scored as a
/// multinomial product over reads with no genotype prior. Pairs are
/// enumerated over ascending keys; a later pair replaces the current best
/// only when it scores higher by more than rounding noise, so the first of
/// any tied pairs wins.
pub fn call_genotype(
    alleles: &AlleleSummary,
    total_error_rate: f64,
) -> Result<GenotypeCall, GenotypingError> {
    validate_error_rate(total_error_rate)?;
    if alleles.is_empty() {
        return Err(GenotypingError::EmptyLocus);
    }

    let keys: Vec<AlleleKey> = alleles.keys().collect();
    let model = ErrorModel::new(total_error_rate, keys.len());

    let mut terms = Vec::with_capacity(keys.len());
    let mut best: Option<((AlleleKey, AlleleKey), f64)> = None;
    for (&hap_a, &hap_b) in pairs_with_replacement(&keys) {
        let score = log_likelihood(alleles, &model, hap_a, hap_b, &mut terms);
        match best {
            Some((_, best_score)) if !beats(score, best_score) => {}
            _ => best = Some(((hap_a, hap_b), score)),
        }
    }

    let (pair, score) = best.ok_or(GenotypingError::EmptyLocus)?;
    Ok(GenotypeCall {
        kind: CallKind::from_pair(pair.0, pair.1),
        pair,
        likelihood: score.exp(),
    })
}
