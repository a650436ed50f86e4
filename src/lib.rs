//! # Short tandem repeat genotyping
//!
//! Infers, for each repeat locus, the observed allele lengths and the most
//! probable diploid genotype, and separates true heterozygosity from
//! polymerase stutter.
//!
//! ## Pipeline
//!
//! 1. **Allele summary**: reads are reduced to per-allele counts, strand
//!    balance and mean mapping quality, keyed by length offset from the
//!    reference.
//! 2. **Genotype call**: every diploid pair of observed alleles is scored
//!    under a uniform error model; the maximum-likelihood pair wins.
//! 3. **Stutter discrimination**: a two-sided binomial test on the two
//!    best-supported alleles decides heterozygous vs. stutter.
//!
//! Loci are independent, so the [`GenotypingEngine`] runs them in parallel.
//!
//! ## Usage Example
//!
//! ```
//! use strtyper::genotyping::{call_genotype, summarize, CallKind};
//! use strtyper::locus::{ReadObservation, Strand};
//!
//! let reads = vec![
//!     ReadObservation::new(0, Strand::Forward, 60),
//!     ReadObservation::new(0, Strand::Reverse, 60),
//!     ReadObservation::new(3, Strand::Forward, 60),
//! ];
//! let alleles = summarize(&reads);
//! let call = call_genotype(&alleles, 0.01)?;
//! assert_eq!(call.kind, CallKind::Het);
//! # Ok::<(), strtyper::GenotypingError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod engine;     // Parallel per-locus pipeline
pub mod genotyping; // Allele summaries, genotype calls, stutter tests
pub mod locus;      // Loci, read observations, tab-delimited input
pub mod report;     // Report rows and stutter accumulators
/// Python bindings for exposing the genotyping core to external runtimes.
#[cfg(feature = "python-bindings")]
pub mod python_bindings;

// Re-exports for convenience
pub use engine::GenotypingEngine;
pub use genotyping::{
    AlleleSummary, CallKind, GenotypeCall, StutterClass, StutterPolicy, StutterVerdict,
};
pub use locus::{Locus, ReadObservation, Strand, UnitClass};
pub use report::LocusReport;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration parameters for genotyping
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GenotypingConfig {
    /// Probability that a read reports the wrong allele, in (0, 1)
    pub total_error_rate: f64,

    /// P-value cutoff below which the top two alleles are called stutter
    pub significance_threshold: f64,

    /// Stutter attribution policy
    pub stutter_policy: StutterPolicy,
}

impl Default for GenotypingConfig {
    fn default() -> Self {
        Self {
            total_error_rate: genotyping::DEFAULT_TOTAL_ERROR_RATE,
            significance_threshold: genotyping::DEFAULT_SIGNIFICANCE_THRESHOLD,
            stutter_policy: StutterPolicy::Binomial,
        }
    }
}

impl GenotypingConfig {
    /// Set the genotype caller's error rate.
    pub fn with_error_rate(mut self, total_error_rate: f64) -> Self {
        self.total_error_rate = total_error_rate;
        self
    }

    /// Set the stutter test's significance threshold.
    pub fn with_significance_threshold(mut self, significance_threshold: f64) -> Self {
        self.significance_threshold = significance_threshold;
        self
    }

    /// Choose between the binomial test and the all-but-top policy.
    pub fn with_binomial_stutter_test(mut self, enabled: bool) -> Self {
        self.stutter_policy = if enabled {
            StutterPolicy::Binomial
        } else {
            StutterPolicy::AllButTop
        };
        self
    }

    /// Whether stutter is decided by the binomial test.
    pub fn use_binomial_stutter_test(&self) -> bool {
        self.stutter_policy == StutterPolicy::Binomial
    }

    /// Check every parameter is in range.
    pub fn validate(&self) -> Result<(), GenotypingError> {
        genotyping::validate_error_rate(self.total_error_rate)?;
        genotyping::validate_threshold(self.significance_threshold)
    }
}

/// Errors that can occur during genotyping
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenotypingError {
    /// Genotype calling needs at least one observed allele
    #[error("locus has no observed alleles")]
    EmptyLocus,

    /// Error rate outside the open interval (0, 1)
    #[error("total error rate {0} must lie strictly between 0 and 1")]
    InvalidErrorRate(f64),

    /// Significance threshold outside [0, 1]
    #[error("significance threshold {0} must lie within [0, 1]")]
    InvalidThreshold(f64),

    /// Mapping quality above the Phred cap of 60
    #[error("mapping quality {0} exceeds 60")]
    InvalidMapq(u8),

    /// Observed length too far from the reference to key an allele
    #[error("length offset {0} does not fit an allele key")]
    AlleleKeyOutOfRange(i64),

    /// Binomial test undefined for the given counts
    #[error("binomial test undefined for {successes} of {trials} reads")]
    UndefinedStutterTest {
        /// Reads on the best-supported allele
        successes: u64,
        /// Reads on the two best-supported alleles
        trials: u64,
    },

    /// Allele summary text could not be parsed
    #[error("malformed allele summary: {0}")]
    MalformedSummary(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GenotypingConfig::default();
        assert_eq!(config.total_error_rate, 0.01);
        assert_eq!(config.significance_threshold, 0.05);
        assert!(config.use_binomial_stutter_test());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = GenotypingConfig::default().with_significance_threshold(1.5);
        assert_eq!(config.validate(), Err(GenotypingError::InvalidThreshold(1.5)));

        let config = GenotypingConfig::default().with_error_rate(1.0);
        assert_eq!(config.validate(), Err(GenotypingError::InvalidErrorRate(1.0)));

        let config = GenotypingConfig::default().with_binomial_stutter_test(false);
        assert_eq!(config.stutter_policy, StutterPolicy::AllButTop);
    }
}
