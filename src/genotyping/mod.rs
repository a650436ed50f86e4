//! Per-locus statistical core: allele summaries, diploid genotype calls and
//! stutter discrimination.
//!
//! Every function here works on a single locus and holds no state between
//! calls, so loci can be processed in any order or in parallel.

mod caller;
mod combinatorics;
mod statistics;
mod stutter;
mod summary;

pub use caller::{
    call_genotype, validate_error_rate, CallKind, GenotypeCall, DEFAULT_TOTAL_ERROR_RATE,
};
pub use combinatorics::{pairs_with_replacement, PairsWithReplacement};
pub use statistics::binomial_test;
pub use stutter::{
    classify_stutter, validate_threshold, StutterClass, StutterPolicy, StutterVerdict,
    DEFAULT_SIGNIFICANCE_THRESHOLD,
};
pub use summary::{summarize, summarize_observed, AlleleKey, AlleleStats, AlleleSummary};
