use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::genotyping::{AlleleSummary, StutterClass, StutterVerdict};
use crate::locus::UnitClass;

/// Read and locus totals for one `(unit, reference length)` bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StutterCounts {
    /// Reads across all loci in the bucket.
    pub total_reads: u64,
    /// Reads attributed to stutter.
    pub stutter_reads: u64,
    /// Loci in the bucket.
    pub total_loci: u64,
    /// Loci with at least one stutter read.
    pub stutter_loci: u64,
}

impl StutterCounts {
    fn add(&mut self, other: &Self) {
        self.total_reads += other.total_reads;
        self.stutter_reads += other.stutter_reads;
        self.total_loci += other.total_loci;
        self.stutter_loci += other.stutter_loci;
    }

    /// Fraction of reads attributed to stutter.
    pub fn stutter_read_fraction(&self) -> f64 {
        ratio(self.stutter_reads, self.total_reads)
    }

    /// Fraction of loci carrying stutter.
    pub fn stutter_locus_fraction(&self) -> f64 {
        ratio(self.stutter_loci, self.total_loci)
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Stutter rates bucketed by repeat unit class and reference length.
///
/// Each locus is recorded once; merging two distributions is commutative and
/// associative, so partial distributions built on separate threads can be
/// combined in any order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StutterDistribution {
    buckets: BTreeMap<(UnitClass, u32), StutterCounts>,
}

impl StutterDistribution {
    /// Empty distribution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one locus.
    pub fn record(
        &mut self,
        unit: UnitClass,
        reference_length: u32,
        alleles: &AlleleSummary,
        verdict: &StutterVerdict,
    ) {
        let counts = StutterCounts {
            total_reads: u64::from(alleles.total_reads()),
            stutter_reads: u64::from(verdict.stutter_reads),
            total_loci: 1,
            stutter_loci: u64::from(verdict.stutter_reads > 0),
        };
        self.buckets
            .entry((unit, reference_length))
            .or_default()
            .add(&counts);
    }

    /// Fold `other` into `self`.
    pub fn merge(mut self, other: Self) -> Self {
        for (bucket, counts) in other.buckets {
            self.buckets.entry(bucket).or_default().add(&counts);
        }
        self
    }

    /// Buckets ordered by unit class, then reference length.
    pub fn rows(&self) -> impl Iterator<Item = (UnitClass, u32, &StutterCounts)> + '_ {
        self.buckets
            .iter()
            .map(|(&(unit, reflen), counts)| (unit, reflen, counts))
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Tab-delimited table with a header row.
    pub fn render(&self) -> String {
        let mut out = String::from(
            "unit\treflen\tstutter_reads\ttotal_reads\tpercent_stutter_reads\t\
             stutter_loci\ttotal_loci\tpercent_stutter_loci\n",
        );
        for (unit, reflen, counts) in self.rows() {
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}\t{:.3}\t{}\t{}\t{:.3}",
                unit,
                reflen,
                counts.stutter_reads,
                counts.total_reads,
                counts.stutter_read_fraction(),
                counts.stutter_loci,
                counts.total_loci,
                counts.stutter_locus_fraction(),
            );
        }
        out
    }
}

/// Locus and read counts per stutter class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StutterTally {
    /// Loci recorded.
    pub total_loci: u64,
    /// Reads across all loci.
    pub total_reads: u64,
    /// Loci with a single allele.
    pub homozygous_loci: u64,
    /// Reads at single-allele loci.
    pub homozygous_reads: u64,
    /// Loci whose top two alleles look balanced.
    pub heterozygous_loci: u64,
    /// Reads on the top two alleles of heterozygous loci.
    pub heterozygous_reads: u64,
    /// Loci classified as stutter.
    pub stutter_loci: u64,
    /// Reads attributed to stutter at stutter loci.
    pub stutter_reads: u64,
}

impl StutterTally {
    /// Empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one locus.
    pub fn record(&mut self, alleles: &AlleleSummary, verdict: &StutterVerdict) {
        let reads = u64::from(alleles.total_reads());
        self.total_loci += 1;
        self.total_reads += reads;
        match verdict.class {
            StutterClass::Homozygous => {
                self.homozygous_loci += 1;
                self.homozygous_reads += reads;
            }
            StutterClass::Heterozygous => {
                self.heterozygous_loci += 1;
                self.heterozygous_reads += alleles
                    .ranked_by_support()
                    .iter()
                    .take(2)
                    .map(|(_, stats)| u64::from(stats.count))
                    .sum::<u64>();
            }
            StutterClass::Stutter => {
                self.stutter_loci += 1;
                self.stutter_reads += u64::from(verdict.stutter_reads);
            }
        }
    }

    /// Fold `other` into `self`.
    pub fn merge(self, other: Self) -> Self {
        Self {
            total_loci: self.total_loci + other.total_loci,
            total_reads: self.total_reads + other.total_reads,
            homozygous_loci: self.homozygous_loci + other.homozygous_loci,
            homozygous_reads: self.homozygous_reads + other.homozygous_reads,
            heterozygous_loci: self.heterozygous_loci + other.heterozygous_loci,
            heterozygous_reads: self.heterozygous_reads + other.heterozygous_reads,
            stutter_loci: self.stutter_loci + other.stutter_loci,
            stutter_reads: self.stutter_reads + other.stutter_reads,
        }
    }

    /// Human-readable summary lines.
    pub fn render(&self, significance_threshold: f64) -> String {
        format!(
            "binom threshold: {:.3}\n\
             hom: {}\nhet: {}\nstutter: {}\ntotal: {}\n\
             reads hom: {}\nreads het: {}\nreads stutter: {}\nreads total: {}\n",
            significance_threshold,
            self.homozygous_loci,
            self.heterozygous_loci,
            self.stutter_loci,
            self.total_loci,
            self.homozygous_reads,
            self.heterozygous_reads,
            self.stutter_reads,
            self.total_reads,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotyping::{classify_stutter, summarize, StutterPolicy};
    use crate::locus::{ReadObservation, Strand};

    fn alleles(counts: &[(i32, u32)]) -> AlleleSummary {
        let reads: Vec<ReadObservation> = counts
            .iter()
            .flat_map(|&(key, n)| {
                (0..n).map(move |_| ReadObservation::new(key, Strand::Forward, 60))
            })
            .collect();
        summarize(&reads)
    }

    fn verdict(alleles: &AlleleSummary) -> StutterVerdict {
        classify_stutter(alleles, 0.05, StutterPolicy::Binomial).unwrap()
    }

    #[test]
    fn buckets_by_unit_and_length() {
        let mut dist = StutterDistribution::new();
        let stuttered = alleles(&[(0, 20), (2, 1)]);
        let clean = alleles(&[(0, 5)]);
        dist.record(UnitClass::Di, 12, &stuttered, &verdict(&stuttered));
        dist.record(UnitClass::Di, 12, &clean, &verdict(&clean));
        dist.record(UnitClass::Mono, 8, &clean, &verdict(&clean));

        let rows: Vec<_> = dist.rows().map(|(u, l, c)| (u, l, *c)).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, UnitClass::Mono);
        let (_, _, di) = rows[1];
        assert_eq!(di.total_reads, 26);
        assert_eq!(di.stutter_reads, 1);
        assert_eq!(di.total_loci, 2);
        assert_eq!(di.stutter_loci, 1);
        assert!(dist.render().contains("di\t12\t1\t26\t0.038\t1\t2\t0.500"));
    }

    #[test]
    fn merge_is_order_independent() {
        let a_alleles = alleles(&[(0, 10), (1, 10)]);
        let b_alleles = alleles(&[(0, 30), (-1, 2), (3, 1)]);

        let mut a = StutterDistribution::new();
        a.record(UnitClass::Tri, 9, &a_alleles, &verdict(&a_alleles));
        let mut b = StutterDistribution::new();
        b.record(UnitClass::Tri, 9, &b_alleles, &verdict(&b_alleles));

        assert_eq!(a.clone().merge(b.clone()), b.merge(a));
    }

    #[test]
    fn tally_splits_reads_by_class() {
        let mut tally = StutterTally::new();
        for counts in [&[(0, 10)][..], &[(0, 8), (2, 7), (4, 1)][..], &[(0, 20), (-2, 1)][..]] {
            let a = alleles(counts);
            tally.record(&a, &verdict(&a));
        }
        assert_eq!(tally.total_loci, 3);
        assert_eq!(tally.total_reads, 47);
        assert_eq!((tally.homozygous_loci, tally.homozygous_reads), (1, 10));
        assert_eq!((tally.heterozygous_loci, tally.heterozygous_reads), (1, 15));
        assert_eq!((tally.stutter_loci, tally.stutter_reads), (1, 1));

        let doubled = tally.merge(tally);
        assert_eq!(doubled.total_reads, 94);
        assert!(tally.render(0.05).starts_with("binom threshold: 0.050\nhom: 1\n"));
    }
}
