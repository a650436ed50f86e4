use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::locus::{ReadObservation, Strand, MAX_MAPQ};
use crate::GenotypingError;

/// Identity of an allele: observed repeat length minus the reference length.
pub type AlleleKey = i32;

/// Support statistics for one allele at a locus.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlleleStats {
    /// Number of reads supporting the allele (always >= 1).
    pub count: u32,
    /// Fraction of supporting reads on the forward strand.
    pub frac_forward: f64,
    /// Mean mapping quality of supporting reads.
    pub mean_mapq: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct AlleleAccumulator {
    count: u32,
    forward: u32,
    mapq_sum: u64,
}

impl AlleleAccumulator {
    fn observe(&mut self, strand: Strand, mapq: u8) {
        self.count += 1;
        self.forward += u32::from(strand.is_forward());
        // struct literals can bypass the constructor's cap
        self.mapq_sum += u64::from(mapq.min(MAX_MAPQ));
    }

    fn finish(self) -> AlleleStats {
        let n = f64::from(self.count);
        AlleleStats {
            count: self.count,
            frac_forward: f64::from(self.forward) / n,
            mean_mapq: self.mapq_sum as f64 / n,
        }
    }
}

/// Per-allele read support at a single locus, ordered by ascending key.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlleleSummary {
    alleles: BTreeMap<AlleleKey, AlleleStats>,
}

impl AlleleSummary {
    /// Summary with no alleles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the statistics for `key`.
    pub fn insert(&mut self, key: AlleleKey, stats: AlleleStats) {
        self.alleles.insert(key, stats);
    }

    /// Statistics for `key`, if observed.
    pub fn get(&self, key: AlleleKey) -> Option<&AlleleStats> {
        self.alleles.get(&key)
    }

    /// Number of distinct alleles.
    pub fn len(&self) -> usize {
        self.alleles.len()
    }

    /// Whether no allele was observed.
    pub fn is_empty(&self) -> bool {
        self.alleles.is_empty()
    }

    /// Allele keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = AlleleKey> + '_ {
        self.alleles.keys().copied()
    }

    /// `(key, stats)` pairs in ascending key order.
    pub fn iter(&self) -> btree_map::Iter<'_, AlleleKey, AlleleStats> {
        self.alleles.iter()
    }

    /// Sum of read counts over all alleles.
    pub fn total_reads(&self) -> u32 {
        self.alleles.values().map(|stats| stats.count).sum()
    }

    /// Alleles ordered by descending support, ties broken by ascending key.
    pub fn ranked_by_support(&self) -> Vec<(AlleleKey, AlleleStats)> {
        let mut ranked: Vec<_> = self.alleles.iter().map(|(&k, &s)| (k, s)).collect();
        ranked.sort_by(|(ka, sa), (kb, sb)| sb.count.cmp(&sa.count).then(ka.cmp(kb)));
        ranked
    }
}

impl<'a> IntoIterator for &'a AlleleSummary {
    type Item = (&'a AlleleKey, &'a AlleleStats);
    type IntoIter = btree_map::Iter<'a, AlleleKey, AlleleStats>;

    fn into_iter(self) -> Self::IntoIter {
        self.alleles.iter()
    }
}

/// Reduce a locus's reads to per-allele support statistics.
///
/// Keys are the reads' `length_delta`, already relative to the reference, so
/// no reference length is taken here; use [`summarize_observed`] for raw
/// observed lengths. An empty read list yields an empty summary.
pub fn summarize(reads: &[ReadObservation]) -> AlleleSummary {
    accumulate(
        reads
            .iter()
            .map(|read| (read.length_delta, read.strand, read.mapq)),
    )
}

/// Summarize raw observed repeat lengths, keyed by offset from the reference.
///
/// Fails with [`GenotypingError::AlleleKeyOutOfRange`] when an offset does not
/// fit an [`AlleleKey`].
pub fn summarize_observed<I>(
    reads: I,
    reference_length: u32,
) -> Result<AlleleSummary, GenotypingError>
where
    I: IntoIterator<Item = (u32, Strand, u8)>,
{
    let reference_length = i64::from(reference_length);
    let mut acc = Accumulators::new();
    for (observed, strand, mapq) in reads {
        let delta = i64::from(observed) - reference_length;
        let key = AlleleKey::try_from(delta)
            .map_err(|_| GenotypingError::AlleleKeyOutOfRange(delta))?;
        acc.observe(key, strand, mapq);
    }
    Ok(acc.finish())
}

fn accumulate<I>(reads: I) -> AlleleSummary
where
    I: Iterator<Item = (AlleleKey, Strand, u8)>,
{
    let mut acc = Accumulators::new();
    for (key, strand, mapq) in reads {
        acc.observe(key, strand, mapq);
    }
    acc.finish()
}

struct Accumulators(BTreeMap<AlleleKey, AlleleAccumulator>);

impl Accumulators {
    fn new() -> Self {
        Self(BTreeMap::new())
    }

    fn observe(&mut self, key: AlleleKey, strand: Strand, mapq: u8) {
        self.0.entry(key).or_default().observe(strand, mapq);
    }

    fn finish(self) -> AlleleSummary {
        AlleleSummary {
            alleles: self.0.into_iter().map(|(k, a)| (k, a.finish())).collect(),
        }
    }
}

impl fmt::Display for AlleleSummary {
    /// `key:count,frac_forward,mean_mapq` per allele, space separated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (key, stats)) in self.alleles.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(
                f,
                "{}:{},{:.6},{:.6}",
                key, stats.count, stats.frac_forward, stats.mean_mapq
            )?;
        }
        Ok(())
    }
}

impl FromStr for AlleleSummary {
    type Err = GenotypingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut summary = AlleleSummary::new();
        for token in s.split_whitespace() {
            let (key, stats) = parse_allele_token(token)
                .ok_or_else(|| GenotypingError::MalformedSummary(token.to_string()))?;
            if summary.alleles.insert(key, stats).is_some() {
                return Err(GenotypingError::MalformedSummary(format!(
                    "duplicate allele key {key}"
                )));
            }
        }
        Ok(summary)
    }
}

fn parse_allele_token(token: &str) -> Option<(AlleleKey, AlleleStats)> {
    let (key, info) = token.split_once(':')?;
    let mut parts = info.split(',');
    let count: u32 = parts.next()?.parse().ok()?;
    let frac_forward: f64 = parts.next()?.parse().ok()?;
    let mean_mapq: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some()
        || count == 0
        || !(0.0..=1.0).contains(&frac_forward)
        || !(0.0..=f64::from(MAX_MAPQ)).contains(&mean_mapq)
    {
        return None;
    }
    Some((
        key.parse().ok()?,
        AlleleStats {
            count,
            frac_forward,
            mean_mapq,
        },
    ))
}
