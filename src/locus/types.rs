use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::GenotypingError;

/// Highest mapping quality a read may carry.
pub const MAX_MAPQ: u8 = 60;

/// Strand a read was aligned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Strand {
    /// Forward (`+`) strand.
    Forward,
    /// Reverse (`-`) strand.
    Reverse,
}

impl Strand {
    /// Whether this is the forward strand.
    pub fn is_forward(self) -> bool {
        matches!(self, Strand::Forward)
    }

    /// Single-character symbol used in tab-delimited files.
    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl FromStr for Strand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            other => Err(format!("unknown strand '{other}'")),
        }
    }
}

/// Length class of the repeated motif.
///
/// Ordering follows motif length, which is the order reports are grouped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnitClass {
    /// 1 bp motif.
    Mono,
    /// 2 bp motif.
    Di,
    /// 3 bp motif.
    Tri,
    /// 4 bp motif.
    Tetra,
}

impl UnitClass {
    /// Motif length in base pairs.
    pub fn unit_len(self) -> u32 {
        match self {
            UnitClass::Mono => 1,
            UnitClass::Di => 2,
            UnitClass::Tri => 3,
            UnitClass::Tetra => 4,
        }
    }

    /// Lowercase name as written in repeat databases.
    pub fn as_str(self) -> &'static str {
        match self {
            UnitClass::Mono => "mono",
            UnitClass::Di => "di",
            UnitClass::Tri => "tri",
            UnitClass::Tetra => "tetra",
        }
    }
}

impl fmt::Display for UnitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mono" => Ok(UnitClass::Mono),
            "di" => Ok(UnitClass::Di),
            "tri" => Ok(UnitClass::Tri),
            "tetra" => Ok(UnitClass::Tetra),
            other => Err(format!("unknown repeat unit class '{other}'")),
        }
    }
}

/// One aligned read crossing a repeat locus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReadObservation {
    /// Observed repeat length minus the reference repeat length.
    pub length_delta: i32,
    /// Strand the read aligned to.
    pub strand: Strand,
    /// Mapping quality (Phred-scaled, 0..=60).
    pub mapq: u8,
}

impl ReadObservation {
    /// Construct a new observation, saturating `mapq` at [`MAX_MAPQ`].
    pub fn new(length_delta: i32, strand: Strand, mapq: u8) -> Self {
        Self {
            length_delta,
            strand,
            mapq: mapq.min(MAX_MAPQ),
        }
    }

    /// Construct a new observation, rejecting `mapq` above [`MAX_MAPQ`].
    pub fn try_new(length_delta: i32, strand: Strand, mapq: u8) -> Result<Self, GenotypingError> {
        if mapq > MAX_MAPQ {
            return Err(GenotypingError::InvalidMapq(mapq));
        }
        Ok(Self::new(length_delta, strand, mapq))
    }
}

/// A reference repeat site with the reads observed across it.
#[derive(Debug, Clone, PartialEq)]
pub struct Locus {
    /// Chromosome/contig name.
    pub chrom: Arc<str>,
    /// 1-based inclusive start of the repeat.
    pub start: u32,
    /// 1-based inclusive end of the repeat.
    pub end: u32,
    /// Repeat motif length class.
    pub unit: UnitClass,
    /// Genomic region annotation (e.g. `intronic`).
    pub region: Arc<str>,
    /// Per-read observations in input order.
    pub reads: Vec<ReadObservation>,
}

impl Locus {
    /// Construct a locus record.
    pub fn new(
        chrom: impl Into<Arc<str>>,
        start: u32,
        end: u32,
        unit: UnitClass,
        region: impl Into<Arc<str>>,
        reads: Vec<ReadObservation>,
    ) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
            unit,
            region: region.into(),
            reads,
        }
    }

    /// Repeat length in the reference genome (`end - start + 1`).
    pub fn reference_length(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_length_is_inclusive() {
        let locus = Locus::new("chr1", 100, 111, UnitClass::Di, "intergenic", vec![]);
        assert_eq!(locus.reference_length(), 12);
    }

    #[test]
    fn mapping_quality_is_capped() {
        assert_eq!(ReadObservation::new(0, Strand::Forward, 200).mapq, MAX_MAPQ);
        assert_eq!(ReadObservation::new(0, Strand::Forward, 37).mapq, 37);
        assert_eq!(
            ReadObservation::try_new(0, Strand::Reverse, 61),
            Err(GenotypingError::InvalidMapq(61))
        );
        assert!(ReadObservation::try_new(-2, Strand::Reverse, 60).is_ok());
    }

    #[test]
    fn unit_classes_order_by_motif_length() {
        let mut units: Vec<UnitClass> = ["tetra", "mono", "tri", "di"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        units.sort();
        assert_eq!(
            units,
            vec![UnitClass::Mono, UnitClass::Di, UnitClass::Tri, UnitClass::Tetra]
        );
        assert!("hexa".parse::<UnitClass>().is_err());
    }
}
