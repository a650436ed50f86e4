//! Repeat loci and the per-read observations made across them.
//!
//! Loci normally come from an external iterator that joins aligned reads
//! against a reference repeat database. [`TsvLocusReader`] reads the
//! tab-delimited form of that stream.

mod reader;
mod types;

pub use reader::{parse_locus_line, LocusParseError, TsvLocusReader};
pub use types::{Locus, ReadObservation, Strand, UnitClass, MAX_MAPQ};
