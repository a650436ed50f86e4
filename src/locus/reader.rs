use std::io::BufRead;
use std::str::FromStr;

use thiserror::Error;

use crate::locus::{Locus, ReadObservation, Strand, UnitClass, MAX_MAPQ};

const NUM_FIELDS: usize = 8;

/// Errors raised while reading tab-delimited locus records.
#[derive(Debug, Error)]
pub enum LocusParseError {
    /// Row has fewer columns than expected.
    #[error("line {line}: expected {expected} tab-delimited fields, found {found}")]
    MissingField {
        /// 1-based line number.
        line: usize,
        /// Number of fields required.
        expected: usize,
        /// Number of fields present.
        found: usize,
    },

    /// A column could not be parsed.
    #[error("line {line}: invalid {field}: {reason}")]
    InvalidField {
        /// 1-based line number.
        line: usize,
        /// Column name.
        field: &'static str,
        /// Parser message.
        reason: String,
    },

    /// Per-read lists disagree on the number of reads.
    #[error("line {line}: {lengths} lengths, {strands} strands and {mapqs} mapqs")]
    LengthMismatch {
        /// 1-based line number.
        line: usize,
        /// Entries in the length list.
        lengths: usize,
        /// Entries in the strand list.
        strands: usize,
        /// Entries in the mapq list.
        mapqs: usize,
    },

    /// Underlying reader failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Streaming reader over per-locus read lists.
///
/// Each row holds `chrom, start, end, unit, region, lengths, strands, mapqs`,
/// where the last three columns are comma-separated lists with one entry per
/// read: observed repeat length in bp, `+`/`-`, and mapping quality.
#[derive(Debug)]
pub struct TsvLocusReader<R> {
    inner: R,
    line_no: usize,
    buffer: String,
}

impl<R: BufRead> TsvLocusReader<R> {
    /// Wrap a buffered reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line_no: 0,
            buffer: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for TsvLocusReader<R> {
    type Item = Result<Locus, LocusParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            match self.inner.read_line(&mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => return Some(Err(err.into())),
            }
            self.line_no += 1;

            let line = self.buffer.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            if self.line_no == 1 && line.starts_with("chrom\t") {
                continue;
            }
            return Some(parse_locus_line(line, self.line_no));
        }
    }
}

/// Parse one tab-delimited locus row.
pub fn parse_locus_line(line: &str, line_no: usize) -> Result<Locus, LocusParseError> {
    let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
    if fields.len() < NUM_FIELDS {
        return Err(LocusParseError::MissingField {
            line: line_no,
            expected: NUM_FIELDS,
            found: fields.len(),
        });
    }

    let start: u32 = parse_field(fields[1], line_no, "start")?;
    let end: u32 = parse_field(fields[2], line_no, "end")?;
    if end < start {
        return Err(LocusParseError::InvalidField {
            line: line_no,
            field: "end",
            reason: format!("end {end} precedes start {start}"),
        });
    }
    let unit: UnitClass = parse_field(fields[3], line_no, "unit")?;

    let lengths: Vec<i64> = parse_list(fields[5], line_no, "lengths")?;
    let strands: Vec<Strand> = parse_list(fields[6], line_no, "strands")?;
    let mapqs: Vec<u8> = parse_list(fields[7], line_no, "mapqs")?;
    if lengths.len() != strands.len() || lengths.len() != mapqs.len() {
        return Err(LocusParseError::LengthMismatch {
            line: line_no,
            lengths: lengths.len(),
            strands: strands.len(),
            mapqs: mapqs.len(),
        });
    }

    let mut locus = Locus::new(fields[0], start, end, unit, fields[4], Vec::new());
    let reference_length = i64::from(locus.reference_length());
    let mut reads = Vec::with_capacity(lengths.len());
    for ((observed, strand), mapq) in lengths.into_iter().zip(strands).zip(mapqs) {
        if mapq > MAX_MAPQ {
            return Err(LocusParseError::InvalidField {
                line: line_no,
                field: "mapqs",
                reason: format!("mapping quality {mapq} exceeds {MAX_MAPQ}"),
            });
        }
        let length_delta = i32::try_from(observed - reference_length).map_err(|_| {
            LocusParseError::InvalidField {
                line: line_no,
                field: "lengths",
                reason: format!("observed length {observed} out of range"),
            }
        })?;
        reads.push(ReadObservation::new(length_delta, strand, mapq));
    }
    locus.reads = reads;
    Ok(locus)
}

fn parse_field<T>(raw: &str, line: usize, field: &'static str) -> Result<T, LocusParseError>
where
    T: FromStr,
    T::Err: ToString,
{
    raw.parse().map_err(|err: T::Err| LocusParseError::InvalidField {
        line,
        field,
        reason: err.to_string(),
    })
}

fn parse_list<T>(raw: &str, line: usize, field: &'static str) -> Result<Vec<T>, LocusParseError>
where
    T: FromStr,
    T::Err: ToString,
{
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_field(item, line, field))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_loci_and_computes_deltas() {
        let input = "chrom\tstart\tend\tunit\tregion\tlengths\tstrands\tmapqs\n\
                     chr1\t100\t111\tdi\tintronic\t12,12,14\t+,-,+\t60,60,37\n\
                     # comment\n\
                     \n\
                     chr2\t5\t9\tmono\texonic\t\t\t\n";
        let loci: Vec<Locus> = TsvLocusReader::new(Cursor::new(input))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(loci.len(), 2);
        let first = &loci[0];
        assert_eq!(first.chrom.as_ref(), "chr1");
        assert_eq!(first.unit, UnitClass::Di);
        assert_eq!(
            first.reads,
            vec![
                ReadObservation::new(0, Strand::Forward, 60),
                ReadObservation::new(0, Strand::Reverse, 60),
                ReadObservation::new(2, Strand::Forward, 37),
            ]
        );
        assert!(loci[1].reads.is_empty());
    }

    #[test]
    fn rejects_mismatched_lists() {
        let err = parse_locus_line("chr1\t1\t4\tmono\tx\t4,4\t+\t60,60", 7).unwrap_err();
        assert!(matches!(err, LocusParseError::LengthMismatch { line: 7, .. }));
    }

    #[test]
    fn rejects_out_of_range_mapq() {
        let err = parse_locus_line("chr1\t1\t4\tmono\tx\t4\t+\t61", 3).unwrap_err();
        assert!(matches!(
            err,
            LocusParseError::InvalidField { field: "mapqs", .. }
        ));
    }
}
