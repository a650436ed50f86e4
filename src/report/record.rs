use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::genotyping::{AlleleKey, AlleleSummary, CallKind, GenotypeCall, StutterVerdict};
use crate::locus::{Locus, UnitClass};

const BASE_COLUMNS: [&str; 11] = [
    "chr",
    "start",
    "end",
    "ref_len",
    "unit",
    "region",
    "raw_alleles",
    "call",
    "genotype",
    "likelihood",
    "allele_summaries",
];

const STUTTER_COLUMNS: [&str; 3] = ["stutter_class", "stutter_pval", "stutter_reads"];

/// Errors raised while parsing a report row.
#[derive(Debug, Error)]
pub enum ReportParseError {
    /// Row has fewer columns than a report carries.
    #[error("expected at least {expected} tab-delimited fields, found {found}")]
    MissingField {
        /// Number of fields required.
        expected: usize,
        /// Number of fields present.
        found: usize,
    },

    /// A column could not be parsed.
    #[error("invalid {field} '{value}'")]
    InvalidField {
        /// Column name.
        field: &'static str,
        /// Raw column text.
        value: String,
    },
}

/// Everything reported for one locus.
#[derive(Debug, Clone, PartialEq)]
pub struct LocusReport {
    /// Chromosome/contig name.
    pub chrom: Arc<str>,
    /// Repeat start.
    pub start: u32,
    /// Repeat end.
    pub end: u32,
    /// Reference repeat length.
    pub reference_length: u32,
    /// Repeat unit class.
    pub unit: UnitClass,
    /// Region annotation.
    pub region: Arc<str>,
    /// Per-allele support.
    pub alleles: AlleleSummary,
    /// Maximum-likelihood genotype.
    pub call: GenotypeCall,
    /// Stutter verdict, when requested.
    pub verdict: Option<StutterVerdict>,
}

impl LocusReport {
    /// Assemble a report from a locus and its computed results.
    pub fn new(
        locus: &Locus,
        alleles: AlleleSummary,
        call: GenotypeCall,
        verdict: Option<StutterVerdict>,
    ) -> Self {
        Self {
            chrom: Arc::clone(&locus.chrom),
            start: locus.start,
            end: locus.end,
            reference_length: locus.reference_length(),
            unit: locus.unit,
            region: Arc::clone(&locus.region),
            alleles,
            call,
            verdict,
        }
    }

    /// Tab-delimited row, without trailing newline.
    pub fn to_row(&self) -> String {
        let mut row = format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom,
            self.start,
            self.end,
            self.reference_length,
            self.unit,
            self.region,
            self.alleles.len(),
            self.call.kind,
            self.call.genotype(),
            format_general(self.call.likelihood),
            self.alleles,
        );
        if let Some(verdict) = &self.verdict {
            let pval = verdict
                .p_value
                .map(format_general)
                .unwrap_or_else(|| "NA".to_string());
            row.push_str(&format!(
                "\t{}\t{}\t{}",
                verdict.class, pval, verdict.stutter_reads
            ));
        }
        row
    }
}

/// Column header line, without trailing newline.
pub fn report_header(with_stutter: bool) -> String {
    let mut columns: Vec<&str> = BASE_COLUMNS.to_vec();
    if with_stutter {
        columns.extend_from_slice(&STUTTER_COLUMNS);
    }
    columns.join("\t")
}

/// Write a header followed by one row per report.
pub fn write_reports<W: Write>(
    writer: &mut W,
    reports: &[LocusReport],
    with_stutter: bool,
) -> std::io::Result<()> {
    writeln!(writer, "{}", report_header(with_stutter))?;
    for report in reports {
        writeln!(writer, "{}", report.to_row())?;
    }
    writer.flush()
}

/// Render reports into a string (useful for tests and snapshots).
pub fn render_reports(reports: &[LocusReport], with_stutter: bool) -> String {
    let mut out = report_header(with_stutter);
    out.push('\n');
    for report in reports {
        out.push_str(&report.to_row());
        out.push('\n');
    }
    out
}

/// A report row read back from text.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Chromosome/contig name.
    pub chrom: String,
    /// Repeat start.
    pub start: u32,
    /// Repeat end.
    pub end: u32,
    /// Reference repeat length.
    pub reference_length: u32,
    /// Repeat unit class.
    pub unit: UnitClass,
    /// Region annotation.
    pub region: String,
    /// Reported call kind.
    pub call: CallKind,
    /// Reported genotype pair.
    pub pair: (AlleleKey, AlleleKey),
    /// Reported likelihood.
    pub likelihood: f64,
    /// Per-allele support.
    pub alleles: AlleleSummary,
}

impl ReportRow {
    /// Whether `line` is a report header.
    pub fn is_header(line: &str) -> bool {
        line.starts_with("chr\tstart\t")
    }
}

impl FromStr for ReportRow {
    type Err = ReportParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() < BASE_COLUMNS.len() {
            return Err(ReportParseError::MissingField {
                expected: BASE_COLUMNS.len(),
                found: fields.len(),
            });
        }

        let pair = fields[8]
            .split_once('/')
            .and_then(|(a, b)| Some((a.parse::<AlleleKey>().ok()?, b.parse::<AlleleKey>().ok()?)))
            .ok_or_else(|| invalid("genotype", fields[8]))?;

        Ok(Self {
            chrom: fields[0].to_string(),
            start: fields[1].parse().map_err(|_| invalid("start", fields[1]))?,
            end: fields[2].parse().map_err(|_| invalid("end", fields[2]))?,
            reference_length: fields[3].parse().map_err(|_| invalid("ref_len", fields[3]))?,
            unit: fields[4].parse().map_err(|_| invalid("unit", fields[4]))?,
            region: fields[5].to_string(),
            call: fields[7].parse().map_err(|_| invalid("call", fields[7]))?,
            pair,
            likelihood: fields[9]
                .parse()
                .map_err(|_| invalid("likelihood", fields[9]))?,
            alleles: fields[10]
                .parse()
                .map_err(|_| invalid("allele_summaries", fields[10]))?,
        })
    }
}

fn invalid(field: &'static str, value: &str) -> ReportParseError {
    ReportParseError::InvalidField {
        field,
        value: value.to_string(),
    }
}

/// Format a real with six significant digits, trimming trailing zeros, in
/// the style of C's `%g`.
pub fn format_general(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return value.to_string();
    }
    let scientific = format!("{value:.5e}");
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return scientific,
    };

    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.abs()
        )
    } else {
        let decimals = (5 - exponent) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotyping::{summarize, StutterClass};
    use crate::locus::{ReadObservation, Strand};

    fn sample_report(verdict: Option<StutterVerdict>) -> LocusReport {
        let locus = Locus::new(
            "chr7",
            1000,
            1011,
            UnitClass::Tetra,
            "intronic",
            vec![
                ReadObservation::new(0, Strand::Forward, 60),
                ReadObservation::new(4, Strand::Reverse, 50),
            ],
        );
        let alleles = summarize(&locus.reads);
        let call = GenotypeCall {
            kind: CallKind::Het,
            pair: (0, 4),
            likelihood: 0.25,
        };
        LocusReport::new(&locus, alleles, call, verdict)
    }

    #[test]
    fn general_format_matches_printf() {
        assert_eq!(format_general(1.0), "1");
        assert_eq!(format_general(0.0625), "0.0625");
        assert_eq!(format_general(0.00970299), "0.00970299");
        assert_eq!(format_general(2.098083e-5), "2.09808e-05");
        assert_eq!(format_general(123456789.0), "1.23457e+08");
        assert_eq!(format_general(0.0), "0");
    }

    #[test]
    fn row_carries_all_columns() {
        let row = sample_report(None).to_row();
        assert_eq!(
            row,
            "chr7\t1000\t1011\t12\ttetra\tintronic\t2\thet\t0/4\t0.25\t\
             0:1,1.000000,60.000000 4:1,0.000000,50.000000"
        );
        assert_eq!(row.split('\t').count(), report_header(false).split('\t').count());
    }

    #[test]
    fn stutter_columns_are_appended() {
        let verdict = StutterVerdict {
            class: StutterClass::Heterozygous,
            p_value: Some(1.0),
            stutter_reads: 0,
        };
        let row = sample_report(Some(verdict)).to_row();
        assert!(row.ends_with("\thet\t1\t0"));
        assert_eq!(row.split('\t').count(), report_header(true).split('\t').count());
    }

    #[test]
    fn rows_parse_back() {
        let report = sample_report(None);
        let parsed: ReportRow = report.to_row().parse().unwrap();
        assert_eq!(parsed.chrom, "chr7");
        assert_eq!(parsed.reference_length, 12);
        assert_eq!(parsed.unit, UnitClass::Tetra);
        assert_eq!(parsed.call, CallKind::Het);
        assert_eq!(parsed.pair, (0, 4));
        assert_eq!(parsed.alleles, report.alleles);
    }

    #[test]
    fn short_rows_are_rejected() {
        assert!(matches!(
            "chr1\t1\t2".parse::<ReportRow>(),
            Err(ReportParseError::MissingField { found: 3, .. })
        ));
        assert!(ReportRow::is_header(&report_header(true)));
    }
}
