//! Report assembly: per-locus rows and cross-locus stutter accumulators.

mod distribution;
mod record;

pub use distribution::{StutterCounts, StutterDistribution, StutterTally};
pub use record::{
    format_general, render_reports, report_header, write_reports, LocusReport, ReportParseError,
    ReportRow,
};
