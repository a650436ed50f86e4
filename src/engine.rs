//! Per-locus pipeline: summarize, call, and optionally classify stutter.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::genotyping::{call_genotype, classify_stutter, summarize};
use crate::locus::Locus;
use crate::report::LocusReport;
use crate::{GenotypingConfig, GenotypingError};

/// Loci genotyped per parallel batch when streaming.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Counts from a streaming run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Loci that produced a report.
    pub genotyped: usize,
    /// Loci logged and dropped.
    pub skipped: usize,
}

/// Runs the genotyping core over loci.
#[derive(Debug, Clone)]
pub struct GenotypingEngine {
    config: GenotypingConfig,
    with_stutter: bool,
}

impl GenotypingEngine {
    /// Create an engine, validating `config` up front.
    pub fn new(config: GenotypingConfig) -> Result<Self, GenotypingError> {
        config.validate()?;
        Ok(Self {
            config,
            with_stutter: false,
        })
    }

    /// Attach a stutter verdict to every report.
    pub fn with_stutter(mut self, enabled: bool) -> Self {
        self.with_stutter = enabled;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &GenotypingConfig {
        &self.config
    }

    /// Whether reports carry a stutter verdict.
    pub fn reports_stutter(&self) -> bool {
        self.with_stutter
    }

    /// Process one locus.
    pub fn process(&self, locus: &Locus) -> Result<LocusReport, GenotypingError> {
        let alleles = summarize(&locus.reads);
        let call = call_genotype(&alleles, self.config.total_error_rate)?;
        let verdict = if self.with_stutter {
            Some(classify_stutter(
                &alleles,
                self.config.significance_threshold,
                self.config.stutter_policy,
            )?)
        } else {
            None
        };
        debug!(
            chrom = %locus.chrom,
            start = locus.start,
            alleles = alleles.len(),
            call = %call.kind,
            "genotyped locus"
        );
        Ok(LocusReport::new(locus, alleles, call, verdict))
    }

    /// Process loci in parallel, returning results in input order.
    pub fn process_all(&self, loci: &[Locus]) -> Vec<Result<LocusReport, GenotypingError>> {
        loci.par_iter().map(|locus| self.process(locus)).collect()
    }

    /// Process loci in parallel, logging and dropping loci that fail.
    pub fn process_skipping(&self, loci: &[Locus]) -> Vec<LocusReport> {
        loci.iter()
            .zip(self.process_all(loci))
            .filter_map(|(locus, result)| match result {
                Ok(report) => Some(report),
                Err(err) => {
                    warn!(
                        chrom = %locus.chrom,
                        start = locus.start,
                        end = locus.end,
                        "skipping locus: {err}"
                    );
                    None
                }
            })
            .collect()
    }

    /// Genotype a lazy stream of loci, handing each report to `emit` in
    /// input order.
    ///
    /// At most `batch_size` loci are held in memory; each batch is processed
    /// in parallel. Failing loci are logged and skipped. The first error
    /// returned by `emit` stops the stream.
    pub fn process_stream<I, F, E>(
        &self,
        loci: I,
        batch_size: usize,
        mut emit: F,
    ) -> Result<StreamSummary, E>
    where
        I: IntoIterator<Item = Locus>,
        F: FnMut(LocusReport) -> Result<(), E>,
    {
        let batch_size = batch_size.max(1);
        let mut loci = loci.into_iter();
        let mut batch: Vec<Locus> = Vec::with_capacity(batch_size);
        let mut summary = StreamSummary::default();

        loop {
            batch.clear();
            batch.extend(loci.by_ref().take(batch_size));
            if batch.is_empty() {
                break;
            }
            let reports = self.process_skipping(&batch);
            summary.skipped += batch.len() - reports.len();
            summary.genotyped += reports.len();
            debug!(batch = batch.len(), genotyped = reports.len(), "batch finished");
            for report in reports {
                emit(report)?;
            }
        }
        Ok(summary)
    }
}
