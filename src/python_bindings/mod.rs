//! Python bindings that expose the genotyping core via PyO3.
use pyo3::{exceptions::PyValueError, prelude::*, types::PyModule};

use crate::genotyping::{self, AlleleSummary};
use crate::locus::{ReadObservation, Strand};
use crate::{GenotypingConfig, GenotypingError};

/// Python-facing genotyper holding a validated configuration.
#[pyclass]
#[derive(Debug)]
pub struct PyGenotyper {
    config: GenotypingConfig,
}

#[pymethods]
impl PyGenotyper {
    #[new]
    #[pyo3(signature = (total_error_rate=0.01, significance_threshold=0.05, use_binomial_stutter_test=true))]
    /// Create a genotyper; raises `ValueError` for out-of-range parameters.
    pub fn new(
        total_error_rate: f64,
        significance_threshold: f64,
        use_binomial_stutter_test: bool,
    ) -> PyResult<Self> {
        let config = GenotypingConfig::default()
            .with_error_rate(total_error_rate)
            .with_significance_threshold(significance_threshold)
            .with_binomial_stutter_test(use_binomial_stutter_test);
        config.validate().map_err(to_py_err)?;
        Ok(Self { config })
    }

    /// Summarize reads into `key:count,frac_forward,mean_mapq` text.
    ///
    /// Args:
    ///     reads: List of `(length_delta, is_forward, mapq)` tuples; a mapq
    ///         above 60 raises `ValueError`.
    pub fn summarize(&self, reads: Vec<(i32, bool, u8)>) -> PyResult<String> {
        Ok(summarize_tuples(reads).map_err(to_py_err)?.to_string())
    }

    /// Call a genotype from reads.
    ///
    /// Returns:
    ///     `(call_kind, "a/b", likelihood)`.
    pub fn call_genotype(&self, reads: Vec<(i32, bool, u8)>) -> PyResult<(String, String, f64)> {
        let alleles = summarize_tuples(reads).map_err(to_py_err)?;
        let call = genotyping::call_genotype(&alleles, self.config.total_error_rate)
            .map_err(to_py_err)?;
        Ok((call.kind.to_string(), call.genotype(), call.likelihood))
    }

    /// Classify stutter from an allele summary string.
    ///
    /// Returns:
    ///     `(classification, p_value or None, stutter_reads)`.
    pub fn classify_stutter(&self, summary: &str) -> PyResult<(String, Option<f64>, u32)> {
        let alleles: AlleleSummary = summary.parse().map_err(to_py_err)?;
        let verdict = genotyping::classify_stutter(
            &alleles,
            self.config.significance_threshold,
            self.config.stutter_policy,
        )
        .map_err(to_py_err)?;
        Ok((verdict.class.to_string(), verdict.p_value, verdict.stutter_reads))
    }
}

fn summarize_tuples(reads: Vec<(i32, bool, u8)>) -> Result<AlleleSummary, GenotypingError> {
    let observations = reads
        .into_iter()
        .map(|(delta, forward, mapq)| {
            let strand = if forward { Strand::Forward } else { Strand::Reverse };
            ReadObservation::try_new(delta, strand, mapq)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(genotyping::summarize(&observations))
}

fn to_py_err(err: GenotypingError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Create Python module.
#[pymodule]
pub fn strtyper_py(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyGenotyper>()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuples_with_out_of_range_mapq_are_rejected() {
        assert_eq!(
            summarize_tuples(vec![(0, true, 60), (2, false, 200)]),
            Err(GenotypingError::InvalidMapq(200))
        );
        let summary = summarize_tuples(vec![(0, true, 60), (0, false, 40)]).unwrap();
        assert_eq!(summary.get(0).unwrap().mean_mapq, 50.0);
    }
}
