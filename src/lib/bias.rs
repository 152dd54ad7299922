//! Coverage-bias correction.
//!
//! Sequencing coverage is not uniform across a genome; the strongest
//! systematic component tracks GC content. A [`CoverageBiasModel`] turns a
//! k-mer into a multiplicative bias so the trust classifier can divide it
//! out of the observed count before comparing against the expectation
//! model. Learning the bias table is out of scope here; a learned table is
//! loaded from a two-column TSV.

use std::path::Path;

use fgoxide::io::DelimFile;
use serde::{Deserialize, Serialize};

use crate::dna::gc_content;
use crate::errors::{KcorError, Result};

/// Multiplicative coverage bias of a k-mer. Always positive; 1.0 means no
/// correction.
pub trait CoverageBiasModel: Send + Sync {
    /// The bias divisor for the given k-mer.
    fn bias(&self, kmer: &[u8]) -> f64;
}

/// Bias correction disabled: every k-mer gets bias 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBias;

impl CoverageBiasModel for NoBias {
    fn bias(&self, _kmer: &[u8]) -> f64 {
        1.0
    }
}

/// One row of a learned bias table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasTableRow {
    /// GC-content bin center, in [0, 1].
    pub gc: f64,
    /// Median bias observed for k-mers in this bin.
    pub bias: f64,
}

/// GC-binned median coverage bias, looked up by the GC content of the
/// query k-mer.
#[derive(Debug, Clone)]
pub struct GcMedianBias {
    gc_step: f64,
    biases: Vec<f64>,
}

impl GcMedianBias {
    /// Builds the table from equally spaced GC bins covering [0, 1].
    /// Empty bins (bias 0) are filled from their nearest populated
    /// neighbor.
    ///
    /// # Errors
    /// Fails if fewer than two bins are given, if any bias is negative,
    /// or if every bin is empty.
    pub fn from_bins(biases: Vec<f64>) -> Result<GcMedianBias> {
        if biases.len() < 2 {
            return Err(KcorError::InvalidParameter {
                parameter: "bias-table".to_string(),
                reason: "needs at least two GC bins".to_string(),
            });
        }
        if biases.iter().any(|&b| b < 0.0 || !b.is_finite()) {
            return Err(KcorError::InvalidParameter {
                parameter: "bias-table".to_string(),
                reason: "bias values must be finite and non-negative".to_string(),
            });
        }
        if biases.iter().all(|&b| b == 0.0) {
            return Err(KcorError::InvalidParameter {
                parameter: "bias-table".to_string(),
                reason: "every GC bin is empty".to_string(),
            });
        }
        let gc_step = 1.0 / (biases.len() - 1) as f64;
        let mut table = GcMedianBias { gc_step, biases };
        table.fill_empty_bins();
        Ok(table)
    }

    /// Loads a table from a TSV with `gc` and `bias` columns, one row per
    /// bin, sorted by ascending GC.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<GcMedianBias> {
        let rows: Vec<BiasTableRow> =
            DelimFile::default().read_tsv(&path).map_err(|e| KcorError::InvalidFileFormat {
                file_type: "bias table".to_string(),
                path: path.as_ref().display().to_string(),
                reason: e.to_string(),
            })?;
        let mut sorted = rows;
        sorted.sort_by(|a, b| a.gc.total_cmp(&b.gc));
        GcMedianBias::from_bins(sorted.into_iter().map(|r| r.bias).collect())
    }

    /// Replaces empty (zero) bins with the value of the nearest populated
    /// bin, preferring the left neighbor.
    fn fill_empty_bins(&mut self) {
        let n = self.biases.len();
        for i in 0..n {
            if self.biases[i] > 0.0 {
                continue;
            }
            let left = (0..i).rev().find(|&j| self.biases[j] > 0.0);
            let right = (i + 1..n).find(|&j| self.biases[j] > 0.0);
            self.biases[i] = match (left, right) {
                (Some(j), _) => self.biases[j],
                (None, Some(j)) => self.biases[j],
                (None, None) => unreachable!("all-empty table rejected at construction"),
            };
        }
    }

    /// Number of GC bins.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.biases.len()
    }
}

impl CoverageBiasModel for GcMedianBias {
    fn bias(&self, kmer: &[u8]) -> f64 {
        let gc = gc_content(kmer);
        let bin = (gc / self.gc_step).round() as usize;
        self.biases[bin.min(self.biases.len() - 1)]
    }
}
