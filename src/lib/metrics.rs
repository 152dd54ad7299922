//! Run metrics.
//!
//! One row per correction run, summarizing how the reads fared. Written
//! as a TSV next to the corrected output so runs can be compared and
//! parsed back for tests.

use std::path::Path;

use fgoxide::io::DelimFile;
use serde::{Deserialize, Serialize};

use crate::errors::{KcorError, Result};
use crate::progress::format_count;

/// Summary counts for one correction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionMetrics {
    /// Reads processed across all shards.
    pub reads: u64,
    /// Reads that received at least one correction.
    pub corrected_reads: u64,
    /// Individual corrections applied.
    pub corrections: u64,
    /// Reads still carrying an unresolved gap placeholder.
    pub unresolved_gap_reads: u64,
    /// Reads abandoned after a per-read fatal inconsistency.
    pub failed_reads: u64,
}

impl CorrectionMetrics {
    /// Writes the metrics as a single-row TSV.
    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        DelimFile::default().write_tsv(&path, [self.clone()]).map_err(|e| {
            KcorError::InvalidFileFormat {
                file_type: "metrics".to_string(),
                path: path.as_ref().display().to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Reads metrics back from a TSV written by [`CorrectionMetrics::write_tsv`].
    pub fn read_tsv<P: AsRef<Path>>(path: P) -> Result<CorrectionMetrics> {
        let rows: Vec<CorrectionMetrics> =
            DelimFile::default().read_tsv(&path).map_err(|e| KcorError::InvalidFileFormat {
                file_type: "metrics".to_string(),
                path: path.as_ref().display().to_string(),
                reason: e.to_string(),
            })?;
        rows.into_iter().next().ok_or_else(|| KcorError::InvalidFileFormat {
            file_type: "metrics".to_string(),
            path: path.as_ref().display().to_string(),
            reason: "empty metrics file".to_string(),
        })
    }

    /// Logs the human-readable run summary.
    pub fn log_summary(&self) {
        log::info!("Correction summary:");
        log::info!("  Reads processed: {}", format_count(self.reads));
        log::info!("  Reads corrected: {}", format_count(self.corrected_reads));
        log::info!("  Corrections applied: {}", format_count(self.corrections));
        if self.reads > 0 {
            let rate = self.corrected_reads as f64 / self.reads as f64 * 100.0;
            log::info!("  Correction rate: {rate:.2}%");
        }
        if self.unresolved_gap_reads > 0 {
            log::info!(
                "  Reads with unresolved gaps: {}",
                format_count(self.unresolved_gap_reads)
            );
        }
        if self.failed_reads > 0 {
            log::warn!(
                "  Reads failed on model inconsistencies: {}",
                format_count(self.failed_reads)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tsv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.tsv");
        let metrics = CorrectionMetrics {
            reads: 1000,
            corrected_reads: 150,
            corrections: 180,
            unresolved_gap_reads: 3,
            failed_reads: 1,
        };
        metrics.write_tsv(&path).unwrap();
        assert_eq!(CorrectionMetrics::read_tsv(&path).unwrap(), metrics);
    }

    #[test]
    fn test_empty_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.tsv");
        std::fs::write(
            &path,
            "reads\tcorrected_reads\tcorrections\tunresolved_gap_reads\tfailed_reads\n",
        )
        .unwrap();
        assert!(CorrectionMetrics::read_tsv(&path).is_err());
    }

    #[test]
    fn test_log_summary_runs() {
        CorrectionMetrics::default().log_summary();
        CorrectionMetrics { reads: 10, corrected_reads: 2, corrections: 2, ..Default::default() }
            .log_summary();
    }
}
