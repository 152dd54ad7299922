//! Custom error types for kcor operations.
//!
//! The taxonomy distinguishes caller-contract violations (a bug in the code
//! driving the read model), model-consistency violations (the trust or
//! expectation models produced something impossible), and input/format
//! problems. Expected outcomes like unresolved repeats or gaps are ordinary
//! return values, never errors.

use thiserror::Error;

/// Result type alias for kcor operations
pub type Result<T> = std::result::Result<T, KcorError>;

/// Error type for kcor operations
#[derive(Error, Debug)]
pub enum KcorError {
    /// A correction was requested past the end of the corrected sequence.
    #[error("Correction position {pos} out of range for sequence of length {len}")]
    PositionOutOfRange {
        /// Requested position in the corrected sequence
        pos: usize,
        /// Current sequence length
        len: usize,
    },

    /// The removed text of a correction does not match the sequence state.
    #[error("Correction at position {pos} removes '{expected}' but sequence holds '{found}'")]
    RemovedTextMismatch {
        /// Position in the corrected sequence
        pos: usize,
        /// Text the caller claimed to remove
        expected: String,
        /// Text actually present
        found: String,
    },

    /// An insertion correction asked to remove the gap placeholder.
    #[error("Insertion at position {pos} would remove a gap placeholder")]
    GapRemoval {
        /// Position in the corrected sequence
        pos: usize,
    },

    /// The removed/inserted text of a correction disagrees with its kind.
    #[error("Correction kind {kind} inconsistent with removed '{removed}' / inserted '{inserted}'")]
    CorrectionKindMismatch {
        /// The declared error kind
        kind: String,
        /// Removed substring
        removed: String,
        /// Inserted substring
        inserted: String,
    },

    /// Trust classification was requested across a gap placeholder.
    #[error("K-mer classification called on a k-mer containing a gap placeholder")]
    GapInKmer,

    /// The z-score of a k-mer is NaN or infinite, meaning the expectation
    /// model was asked about a k-mer length it cannot support.
    #[error(
        "Non-finite z-score for k-mer of length {kmer_len} \
         (count {count}, bias {bias}, expected {mean} +/- {sd})"
    )]
    NonFiniteZScore {
        /// Length of the offending k-mer
        kmer_len: usize,
        /// Raw occurrence count
        count: u64,
        /// Coverage bias divisor
        bias: f64,
        /// Expected count mean
        mean: f64,
        /// Expected count standard deviation
        sd: f64,
    },

    /// A deletion repair was attempted next to an already-untrusted flank.
    #[error("Gap at position {pos} is flanked by an untrusted region")]
    InconsistentBoundary {
        /// Gap position in the corrected sequence
        pos: usize,
    },

    /// The expectation model produced an impossible sampling probability.
    #[error(
        "Invalid k-mer sampling probability {p} (genome size {genome_size}, k {k}, read length {read_len})"
    )]
    InvalidExpectation {
        /// The offending probability
        p: f64,
        /// Genome size parameter
        genome_size: u64,
        /// K-mer length queried
        k: usize,
        /// Read length bucket that produced the probability
        read_len: usize,
    },

    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "FASTQ", "bias table")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Underlying I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_out_of_range() {
        let error = KcorError::PositionOutOfRange { pos: 10, len: 5 };
        let msg = format!("{error}");
        assert!(msg.contains("position 10"));
        assert!(msg.contains("length 5"));
    }

    #[test]
    fn test_kind_mismatch() {
        let error = KcorError::CorrectionKindMismatch {
            kind: "insertion".to_string(),
            removed: "A".to_string(),
            inserted: "AG".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("insertion"));
        assert!(msg.contains("'A'"));
        assert!(msg.contains("'AG'"));
    }

    #[test]
    fn test_invalid_file_format() {
        let error = KcorError::InvalidFileFormat {
            file_type: "bias table".to_string(),
            path: "/path/to/bias.tsv".to_string(),
            reason: "non-positive bias".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("Invalid bias table file"));
        assert!(msg.contains("non-positive bias"));
    }

    #[test]
    fn test_non_finite_z_score() {
        let error = KcorError::NonFiniteZScore {
            kmer_len: 15,
            count: 3,
            bias: 1.0,
            mean: 5.0,
            sd: 0.0,
        };
        assert!(format!("{error}").contains("z-score"));
    }
}
