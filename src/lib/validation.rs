//! Input validation utilities
//!
//! Common validation for command-line parameters and file paths, with
//! structured errors from [`crate::errors`] so failures carry context.

use std::path::Path;

use crate::errors::{KcorError, Result};

/// Validates that a file exists.
///
/// # Errors
/// Returns an error naming the file and its role if it does not exist.
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(KcorError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path.display().to_string(),
            reason: "file does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validates that every file in the slice exists.
///
/// # Errors
/// Returns the error for the first missing file.
pub fn validate_files_exist<P: AsRef<Path>>(files: &[P], description: &str) -> Result<()> {
    for path in files {
        validate_file_exists(path, description)?;
    }
    Ok(())
}

/// Validates a k-mer size: odd, so a k-mer is never its own reverse
/// complement, and large enough to be informative.
///
/// # Errors
/// Returns an error describing the constraint that failed.
pub fn validate_kmer_size(k: usize) -> Result<()> {
    if k < 3 {
        return Err(KcorError::InvalidParameter {
            parameter: "kmer-size".to_string(),
            reason: format!("must be at least 3, got {k}"),
        });
    }
    if k % 2 == 0 {
        return Err(KcorError::InvalidParameter {
            parameter: "kmer-size".to_string(),
            reason: format!("must be odd, got {k}"),
        });
    }
    Ok(())
}

/// Validates that a directory exists and is a directory.
///
/// # Errors
/// Returns an error if the path is missing or not a directory.
pub fn validate_output_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.is_dir() {
        return Err(KcorError::InvalidParameter {
            parameter: "output-dir".to_string(),
            reason: format!("'{}' is not an existing directory", path.display()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_file_exists() {
        assert!(validate_file_exists("/nonexistent/input.fastq", "Input FASTQ").is_err());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.fastq");
        std::fs::write(&path, "@r\nA\n+\nI\n").unwrap();
        assert!(validate_file_exists(&path, "Input FASTQ").is_ok());
        assert!(validate_files_exist(&[&path], "Input FASTQ").is_ok());
    }

    #[test]
    fn test_validate_kmer_size() {
        assert!(validate_kmer_size(1).is_err());
        assert!(validate_kmer_size(4).is_err());
        assert!(validate_kmer_size(3).is_ok());
        assert!(validate_kmer_size(15).is_ok());
    }

    #[test]
    fn test_validate_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_output_dir(dir.path()).is_ok());
        assert!(validate_output_dir(dir.path().join("missing")).is_err());
    }
}
