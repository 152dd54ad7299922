//! Expected k-mer counts under perfect uniform sequencing.
//!
//! For a genome of known size and topology and a dataset with a known
//! read-length distribution, the expected number of times a unique
//! genomic k-mer is sampled by the reads has a closed form: each read of
//! length `l` covers a given k-mer with a probability depending only on
//! `l`, `k` and the genome size, so the count is a sum of independent
//! Bernoulli draws. The trust classifier compares bias-corrected observed
//! counts against this expectation.

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::errors::{KcorError, Result};

/// Genome topology; affects how many positions a read can start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenomeTopology {
    /// Linear chromosome: reads cannot wrap around the ends.
    Linear,
    /// Circular genome (plasmids, many bacterial chromosomes).
    Circular,
}

/// Histogram of read lengths observed in the dataset.
#[derive(Debug, Clone, Default)]
pub struct ReadLengthHistogram {
    counts: AHashMap<usize, u64>,
}

impl ReadLengthHistogram {
    /// Creates an empty histogram.
    #[must_use]
    pub fn new() -> ReadLengthHistogram {
        ReadLengthHistogram::default()
    }

    /// Records one read of the given length.
    pub fn record(&mut self, length: usize) {
        *self.counts.entry(length).or_insert(0) += 1;
    }

    /// Number of reads with exactly the given length.
    #[must_use]
    pub fn reads_of_length(&self, length: usize) -> u64 {
        self.counts.get(&length).copied().unwrap_or(0)
    }

    /// Total number of recorded reads.
    #[must_use]
    pub fn total_reads(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Iterates over `(length, count)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.counts.iter().map(|(&l, &n)| (l, n))
    }
}

/// Expected count of a unique genomic k-mer as a function of k-mer
/// length: `(mean, standard deviation)`.
pub trait ExpectationModel: Send + Sync {
    /// Expected count and its standard deviation for k-mers of length
    /// `k`.
    fn expected_count(&self, k: usize) -> Result<(f64, f64)>;
}

/// The perfect uniform sequencing model: genome size, topology and the
/// dataset's read-length histogram. Results are memoized per k-mer
/// length.
pub struct Pusm {
    genome_size: u64,
    topology: GenomeTopology,
    read_lengths: ReadLengthHistogram,
    memo: RwLock<AHashMap<usize, (f64, f64)>>,
}

impl Pusm {
    /// Builds the model.
    ///
    /// # Errors
    /// Fails if the genome size is zero or any recorded read is longer
    /// than a linear genome (a read cannot be sampled from a shorter
    /// linear template).
    pub fn new(
        genome_size: u64,
        topology: GenomeTopology,
        read_lengths: ReadLengthHistogram,
    ) -> Result<Pusm> {
        if genome_size == 0 {
            return Err(KcorError::InvalidParameter {
                parameter: "genome-size".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if topology == GenomeTopology::Linear {
            if let Some((l, _)) =
                read_lengths.iter().find(|&(l, _)| l as u64 > genome_size)
            {
                return Err(KcorError::InvalidParameter {
                    parameter: "genome-size".to_string(),
                    reason: format!("read length {l} exceeds linear genome size {genome_size}"),
                });
            }
        }
        Ok(Pusm { genome_size, topology, read_lengths, memo: RwLock::new(AHashMap::new()) })
    }

    /// Probability that one read of length `l` samples a fixed unique
    /// k-mer of length `k`.
    fn sampling_probability(&self, k: usize, l: usize) -> Result<f64> {
        let g = self.genome_size as f64;
        let k_f = k as f64;
        let l_f = l as f64;
        let p = match self.topology {
            GenomeTopology::Circular => (l_f - k_f + 1.0) / g,
            GenomeTopology::Linear => {
                (l_f - k_f) * (g - l_f) / ((g - k_f + 1.0) * (g - l_f + 1.0))
            }
        };
        if !(0.0..=1.0).contains(&p) {
            return Err(KcorError::InvalidExpectation {
                p,
                genome_size: self.genome_size,
                k,
                read_len: l,
            });
        }
        Ok(p)
    }
}

impl ExpectationModel for Pusm {
    fn expected_count(&self, k: usize) -> Result<(f64, f64)> {
        if let Some(&cached) = self.memo.read().get(&k) {
            return Ok(cached);
        }
        let mut mean = 0.0;
        let mut variance = 0.0;
        for (l, n) in self.read_lengths.iter() {
            if l < k {
                continue;
            }
            let p = self.sampling_probability(k, l)?;
            mean += n as f64 * p;
            variance += n as f64 * p * (1.0 - p);
        }
        let result = (mean, variance.sqrt());
        self.memo.write().insert(k, result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(pairs: &[(usize, u64)]) -> ReadLengthHistogram {
        let mut hist = ReadLengthHistogram::new();
        for &(l, n) in pairs {
            for _ in 0..n {
                hist.record(l);
            }
        }
        hist
    }

    #[test]
    fn test_histogram() {
        let hist = histogram(&[(100, 3), (150, 2)]);
        assert_eq!(hist.reads_of_length(100), 3);
        assert_eq!(hist.reads_of_length(150), 2);
        assert_eq!(hist.reads_of_length(99), 0);
        assert_eq!(hist.total_reads(), 5);
    }

    #[test]
    fn test_circular_expectation() {
        // 10 reads of length 100 on a circular genome of 1000:
        // p = (100 - 15 + 1) / 1000 = 0.086, mean = 0.86.
        let pusm =
            Pusm::new(1000, GenomeTopology::Circular, histogram(&[(100, 10)])).unwrap();
        let (mean, sd) = pusm.expected_count(15).unwrap();
        assert!((mean - 0.86).abs() < 1e-12);
        let expected_var: f64 = 10.0 * 0.086 * (1.0 - 0.086);
        assert!((sd - expected_var.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_linear_expectation() {
        let pusm = Pusm::new(1000, GenomeTopology::Linear, histogram(&[(100, 10)])).unwrap();
        let (mean, _) = pusm.expected_count(15).unwrap();
        let p = (100.0 - 15.0) * (1000.0 - 100.0) / ((1000.0 - 15.0 + 1.0) * (1000.0 - 100.0 + 1.0));
        assert!((mean - 10.0 * p).abs() < 1e-12);
    }

    #[test]
    fn test_reads_shorter_than_k_ignored() {
        let pusm =
            Pusm::new(1000, GenomeTopology::Circular, histogram(&[(10, 5), (100, 10)])).unwrap();
        let (mean, _) = pusm.expected_count(15).unwrap();
        // Only the length-100 reads contribute.
        assert!((mean - 10.0 * 0.086).abs() < 1e-12);
    }

    #[test]
    fn test_memoization_is_stable() {
        let pusm =
            Pusm::new(1000, GenomeTopology::Circular, histogram(&[(100, 10)])).unwrap();
        let first = pusm.expected_count(15).unwrap();
        let second = pusm.expected_count(15).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(Pusm::new(0, GenomeTopology::Circular, histogram(&[(100, 1)])).is_err());
        assert!(Pusm::new(50, GenomeTopology::Linear, histogram(&[(100, 1)])).is_err());
        // A circular genome shorter than the reads is fine only while the
        // sampling probability stays within [0, 1].
        let pusm = Pusm::new(50, GenomeTopology::Circular, histogram(&[(100, 1)])).unwrap();
        assert!(pusm.expected_count(15).is_err());
    }
}
