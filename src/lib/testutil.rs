//! Shared stubs for unit tests: fixed-count oracles, constant expectation
//! models, and a classifier wired so that k-mers occurring once in a
//! reference are trusted, absent k-mers untrusted, and multi-copy k-mers
//! repeats.

use std::sync::Arc;

use ahash::AHashMap;

use crate::bias::NoBias;
use crate::classify::{ClassifierPolicy, KmerClassifier};
use crate::dna::reverse_complement;
use crate::errors::Result;
use crate::kmer_index::KmerCountOracle;
use crate::pusm::ExpectationModel;

/// Expectation model returning the same `(mean, sd)` for every k-mer
/// length.
pub(crate) struct ConstExpectation {
    pub mean: f64,
    pub sd: f64,
}

impl ExpectationModel for ConstExpectation {
    fn expected_count(&self, _k: usize) -> Result<(f64, f64)> {
        Ok((self.mean, self.sd))
    }
}

/// Count oracle backed by an explicit table with a default for unlisted
/// k-mers. Counts are taken as-is (no orientation summing); tests set the
/// totals they want directly.
pub(crate) struct FixedCounts {
    counts: AHashMap<Vec<u8>, u64>,
    default: u64,
}

impl FixedCounts {
    pub fn with_default(default: u64) -> FixedCounts {
        FixedCounts { counts: AHashMap::new(), default }
    }

    pub fn set(&mut self, kmer: &[u8], count: u64) {
        self.counts.insert(kmer.to_vec(), count);
    }
}

impl KmerCountOracle for FixedCounts {
    fn count(&self, kmer: &[u8]) -> u64 {
        self.counts.get(kmer).copied().unwrap_or(self.default)
    }
}

/// Count oracle derived from a reference text: every occurrence of the
/// query or its reverse complement in the reference counts `coverage`
/// observations.
pub(crate) struct ReferenceOracle {
    reference: Vec<u8>,
    coverage: u64,
}

impl ReferenceOracle {
    pub fn new(reference: &[u8], coverage: u64) -> ReferenceOracle {
        ReferenceOracle { reference: reference.to_vec(), coverage }
    }

    fn occurrences(&self, pattern: &[u8]) -> u64 {
        if pattern.is_empty() || pattern.len() > self.reference.len() {
            return 0;
        }
        self.reference.windows(pattern.len()).filter(|w| *w == pattern).count() as u64
    }
}

impl KmerCountOracle for ReferenceOracle {
    fn count(&self, kmer: &[u8]) -> u64 {
        (self.occurrences(kmer) + self.occurrences(&reverse_complement(kmer))) * self.coverage
    }
}

/// Threshold classifier over [`ReferenceOracle`] with expectation equal to
/// the coverage: unique reference k-mers classify `Trusted`, absent ones
/// `Untrusted`, multi-copy ones `Repeat`.
pub(crate) fn reference_classifier(
    reference: &[u8],
    coverage: u64,
    min_kmer_len: usize,
) -> KmerClassifier {
    KmerClassifier::new(
        Arc::new(ReferenceOracle::new(reference, coverage)),
        Arc::new(NoBias),
        Arc::new(ConstExpectation { mean: coverage as f64, sd: coverage as f64 / 4.0 }),
        ClassifierPolicy::Threshold,
        min_kmer_len,
    )
    .expect("valid test classifier")
}
