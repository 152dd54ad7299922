//! K-mer trust classification.
//!
//! A k-mer drawn from a read is classified against the expected coverage
//! of a unique genomic k-mer: `Trusted` means consistent with one genomic
//! occurrence, `Untrusted` means it likely contains a sequencing error,
//! and `Repeat` means its count is too high to be informative (the window
//! must be grown before a decision can be made).
//!
//! Classification combines three externally supplied models: the
//! occurrence [`KmerCountOracle`], the [`CoverageBiasModel`] and the
//! [`ExpectationModel`]. Results are memoized per exact k-mer for the
//! lifetime of one correction run; the memo is sharded so consumer
//! threads rarely contend.

use std::sync::Arc;

use ahash::{AHashMap, RandomState};
use parking_lot::Mutex;

use crate::bias::CoverageBiasModel;
use crate::dna::contains_gap;
use crate::errors::{KcorError, Result};
use crate::kmer_index::KmerCountOracle;
use crate::pusm::ExpectationModel;

/// Number of cache shards; must be a power of two.
const CACHE_SHARDS: usize = 16;

/// Trust classification of a single k-mer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KmerClass {
    /// Consistent with exactly one expected genomic occurrence.
    Trusted,
    /// Count too low; the k-mer likely contains an error.
    Untrusted,
    /// Count too high; ambiguous due to genomic multiplicity.
    Repeat,
}

impl KmerClass {
    /// Returns `true` for `Trusted` and `Untrusted`: growth stops once a
    /// window is decisive.
    #[inline]
    #[must_use]
    pub fn is_decisive(self) -> bool {
        !matches!(self, KmerClass::Repeat)
    }
}

/// How raw counts are turned into a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierPolicy {
    /// Compare the bias-corrected count against fixed multiples of the
    /// expected count: untrusted below 0.5x, trusted below 1.5x, repeat
    /// above.
    Threshold,
    /// Standardize the bias-corrected count; untrusted below z = -2,
    /// repeat above z = 2, trusted in between.
    ZScore,
}

/// Classifies k-mers and memoizes the results for one correction run.
pub struct KmerClassifier {
    oracle: Arc<dyn KmerCountOracle>,
    bias: Arc<dyn CoverageBiasModel>,
    expectation: Arc<dyn ExpectationModel>,
    policy: ClassifierPolicy,
    min_kmer_len: usize,
    hasher: RandomState,
    cache: Vec<Mutex<AHashMap<Vec<u8>, KmerClass>>>,
}

impl KmerClassifier {
    /// Builds a classifier over the given models.
    ///
    /// # Errors
    /// Fails unless `min_kmer_len` is odd and at least 3: windows grow by
    /// two bases at a time, and an odd length guarantees a k-mer is never
    /// its own reverse complement.
    pub fn new(
        oracle: Arc<dyn KmerCountOracle>,
        bias: Arc<dyn CoverageBiasModel>,
        expectation: Arc<dyn ExpectationModel>,
        policy: ClassifierPolicy,
        min_kmer_len: usize,
    ) -> Result<KmerClassifier> {
        if min_kmer_len < 3 || min_kmer_len % 2 == 0 {
            return Err(KcorError::InvalidParameter {
                parameter: "kmer-size".to_string(),
                reason: format!("must be odd and >= 3, got {min_kmer_len}"),
            });
        }
        let cache = (0..CACHE_SHARDS).map(|_| Mutex::new(AHashMap::new())).collect();
        Ok(KmerClassifier {
            oracle,
            bias,
            expectation,
            policy,
            min_kmer_len,
            hasher: RandomState::new(),
            cache,
        })
    }

    /// The minimum trusted k-mer length windows start from.
    #[must_use]
    pub fn min_kmer_len(&self) -> usize {
        self.min_kmer_len
    }

    /// Classifies a k-mer, consulting the memo first.
    ///
    /// # Errors
    /// A k-mer containing the gap placeholder is a caller-contract
    /// violation; a non-finite z-score is a model-consistency violation.
    pub fn classify(&self, kmer: &[u8]) -> Result<KmerClass> {
        if contains_gap(kmer) {
            return Err(KcorError::GapInKmer);
        }
        let shard = &self.cache[self.shard_of(kmer)];
        if let Some(&class) = shard.lock().get(kmer) {
            return Ok(class);
        }
        let class = match self.policy {
            ClassifierPolicy::Threshold => self.classify_threshold(kmer)?,
            ClassifierPolicy::ZScore => classify_z_score(self.z_score(kmer)?),
        };
        shard.lock().insert(kmer.to_vec(), class);
        Ok(class)
    }

    /// The standardized deviation of the bias-corrected count from its
    /// expectation.
    ///
    /// # Errors
    /// A NaN or infinite z-score means the expectation model was asked
    /// about a k-mer length it cannot support (for example a standard
    /// deviation of zero); that is fatal for the read being corrected.
    pub fn z_score(&self, kmer: &[u8]) -> Result<f64> {
        if contains_gap(kmer) {
            return Err(KcorError::GapInKmer);
        }
        let count = self.oracle.count(kmer);
        let bias = self.bias.bias(kmer);
        let corrected = count as f64 / bias;
        let (mean, sd) = self.expectation.expected_count(kmer.len())?;
        let z = (corrected - mean) / sd;
        if !z.is_finite() {
            return Err(KcorError::NonFiniteZScore {
                kmer_len: kmer.len(),
                count,
                bias,
                mean,
                sd,
            });
        }
        Ok(z)
    }

    fn classify_threshold(&self, kmer: &[u8]) -> Result<KmerClass> {
        let count = self.oracle.count(kmer);
        let corrected = count as f64 / self.bias.bias(kmer);
        let (mean, _) = self.expectation.expected_count(kmer.len())?;
        Ok(if corrected < 0.5 * mean {
            KmerClass::Untrusted
        } else if corrected < 1.5 * mean {
            KmerClass::Trusted
        } else {
            KmerClass::Repeat
        })
    }

    fn shard_of(&self, kmer: &[u8]) -> usize {
        (std::hash::BuildHasher::hash_one(&self.hasher, kmer) as usize) & (CACHE_SHARDS - 1)
    }
}

fn classify_z_score(z: f64) -> KmerClass {
    if z < -2.0 {
        KmerClass::Untrusted
    } else if z > 2.0 {
        KmerClass::Repeat
    } else {
        KmerClass::Trusted
    }
}
