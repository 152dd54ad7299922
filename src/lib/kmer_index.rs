//! K-mer occurrence counting.
//!
//! The trust classifier consumes a [`KmerCountOracle`]: an exact substring
//! counter over the read set that sums both orientations of a query. Two
//! implementations are provided:
//!
//! - [`FmKmerIndex`] — an FM-index over the concatenated, sanitized read
//!   set. Supports queries of any length, which the correction walker
//!   relies on when it grows windows beyond the minimum k-mer size.
//! - [`NaiveKmerIndex`] — a scanning counter over the raw reads. Linear
//!   per query; intended for small inputs and as a reference
//!   implementation in tests.

use std::path::Path;
use std::sync::Arc;

use bio::alphabets::Alphabet;
use bio::data_structures::bwt::{BWT, Less, Occ, bwt, less};
use bio::data_structures::fmindex::{BackwardSearchResult, FMIndex, FMIndexable};
use bio::data_structures::suffix_array::suffix_array;
use rayon::prelude::*;

use crate::dna::{reverse_complement, sanitize};
use crate::errors::Result;
use crate::fastq::FastqChunkReader;
use crate::pusm::ReadLengthHistogram;

/// Sentinel separating reads in the indexed text.
const SENTINEL: u8 = b'$';

/// Sampling rate for the FM-index occurrence table.
const OCC_SAMPLING: u32 = 32;

/// Batch size used when streaming reads off disk during index
/// construction.
const BUILD_BATCH: usize = 4096;

/// Exact, reverse-complement-aware k-mer occurrence counts over a read
/// set.
pub trait KmerCountOracle: Send + Sync {
    /// Number of occurrences of `kmer` in the read set, both orientations
    /// summed.
    fn count(&self, kmer: &[u8]) -> u64;
}

/// FM-index-backed occurrence counter over the whole read set.
pub struct FmKmerIndex {
    fm: FMIndex<Arc<BWT>, Arc<Less>, Arc<Occ>>,
}

impl FmKmerIndex {
    /// Indexes the given sequences. Each sequence is sanitized to the
    /// `ACGTN` alphabet and terminated with a sentinel so no query can
    /// match across read boundaries.
    #[must_use]
    pub fn from_sequences<I>(sequences: I) -> FmKmerIndex
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut text = Vec::new();
        for seq in sequences {
            text.extend_from_slice(&sanitize(&seq));
            text.push(SENTINEL);
        }
        if text.last() != Some(&SENTINEL) {
            text.push(SENTINEL);
        }
        let alphabet = Alphabet::new(b"$ACGNT");
        let sa = suffix_array(&text);
        let bwt = Arc::new(bwt(&text, &sa));
        let less = Arc::new(less(&bwt, &alphabet));
        let occ = Arc::new(Occ::new(&bwt, OCC_SAMPLING, &alphabet));
        FmKmerIndex { fm: FMIndex::new(bwt, less, occ) }
    }

    /// Streams the given FASTQ shards into an index, collecting the
    /// read-length histogram the expectation model needs along the way.
    pub fn from_fastq_paths<P: AsRef<Path>>(
        paths: &[P],
    ) -> Result<(FmKmerIndex, ReadLengthHistogram)> {
        let mut sequences = Vec::new();
        let mut lengths = ReadLengthHistogram::new();
        for path in paths {
            let mut reader = FastqChunkReader::open(path)?;
            loop {
                let batch = reader.next_batch(BUILD_BATCH)?;
                if batch.is_empty() {
                    break;
                }
                let sanitized: Vec<Vec<u8>> =
                    batch.par_iter().map(|r| sanitize(&r.sequence)).collect();
                for seq in sanitized {
                    lengths.record(seq.len());
                    sequences.push(seq);
                }
            }
        }
        Ok((FmKmerIndex::from_sequences(sequences), lengths))
    }

    fn occurrences(&self, pattern: &[u8]) -> u64 {
        if pattern.is_empty() || !pattern.iter().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T' | b'N')) {
            return 0;
        }
        match self.fm.backward_search(pattern.iter()) {
            BackwardSearchResult::Complete(interval) => (interval.upper - interval.lower) as u64,
            BackwardSearchResult::Partial(..) | BackwardSearchResult::Absent => 0,
        }
    }
}

impl KmerCountOracle for FmKmerIndex {
    fn count(&self, kmer: &[u8]) -> u64 {
        self.occurrences(kmer) + self.occurrences(&reverse_complement(kmer))
    }
}

/// Scanning occurrence counter. Stores the sanitized reads and counts
/// matches by sliding a window over each one.
pub struct NaiveKmerIndex {
    reads: Vec<Vec<u8>>,
}

impl NaiveKmerIndex {
    /// Stores the given sequences for scanning.
    #[must_use]
    pub fn from_sequences<I>(sequences: I) -> NaiveKmerIndex
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        NaiveKmerIndex { reads: sequences.into_iter().map(|s| sanitize(&s)).collect() }
    }

    fn occurrences(&self, pattern: &[u8]) -> u64 {
        if pattern.is_empty() {
            return 0;
        }
        self.reads
            .par_iter()
            .map(|read| read.windows(pattern.len()).filter(|w| *w == pattern).count() as u64)
            .sum()
    }
}

impl KmerCountOracle for NaiveKmerIndex {
    fn count(&self, kmer: &[u8]) -> u64 {
        self.occurrences(kmer) + self.occurrences(&reverse_complement(kmer))
    }
}
