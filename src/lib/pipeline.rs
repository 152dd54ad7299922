//! The bounded producer/consumer correction pipeline.
//!
//! One producer thread per input shard reads batches of records into a
//! bounded channel; a configurable number of consumer threads per
//! producer drain it, correct each read end-to-end, and serialize results
//! through that shard's output mutex. Producers block when their channel
//! is full; consumers block when it is empty and exit once the producer
//! has dropped its sender and the channel drains. Consumers of different
//! shards never contend.
//!
//! A fatal model inconsistency in one read is isolated: the read is
//! written through uncorrected, counted, and the batch continues.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::classify::KmerClassifier;
use crate::errors::{KcorError, Result};
use crate::fastq::{CorrectionRow, FastqChunkReader, ReadRecord, ShardWriter};
use crate::metrics::CorrectionMetrics;
use crate::profile::ErrorProfile;
use crate::progress::ProgressTracker;
use crate::read::CorrectedRead;
use crate::resolver::resolve_gaps;
use crate::walker::{WalkerOptions, correct_read, correct_read_profile_only};

/// Which correction algorithm consumers run per read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrectionAlgorithm {
    /// The k-mer-trust-guided greedy walker.
    #[default]
    Kmer,
    /// Profile-ranked per-base correction without k-mer consultation.
    ProfileOnly,
}

/// Pipeline configuration.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Correction algorithm to run per read.
    pub algorithm: CorrectionAlgorithm,
    /// Walker configuration shared by all consumers.
    pub walker: WalkerOptions,
    /// Run the multideletion resolver on reads that carry gap markers.
    pub resolve_gaps: bool,
    /// Consumer threads per input shard.
    pub consumers_per_input: usize,
    /// Bounded channel capacity, in batches, per producer.
    pub queue_size: usize,
    /// Reads per batch.
    pub batch_size: usize,
}

impl Default for PipelineOptions {
    fn default() -> PipelineOptions {
        PipelineOptions {
            algorithm: CorrectionAlgorithm::Kmer,
            walker: WalkerOptions::default(),
            resolve_gaps: false,
            consumers_per_input: 2,
            queue_size: 50,
            batch_size: 1024,
        }
    }
}

#[derive(Default)]
struct Counters {
    reads: AtomicU64,
    corrected_reads: AtomicU64,
    corrections: AtomicU64,
    unresolved_gap_reads: AtomicU64,
    failed_reads: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CorrectionMetrics {
        CorrectionMetrics {
            reads: self.reads.load(Ordering::Relaxed),
            corrected_reads: self.corrected_reads.load(Ordering::Relaxed),
            corrections: self.corrections.load(Ordering::Relaxed),
            unresolved_gap_reads: self.unresolved_gap_reads.load(Ordering::Relaxed),
            failed_reads: self.failed_reads.load(Ordering::Relaxed),
        }
    }
}

/// Runs the correction models over streams of reads.
pub struct CorrectionPipeline {
    classifier: Arc<KmerClassifier>,
    profile: Arc<dyn ErrorProfile>,
    options: PipelineOptions,
}

impl CorrectionPipeline {
    /// Builds a pipeline over the given models.
    ///
    /// # Errors
    /// Fails on non-positive thread, queue or batch settings.
    pub fn new(
        classifier: Arc<KmerClassifier>,
        profile: Arc<dyn ErrorProfile>,
        options: PipelineOptions,
    ) -> Result<CorrectionPipeline> {
        for (name, value) in [
            ("consumers-per-input", options.consumers_per_input),
            ("queue-size", options.queue_size),
            ("batch-size", options.batch_size),
        ] {
            if value == 0 {
                return Err(KcorError::InvalidParameter {
                    parameter: name.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(CorrectionPipeline { classifier, profile, options })
    }

    /// Corrects every read of every input shard, writing per-shard
    /// outputs into `output_dir`, and returns the run metrics.
    ///
    /// # Errors
    /// Fails on I/O problems and malformed input; per-read model
    /// inconsistencies are counted, not propagated.
    pub fn run(&self, inputs: &[PathBuf], output_dir: &Path) -> Result<CorrectionMetrics> {
        let counters = Counters::default();
        let progress = ProgressTracker::new("Corrected reads", 100_000);
        let mut writers = Vec::with_capacity(inputs.len());
        let mut outcome: Result<()> = Ok(());

        std::thread::scope(|scope| {
            let mut handles = Vec::new();
            for input in inputs {
                let writer = match ShardWriter::create(input, output_dir) {
                    Ok(w) => Arc::new(Mutex::new(w)),
                    Err(e) => {
                        outcome = Err(e);
                        return;
                    }
                };
                writers.push(Arc::clone(&writer));

                let (tx, rx) = bounded::<Vec<ReadRecord>>(self.options.queue_size);
                let batch_size = self.options.batch_size;
                handles.push(scope.spawn(move || produce(input, batch_size, &tx)));
                for _ in 0..self.options.consumers_per_input {
                    let rx = rx.clone();
                    let writer = Arc::clone(&writer);
                    let counters = &counters;
                    let progress = &progress;
                    handles.push(
                        scope.spawn(move || self.consume(&rx, &writer, counters, progress)),
                    );
                }
            }
            for handle in handles {
                let result = handle.join().expect("pipeline thread panicked");
                if outcome.is_ok() {
                    if let Err(e) = result {
                        outcome = Err(e);
                    }
                }
            }
        });
        outcome?;

        for writer in writers {
            writer.lock().finish()?;
        }
        progress.finish();
        Ok(counters.snapshot())
    }

    /// Drains one producer's channel, correcting and writing each read.
    fn consume(
        &self,
        rx: &Receiver<Vec<ReadRecord>>,
        writer: &Mutex<ShardWriter>,
        counters: &Counters,
        progress: &ProgressTracker,
    ) -> Result<()> {
        for batch in rx.iter() {
            for record in batch {
                counters.reads.fetch_add(1, Ordering::Relaxed);
                match self.correct_one(record.clone()) {
                    Ok((read, gap_unresolved)) => {
                        let n = read.corrections().len() as u64;
                        counters.corrections.fetch_add(n, Ordering::Relaxed);
                        if n > 0 {
                            counters.corrected_reads.fetch_add(1, Ordering::Relaxed);
                        }
                        if gap_unresolved {
                            counters.unresolved_gap_reads.fetch_add(1, Ordering::Relaxed);
                        }
                        let rows = correction_rows(&read);
                        writer.lock().write(&read.to_record(), &rows)?;
                    }
                    Err(e) => {
                        // One bad read must not halt the batch.
                        warn!("read {}: {e}; written uncorrected", record.name_text());
                        counters.failed_reads.fetch_add(1, Ordering::Relaxed);
                        writer.lock().write(&record, &[])?;
                    }
                }
                progress.add(1);
            }
        }
        Ok(())
    }

    /// Runs the configured algorithm (and optionally the resolver) on one
    /// read, entirely on the calling thread.
    fn correct_one(&self, record: ReadRecord) -> Result<(CorrectedRead, bool)> {
        let mut read = match self.options.algorithm {
            CorrectionAlgorithm::Kmer => {
                correct_read(record, &self.classifier, self.profile.as_ref(), &self.options.walker)?
            }
            CorrectionAlgorithm::ProfileOnly => {
                correct_read_profile_only(record, self.profile.as_ref(), &self.options.walker)?
            }
        };
        let gap_unresolved = if read.has_gap() && self.options.resolve_gaps {
            let outcome = resolve_gaps(&mut read, &self.classifier, self.profile.as_ref())?;
            outcome.unresolved > 0
        } else {
            read.has_gap()
        };
        Ok((read, gap_unresolved))
    }
}

fn produce(input: &Path, batch_size: usize, tx: &Sender<Vec<ReadRecord>>) -> Result<()> {
    let mut reader = FastqChunkReader::open(input)?;
    loop {
        let batch = reader.next_batch(batch_size)?;
        if batch.is_empty() {
            break;
        }
        if tx.send(batch).is_err() {
            // All consumers died; their error is the interesting one.
            break;
        }
    }
    debug!("{}: produced {} reads", input.display(), reader.records_read());
    Ok(())
}

fn correction_rows(read: &CorrectedRead) -> Vec<CorrectionRow> {
    let name = read.original().name_text();
    read.corrections()
        .iter()
        .map(|c| CorrectionRow {
            read: name.clone(),
            pos: c.pos,
            orig_pos: c.orig_pos,
            removed: c.removed_text(),
            inserted: c.inserted_text(),
            probability: c.probability,
            kind: c.kind.to_string(),
        })
        .collect()
}
