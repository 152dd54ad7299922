//! Correct sequencing errors in FASTQ reads.
//!
//! This tool indexes the k-mer content of the input reads, models the
//! expected coverage of a unique genomic k-mer, and rewrites each read to
//! remove substitutions, spurious insertions and deletions wherever the
//! trust models agree on a single repair. Each input file becomes one
//! output shard with a corrected FASTQ and a corrections sidecar.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use kcor_lib::bias::{CoverageBiasModel, GcMedianBias, NoBias};
use kcor_lib::classify::{ClassifierPolicy, KmerClassifier};
use kcor_lib::kmer_index::FmKmerIndex;
use kcor_lib::pipeline::{CorrectionAlgorithm, CorrectionPipeline, PipelineOptions};
use kcor_lib::profile::{ErrorProfile, OverallProfile};
use kcor_lib::progress::OperationTimer;
use kcor_lib::pusm::{GenomeTopology, Pusm};
use kcor_lib::validation::{validate_files_exist, validate_kmer_size, validate_output_dir};
use kcor_lib::walker::WalkerOptions;

use crate::commands::command::Command;

/// Genome topology argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TopologyArg {
    /// Linear chromosomes.
    Linear,
    /// Circular genome (plasmids, most bacterial chromosomes).
    Circular,
}

impl From<TopologyArg> for GenomeTopology {
    fn from(arg: TopologyArg) -> GenomeTopology {
        match arg {
            TopologyArg::Linear => GenomeTopology::Linear,
            TopologyArg::Circular => GenomeTopology::Circular,
        }
    }
}

/// Trust classification policy argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ClassifierArg {
    /// Fixed multiples of the expected count (0.5x / 1.5x).
    Threshold,
    /// Standardized deviation from the expected count (-2 / +2).
    ZScore,
}

impl From<ClassifierArg> for ClassifierPolicy {
    fn from(arg: ClassifierArg) -> ClassifierPolicy {
        match arg {
            ClassifierArg::Threshold => ClassifierPolicy::Threshold,
            ClassifierArg::ZScore => ClassifierPolicy::ZScore,
        }
    }
}

/// Correction algorithm argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AlgorithmArg {
    /// K-mer-trust-guided greedy correction.
    Kmer,
    /// Profile-ranked per-base correction, no k-mer consultation.
    ProfileOnly,
}

impl From<AlgorithmArg> for CorrectionAlgorithm {
    fn from(arg: AlgorithmArg) -> CorrectionAlgorithm {
        match arg {
            AlgorithmArg::Kmer => CorrectionAlgorithm::Kmer,
            AlgorithmArg::ProfileOnly => CorrectionAlgorithm::ProfileOnly,
        }
    }
}

/// Correct sequencing errors in FASTQ reads.
#[derive(Debug, Parser)]
#[command(
    name = "correct",
    about = "Correct sequencing errors in FASTQ reads",
    long_about = r#"
Correct substitutions, insertions and deletions in sequencing reads using
k-mer trust classification.

The k-mer content of the input reads is indexed up front; every window of
each read is then compared against the coverage expected of a unique
genomic k-mer. Each input file is processed by its own producer thread
and a configurable number of consumer threads, and becomes one output
shard.

EXAMPLES:

  # Substitution-only correction against a 4.6 Mb circular genome
  kcor correct -i reads.fastq -o out/ --genome-size 4641652 --topology circular

  # Full indel correction with gap resolution, two shards
  kcor correct -i lane1.fastq.gz -i lane2.fastq.gz -o out/ \
      --genome-size 4641652 --correct-indels --resolve-gaps

  # A learned coverage-bias table and error profile
  kcor correct -i reads.fastq -o out/ --genome-size 4641652 \
      --bias-table bias.tsv --error-profile profile.tsv
"#
)]
pub struct Correct {
    /// Input FASTQ file(s), plain or gzipped; one output shard each.
    #[arg(short = 'i', long = "input", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory for corrected FASTQ and corrections sidecars.
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: PathBuf,

    /// Estimated genome size in bases.
    #[arg(short = 'g', long = "genome-size")]
    pub genome_size: u64,

    /// Genome topology.
    #[arg(long = "topology", value_enum, default_value = "linear")]
    pub topology: TopologyArg,

    /// Minimum trusted k-mer length (must be odd).
    #[arg(short = 'k', long = "kmer-size", default_value_t = 15)]
    pub kmer_size: usize,

    /// Trust classification policy.
    #[arg(long = "classifier", value_enum, default_value = "threshold")]
    pub classifier: ClassifierArg,

    /// GC-binned coverage-bias table (TSV with gc and bias columns).
    /// Without it, bias correction is disabled.
    #[arg(long = "bias-table")]
    pub bias_table: Option<PathBuf>,

    /// Learned error profile (TSV with event and count columns).
    /// Without it, plausible short-read default rates are used.
    #[arg(long = "error-profile")]
    pub error_profile: Option<PathBuf>,

    /// Correction algorithm.
    #[arg(long = "algorithm", value_enum, default_value = "kmer")]
    pub algorithm: AlgorithmArg,

    /// Also repair insertions and deletions (substitutions and insertion
    /// removals only, otherwise).
    #[arg(long = "correct-indels")]
    pub correct_indels: bool,

    /// Run the multideletion resolver on reads carrying gap markers.
    #[arg(long = "resolve-gaps")]
    pub resolve_gaps: bool,

    /// Consumer threads per input file.
    #[arg(short = 't', long = "consumers-per-input", default_value_t = 2)]
    pub consumers_per_input: usize,

    /// Bounded queue capacity per producer, in batches.
    #[arg(long = "queue-size", default_value_t = 50)]
    pub queue_size: usize,

    /// Reads per batch.
    #[arg(long = "batch-size", default_value_t = 1024)]
    pub batch_size: usize,
}

impl Command for Correct {
    fn execute(&self) -> Result<()> {
        validate_files_exist(&self.inputs, "Input FASTQ")?;
        validate_output_dir(&self.output_dir)?;
        validate_kmer_size(self.kmer_size)?;
        if let Some(path) = &self.bias_table {
            validate_files_exist(std::slice::from_ref(path), "Bias table")?;
        }
        if let Some(path) = &self.error_profile {
            validate_files_exist(std::slice::from_ref(path), "Error profile")?;
        }

        info!("Inputs: {}", self.inputs.len());
        info!("Genome size: {} ({:?})", self.genome_size, self.topology);
        info!("K-mer size: {}", self.kmer_size);
        info!("Algorithm: {:?}, indels: {}", self.algorithm, self.correct_indels);
        info!("Consumers per input: {}", self.consumers_per_input);

        let timer = OperationTimer::start("Indexing read k-mers");
        let (index, read_lengths) =
            FmKmerIndex::from_fastq_paths(&self.inputs).context("Failed to index input reads")?;
        timer.done(read_lengths.total_reads());

        let expectation = Pusm::new(self.genome_size, self.topology.into(), read_lengths)
            .context("Failed to build the expectation model")?;
        let bias: Arc<dyn CoverageBiasModel> = match &self.bias_table {
            Some(path) => Arc::new(
                GcMedianBias::from_tsv(path).context("Failed to load the coverage-bias table")?,
            ),
            None => Arc::new(NoBias),
        };
        let profile: Arc<dyn ErrorProfile> = match &self.error_profile {
            Some(path) => Arc::new(
                OverallProfile::from_tsv(path).context("Failed to load the error profile")?,
            ),
            None => Arc::new(OverallProfile::with_default_rates()),
        };
        let classifier = KmerClassifier::new(
            Arc::new(index),
            bias,
            Arc::new(expectation),
            self.classifier.into(),
            self.kmer_size,
        )?;

        let options = PipelineOptions {
            algorithm: self.algorithm.into(),
            walker: WalkerOptions { correct_indels: self.correct_indels },
            resolve_gaps: self.resolve_gaps,
            consumers_per_input: self.consumers_per_input,
            queue_size: self.queue_size,
            batch_size: self.batch_size,
        };
        let pipeline = CorrectionPipeline::new(Arc::new(classifier), profile, options)?;

        let timer = OperationTimer::start("Correcting reads");
        let metrics = pipeline
            .run(&self.inputs, &self.output_dir)
            .context("Correction pipeline failed")?;
        timer.done(metrics.reads);

        let metrics_path = self.output_dir.join("correction_metrics.tsv");
        metrics.write_tsv(&metrics_path).context("Failed to write metrics")?;
        metrics.log_summary();
        info!("Metrics written to {}", metrics_path.display());
        Ok(())
    }
}
