#![deny(unsafe_code)]
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args
)]

//! # kcor - k-mer-trust-guided read error correction
//!
//! This library corrects sequencing errors in DNA/RNA reads by comparing
//! the k-mer content of each read against a statistical model of which
//! k-mers are biologically plausible.
//!
//! ## Overview
//!
//! The pipeline classifies every k-mer of a read as trusted, untrusted or
//! repetitive by combining three models: exact occurrence counts over the
//! read set ([`kmer_index`]), a GC-keyed coverage-bias correction
//! ([`bias`]), and the expected count of a unique genomic k-mer under
//! uniform sequencing ([`pusm`]). The greedy walker ([`walker`]) slides
//! an adaptive window over each read and repairs substitutions, spurious
//! insertions and single-base deletions; runs of multiple deletions are
//! marked with a gap placeholder and repaired by the resolver
//! ([`resolver`]). Reads flow through a bounded producer/consumer
//! pipeline ([`pipeline`]) with one producer per input shard.
//!
//! ## Core modules
//!
//! - **[`read`]** - the edit-consistent read model: sequence, quality and
//!   coordinate map mutated atomically through one primitive
//! - **[`classify`]** - k-mer trust classification with a per-run memo
//! - **[`boundary`]** - flank and bridge consistency checks for
//!   deletion-like edits
//! - **[`walker`]** - the greedy correction walk
//! - **[`resolver`]** - multideletion gap repair
//! - **[`pipeline`]** - the concurrent correction pipeline
//!
//! ## Model interfaces
//!
//! - **[`kmer_index`]** - exact reverse-complement-aware occurrence
//!   counts (FM-index backed)
//! - **[`bias`]** - coverage-bias models
//! - **[`pusm`]** - expected k-mer counts under perfect uniform
//!   sequencing
//! - **[`profile`]** - per-position error-probability profiles
//!
//! ## Utilities
//!
//! - **[`dna`]**, **[`correction`]**, **[`fastq`]**, **[`metrics`]**,
//!   **[`progress`]**, **[`validation`]**, **[`errors`]**

pub mod bias;
pub mod boundary;
pub mod classify;
pub mod correction;
pub mod dna;
pub mod errors;
pub mod fastq;
pub mod kmer_index;
pub mod metrics;
pub mod pipeline;
pub mod profile;
pub mod progress;
pub mod pusm;
pub mod read;
pub mod resolver;
pub mod validation;
pub mod walker;

#[cfg(test)]
pub(crate) mod testutil;

pub use errors::{KcorError, Result};
