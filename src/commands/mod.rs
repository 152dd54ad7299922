//! CLI command implementations for kcor.
//!
//! Each submodule implements one subcommand:
//!
//! - [`correct`] - correct sequencing errors in FASTQ reads using the
//!   k-mer trust models

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::needless_pass_by_value,
    clippy::uninlined_format_args
)]

pub mod command;
pub mod correct;
