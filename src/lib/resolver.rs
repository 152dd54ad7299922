//! Multideletion gap resolution.
//!
//! A gap placeholder in a corrected sequence stands for an unresolved run
//! of deleted bases (or an externally marked chimeric break). The resolver
//! tries to repair each gap by alternately extending its left and right
//! boundary k-mers: at each edge the plausible single-base deletions are
//! ranked by the error profile and the best one whose extended boundary
//! k-mer classifies trusted is materialized, shrinking the run one base at
//! a time. Once the k-mer bridging the placeholder classifies trusted the
//! placeholder is collapsed away; if neither edge can extend and the
//! bridge never becomes trusted the gap is reported unresolved and the
//! read keeps its marker for downstream handling (for example read
//! splitting).

use itertools::Itertools;

use crate::boundary::BoundaryChecker;
use crate::classify::{KmerClass, KmerClassifier};
use crate::correction::ErrorKind;
use crate::dna::{Base, is_gap};
use crate::errors::{KcorError, Result};
use crate::profile::ErrorProfile;
use crate::read::CorrectedRead;

/// Outcome of a gap-resolution pass over one read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GapResolution {
    /// Gaps collapsed successfully.
    pub resolved: usize,
    /// Gaps left in place with their marker.
    pub unresolved: usize,
}

/// Resolves every gap placeholder in the read, left to right.
///
/// # Errors
/// A gap flanked by an already-untrusted region is a model-consistency
/// violation and fails the whole read; unresolved gaps are an expected
/// outcome and only counted.
pub fn resolve_gaps(
    read: &mut CorrectedRead,
    classifier: &KmerClassifier,
    profile: &dyn ErrorProfile,
) -> Result<GapResolution> {
    let mut outcome = GapResolution::default();
    let mut i = 0;
    while i < read.len() {
        if is_gap(read.sequence()[i]) {
            if resolve_gap(read, classifier, profile, i)? {
                outcome.resolved += 1;
                // The marker is gone; whatever shifted into slot i is
                // inspected next.
            } else {
                outcome.unresolved += 1;
                i += 1;
            }
        } else {
            i += 1;
        }
    }
    Ok(outcome)
}

/// Attempts to resolve one gap. Returns `true` if the placeholder was
/// collapsed.
fn resolve_gap(
    read: &mut CorrectedRead,
    classifier: &KmerClassifier,
    profile: &dyn ErrorProfile,
    mut gap_pos: usize,
) -> Result<bool> {
    let checker = BoundaryChecker::new(classifier);

    let left = checker.flank_left(read.sequence(), gap_pos)?;
    let right = checker.flank_right(read.sequence(), gap_pos)?;
    if left == KmerClass::Untrusted || right == KmerClass::Untrusted {
        // The corrector never plants a gap next to an unresolved
        // untrusted region; finding one means the models contradict
        // themselves.
        return Err(KcorError::InconsistentBoundary { pos: gap_pos });
    }

    let mut middle = checker.bridged_at_gap(read.sequence(), gap_pos, None)?;
    let mut can_left = true;
    let mut can_right = true;
    let mut do_left = true;
    // Safety cap: a chimeric junction can extend one edge indefinitely
    // without the bridge ever becoming trusted.
    let max_steps = read.len();
    let mut steps = 0;

    while can_left && can_right && middle != KmerClass::Trusted && steps < max_steps {
        steps += 1;
        if do_left {
            if extend_left(read, classifier, profile, gap_pos)? {
                gap_pos += 1;
            } else {
                can_left = false;
            }
            if can_right {
                do_left = false;
            }
        } else {
            if !extend_right(read, classifier, profile, gap_pos)? {
                can_right = false;
            }
            if can_left {
                do_left = true;
            }
        }
        middle = checker.bridged_at_gap(read.sequence(), gap_pos, None)?;
    }

    if middle == KmerClass::Trusted {
        read.collapse_gap(gap_pos, 1.0)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Single-base deletion kinds at `pos`, ranked by descending profile
/// probability.
fn ranked_deletions(
    profile: &dyn ErrorProfile,
    seq: &[u8],
    pos: usize,
) -> Result<Vec<(Base, f64)>> {
    let probs = profile.probabilities(seq, pos)?;
    Ok(ErrorKind::single_deletions()
        .iter()
        .filter_map(|&kind| {
            let ErrorKind::Del(base) = kind else { return None };
            Some((base, probs.get(&kind).copied().unwrap_or(f64::NEG_INFINITY)))
        })
        .sorted_by(|a, b| b.1.total_cmp(&a.1))
        .collect())
}

/// The longest gap-free stretch of at most `max_len` bases ending just
/// before `end`.
fn gap_free_suffix(seq: &[u8], end: usize, max_len: usize) -> &[u8] {
    let lo = end.saturating_sub(max_len);
    let start = seq[lo..end]
        .iter()
        .rposition(|&b| is_gap(b))
        .map_or(lo, |offset| lo + offset + 1);
    &seq[start..end]
}

/// The longest gap-free stretch of at most `max_len` bases starting at
/// `start`.
fn gap_free_prefix(seq: &[u8], start: usize, max_len: usize) -> &[u8] {
    let hi = (start + max_len).min(seq.len());
    let end = seq[start..hi]
        .iter()
        .position(|&b| is_gap(b))
        .map_or(hi, |offset| start + offset);
    &seq[start..end]
}

/// Tries to materialize one deleted base at the left edge of the gap.
/// On success a deletion correction is applied at `gap_pos - 1` and the
/// marker moves one slot to the right.
fn extend_left(
    read: &mut CorrectedRead,
    classifier: &KmerClassifier,
    profile: &dyn ErrorProfile,
    gap_pos: usize,
) -> Result<bool> {
    if gap_pos == 0 {
        return Ok(false);
    }
    let k = classifier.min_kmer_len();
    let seq = read.sequence();
    let edge = gap_free_suffix(seq, gap_pos, k);
    if edge.is_empty() {
        return Ok(false);
    }
    let edge_start = gap_pos - edge.len();

    for (base, probability) in ranked_deletions(profile, seq, gap_pos - 1)? {
        let mut candidate = edge.to_vec();
        candidate.push(base.to_u8());
        let mut class = classifier.classify(&candidate)?;
        // Grow away from the gap while the boundary k-mer is repetitive.
        let mut start = edge_start;
        while class == KmerClass::Repeat && start >= 2 {
            if is_gap(seq[start - 1]) || is_gap(seq[start - 2]) {
                break;
            }
            candidate.insert(0, seq[start - 1]);
            candidate.insert(0, seq[start - 2]);
            class = classifier.classify(&candidate)?;
            start -= 2;
        }
        if class == KmerClass::Trusted {
            let p = clamp_probability(probability);
            read.apply_correction(ErrorKind::Del(base), gap_pos - 1, p)?;
            return Ok(true);
        }
    }
    Ok(false)
}

/// Tries to materialize one deleted base at the right edge of the gap.
/// On success a deletion correction is applied at the marker itself,
/// placing the base between the marker and the right flank.
fn extend_right(
    read: &mut CorrectedRead,
    classifier: &KmerClassifier,
    profile: &dyn ErrorProfile,
    gap_pos: usize,
) -> Result<bool> {
    if gap_pos + 1 >= read.len() {
        return Ok(false);
    }
    let k = classifier.min_kmer_len();
    let seq = read.sequence();
    let edge = gap_free_prefix(seq, gap_pos + 1, k);
    if edge.is_empty() {
        return Ok(false);
    }
    let edge_end = gap_pos + 1 + edge.len();

    for (base, probability) in ranked_deletions(profile, seq, gap_pos + 1)? {
        let mut candidate = Vec::with_capacity(edge.len() + 1);
        candidate.push(base.to_u8());
        candidate.extend_from_slice(edge);
        let mut class = classifier.classify(&candidate)?;
        let mut end = edge_end;
        while class == KmerClass::Repeat && end + 2 <= seq.len() {
            if is_gap(seq[end]) || is_gap(seq[end + 1]) {
                break;
            }
            candidate.push(seq[end]);
            candidate.push(seq[end + 1]);
            class = classifier.classify(&candidate)?;
            end += 2;
        }
        if class == KmerClass::Trusted {
            let p = clamp_probability(probability);
            read.apply_correction(ErrorKind::Del(base), gap_pos, p)?;
            return Ok(true);
        }
    }
    Ok(false)
}

fn clamp_probability(ln_p: f64) -> f64 {
    let p = ln_p.exp();
    if p > 0.0 && p <= 1.0 { p } else { 1.0 }
}
