//! The greedy correction walker.
//!
//! The walker slides an adaptive window across the corrected sequence.
//! Each window is classified; `Repeat` windows grow (right first, then
//! left, two bases at a time) until decisive, and `Untrusted` windows
//! trigger candidate enumeration: every reasonable single edit at the
//! cursor position is applied hypothetically, the edited window is
//! classified (growing outward on `Repeat` with the edit re-applied at the
//! shifted offset), and the candidates that flip the window away from
//! `Untrusted` are collected. Exactly one surviving candidate is applied;
//! several mean the window was not discriminating enough and is grown
//! before retrying — window growth, not candidate count, is the
//! tie-breaker. Deletion candidates must additionally pass the boundary
//! consistency check before they count as resolving.
//!
//! Regions that stay `Repeat` after exhausting growth terminate the walk
//! (the remainder of the read is repetitive); untrusted windows with no
//! surviving candidate are left uncorrected. Neither is an error.

use crate::boundary::BoundaryChecker;
use crate::classify::{KmerClass, KmerClassifier};
use crate::correction::{ErrorKind, apply_edit};
use crate::dna::{BASES, contains_gap, is_gap};
use crate::errors::Result;
use crate::fastq::ReadRecord;
use crate::profile::ErrorProfile;
use crate::read::CorrectedRead;

/// Walker configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkerOptions {
    /// Enable insertion/deletion repair. Off, only substitutions and
    /// insertion removals are attempted and the cursor advances one base
    /// per iteration; on, deletion candidates join the pool and an
    /// applied indel advances the cursor by half the last window length,
    /// since the edit shifted the frame under the remaining window.
    pub correct_indels: bool,
}

/// The adaptive classification window `[start, start + len)`.
#[derive(Debug, Clone, Copy)]
struct Window {
    start: usize,
    len: usize,
}

impl Window {
    fn end(self) -> usize {
        self.start + self.len
    }

    fn text(self, seq: &[u8]) -> &[u8] {
        &seq[self.start..self.end()]
    }
}

/// Corrects one read by walking it with the trust classifier.
///
/// # Errors
/// Propagates caller-contract and model-consistency violations; expected
/// outcomes (unresolved repeats, zero-candidate windows) are not errors.
pub fn correct_read(
    record: ReadRecord,
    classifier: &KmerClassifier,
    profile: &dyn ErrorProfile,
    options: &WalkerOptions,
) -> Result<CorrectedRead> {
    let mut read = CorrectedRead::new(record);
    let k_min = classifier.min_kmer_len();
    let checker = BoundaryChecker::new(classifier);

    let mut pos = 0usize;
    // The walk needs a full minimum-length window; the last k-1 bases
    // cannot anchor one.
    while pos + k_min <= read.len() {
        let mut window = Window { start: pos, len: k_min };
        if contains_gap(window.text(read.sequence())) {
            pos += 1;
            continue;
        }
        let mut class = classifier.classify(window.text(read.sequence()))?;
        if class == KmerClass::Repeat {
            class = grow_window(classifier, read.sequence(), &mut window)?;
            if class == KmerClass::Repeat {
                // The whole remainder belongs to a repetitive region.
                break;
            }
        }

        let mut applied_indel = false;
        if class == KmerClass::Untrusted {
            loop {
                let candidates =
                    resolving_candidates(&read, classifier, &checker, window, pos, options)?;
                match candidates.len() {
                    0 => break,
                    1 => {
                        let kind = candidates[0];
                        let probability = kind_probability(profile, read.sequence(), pos, kind)?;
                        read.apply_correction(kind, pos, probability)?;
                        applied_indel = !matches!(kind, ErrorKind::Sub(_));
                        break;
                    }
                    _ => {
                        // Ambiguous: a larger window must discriminate.
                        if !grow_window_step(read.sequence(), &mut window) {
                            break;
                        }
                    }
                }
            }
        }

        pos += if options.correct_indels && applied_indel {
            (window.len / 2).max(1)
        } else {
            1
        };
    }
    Ok(read)
}

/// Grows a `Repeat` window until decisive: first rightwards while room and
/// no gap symbol is crossed, then leftwards, reclassifying after each
/// two-base extension. Returns the final classification (possibly still
/// `Repeat` on exhaustion).
fn grow_window(
    classifier: &KmerClassifier,
    seq: &[u8],
    window: &mut Window,
) -> Result<KmerClass> {
    let mut class = KmerClass::Repeat;
    while class == KmerClass::Repeat && window.end() + 2 <= seq.len() {
        if is_gap(seq[window.end()]) || is_gap(seq[window.end() + 1]) {
            break;
        }
        window.len += 2;
        class = classifier.classify(window.text(seq))?;
    }
    while class == KmerClass::Repeat && window.start >= 2 {
        if is_gap(seq[window.start - 1]) || is_gap(seq[window.start - 2]) {
            break;
        }
        window.start -= 2;
        window.len += 2;
        class = classifier.classify(window.text(seq))?;
    }
    Ok(class)
}

/// Extends the window by one two-base step for the ambiguity tie-break,
/// preferring the right side. Returns `false` when no gap-free room
/// remains on either side.
fn grow_window_step(seq: &[u8], window: &mut Window) -> bool {
    if window.end() + 2 <= seq.len()
        && !is_gap(seq[window.end()])
        && !is_gap(seq[window.end() + 1])
    {
        window.len += 2;
        return true;
    }
    if window.start >= 2 && !is_gap(seq[window.start - 1]) && !is_gap(seq[window.start - 2]) {
        window.start -= 2;
        window.len += 2;
        return true;
    }
    false
}

/// Enumerates the reasonable single-edit candidates at the cursor position
/// and keeps those whose edited window no longer classifies `Untrusted`.
/// Deletion candidates must also pass the boundary consistency check.
fn resolving_candidates(
    read: &CorrectedRead,
    classifier: &KmerClassifier,
    checker: &BoundaryChecker<'_>,
    window: Window,
    pos: usize,
    options: &WalkerOptions,
) -> Result<Vec<ErrorKind>> {
    let seq = read.sequence();
    let text = window.text(seq);
    let offset = pos - window.start;
    let current = text[offset];

    let mut kinds = Vec::with_capacity(8);
    for base in BASES {
        if base.to_u8() != current {
            kinds.push(ErrorKind::Sub(base));
        }
    }
    if text.len() > 1 {
        kinds.push(ErrorKind::Insertion);
    }
    if options.correct_indels && pos + 1 < seq.len() {
        for base in BASES {
            kinds.push(ErrorKind::Del(base));
        }
    }

    let mut resolving = Vec::new();
    for kind in kinds {
        let candidate = apply_edit(text, offset, kind);
        let mut class = classifier.classify(&candidate)?;
        if class == KmerClass::Repeat {
            class = grow_edited_window(classifier, seq, window, offset, kind)?;
        }
        if class == KmerClass::Untrusted {
            continue;
        }
        if let ErrorKind::Del(base) = kind {
            if !checker.deletion_is_consistent(seq, pos, base)? {
                continue;
            }
        }
        resolving.push(kind);
    }
    Ok(resolving)
}

/// Grows a hypothetically edited window that classified `Repeat`: the
/// unedited window is extended (right first, then left) and the edit is
/// re-applied at its shifted offset before every reclassification, so the
/// asymmetric growth keeps pointing at the same read position.
fn grow_edited_window(
    classifier: &KmerClassifier,
    seq: &[u8],
    window: Window,
    offset: usize,
    kind: ErrorKind,
) -> Result<KmerClass> {
    let mut start = window.start;
    let mut len = window.len;
    let mut offset = offset;
    let mut class = KmerClass::Repeat;
    while class == KmerClass::Repeat && start + len + 2 <= seq.len() {
        if is_gap(seq[start + len]) || is_gap(seq[start + len + 1]) {
            break;
        }
        len += 2;
        let edited = apply_edit(&seq[start..start + len], offset, kind);
        class = classifier.classify(&edited)?;
    }
    while class == KmerClass::Repeat && start >= 2 {
        if is_gap(seq[start - 1]) || is_gap(seq[start - 2]) {
            break;
        }
        start -= 2;
        len += 2;
        offset += 2;
        let edited = apply_edit(&seq[start..start + len], offset, kind);
        class = classifier.classify(&edited)?;
    }
    Ok(class)
}

/// The profile's probability for an applied correction, for the
/// correction record. Missing or degenerate entries fall back to 1.0.
fn kind_probability(
    profile: &dyn ErrorProfile,
    seq: &[u8],
    pos: usize,
    kind: ErrorKind,
) -> Result<f64> {
    let probs = profile.probabilities(seq, pos)?;
    let p = probs.get(&kind).map_or(1.0, |ln_p| ln_p.exp());
    Ok(if p > 0.0 && p <= 1.0 { p } else { 1.0 })
}

/// Profile-only correction: no k-mer consultation at all. At each
/// position the most likely per-base edit is applied when the profile
/// ranks it above `Correct`, and (with indel repair enabled) the most
/// likely next-gap deletion when ranked above `NoDel`.
pub fn correct_read_profile_only(
    record: ReadRecord,
    profile: &dyn ErrorProfile,
    options: &WalkerOptions,
) -> Result<CorrectedRead> {
    let mut read = CorrectedRead::new(record);
    let mut pos = 0usize;
    while pos < read.len() {
        if is_gap(read.sequence()[pos]) {
            pos += 1;
            continue;
        }
        let probs = profile.probabilities(read.sequence(), pos)?;
        let (best, ln_p) = most_likely(&probs, &ErrorKind::current_base_kinds(), ErrorKind::Correct);
        let applicable = match best {
            ErrorKind::Insertion => options.correct_indels && pos > 0,
            ErrorKind::Sub(base) => read.sequence()[pos] != base.to_u8(),
            _ => false,
        };
        if applicable {
            read.apply_correction(best, pos, clamp_probability(ln_p))?;
            if best == ErrorKind::Insertion {
                // The removal shifted the tail left; re-inspect this slot.
                pos -= 1;
            }
        }

        if options.correct_indels && pos + 1 < read.len() && !is_gap(read.sequence()[pos]) {
            let probs = profile.probabilities(read.sequence(), pos)?;
            let (best, ln_p) = most_likely(&probs, &ErrorKind::next_gap_kinds(), ErrorKind::NoDel);
            if best != ErrorKind::NoDel {
                read.apply_correction(best, pos, clamp_probability(ln_p))?;
            }
        }
        pos += 1;
    }
    Ok(read)
}

fn most_likely(
    probs: &crate::profile::ErrorKindMap,
    kinds: &[ErrorKind],
    baseline: ErrorKind,
) -> (ErrorKind, f64) {
    let mut best = baseline;
    let mut best_p = probs.get(&baseline).copied().unwrap_or(f64::NEG_INFINITY);
    for &kind in kinds {
        let p = probs.get(&kind).copied().unwrap_or(f64::NEG_INFINITY);
        if p > best_p {
            best_p = p;
            best = kind;
        }
    }
    (best, best_p)
}

fn clamp_probability(ln_p: f64) -> f64 {
    let p = ln_p.exp();
    if p > 0.0 && p <= 1.0 { p } else { 1.0 }
}
