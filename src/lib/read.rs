//! The edit-consistent read model.
//!
//! A [`CorrectedRead`] owns a read's original record, its corrected
//! sequence and quality string, a coordinate map back to original read
//! positions, and the ordered log of applied corrections. The three
//! vectors are updated atomically inside the single mutation primitive
//! [`CorrectedRead::apply_correction`], so they can never diverge:
//!
//! 1. `sequence`, `quality` and the coordinate map always have equal
//!    length.
//! 2. Coordinate-map entries are only ever duplicated (deletion) or
//!    removed (insertion), never invented.
//! 3. The correction log is append-only; every entry was consistent with
//!    the sequence state at the time it was recorded.

use crate::correction::{Correction, ErrorKind};
use crate::dna::{GAP, is_gap};
use crate::errors::{KcorError, Result};
use crate::fastq::ReadRecord;

/// A read undergoing correction. See the module docs for the invariants.
#[derive(Debug, Clone)]
pub struct CorrectedRead {
    original: ReadRecord,
    sequence: Vec<u8>,
    quality: Vec<u8>,
    orig_positions: Vec<usize>,
    corrections: Vec<Correction>,
}

impl CorrectedRead {
    /// Wraps a raw read: corrected state equals the original, the
    /// coordinate map is the identity, and the correction log is empty.
    #[must_use]
    pub fn new(original: ReadRecord) -> CorrectedRead {
        let sequence = original.sequence.clone();
        let quality = original.quality.clone();
        let orig_positions = (0..sequence.len()).collect();
        CorrectedRead { original, sequence, quality, orig_positions, corrections: Vec::new() }
    }

    /// The immutable original record.
    #[must_use]
    pub fn original(&self) -> &ReadRecord {
        &self.original
    }

    /// The corrected sequence in its current state.
    #[must_use]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// The corrected quality string, always the same length as the
    /// sequence.
    #[must_use]
    pub fn quality(&self) -> &[u8] {
        &self.quality
    }

    /// For each corrected-sequence position, the original read position it
    /// descends from.
    #[must_use]
    pub fn orig_positions(&self) -> &[usize] {
        &self.orig_positions
    }

    /// The applied corrections in application order.
    #[must_use]
    pub fn corrections(&self) -> &[Correction] {
        &self.corrections
    }

    /// Current corrected-sequence length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Returns `true` if the corrected sequence is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Returns `true` while the corrected sequence still contains an
    /// unresolved gap placeholder.
    #[must_use]
    pub fn has_gap(&self) -> bool {
        self.sequence.contains(&GAP)
    }

    /// Length invariant accessor for tests: sequence, quality and
    /// coordinate map must agree after every mutation.
    #[must_use]
    pub fn is_length_consistent(&self) -> bool {
        self.sequence.len() == self.quality.len()
            && self.sequence.len() == self.orig_positions.len()
    }

    /// The corrected read as an output record. Unresolved gap placeholders
    /// are kept in the sequence so downstream tooling can split on them.
    #[must_use]
    pub fn to_record(&self) -> ReadRecord {
        ReadRecord {
            name: self.original.name.clone(),
            sequence: self.sequence.clone(),
            quality: self.quality.clone(),
        }
    }

    /// Applies a correction of the given kind at `pos`, deriving the
    /// removed and inserted substrings from the current sequence state.
    ///
    /// This is the only public mutation path. Sequence, quality and the
    /// coordinate map are updated together:
    ///
    /// - `Insertion` removes the base, its quality and its coordinate
    ///   entry.
    /// - `Del(x)` materializes `x` after `pos` with quality equal to the
    ///   truncated mean of the neighboring quality codes, duplicating the
    ///   coordinate entry.
    /// - `MultiDel` materializes the gap placeholder after `pos`,
    ///   extending quality and coordinates the same way.
    /// - `Sub(x)` rewrites the base in place; quality and coordinates are
    ///   untouched.
    ///
    /// # Errors
    /// Fails on out-of-range positions, on an insertion that would remove
    /// a gap placeholder, and on sentinel kinds.
    pub fn apply_correction(&mut self, kind: ErrorKind, pos: usize, probability: f64) -> Result<()> {
        if pos >= self.sequence.len() {
            return Err(KcorError::PositionOutOfRange { pos, len: self.sequence.len() });
        }
        let current = self.sequence[pos];
        if kind == ErrorKind::Insertion && is_gap(current) {
            return Err(KcorError::GapRemoval { pos });
        }
        let removed = vec![current];
        let inserted = match kind {
            ErrorKind::Insertion => Vec::new(),
            ErrorKind::Sub(base) => vec![base.to_u8()],
            ErrorKind::Del(base) => vec![current, base.to_u8()],
            ErrorKind::MultiDel => vec![current, GAP],
            ErrorKind::Correct | ErrorKind::NoDel => {
                return Err(KcorError::CorrectionKindMismatch {
                    kind: kind.to_string(),
                    removed: (current as char).to_string(),
                    inserted: String::new(),
                });
            }
        };
        let corr =
            Correction::new(pos, self.orig_positions[pos], removed, inserted, probability, kind)?;
        self.apply(corr)
    }

    /// Applies a pre-built correction after checking it against the
    /// current sequence state.
    ///
    /// # Errors
    /// Fails if the removed text does not match the sequence at `pos`, or
    /// if a deletion-like correction falls on the last base (there is no
    /// right neighbor to average quality with).
    pub fn apply(&mut self, corr: Correction) -> Result<()> {
        let pos = corr.pos;
        if pos + corr.removed.len() > self.sequence.len() {
            return Err(KcorError::PositionOutOfRange { pos, len: self.sequence.len() });
        }
        let found = &self.sequence[pos..pos + corr.removed.len()];
        if found != corr.removed.as_slice() {
            return Err(KcorError::RemovedTextMismatch {
                pos,
                expected: corr.removed_text(),
                found: String::from_utf8_lossy(found).into_owned(),
            });
        }
        if corr.kind.is_deletion_like() && pos + 1 >= self.sequence.len() {
            return Err(KcorError::PositionOutOfRange { pos: pos + 1, len: self.sequence.len() });
        }
        self.splice_and_record(corr);
        Ok(())
    }

    /// Removes a resolved gap placeholder at `pos`, recording the removal
    /// as an insertion correction. Only the multideletion resolver calls
    /// this, once the flanks around the placeholder have been joined into
    /// a trusted k-mer.
    pub(crate) fn collapse_gap(&mut self, pos: usize, probability: f64) -> Result<()> {
        if pos >= self.sequence.len() {
            return Err(KcorError::PositionOutOfRange { pos, len: self.sequence.len() });
        }
        if !is_gap(self.sequence[pos]) {
            return Err(KcorError::RemovedTextMismatch {
                pos,
                expected: (GAP as char).to_string(),
                found: (self.sequence[pos] as char).to_string(),
            });
        }
        let corr = Correction::new(
            pos,
            self.orig_positions[pos],
            vec![GAP],
            Vec::new(),
            probability,
            ErrorKind::Insertion,
        )?;
        self.splice_and_record(corr);
        Ok(())
    }

    /// The single internal splice point where sequence, quality and the
    /// coordinate map change together.
    fn splice_and_record(&mut self, corr: Correction) {
        let pos = corr.pos;
        match corr.kind {
            ErrorKind::Insertion => {
                self.sequence.remove(pos);
                self.quality.remove(pos);
                self.orig_positions.remove(pos);
            }
            ErrorKind::Sub(_) => {
                self.sequence[pos] = corr.inserted[0];
            }
            ErrorKind::Del(_) | ErrorKind::MultiDel => {
                let n = corr.inserted.len();
                let q_left = self.quality[pos];
                let q_right = self.quality[pos + 1];
                let q_mid = ((u16::from(q_left) + u16::from(q_right)) / 2) as u8;
                self.sequence.splice(pos..=pos, corr.inserted.iter().copied());
                let mut quals = Vec::with_capacity(n);
                quals.push(q_left);
                quals.resize(n, q_mid);
                self.quality.splice(pos..=pos, quals);
                let orig = self.orig_positions[pos];
                for _ in 1..n {
                    self.orig_positions.insert(pos, orig);
                }
            }
            ErrorKind::Correct | ErrorKind::NoDel => unreachable!("sentinels are never applied"),
        }
        self.corrections.push(corr);
        debug_assert!(self.is_length_consistent());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dna::Base;

    fn record(seq: &[u8], qual: &[u8]) -> ReadRecord {
        ReadRecord { name: b"read1".to_vec(), sequence: seq.to_vec(), quality: qual.to_vec() }
    }

    #[test]
    fn test_identity_construction() {
        let read = CorrectedRead::new(record(b"ACGTA", b"IIIII"));
        assert!(read.corrections().is_empty());
        assert_eq!(read.orig_positions(), &[0, 1, 2, 3, 4]);
        assert_eq!(read.sequence(), b"ACGTA");
        assert_eq!(read.quality(), b"IIIII");
        assert!(read.is_length_consistent());
    }

    #[test]
    fn test_deletion_quality_mean() {
        // Codes: '0' = 48, '2' = 50; their mean 49 = '1'.
        let mut read = CorrectedRead::new(record(b"AC", b"02"));
        read.apply_correction(ErrorKind::Del(Base::G), 0, 1.0).unwrap();
        assert_eq!(read.sequence(), b"AGC");
        assert_eq!(read.quality(), b"012");
        assert_eq!(read.orig_positions(), &[0, 0, 1]);
        assert!(read.is_length_consistent());
        assert_eq!(read.corrections().len(), 1);
        assert_eq!(read.corrections()[0].removed, b"A".to_vec());
        assert_eq!(read.corrections()[0].inserted, b"AG".to_vec());
    }

    #[test]
    fn test_insertion_removes_base() {
        let mut read = CorrectedRead::new(record(b"ACGT", b"1111"));
        read.apply_correction(ErrorKind::Insertion, 1, 1.0).unwrap();
        assert_eq!(read.sequence(), b"AGT");
        assert_eq!(read.quality(), b"111");
        assert_eq!(read.orig_positions(), &[0, 2, 3]);
        assert!(read.is_length_consistent());
    }

    #[test]
    fn test_substitution_leaves_quality() {
        let mut read = CorrectedRead::new(record(b"ACGT", b"FFFF"));
        read.apply_correction(ErrorKind::Sub(Base::T), 2, 0.5).unwrap();
        assert_eq!(read.sequence(), b"ACTT");
        assert_eq!(read.quality(), b"FFFF");
        assert_eq!(read.orig_positions(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_multidel_inserts_placeholder() {
        let mut read = CorrectedRead::new(record(b"ACGT", b"0246"));
        read.apply_correction(ErrorKind::MultiDel, 1, 1.0).unwrap();
        assert_eq!(read.sequence(), b"AC_GT");
        // q_mid = mean('2'=50, '4'=52) = 51 = '3'; inserted text has n = 2.
        assert_eq!(read.quality(), b"02346");
        assert_eq!(read.orig_positions(), &[0, 1, 1, 2, 3]);
        assert!(read.is_length_consistent());
        assert!(read.has_gap());
    }

    #[test]
    fn test_collapse_gap() {
        let mut read = CorrectedRead::new(record(b"ACGT", b"0246"));
        read.apply_correction(ErrorKind::MultiDel, 1, 1.0).unwrap();
        read.collapse_gap(2, 1.0).unwrap();
        assert_eq!(read.sequence(), b"ACGT");
        assert_eq!(read.quality(), b"0246");
        assert!(!read.has_gap());
        assert_eq!(read.corrections().len(), 2);
        assert_eq!(read.corrections()[1].kind, ErrorKind::Insertion);
    }

    #[test]
    fn test_insertion_of_gap_rejected() {
        let mut read = CorrectedRead::new(record(b"ACGT", b"0246"));
        read.apply_correction(ErrorKind::MultiDel, 1, 1.0).unwrap();
        let err = read.apply_correction(ErrorKind::Insertion, 2, 1.0).unwrap_err();
        assert!(matches!(err, KcorError::GapRemoval { pos: 2 }));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut read = CorrectedRead::new(record(b"ACGT", b"1111"));
        let err = read.apply_correction(ErrorKind::Insertion, 4, 1.0).unwrap_err();
        assert!(matches!(err, KcorError::PositionOutOfRange { pos: 4, len: 4 }));
    }

    #[test]
    fn test_deletion_on_last_base_rejected() {
        let mut read = CorrectedRead::new(record(b"ACGT", b"1111"));
        assert!(read.apply_correction(ErrorKind::Del(Base::A), 3, 1.0).is_err());
    }

    #[test]
    fn test_removed_text_mismatch() {
        let mut read = CorrectedRead::new(record(b"ACGT", b"1111"));
        let corr = Correction::new(0, 0, b"G".to_vec(), b"GA".to_vec(), 1.0, ErrorKind::Del(Base::A))
            .unwrap();
        assert!(matches!(read.apply(corr), Err(KcorError::RemovedTextMismatch { .. })));
    }

    #[test]
    fn test_invariant_across_edit_sequence() {
        let mut read = CorrectedRead::new(record(b"ACGTACGTACGT", b"IIIIIIIIIIII"));
        read.apply_correction(ErrorKind::Sub(Base::T), 0, 0.9).unwrap();
        assert!(read.is_length_consistent());
        read.apply_correction(ErrorKind::Del(Base::C), 4, 0.8).unwrap();
        assert!(read.is_length_consistent());
        read.apply_correction(ErrorKind::Insertion, 7, 0.7).unwrap();
        assert!(read.is_length_consistent());
        read.apply_correction(ErrorKind::MultiDel, 2, 0.6).unwrap();
        assert!(read.is_length_consistent());
        assert_eq!(read.corrections().len(), 4);
        // The log is append-only and ordered by application.
        assert_eq!(read.corrections()[0].kind, ErrorKind::Sub(Base::T));
        assert_eq!(read.corrections()[3].kind, ErrorKind::MultiDel);
    }
}
