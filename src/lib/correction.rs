//! Correction events applied to a read.
//!
//! An [`ErrorKind`] names the sequencing error a correction undoes: the
//! genome base that was substituted away from, the identity of a deleted
//! base, an inserted base to drop, or a run of multiple deletions. The
//! sentinels `Correct` and `NoDel` exist only for ranking candidate edits
//! and are never stored as applied corrections.
//!
//! A [`Correction`] records one applied edit together with the substrings
//! it removed and inserted. The removed/inserted pair is fully determined
//! by the kind; a mismatch is a construction error, never silently fixed.

use crate::dna::{Base, GAP, is_gap};
use crate::errors::{KcorError, Result};

/// The closed taxonomy of sequencing error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The base is correct; ranking sentinel, never applied.
    Correct,
    /// An extra base was inserted into the read and must be removed.
    Insertion,
    /// The genome holds this base, the read holds something else.
    Sub(Base),
    /// A single base of this identity was deleted from the read.
    Del(Base),
    /// Two or more consecutive bases were deleted, or an unresolved
    /// chimeric break.
    MultiDel,
    /// No deletion at this gap; ranking sentinel, never applied.
    NoDel,
}

impl ErrorKind {
    /// All kinds that can be ranked for the base currently under the
    /// cursor: `Correct`, `Insertion` and the four substitutions.
    #[must_use]
    pub fn current_base_kinds() -> [ErrorKind; 6] {
        [
            ErrorKind::Correct,
            ErrorKind::Insertion,
            ErrorKind::Sub(Base::A),
            ErrorKind::Sub(Base::C),
            ErrorKind::Sub(Base::G),
            ErrorKind::Sub(Base::T),
        ]
    }

    /// All kinds that can be ranked for the gap following the cursor:
    /// the four single-base deletions, `MultiDel` and `NoDel`.
    #[must_use]
    pub fn next_gap_kinds() -> [ErrorKind; 6] {
        [
            ErrorKind::Del(Base::A),
            ErrorKind::Del(Base::C),
            ErrorKind::Del(Base::G),
            ErrorKind::Del(Base::T),
            ErrorKind::MultiDel,
            ErrorKind::NoDel,
        ]
    }

    /// The four single-base deletion kinds.
    #[must_use]
    pub fn single_deletions() -> [ErrorKind; 4] {
        [
            ErrorKind::Del(Base::A),
            ErrorKind::Del(Base::C),
            ErrorKind::Del(Base::G),
            ErrorKind::Del(Base::T),
        ]
    }

    /// Returns `true` for kinds that repair a gap between two bases
    /// rather than replacing a base in place.
    #[inline]
    #[must_use]
    pub fn is_deletion_like(self) -> bool {
        matches!(self, ErrorKind::Del(_) | ErrorKind::MultiDel)
    }

    /// Returns `true` for the ranking sentinels that are never applied.
    #[inline]
    #[must_use]
    pub fn is_sentinel(self) -> bool {
        matches!(self, ErrorKind::Correct | ErrorKind::NoDel)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Correct => write!(f, "correct"),
            ErrorKind::Insertion => write!(f, "insertion"),
            ErrorKind::Sub(base) => write!(f, "sub_from_{base}"),
            ErrorKind::Del(base) => write!(f, "del_of_{base}"),
            ErrorKind::MultiDel => write!(f, "multidel"),
            ErrorKind::NoDel => write!(f, "no_del"),
        }
    }
}

/// Applies a single hypothesized edit to a window of sequence text and
/// returns the edited text. `pos` is the offset of the edit inside the
/// window.
///
/// - `Sub(x)` replaces the byte at `pos` with `x`.
/// - `Insertion` drops the byte at `pos` (the window shrinks by one).
/// - `Del(x)` keeps the byte at `pos` and inserts `x` after it.
/// - `MultiDel` keeps the byte at `pos` and inserts the gap placeholder
///   after it.
///
/// # Panics
/// Panics if `pos` is out of range or a sentinel kind is passed; both are
/// internal logic errors in candidate enumeration.
#[must_use]
pub fn apply_edit(window: &[u8], pos: usize, kind: ErrorKind) -> Vec<u8> {
    assert!(pos < window.len(), "edit offset {pos} out of window of length {}", window.len());
    let mut edited = Vec::with_capacity(window.len() + 1);
    match kind {
        ErrorKind::Sub(base) => {
            edited.extend_from_slice(window);
            edited[pos] = base.to_u8();
        }
        ErrorKind::Insertion => {
            edited.extend_from_slice(&window[..pos]);
            edited.extend_from_slice(&window[pos + 1..]);
        }
        ErrorKind::Del(base) => {
            edited.extend_from_slice(&window[..=pos]);
            edited.push(base.to_u8());
            edited.extend_from_slice(&window[pos + 1..]);
        }
        ErrorKind::MultiDel => {
            edited.extend_from_slice(&window[..=pos]);
            edited.push(GAP);
            edited.extend_from_slice(&window[pos + 1..]);
        }
        ErrorKind::Correct | ErrorKind::NoDel => {
            panic!("sentinel kind {kind} cannot be applied to a window")
        }
    }
    edited
}

/// One applied correction: where it happened, what text it replaced, and
/// how likely the underlying error was.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    /// Position in the corrected sequence at application time.
    pub pos: usize,
    /// Position in the original read, taken from the coordinate map.
    pub orig_pos: usize,
    /// Substring removed from the corrected sequence.
    pub removed: Vec<u8>,
    /// Substring inserted in its place.
    pub inserted: Vec<u8>,
    /// Probability of the corrected error, in (0, 1].
    pub probability: f64,
    /// The kind of sequencing error this correction undoes.
    pub kind: ErrorKind,
}

impl Correction {
    /// Builds a correction, validating that the removed/inserted pair is
    /// derivable from the kind.
    pub fn new(
        pos: usize,
        orig_pos: usize,
        removed: Vec<u8>,
        inserted: Vec<u8>,
        probability: f64,
        kind: ErrorKind,
    ) -> Result<Correction> {
        if !(probability > 0.0 && probability <= 1.0) {
            return Err(KcorError::InvalidParameter {
                parameter: "probability".to_string(),
                reason: format!("must be in (0, 1], got {probability}"),
            });
        }
        let consistent = match kind {
            ErrorKind::Insertion => removed.len() == 1 && inserted.is_empty(),
            ErrorKind::Sub(base) => {
                removed.len() == 1
                    && inserted == [base.to_u8()]
                    && removed != inserted
                    && !is_gap(removed[0])
            }
            ErrorKind::Del(base) => {
                removed.len() == 1
                    && inserted.len() == 2
                    && inserted[0] == removed[0]
                    && inserted[1] == base.to_u8()
            }
            ErrorKind::MultiDel => {
                removed.len() == 1 && inserted.len() >= 2 && inserted[0] == removed[0]
            }
            ErrorKind::Correct | ErrorKind::NoDel => false,
        };
        if !consistent || removed == inserted {
            return Err(KcorError::CorrectionKindMismatch {
                kind: kind.to_string(),
                removed: String::from_utf8_lossy(&removed).into_owned(),
                inserted: String::from_utf8_lossy(&inserted).into_owned(),
            });
        }
        Ok(Correction { pos, orig_pos, removed, inserted, probability, kind })
    }

    /// The removed substring as UTF-8 text.
    #[must_use]
    pub fn removed_text(&self) -> String {
        String::from_utf8_lossy(&self.removed).into_owned()
    }

    /// The inserted substring as UTF-8 text.
    #[must_use]
    pub fn inserted_text(&self) -> String {
        String::from_utf8_lossy(&self.inserted).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::Sub(Base::A).to_string(), "sub_from_A");
        assert_eq!(ErrorKind::Del(Base::T).to_string(), "del_of_T");
        assert_eq!(ErrorKind::Insertion.to_string(), "insertion");
        assert_eq!(ErrorKind::MultiDel.to_string(), "multidel");
    }

    #[test]
    fn test_apply_edit_substitution() {
        assert_eq!(apply_edit(b"ACGT", 1, ErrorKind::Sub(Base::T)), b"ATGT".to_vec());
        assert_eq!(apply_edit(b"ACGT", 0, ErrorKind::Sub(Base::G)), b"GCGT".to_vec());
    }

    #[test]
    fn test_apply_edit_insertion() {
        assert_eq!(apply_edit(b"ACGT", 1, ErrorKind::Insertion), b"AGT".to_vec());
        assert_eq!(apply_edit(b"ACGT", 3, ErrorKind::Insertion), b"ACG".to_vec());
    }

    #[test]
    fn test_apply_edit_deletion() {
        assert_eq!(apply_edit(b"ACGT", 1, ErrorKind::Del(Base::T)), b"ACTGT".to_vec());
        assert_eq!(apply_edit(b"ACGT", 3, ErrorKind::Del(Base::A)), b"ACGTA".to_vec());
    }

    #[test]
    fn test_apply_edit_multidel() {
        assert_eq!(apply_edit(b"ACGT", 1, ErrorKind::MultiDel), b"AC_GT".to_vec());
    }

    #[test]
    fn test_correction_validation() {
        // Valid: substitution
        assert!(
            Correction::new(0, 0, b"C".to_vec(), b"A".to_vec(), 0.9, ErrorKind::Sub(Base::A))
                .is_ok()
        );
        // Invalid: substitution to itself
        assert!(
            Correction::new(0, 0, b"A".to_vec(), b"A".to_vec(), 0.9, ErrorKind::Sub(Base::A))
                .is_err()
        );
        // Valid: insertion removes one base, inserts nothing
        assert!(
            Correction::new(0, 0, b"C".to_vec(), b"".to_vec(), 0.9, ErrorKind::Insertion).is_ok()
        );
        // Invalid: insertion with inserted text
        assert!(
            Correction::new(0, 0, b"C".to_vec(), b"CA".to_vec(), 0.9, ErrorKind::Insertion)
                .is_err()
        );
        // Valid: single deletion keeps the removed base and adds one
        assert!(
            Correction::new(0, 0, b"A".to_vec(), b"AG".to_vec(), 0.9, ErrorKind::Del(Base::G))
                .is_ok()
        );
        // Invalid: deletion whose inserted text disagrees with the kind
        assert!(
            Correction::new(0, 0, b"A".to_vec(), b"AC".to_vec(), 0.9, ErrorKind::Del(Base::G))
                .is_err()
        );
        // Valid: multidel inserts the gap placeholder
        assert!(
            Correction::new(
                0,
                0,
                b"A".to_vec(),
                vec![b'A', GAP],
                0.9,
                ErrorKind::MultiDel
            )
            .is_ok()
        );
        // Sentinels are never stored
        assert!(
            Correction::new(0, 0, b"A".to_vec(), b"C".to_vec(), 0.9, ErrorKind::Correct).is_err()
        );
        assert!(
            Correction::new(0, 0, b"A".to_vec(), b"AC".to_vec(), 0.9, ErrorKind::NoDel).is_err()
        );
    }

    #[test]
    fn test_correction_probability_range() {
        assert!(
            Correction::new(0, 0, b"C".to_vec(), b"A".to_vec(), 0.0, ErrorKind::Sub(Base::A))
                .is_err()
        );
        assert!(
            Correction::new(0, 0, b"C".to_vec(), b"A".to_vec(), 1.5, ErrorKind::Sub(Base::A))
                .is_err()
        );
        assert!(
            Correction::new(0, 0, b"C".to_vec(), b"A".to_vec(), 1.0, ErrorKind::Sub(Base::A))
                .is_ok()
        );
    }
}
