//! Boundary consistency checks for deletion-like edits.
//!
//! A hypothesized deletion repairs a gap *between* two bases instead of
//! replacing a base in place, so local window classification alone is not
//! enough: the regions flanking the gap must each be individually decisive
//! (not `Untrusted`), and joining them across the gap — optionally with
//! the hypothesized base in the middle — must yield a trusted k-mer.
//! Whenever an inspected window classifies as `Repeat`, it is grown
//! outward two bases at a time (keeping the length odd so a k-mer is never
//! its own reverse complement) until the classification is decisive or no
//! gap-free sequence remains.
//!
//! Two bridge variants exist because a gap is addressed in two ways: an
//! unresolved multideletion occupies a sequence slot of its own (the gap
//! placeholder), while a single-deletion candidate sits between two real
//! bases. [`BoundaryChecker::bridged_at_gap`] excludes the slot;
//! [`BoundaryChecker::bridged_between`] keeps both neighbors.

use crate::classify::{KmerClass, KmerClassifier};
use crate::dna::{Base, contains_gap, is_gap};
use crate::errors::Result;

/// Checks the surroundings of a candidate gap against the trust
/// classifier.
pub struct BoundaryChecker<'a> {
    classifier: &'a KmerClassifier,
}

impl<'a> BoundaryChecker<'a> {
    /// Wraps the given classifier.
    #[must_use]
    pub fn new(classifier: &'a KmerClassifier) -> BoundaryChecker<'a> {
        BoundaryChecker { classifier }
    }

    /// Classifies the region ending immediately before `pos`, starting
    /// from the minimum k-mer length and extending leftwards while the
    /// classification is `Repeat`. Returns `Repeat` when fewer than
    /// `k_min` bases (or only gap-interrupted ones) are available.
    pub fn flank_left(&self, seq: &[u8], pos: usize) -> Result<KmerClass> {
        let k = self.classifier.min_kmer_len();
        if pos < k {
            return Ok(KmerClass::Repeat);
        }
        let mut window = seq[pos - k..pos].to_vec();
        if contains_gap(&window) {
            return Ok(KmerClass::Repeat);
        }
        let mut class = self.classifier.classify(&window)?;
        let mut start = pos - k;
        while class == KmerClass::Repeat && start >= 2 {
            if is_gap(seq[start - 1]) || is_gap(seq[start - 2]) {
                break;
            }
            window.insert(0, seq[start - 1]);
            window.insert(0, seq[start - 2]);
            class = self.classifier.classify(&window)?;
            start -= 2;
        }
        Ok(class)
    }

    /// Classifies the region starting immediately after `pos`, extending
    /// rightwards while the classification is `Repeat`.
    pub fn flank_right(&self, seq: &[u8], pos: usize) -> Result<KmerClass> {
        let k = self.classifier.min_kmer_len();
        if pos + 1 + k > seq.len() {
            return Ok(KmerClass::Repeat);
        }
        let mut window = seq[pos + 1..pos + 1 + k].to_vec();
        if contains_gap(&window) {
            return Ok(KmerClass::Repeat);
        }
        let mut class = self.classifier.classify(&window)?;
        let mut end = pos + k;
        while class == KmerClass::Repeat && end + 2 < seq.len() {
            if is_gap(seq[end + 1]) || is_gap(seq[end + 2]) {
                break;
            }
            window.push(seq[end + 1]);
            window.push(seq[end + 2]);
            class = self.classifier.classify(&window)?;
            end += 2;
        }
        Ok(class)
    }

    /// Classifies the k-mer bridging a gap placeholder occupying slot
    /// `gap_pos`: the neighbors of the slot joined together, the slot
    /// itself excluded, with `middle` (if any) standing in for the deleted
    /// run.
    pub fn bridged_at_gap(
        &self,
        seq: &[u8],
        gap_pos: usize,
        middle: Option<Base>,
    ) -> Result<KmerClass> {
        let left_start = gap_pos.checked_sub(1);
        self.bridged_core(seq, left_start, gap_pos + 1, middle)
    }

    /// Classifies the k-mer bridging the junction *between* `pos` and
    /// `pos + 1`, keeping both neighbors, with `middle` (if any) standing
    /// in for the hypothesized deleted base.
    pub fn bridged_between(
        &self,
        seq: &[u8],
        pos: usize,
        middle: Option<Base>,
    ) -> Result<KmerClass> {
        self.bridged_core(seq, Some(pos), pos + 1, middle)
    }

    /// Shared growth core for the bridge checks: alternates left and right
    /// extension, preferring whichever side still has gap-free sequence,
    /// and classifies whenever the window reaches the minimum length at
    /// odd parity. Returns the first decisive classification, or `Repeat`
    /// on exhaustion.
    fn bridged_core(
        &self,
        seq: &[u8],
        left_start: Option<usize>,
        right_start: usize,
        middle: Option<Base>,
    ) -> Result<KmerClass> {
        let k_min = self.classifier.min_kmer_len();
        let n = seq.len();
        let mut window: Vec<u8> = middle.map(|b| vec![b.to_u8()]).unwrap_or_default();
        let mut next_left = left_start;
        let mut next_right = right_start;
        let mut left_possible = next_left.is_some();
        let mut right_possible = next_right < n;
        let mut go_left = left_possible;

        while (left_possible || right_possible) && window.len() < n {
            if go_left {
                match next_left {
                    Some(i) if !is_gap(seq[i]) => {
                        window.insert(0, seq[i]);
                        if window.len() >= k_min && window.len() % 2 == 1 {
                            let class = self.classifier.classify(&window)?;
                            if class.is_decisive() {
                                return Ok(class);
                            }
                        }
                        next_left = i.checked_sub(1);
                        if next_left.is_none() {
                            left_possible = false;
                        }
                    }
                    _ => left_possible = false,
                }
                if right_possible {
                    go_left = false;
                }
            } else {
                if next_right < n && !is_gap(seq[next_right]) {
                    window.push(seq[next_right]);
                    if window.len() >= k_min && window.len() % 2 == 1 {
                        let class = self.classifier.classify(&window)?;
                        if class.is_decisive() {
                            return Ok(class);
                        }
                    }
                    next_right += 1;
                    if next_right >= n {
                        right_possible = false;
                    }
                } else {
                    right_possible = false;
                }
                if left_possible {
                    go_left = true;
                }
            }
        }
        Ok(KmerClass::Repeat)
    }

    /// Full acceptance test for a single-base deletion candidate at `pos`
    /// (the hypothesized base sits between `pos` and `pos + 1`): both
    /// flanks must not be untrusted, the junction without the hypothesis
    /// must currently be untrusted (it is actually broken), and the bridge
    /// with the hypothesized base must be trusted.
    pub fn deletion_is_consistent(&self, seq: &[u8], pos: usize, base: Base) -> Result<bool> {
        let left = self.flank_left(seq, pos + 1)?;
        let right = self.flank_right(seq, pos)?;
        if left == KmerClass::Untrusted || right == KmerClass::Untrusted {
            return Ok(false);
        }
        if self.bridged_between(seq, pos, None)? != KmerClass::Untrusted {
            return Ok(false);
        }
        Ok(self.bridged_between(seq, pos, Some(base))? == KmerClass::Trusted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bias::NoBias;
    use crate::classify::ClassifierPolicy;
    use crate::dna::GAP;
    use crate::testutil::{ConstExpectation, FixedCounts};
    use std::sync::Arc;

    const K: usize = 5;

    fn classifier(counts: FixedCounts) -> KmerClassifier {
        KmerClassifier::new(
            Arc::new(counts),
            Arc::new(NoBias),
            Arc::new(ConstExpectation { mean: 10.0, sd: 2.0 }),
            ClassifierPolicy::Threshold,
            K,
        )
        .unwrap()
    }

    #[test]
    fn test_flank_left_too_short_is_repeat() {
        let clf = classifier(FixedCounts::with_default(10));
        let checker = BoundaryChecker::new(&clf);
        assert_eq!(checker.flank_left(b"ACGTACGT", 3).unwrap(), KmerClass::Repeat);
    }

    #[test]
    fn test_flank_left_decisive_immediately() {
        let seq = b"ACGTTACAGGCT";
        let clf = classifier(FixedCounts::with_default(10));
        let checker = BoundaryChecker::new(&clf);
        assert_eq!(checker.flank_left(seq, 7).unwrap(), KmerClass::Trusted);
    }

    #[test]
    fn test_flank_left_grows_past_repeat() {
        let seq = b"ACGTTACAGGCT";
        let mut counts = FixedCounts::with_default(10);
        counts.set(&seq[2..7], 30); // initial left window is a repeat
        counts.set(&seq[0..7], 10); // grown window is trusted
        let clf = classifier(counts);
        let checker = BoundaryChecker::new(&clf);
        assert_eq!(checker.flank_left(seq, 7).unwrap(), KmerClass::Trusted);
    }

    #[test]
    fn test_flank_left_exhausted_repeat() {
        let seq = b"ACGTTACAGGCT";
        let clf = classifier(FixedCounts::with_default(30));
        let checker = BoundaryChecker::new(&clf);
        // Everything classifies repeat; growth runs out of sequence.
        assert_eq!(checker.flank_left(seq, 7).unwrap(), KmerClass::Repeat);
    }

    #[test]
    fn test_flank_right_windows() {
        let seq = b"ACGTTACAGGCT";
        let mut counts = FixedCounts::with_default(10);
        counts.set(&seq[5..10], 2); // window right of pos 4 is untrusted
        let clf = classifier(counts);
        let checker = BoundaryChecker::new(&clf);
        assert_eq!(checker.flank_right(seq, 4).unwrap(), KmerClass::Untrusted);
        // Not enough sequence right of position 8 for a full k-mer.
        assert_eq!(checker.flank_right(seq, 8).unwrap(), KmerClass::Repeat);
    }

    #[test]
    fn test_flank_stops_at_gap() {
        let mut seq = b"ACGTTACAGGCT".to_vec();
        seq[1] = GAP;
        let mut counts = FixedCounts::with_default(10);
        counts.set(&seq[2..7], 30); // repeat forces leftward growth into the gap
        let clf = classifier(counts);
        let checker = BoundaryChecker::new(&clf);
        assert_eq!(checker.flank_left(&seq, 7).unwrap(), KmerClass::Repeat);
    }

    #[test]
    fn test_bridged_at_gap_with_hypothesis() {
        let seq = b"ACGTTACAGGCT";
        let pos = 5;
        // Growth order around the excluded slot: left, right, left, right
        // -> s3 s4 G s6 s7.
        let bridge = vec![seq[3], seq[4], b'G', seq[6], seq[7]];
        let mut counts = FixedCounts::with_default(2);
        counts.set(&bridge, 10);
        let clf = classifier(counts);
        let checker = BoundaryChecker::new(&clf);
        assert_eq!(checker.bridged_at_gap(seq, pos, Some(Base::G)).unwrap(), KmerClass::Trusted);
    }

    #[test]
    fn test_bridged_at_gap_without_hypothesis_skips_slot() {
        let seq = b"ACGTTACAGGCT";
        let pos = 5;
        // Without a middle base the window closes over the slot:
        // left, right, left, right, left -> s2 s3 s4 s6 s7.
        let bridge = vec![seq[2], seq[3], seq[4], seq[6], seq[7]];
        let mut counts = FixedCounts::with_default(2);
        counts.set(&bridge, 10);
        let clf = classifier(counts);
        let checker = BoundaryChecker::new(&clf);
        assert_eq!(checker.bridged_at_gap(seq, pos, None).unwrap(), KmerClass::Trusted);
    }

    #[test]
    fn test_bridged_between_keeps_both_neighbors() {
        let seq = b"ACGTTACAGGCT";
        let pos = 5;
        // Junction between s5 and s6 with hypothesis G:
        // growth order left, right, left, right -> s4 s5 G s6 s7.
        let bridge = vec![seq[4], seq[5], b'G', seq[6], seq[7]];
        let mut counts = FixedCounts::with_default(2);
        counts.set(&bridge, 10);
        let clf = classifier(counts);
        let checker = BoundaryChecker::new(&clf);
        assert_eq!(checker.bridged_between(seq, pos, Some(Base::G)).unwrap(), KmerClass::Trusted);
        // Without the hypothesis the window is plain local sequence.
        let mut counts = FixedCounts::with_default(2);
        counts.set(&seq[3..8], 10);
        let clf = classifier(counts);
        let checker = BoundaryChecker::new(&clf);
        assert_eq!(checker.bridged_between(seq, pos, None).unwrap(), KmerClass::Trusted);
    }

    #[test]
    fn test_bridged_exhaustion_is_repeat() {
        let clf = classifier(FixedCounts::with_default(30));
        let checker = BoundaryChecker::new(&clf);
        assert_eq!(checker.bridged_at_gap(b"ACGTTACAGGCT", 5, None).unwrap(), KmerClass::Repeat);
    }

    #[test]
    fn test_bridged_stops_at_gap_symbol() {
        let mut seq = b"ACGTTACAGGCT".to_vec();
        seq[2] = GAP;
        seq[8] = GAP;
        let clf = classifier(FixedCounts::with_default(30));
        let checker = BoundaryChecker::new(&clf);
        // Growth is fenced in by the surrounding gaps and never reaches a
        // classifiable window.
        assert_eq!(checker.bridged_at_gap(&seq, 5, None).unwrap(), KmerClass::Repeat);
    }

    #[test]
    fn test_deletion_is_consistent() {
        let seq = b"ACGTTACAGGCT";
        let pos = 5;
        let with_base = vec![seq[4], seq[5], b'G', seq[6], seq[7]];
        let without: Vec<u8> = seq[3..8].to_vec();
        let mut counts = FixedCounts::with_default(10);
        counts.set(&with_base, 10); // trusted with the hypothesis
        counts.set(&without, 2); // broken junction without it
        let clf = classifier(counts);
        let checker = BoundaryChecker::new(&clf);
        assert!(checker.deletion_is_consistent(seq, pos, Base::G).unwrap());
        // A junction that is already fine needs no deletion.
        let clf = classifier(FixedCounts::with_default(10));
        let checker = BoundaryChecker::new(&clf);
        assert!(!checker.deletion_is_consistent(seq, pos, Base::G).unwrap());
    }
}
