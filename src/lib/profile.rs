//! Error-probability profiles.
//!
//! A profile answers, for a position in a sequence, how likely each kind
//! of sequencing error is at that position, as natural-log probabilities.
//! The walker uses these to attach probabilities to applied corrections
//! and the multideletion resolver uses them to rank candidate deletions at
//! a gap edge. Learning a profile is out of scope; a learned table is
//! loaded from disk, and plausible default rates are available for
//! datasets without one.

use std::path::Path;

use ahash::AHashMap;
use fgoxide::io::DelimFile;
use serde::{Deserialize, Serialize};

use crate::correction::ErrorKind;
use crate::dna::{BASES, Base, is_gap};
use crate::errors::{KcorError, Result};

/// Natural-log probabilities per error kind.
pub type ErrorKindMap = AHashMap<ErrorKind, f64>;

/// Per-position error likelihoods. Implementations must cover every
/// deletion kind plus `NoDel`, and every substitution/insertion kind plus
/// `Correct`, for any gap-free position they are queried at.
pub trait ErrorProfile: Send + Sync {
    /// Ln-probabilities of each error kind at `pos` in `seq`.
    fn probabilities(&self, seq: &[u8], pos: usize) -> Result<ErrorKindMap>;
}

/// One row of a stored profile table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRow {
    /// Event token: `total_bases`, `insertion`, `multidel`, `del_of_X`,
    /// or `sub_X_Y` (genome base X observed as read base Y).
    pub event: String,
    /// Number of observations.
    pub count: u64,
}

/// Global frequency-table profile: per-kind counts plus a substitution
/// matrix keyed by (genome base, read base), normalized by the total
/// number of observed bases.
#[derive(Debug, Clone)]
pub struct OverallProfile {
    total_bases: u64,
    insertions: u64,
    deletions: AHashMap<Base, u64>,
    multidels: u64,
    substitutions: AHashMap<(Base, u8), u64>,
    noncorrect: u64,
    deleted: u64,
}

impl OverallProfile {
    /// Builds a profile from raw observation counts.
    ///
    /// # Errors
    /// Fails if `total_bases` is zero or smaller than the error counts it
    /// must normalize.
    pub fn from_counts(
        total_bases: u64,
        insertions: u64,
        deletions: AHashMap<Base, u64>,
        multidels: u64,
        substitutions: AHashMap<(Base, u8), u64>,
    ) -> Result<OverallProfile> {
        let noncorrect = insertions + substitutions.values().sum::<u64>();
        let deleted = deletions.values().sum::<u64>() + multidels;
        if total_bases == 0 || noncorrect > total_bases || deleted > total_bases {
            return Err(KcorError::InvalidParameter {
                parameter: "error-profile".to_string(),
                reason: format!(
                    "total bases {total_bases} cannot normalize {noncorrect} base errors \
                     and {deleted} deletions"
                ),
            });
        }
        Ok(OverallProfile {
            total_bases,
            insertions,
            deletions,
            multidels,
            substitutions,
            noncorrect,
            deleted,
        })
    }

    /// A profile with plausible short-read defaults, for datasets without
    /// a learned table: substitutions around 1e-3 per base, indels an
    /// order of magnitude rarer.
    #[must_use]
    pub fn with_default_rates() -> OverallProfile {
        let total = 1_000_000u64;
        let mut deletions = AHashMap::new();
        for base in BASES {
            deletions.insert(base, 25);
        }
        let mut substitutions = AHashMap::new();
        for genome in BASES {
            for read in BASES {
                if genome != read {
                    substitutions.insert((genome, read.to_u8()), 333);
                }
            }
            substitutions.insert((genome, b'N'), 50);
        }
        OverallProfile::from_counts(total, 100, deletions, 10, substitutions)
            .expect("default rates are consistent")
    }

    /// Loads a profile from a TSV with `event` and `count` columns.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<OverallProfile> {
        let invalid = |reason: String| KcorError::InvalidFileFormat {
            file_type: "error profile".to_string(),
            path: path.as_ref().display().to_string(),
            reason,
        };
        let rows: Vec<ProfileRow> =
            DelimFile::default().read_tsv(&path).map_err(|e| invalid(e.to_string()))?;
        let mut total_bases = 0;
        let mut insertions = 0;
        let mut multidels = 0;
        let mut deletions = AHashMap::new();
        let mut substitutions = AHashMap::new();
        for row in rows {
            match parse_event(&row.event) {
                Some(Event::TotalBases) => total_bases = row.count,
                Some(Event::Insertion) => insertions = row.count,
                Some(Event::MultiDel) => multidels = row.count,
                Some(Event::Del(base)) => {
                    deletions.insert(base, row.count);
                }
                Some(Event::Sub(genome, read)) => {
                    substitutions.insert((genome, read), row.count);
                }
                None => return Err(invalid(format!("unknown event '{}'", row.event))),
            }
        }
        OverallProfile::from_counts(total_bases, insertions, deletions, multidels, substitutions)
    }

    /// Writes the profile as a TSV readable by [`OverallProfile::from_tsv`].
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut rows = vec![
            ProfileRow { event: "total_bases".to_string(), count: self.total_bases },
            ProfileRow { event: "insertion".to_string(), count: self.insertions },
            ProfileRow { event: "multidel".to_string(), count: self.multidels },
        ];
        for base in BASES {
            rows.push(ProfileRow {
                event: format!("del_of_{base}"),
                count: self.deletions.get(&base).copied().unwrap_or(0),
            });
        }
        for (&(genome, read), &count) in &self.substitutions {
            rows.push(ProfileRow {
                event: format!("sub_{genome}_{}", read as char),
                count,
            });
        }
        DelimFile::default().write_tsv(&path, rows).map_err(|e| KcorError::InvalidFileFormat {
            file_type: "error profile".to_string(),
            path: path.as_ref().display().to_string(),
            reason: e.to_string(),
        })
    }

    fn ln_rate(&self, count: u64) -> f64 {
        (count as f64 / self.total_bases as f64).ln()
    }
}

enum Event {
    TotalBases,
    Insertion,
    MultiDel,
    Del(Base),
    Sub(Base, u8),
}

fn parse_event(event: &str) -> Option<Event> {
    match event {
        "total_bases" => Some(Event::TotalBases),
        "insertion" => Some(Event::Insertion),
        "multidel" => Some(Event::MultiDel),
        _ => {
            if let Some(rest) = event.strip_prefix("del_of_") {
                if rest.len() != 1 {
                    return None;
                }
                return Base::from_u8(rest.as_bytes()[0]).map(Event::Del);
            }
            let rest = event.strip_prefix("sub_")?;
            let mut parts = rest.split('_');
            let genome_part = parts.next()?;
            let read_part = parts.next()?;
            if parts.next().is_some() || genome_part.len() != 1 || read_part.len() != 1 {
                return None;
            }
            let genome = Base::from_u8(genome_part.as_bytes()[0])?;
            Some(Event::Sub(genome, read_part.as_bytes()[0]))
        }
    }
}

impl ErrorProfile for OverallProfile {
    fn probabilities(&self, seq: &[u8], pos: usize) -> Result<ErrorKindMap> {
        if pos >= seq.len() {
            return Err(KcorError::PositionOutOfRange { pos, len: seq.len() });
        }
        let read_base = seq[pos];
        if is_gap(read_base) {
            return Err(KcorError::GapInKmer);
        }
        let mut map = ErrorKindMap::with_capacity(12);
        map.insert(ErrorKind::Insertion, self.ln_rate(self.insertions));
        map.insert(ErrorKind::MultiDel, self.ln_rate(self.multidels));
        for base in BASES {
            map.insert(
                ErrorKind::Del(base),
                self.ln_rate(self.deletions.get(&base).copied().unwrap_or(0)),
            );
            map.insert(
                ErrorKind::Sub(base),
                self.ln_rate(
                    self.substitutions.get(&(base, read_base)).copied().unwrap_or(0),
                ),
            );
        }
        map.insert(ErrorKind::Correct, self.ln_rate(self.total_bases - self.noncorrect));
        map.insert(ErrorKind::NoDel, self.ln_rate(self.total_bases - self.deleted));
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rates_cover_all_kinds() {
        let profile = OverallProfile::with_default_rates();
        let probs = profile.probabilities(b"ACGT", 1).unwrap();
        for kind in ErrorKind::current_base_kinds() {
            assert!(probs.contains_key(&kind), "missing {kind}");
        }
        for kind in ErrorKind::next_gap_kinds() {
            assert!(probs.contains_key(&kind), "missing {kind}");
        }
        // Correct and NoDel dominate everything else.
        let correct = probs[&ErrorKind::Correct];
        let no_del = probs[&ErrorKind::NoDel];
        for (&kind, &p) in &probs {
            if !kind.is_sentinel() {
                assert!(p < correct, "{kind} outranks Correct");
                assert!(p < no_del, "{kind} outranks NoDel");
            }
        }
    }

    #[test]
    fn test_substitutions_depend_on_read_base() {
        let mut substitutions = AHashMap::new();
        substitutions.insert((Base::A, b'C'), 500);
        substitutions.insert((Base::A, b'G'), 5);
        let profile =
            OverallProfile::from_counts(10_000, 10, AHashMap::new(), 0, substitutions).unwrap();
        // Read base C: genome-A substitution is common.
        let at_c = profile.probabilities(b"CCC", 1).unwrap();
        // Read base G: genome-A substitution is rare.
        let at_g = profile.probabilities(b"GGG", 1).unwrap();
        assert!(at_c[&ErrorKind::Sub(Base::A)] > at_g[&ErrorKind::Sub(Base::A)]);
        // Unobserved events get ln(0).
        assert_eq!(at_c[&ErrorKind::Sub(Base::T)], f64::NEG_INFINITY);
    }

    #[test]
    fn test_gap_position_rejected() {
        let profile = OverallProfile::with_default_rates();
        assert!(matches!(profile.probabilities(b"A_C", 1), Err(KcorError::GapInKmer)));
        assert!(profile.probabilities(b"AC", 2).is_err());
    }

    #[test]
    fn test_inconsistent_counts_rejected() {
        assert!(
            OverallProfile::from_counts(0, 0, AHashMap::new(), 0, AHashMap::new()).is_err()
        );
        assert!(
            OverallProfile::from_counts(5, 10, AHashMap::new(), 0, AHashMap::new()).is_err()
        );
    }

    #[test]
    fn test_tsv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.tsv");
        let original = OverallProfile::with_default_rates();
        original.to_tsv(&path).unwrap();
        let loaded = OverallProfile::from_tsv(&path).unwrap();
        let a = original.probabilities(b"ACGT", 2).unwrap();
        let b = loaded.probabilities(b"ACGT", 2).unwrap();
        for (kind, p) in a {
            assert!((p - b[&kind]).abs() < 1e-12, "mismatch for {kind}");
        }
    }

    #[test]
    fn test_unknown_event_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tsv");
        std::fs::write(&path, "event\tcount\nfrobnicate\t3\n").unwrap();
        assert!(OverallProfile::from_tsv(&path).is_err());
    }
}
