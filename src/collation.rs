use std::cmp::Ordering;

use icu::collator::options::{CollatorOptions, Strength};
use icu::collator::{Collator, CollatorBorrowed};
use icu::locale::Locale;
use icu::segmenter::GraphemeClusterSegmenter;
use log::{debug, warn};
use rayon::prelude::*;

/// Indexes smaller than this many entries per worker thread are sorted on
/// the calling thread.
const PARALLEL_SORT_GRAIN: usize = 1024;

/// Locale-aware ordering for one dictionary.
///
/// Two collators are kept: a full-strength one that fixes the iteration
/// order, and a secondary-strength one (case-insensitive) used for searching
/// and prefix matching.
pub struct Collation {
    locale: String,
    sort: CollatorBorrowed<'static>,
    search: CollatorBorrowed<'static>,
}

impl std::fmt::Debug for Collation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collation")
            .field("locale", &self.locale)
            .finish()
    }
}

/// Turn POSIX-style names (`cs_CZ.UTF-8@euro`) into BCP-47 (`cs-CZ`).
pub fn normalize_locale(name: &str) -> String {
    let name = name.trim();
    let name = name.split('@').next().unwrap_or(name);
    let name = name.split('.').next().unwrap_or(name);
    name.replace('_', "-")
}

impl Collation {
    /// Build collators for `locale_name`. Returns `None`, after logging, if
    /// the name cannot be parsed or no collator can be constructed.
    pub fn new(locale_name: &str) -> Option<Self> {
        let normalized = normalize_locale(locale_name);
        let locale: Locale = match normalized.parse() {
            Ok(l) => l,
            Err(e) => {
                warn!("collation `{}': not a valid locale: {:?}", locale_name, e);
                return None;
            }
        };

        let sort = match Collator::try_new(locale.clone().into(), CollatorOptions::default()) {
            Ok(c) => c,
            Err(e) => {
                warn!("collation `{}': no collator: {}", locale_name, e);
                return None;
            }
        };

        let mut options = CollatorOptions::default();
        options.strength = Some(Strength::Secondary);
        let search = match Collator::try_new(locale.into(), options) {
            Ok(c) => c,
            Err(e) => {
                warn!("collation `{}': no search collator: {}", locale_name, e);
                return None;
            }
        };

        debug!("collation `{}' ready as {}", locale_name, normalized);
        Some(Self {
            locale: normalized,
            sort,
            search,
        })
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// The total order entries are iterated in: full-strength collation,
    /// ties broken by bytes.
    pub fn order(&self, a: &str, b: &str) -> Ordering {
        self.sort
            .compare(a, b)
            .then_with(|| a.as_bytes().cmp(b.as_bytes()))
    }

    /// Case-insensitive comparison used by searches.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.search.compare(a, b)
    }

    /// Offsets `0..len` sorted by [`Collation::order`] of `key(offset)`.
    pub fn permutation<'a, F>(&self, len: usize, key: F) -> Vec<u32>
    where
        F: Fn(u32) -> &'a str + Sync,
    {
        let mut perm: Vec<u32> = (0..len as u32).collect();
        let threads = rayon::current_num_threads();
        if threads > 1 && threads * PARALLEL_SORT_GRAIN <= len {
            perm.par_sort_by(|&a, &b| self.order(key(a), key(b)));
        } else {
            perm.sort_by(|&a, &b| self.order(key(a), key(b)));
        }
        perm
    }

    /// Byte length of the longest prefix of `s1` that collates equal to a
    /// grapheme-aligned prefix of `s2` of the same cluster count.
    pub fn longest_common_prefix(&self, s1: &str, s2: &str) -> usize {
        let segmenter = GraphemeClusterSegmenter::new();
        let b1: Vec<usize> = segmenter.segment_str(s1).collect();
        let b2: Vec<usize> = segmenter.segment_str(s2).collect();

        let mut best = 0;
        for (&e1, &e2) in b1.iter().zip(b2.iter()) {
            if e1 == 0 {
                continue;
            }
            if self.search.compare(&s1[..e1], &s2[..e2]) == Ordering::Equal {
                best = e1;
            }
        }
        best
    }
}

/// Byte length of the longest exactly equal prefix, kept on a character
/// boundary of `s1`.
pub fn byte_common_prefix(s1: &str, s2: &str) -> usize {
    let mut n = s1
        .bytes()
        .zip(s2.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    while !s1.is_char_boundary(n) {
        n -= 1;
    }
    n
}
