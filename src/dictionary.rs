use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::collation::{byte_common_prefix, Collation};
use crate::dict_data::DictData;
use crate::error::{Result, StardictError};
use crate::format::entry::{decode_entry, DecodedEntry};
use crate::format::index::{ascii_casecmp, load_index, load_synonyms};
use crate::format::{DictionaryInfo, IndexEntry, SynonymEntry};

/// How far back a missed search looks for an entry sharing a longer prefix.
const NEAR_MISS_LIMIT: u32 = 32;

/// Knobs for [`Dictionary::open_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    /// Build a collated order when the `.ifo` declares a locale.
    pub collation: bool,
    /// Fail the load when a `.syn` record targets a missing index entry,
    /// instead of dropping it at lookup time.
    pub strict_synonym_targets: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            collation: true,
            strict_synonym_targets: false,
        }
    }
}

struct Collated {
    collation: Collation,
    index_order: Vec<u32>,
    synonym_order: Vec<u32>,
}

/// A loaded StarDict dictionary.
///
/// Offsets used by the public API are positions in the active order: the
/// collated order if one was built, otherwise the order of the `.idx` file.
pub struct Dictionary {
    info: DictionaryInfo,
    index: Vec<IndexEntry>,
    synonyms: Vec<SynonymEntry>,
    data: DictData,
    collated: Option<Collated>,
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dictionary")
            .field("book_name", &self.info.book_name)
            .field("words", &self.index.len())
            .field("synonyms", &self.synonyms.len())
            .field("data", &self.data)
            .field("collation", &self.collation_locale())
            .finish()
    }
}

impl Dictionary {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &OpenOptions::default())
    }

    /// Load the `.ifo` at `path` together with its index, synonyms and
    /// payload.
    pub fn open_with<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Self> {
        let info = DictionaryInfo::load(path.as_ref())?;
        let index = load_index(&info)?;
        if index.len() > u32::MAX as usize {
            return Err(StardictError::InvalidData(format!(
                "{}: {} entries do not fit 32-bit offsets",
                info.path.display(),
                index.len()
            )));
        }

        let synonyms = load_synonyms(&info)?.unwrap_or_default();
        if options.strict_synonym_targets {
            if let Some(bad) = synonyms.iter().find(|s| s.target as usize >= index.len()) {
                return Err(StardictError::InvalidData(format!(
                    "{}: synonym `{}' targets entry {} of {}",
                    info.sibling("syn").display(),
                    bad.word,
                    bad.target,
                    index.len()
                )));
            }
        }

        let data = DictData::open(&info)?;

        let collated = match (&info.collation_locale, options.collation) {
            (Some(locale), true) => Collation::new(locale).map(|collation| {
                let (words, syns) = (index.as_slice(), synonyms.as_slice());
                let index_order =
                    collation.permutation(words.len(), move |i| words[i as usize].name.as_str());
                let synonym_order =
                    collation.permutation(syns.len(), move |i| syns[i as usize].word.as_str());
                Collated {
                    collation,
                    index_order,
                    synonym_order,
                }
            }),
            _ => None,
        };

        let dict = Self {
            info,
            index,
            synonyms,
            data,
            collated,
        };
        info!(
            "loaded `{}': {} words, {} synonyms, {} storage, collation {}",
            dict.info.book_name,
            dict.index.len(),
            dict.synonyms.len(),
            dict.data.kind(),
            dict.collation_locale().unwrap_or("none")
        );
        Ok(dict)
    }

    pub fn info(&self) -> &DictionaryInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.book_name
    }

    /// Number of entries actually loaded from the index.
    pub fn len(&self) -> u32 {
        self.index.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn synonym_count(&self) -> u32 {
        self.synonyms.len() as u32
    }

    pub fn has_collation(&self) -> bool {
        self.collated.is_some()
    }

    pub fn collation_locale(&self) -> Option<&str> {
        self.collated.as_ref().map(|c| c.collation.locale())
    }

    fn raw_index(&self, offset: u32) -> Option<usize> {
        if offset >= self.len() {
            return None;
        }
        match &self.collated {
            Some(c) => c.index_order.get(offset as usize).map(|&i| i as usize),
            None => Some(offset as usize),
        }
    }

    /// The index record at `offset` in the active order.
    pub fn entry_record(&self, offset: u32) -> Option<&IndexEntry> {
        self.raw_index(offset).and_then(|i| self.index.get(i))
    }

    pub fn name_at(&self, offset: u32) -> Option<&str> {
        self.entry_record(offset).map(|e| e.name.as_str())
    }

    /// The comparator searches run with.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match &self.collated {
            Some(c) => c.collation.compare(a, b),
            None => ascii_casecmp(a, b),
        }
    }

    /// Byte length of the prefix of `s1` matching `s2` under the active
    /// comparator.
    pub fn longest_common_prefix(&self, s1: &str, s2: &str) -> usize {
        match &self.collated {
            Some(c) => c.collation.longest_common_prefix(s1, s2),
            None => byte_common_prefix(s1, s2),
        }
    }

    /// First offset whose name does not compare less than `word`.
    pub fn lower_bound(&self, word: &str) -> u32 {
        let (mut lo, mut hi) = (0u32, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let name = self.name_at(mid).unwrap_or_default();
            if self.compare(name, word) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Locate `word`. On a hit the first equal offset is returned with
    /// `true`. On a miss the insertion point is returned, unless an entry
    /// shortly before it shares a longer prefix with `word`.
    pub fn search_offset(&self, word: &str) -> (u32, bool) {
        let lo = self.lower_bound(word);
        let prefix_at = |offset: u32| {
            self.name_at(offset)
                .map(|name| self.longest_common_prefix(name, word))
                .unwrap_or(0)
        };

        if let Some(name) = self.name_at(lo) {
            if self.compare(name, word) == Ordering::Equal {
                return (lo, true);
            }
        }

        let mut best = lo;
        let mut best_len = prefix_at(lo);
        let mut probe = lo;
        while probe > 0 && lo - probe < NEAR_MISS_LIMIT {
            probe -= 1;
            let len = prefix_at(probe);
            if len == 0 || len < best_len {
                break;
            }
            if len > best_len {
                best = probe;
                best_len = len;
            }
        }
        (best, false)
    }

    /// Like [`Dictionary::search_offset`], returning an iterator.
    pub fn search(self: &Arc<Self>, word: &str) -> (DictIterator, bool) {
        let (offset, found) = self.search_offset(word);
        (DictIterator::new(Arc::clone(self), offset), found)
    }

    fn synonym_at(&self, offset: usize) -> Option<&SynonymEntry> {
        let i = match &self.collated {
            Some(c) => *c.synonym_order.get(offset)? as usize,
            None => offset,
        };
        self.synonyms.get(i)
    }

    /// Names of the main entries `word` is a synonym of.
    pub fn synonyms(&self, word: &str) -> Vec<String> {
        let (mut lo, mut hi) = (0usize, self.synonyms.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let syn = self.synonym_at(mid).map(|s| s.word.as_str()).unwrap_or_default();
            if self.compare(syn, word) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        let mut out = Vec::new();
        while let Some(syn) = self.synonym_at(lo) {
            if self.compare(&syn.word, word) != Ordering::Equal {
                break;
            }
            match self.index.get(syn.target as usize) {
                Some(entry) => out.push(entry.name.clone()),
                None => warn!(
                    "`{}': synonym `{}' targets missing entry {}",
                    self.info.book_name, syn.word, syn.target
                ),
            }
            lo += 1;
        }
        out
    }

    /// Read and decode the entry at `offset`, surfacing every failure.
    pub fn read_entry(&self, offset: u32) -> Result<DecodedEntry> {
        let record = self.entry_record(offset).ok_or_else(|| {
            StardictError::InvalidArgument(format!(
                "offset {} out of range 0..{}",
                offset,
                self.len()
            ))
        })?;
        let bytes = self
            .data
            .read_at(record.data_offset, record.data_size as usize)?;
        decode_entry(&bytes, self.info.same_type_sequence.as_deref())
    }

    /// Decoded entry at `offset`, or `None` if it is out of range or cannot
    /// be read.
    pub fn entry_at(&self, offset: u32) -> Option<DecodedEntry> {
        match self.read_entry(offset) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("`{}': entry {}: {}", self.info.book_name, offset, e);
                None
            }
        }
    }
}

/// A position in a dictionary's active order. `offset == len` is the end
/// position.
#[derive(Debug, Clone)]
pub struct DictIterator {
    dict: Arc<Dictionary>,
    offset: u32,
}

impl PartialEq for DictIterator {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.dict, &other.dict) && self.offset == other.offset
    }
}

impl DictIterator {
    /// Offsets past the end are clamped to the end position.
    pub fn new(dict: Arc<Dictionary>, offset: u32) -> Self {
        let offset = offset.min(dict.len());
        Self { dict, offset }
    }

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dict
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn is_valid(&self) -> bool {
        self.offset < self.dict.len()
    }

    pub fn name(&self) -> Option<&str> {
        self.dict.name_at(self.offset)
    }

    pub fn entry(&self) -> Option<DecodedEntry> {
        self.dict.entry_at(self.offset)
    }

    /// Step forward; `false` once the end position is reached.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        if self.offset < self.dict.len() {
            self.offset += 1;
        }
        self.is_valid()
    }

    /// Step back; `false` if already at the first entry.
    pub fn prev(&mut self) -> bool {
        if self.offset == 0 {
            return false;
        }
        self.offset -= 1;
        true
    }
}
