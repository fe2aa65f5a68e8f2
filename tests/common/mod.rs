//! Helpers for building small dictionaries on disk.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stardict_tools::format::index::raw_order_cmp;
use stardict_tools::format::{DictionaryInfo, EntryField};
use stardict_tools::{Dictionary, DictionaryWriter};

pub fn info(book: &str, schema: Option<&str>, collation: Option<&str>) -> DictionaryInfo {
    DictionaryInfo {
        book_name: book.to_string(),
        same_type_sequence: schema.map(str::to_string),
        collation_locale: collation.map(str::to_string),
        ..Default::default()
    }
}

pub fn definition(word: &str) -> String {
    format!("definition of {}", word)
}

/// Write `words` (sorted into raw order first) with one `m` field each.
pub fn build_with(dir: &Path, info: DictionaryInfo, words: &[&str]) -> PathBuf {
    let ifo = dir.join(format!("{}.ifo", info.book_name));
    let mut sorted = words.to_vec();
    sorted.sort_by(|a, b| raw_order_cmp(a, b));

    let mut w = DictionaryWriter::new(&ifo, info).unwrap();
    for word in sorted {
        w.push_entry(word, &[EntryField::new(b'm', definition(word))])
            .unwrap();
    }
    w.finish().unwrap();
    ifo
}

pub fn build(dir: &Path, book: &str, words: &[&str]) -> PathBuf {
    build_with(dir, info(book, Some("m"), None), words)
}

pub fn open(path: &Path) -> Arc<Dictionary> {
    Arc::new(Dictionary::open(path).unwrap())
}

/// Deterministic pseudo-random numbers for sequence tests.
pub struct Lcg(pub u64);

impl Lcg {
    pub fn next(&mut self, bound: u32) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 33) % bound as u64) as u32
    }
}
