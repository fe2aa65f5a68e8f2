use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use zune_inflate::DeflateDecoder;

use crate::error::{Result, StardictError};
use crate::format::DictionaryInfo;
use crate::shared_macros::{read_be_u32, take_be_int};

/// One `.idx` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub data_offset: u64,
    pub data_size: u32,
}

/// One `.syn` record: an alternative spelling pointing into the main index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymEntry {
    pub word: String,
    pub target: u32,
}

/// `g_ascii_strcasecmp`: compares bytes with ASCII letters folded to lower
/// case, leaving everything else untouched.
pub fn ascii_casecmp(a: &str, b: &str) -> Ordering {
    fn fold(s: &str) -> impl Iterator<Item = u8> + '_ {
        s.bytes().map(|c| c.to_ascii_lowercase())
    }
    fold(a).cmp(fold(b))
}

/// The order `.idx` and `.syn` files are stored in: ASCII case-insensitive,
/// ties broken by plain byte order.
pub fn raw_order_cmp(a: &str, b: &str) -> Ordering {
    ascii_casecmp(a, b).then_with(|| a.as_bytes().cmp(b.as_bytes()))
}

/// Read a whole file, transparently gunzipping it when `gzipped`.
fn read_maybe_gzipped(path: &Path, gzipped: bool) -> Result<Vec<u8>> {
    let raw = fs::read(path).map_err(|e| StardictError::from(e).in_file(path))?;
    if !gzipped {
        return Ok(raw);
    }
    DeflateDecoder::new(&raw)
        .decode_gzip()
        .map_err(|e| StardictError::InvalidData(format!("gzip decode: {:?}", e)).in_file(path))
}

fn split_name(buf: &[u8], pos: usize) -> Result<(String, usize)> {
    let rest = &buf[pos..];
    let nul = rest.iter().position(|&b| b == 0).ok_or_else(|| {
        StardictError::InvalidData(format!("unterminated word at byte {}", pos))
    })?;
    let name = std::str::from_utf8(&rest[..nul])
        .map_err(|_| StardictError::InvalidData(format!("invalid UTF-8 word at byte {}", pos)))?;
    Ok((name.to_string(), pos + nul + 1))
}

/// Parse `.idx` contents with `offset_bits`-wide data offsets.
pub fn parse_index(buf: &[u8], offset_bits: u32) -> Result<Vec<IndexEntry>> {
    let offset_size = match offset_bits {
        32 => 4usize,
        64 => 8usize,
        other => {
            return Err(StardictError::InvalidData(format!(
                "unsupported offset width: {} bits",
                other
            )))
        }
    };

    let mut entries = Vec::new();
    let mut pos = 0usize;
    while pos < buf.len() {
        let record_start = pos;
        let (name, after_name) = split_name(buf, pos)?;
        if name.is_empty() {
            return Err(StardictError::InvalidData(format!(
                "empty word at byte {}",
                record_start
            )));
        }
        pos = after_name;

        let truncated = || {
            StardictError::InvalidData(format!("truncated record `{}' at byte {}", name, record_start))
        };
        let data_offset = take_be_int!(buf, pos, offset_size).ok_or_else(truncated)?;
        let data_size = read_be_u32!(buf, pos).ok_or_else(truncated)?;
        pos += 4;

        entries.push(IndexEntry {
            name,
            data_offset,
            data_size,
        });
    }
    Ok(entries)
}

/// Parse `.syn` contents.
pub fn parse_synonyms(buf: &[u8]) -> Result<Vec<SynonymEntry>> {
    let mut entries = Vec::new();
    let mut pos = 0usize;
    while pos < buf.len() {
        let record_start = pos;
        let (word, after_word) = split_name(buf, pos)?;
        pos = after_word;
        let target = read_be_u32!(buf, pos).ok_or_else(|| {
            StardictError::InvalidData(format!(
                "truncated synonym `{}' at byte {}",
                word, record_start
            ))
        })?;
        pos += 4;
        entries.push(SynonymEntry { word, target });
    }
    Ok(entries)
}

/// Locate the index file next to `info`: `.idx`, else `.idx.gz`.
pub fn find_index_file(info: &DictionaryInfo) -> Result<(PathBuf, bool)> {
    let plain = info.sibling("idx");
    if plain.is_file() {
        return Ok((plain, false));
    }
    let gz = info.sibling("idx.gz");
    if gz.is_file() {
        return Ok((gz, true));
    }
    Err(StardictError::FileNotFound(format!(
        "neither {} nor {} exists",
        plain.display(),
        gz.display()
    )))
}

/// Load the main index for `info`. The returned count is authoritative even
/// when it disagrees with the `.ifo`.
pub fn load_index(info: &DictionaryInfo) -> Result<Vec<IndexEntry>> {
    let (path, gzipped) = find_index_file(info)?;
    let buf = read_maybe_gzipped(&path, gzipped)?;

    if !gzipped && buf.len() as u64 != info.index_filesize {
        warn!(
            "{}: idxfilesize says {} bytes, file has {}",
            path.display(),
            info.index_filesize,
            buf.len()
        );
    }

    let entries = parse_index(&buf, info.index_offset_bits).map_err(|e| e.in_file(&path))?;
    if entries.len() as u64 != info.word_count {
        warn!(
            "{}: wordcount says {}, index has {} entries",
            path.display(),
            info.word_count,
            entries.len()
        );
    }
    debug!("{}: loaded {} index entries", path.display(), entries.len());
    Ok(entries)
}

/// Load the `.syn` file if there is one.
pub fn load_synonyms(info: &DictionaryInfo) -> Result<Option<Vec<SynonymEntry>>> {
    let path = info.sibling("syn");
    if !path.is_file() {
        return Ok(None);
    }
    let buf = read_maybe_gzipped(&path, false)?;
    let entries = parse_synonyms(&buf).map_err(|e| e.in_file(&path))?;
    if entries.len() as u64 != info.synonym_word_count {
        warn!(
            "{}: synwordcount says {}, file has {} entries",
            path.display(),
            info.synonym_word_count,
            entries.len()
        );
    }
    Ok(Some(entries))
}
