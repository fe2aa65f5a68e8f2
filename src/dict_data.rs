use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;
use zune_inflate::DeflateDecoder;

use crate::dictzip::DictzipReader;
use crate::error::{Result, StardictError};
use crate::format::gzip::GzipHeader;
use crate::format::DictionaryInfo;
use crate::mapped_file::MappedFile;

/// Storage behind a dictionary's `.dict` payload.
pub enum DictData {
    /// Uncompressed `.dict`, mapped whole.
    Mapped(MappedFile),
    /// `.dict.dz` without a random-access table, inflated up front.
    Buffer(Vec<u8>),
    /// `.dict.dz` read chunk by chunk.
    Dictzip(Mutex<DictzipReader<MappedFile>>),
}

impl fmt::Debug for DictData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DictData::{}", self.kind())
    }
}

impl DictData {
    /// Open `.dict`, else `.dict.dz`, next to `info`.
    pub fn open(info: &DictionaryInfo) -> Result<Self> {
        let plain = info.sibling("dict");
        if plain.is_file() {
            return Self::open_plain(&plain);
        }
        let dz = info.sibling("dict.dz");
        if dz.is_file() {
            return Self::open_compressed(&dz);
        }
        Err(StardictError::FileNotFound(format!(
            "neither {} nor {} exists",
            plain.display(),
            dz.display()
        )))
    }

    fn open_plain(path: &Path) -> Result<Self> {
        let len = fs::metadata(path)
            .map_err(|e| StardictError::from(e).in_file(path))?
            .len();
        if len == 0 {
            // zero-length files cannot be mapped
            return Ok(DictData::Buffer(Vec::new()));
        }
        let map = MappedFile::open(path).map_err(|e| StardictError::from(e).in_file(path))?;
        Ok(DictData::Mapped(map))
    }

    fn open_compressed(path: &Path) -> Result<Self> {
        let map = MappedFile::open(path).map_err(|e| StardictError::from(e).in_file(path))?;
        let header = GzipHeader::read_from(&mut map.clone()).map_err(|e| e.in_file(path))?;

        if header.is_dictzip() {
            let reader = DictzipReader::with_header(map, header).map_err(|e| e.in_file(path))?;
            debug!(
                "{}: dictzip with {} chunks of {} bytes",
                path.display(),
                reader.chunk_count(),
                reader.chunk_length()
            );
            return Ok(DictData::Dictzip(Mutex::new(reader)));
        }

        debug!("{}: plain gzip, inflating whole file", path.display());
        let data = DeflateDecoder::new(map.as_slice())
            .decode_gzip()
            .map_err(|e| {
                StardictError::InvalidData(format!("gzip decode: {:?}", e)).in_file(path)
            })?;
        Ok(DictData::Buffer(data))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DictData::Mapped(_) => "mapped",
            DictData::Buffer(_) => "buffer",
            DictData::Dictzip(_) => "dictzip",
        }
    }

    /// Copy `len` bytes starting at `offset`.
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let out_of_range = || {
            StardictError::InvalidData(format!(
                "entry range {}+{} lies outside the .dict data",
                offset, len
            ))
        };
        match self {
            DictData::Mapped(map) => map
                .read_at(offset, len)
                .map(<[u8]>::to_vec)
                .ok_or_else(out_of_range),
            DictData::Buffer(buf) => {
                let start = usize::try_from(offset).map_err(|_| out_of_range())?;
                let end = start.checked_add(len).ok_or_else(out_of_range)?;
                buf.get(start..end).map(<[u8]>::to_vec).ok_or_else(out_of_range)
            }
            DictData::Dictzip(reader) => {
                let mut reader = reader.lock().map_err(|_| {
                    StardictError::Io("dictzip reader lock poisoned".to_string())
                })?;
                reader.read_exact_at(offset, len)
            }
        }
    }
}

/// Where the payload of `info` would be read from, without opening it.
pub fn locate(info: &DictionaryInfo) -> Option<PathBuf> {
    ["dict", "dict.dz"]
        .iter()
        .map(|ext| info.sibling(ext))
        .find(|p| p.is_file())
}
