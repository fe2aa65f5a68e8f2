use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::dictzip::write_dictzip;
use crate::error::{Result, StardictError};
use crate::format::entry::{encode_tagged, encode_with_schema, EntryField};
use crate::format::index::raw_order_cmp;
use crate::format::{DictionaryInfo, SynonymEntry};

struct PendingEntry {
    word: String,
    fields: Vec<EntryField>,
}

/// Writes a new dictionary: `.ifo`, `.idx`, `.dict` (or `.dict.dz`) and,
/// when synonyms were added, `.syn`.
///
/// Entries are written in the order they are supplied; callers wanting a
/// searchable dictionary supply them sorted by
/// [`raw_order_cmp`](crate::format::index::raw_order_cmp).
pub struct DictionaryWriter {
    info: DictionaryInfo,
    dict: Vec<u8>,
    index: Vec<u8>,
    word_count: u64,
    synonyms: Vec<SynonymEntry>,
    pending: Option<PendingEntry>,
    dictzip_chunk_length: Option<u16>,
}

impl DictionaryWriter {
    /// Start a dictionary whose `.ifo` will be written to `ifo_path`. Counts
    /// and sizes in `info` are filled in by [`DictionaryWriter::finish`].
    pub fn new<P: AsRef<Path>>(ifo_path: P, mut info: DictionaryInfo) -> Result<Self> {
        if info.book_name.is_empty() {
            return Err(StardictError::InvalidArgument(
                "book name must not be empty".to_string(),
            ));
        }
        if info.index_offset_bits != 32 && info.index_offset_bits != 64 {
            return Err(StardictError::InvalidArgument(format!(
                "index offsets must be 32 or 64 bits, not {}",
                info.index_offset_bits
            )));
        }
        // empty values are not written, so they would not read back
        for value in [
            &mut info.author,
            &mut info.email,
            &mut info.website,
            &mut info.description,
            &mut info.date,
            &mut info.same_type_sequence,
            &mut info.collation_locale,
        ] {
            if value.as_deref() == Some("") {
                *value = None;
            }
        }
        info.path = ifo_path.as_ref().to_path_buf();

        Ok(Self {
            info,
            dict: Vec::new(),
            index: Vec::new(),
            word_count: 0,
            synonyms: Vec::new(),
            pending: None,
            dictzip_chunk_length: None,
        })
    }

    /// Compress the payload into `.dict.dz` with chunks of `chunk_length`.
    pub fn with_dictzip(mut self, chunk_length: u16) -> Result<Self> {
        if chunk_length == 0 {
            return Err(StardictError::InvalidArgument(
                "dictzip chunk length must be non-zero".to_string(),
            ));
        }
        self.dictzip_chunk_length = Some(chunk_length);
        Ok(self)
    }

    pub fn word_count(&self) -> u64 {
        self.word_count
    }

    pub fn begin_entry(&mut self, word: &str) -> Result<()> {
        if let Some(pending) = &self.pending {
            return Err(StardictError::InvalidArgument(format!(
                "entry `{}' was not finished",
                pending.word
            )));
        }
        if word.is_empty() || word.contains('\0') {
            return Err(StardictError::InvalidArgument(format!(
                "invalid headword {:?}",
                word
            )));
        }
        self.pending = Some(PendingEntry {
            word: word.to_string(),
            fields: Vec::new(),
        });
        Ok(())
    }

    pub fn add_field(&mut self, kind: u8, data: impl Into<Vec<u8>>) -> Result<()> {
        let pending = self.pending.as_mut().ok_or_else(|| {
            StardictError::InvalidArgument("add_field outside of an entry".to_string())
        })?;
        pending.fields.push(EntryField::new(kind, data));
        Ok(())
    }

    /// Encode the pending entry into `.dict` and record it in `.idx`.
    /// Returns the entry's index.
    pub fn finish_entry(&mut self) -> Result<u32> {
        let pending = self.pending.take().ok_or_else(|| {
            StardictError::InvalidArgument("finish_entry without begin_entry".to_string())
        })?;

        let payload = match &self.info.same_type_sequence {
            Some(schema) => encode_with_schema(&pending.fields, schema.as_bytes())?,
            None => encode_tagged(&pending.fields)?,
        };

        let offset = self.dict.len() as u64;
        let size = u32::try_from(payload.len()).map_err(|_| {
            StardictError::InvalidArgument(format!("entry `{}' is too large", pending.word))
        })?;
        let id = u32::try_from(self.word_count).map_err(|_| {
            StardictError::InvalidArgument("too many entries".to_string())
        })?;

        self.index.extend_from_slice(pending.word.as_bytes());
        self.index.push(0);
        if self.info.index_offset_bits == 64 {
            self.index.extend_from_slice(&offset.to_be_bytes());
        } else {
            let offset = u32::try_from(offset).map_err(|_| {
                StardictError::InvalidData(format!(
                    "offset {} of `{}' does not fit 32 bits",
                    offset, pending.word
                ))
            })?;
            self.index.extend_from_slice(&offset.to_be_bytes());
        }
        self.index.extend_from_slice(&size.to_be_bytes());

        self.dict.extend_from_slice(&payload);
        self.word_count += 1;
        Ok(id)
    }

    /// Shorthand for a begin/add/finish sequence.
    pub fn push_entry(&mut self, word: &str, fields: &[EntryField]) -> Result<u32> {
        self.begin_entry(word)?;
        for field in fields {
            self.add_field(field.kind, field.data.clone())?;
        }
        self.finish_entry()
    }

    /// Make `word` a synonym of the entry with index `target`.
    pub fn add_synonym(&mut self, word: &str, target: u32) -> Result<()> {
        if word.is_empty() || word.contains('\0') {
            return Err(StardictError::InvalidArgument(format!(
                "invalid synonym {:?}",
                word
            )));
        }
        self.synonyms.push(SynonymEntry {
            word: word.to_string(),
            target,
        });
        Ok(())
    }

    fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
        fs::write(path, bytes).map_err(|e| StardictError::from(e).in_file(path))
    }

    fn remove_stale(path: PathBuf) -> Result<()> {
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| StardictError::from(e).in_file(&path))?;
        }
        Ok(())
    }

    /// Write every file and return the info block as written.
    pub fn finish(mut self) -> Result<DictionaryInfo> {
        if let Some(pending) = &self.pending {
            return Err(StardictError::InvalidArgument(format!(
                "entry `{}' was not finished",
                pending.word
            )));
        }
        if self.word_count == 0 {
            return Err(StardictError::InvalidArgument(
                "a dictionary needs at least one entry".to_string(),
            ));
        }

        match self.dictzip_chunk_length {
            Some(chunk_length) => {
                let path = self.info.sibling("dict.dz");
                let mut out = BufWriter::new(
                    File::create(&path).map_err(|e| StardictError::from(e).in_file(&path))?,
                );
                write_dictzip(&self.dict, chunk_length, &mut out)?;
                out.flush()?;
                Self::remove_stale(self.info.sibling("dict"))?;
            }
            None => {
                Self::replace_file(&self.info.sibling("dict"), &self.dict)?;
                Self::remove_stale(self.info.sibling("dict.dz"))?;
            }
        }

        Self::replace_file(&self.info.sibling("idx"), &self.index)?;
        Self::remove_stale(self.info.sibling("idx.gz"))?;

        let syn_path = self.info.sibling("syn");
        if self.synonyms.is_empty() {
            Self::remove_stale(syn_path)?;
        } else {
            self.synonyms.sort_by(|a, b| {
                raw_order_cmp(&a.word, &b.word).then_with(|| a.target.cmp(&b.target))
            });
            let mut syn = Vec::new();
            for s in &self.synonyms {
                syn.extend_from_slice(s.word.as_bytes());
                syn.push(0);
                syn.extend_from_slice(&s.target.to_be_bytes());
            }
            Self::replace_file(&syn_path, &syn)?;
        }

        self.info.word_count = self.word_count;
        self.info.synonym_word_count = self.synonyms.len() as u64;
        self.info.index_filesize = self.index.len() as u64;

        let ifo = self.info.to_bytes()?;
        Self::replace_file(&self.info.path, &ifo)?;

        info!(
            "wrote `{}': {} words, {} synonyms, {} payload bytes",
            self.info.book_name,
            self.info.word_count,
            self.info.synonym_word_count,
            self.dict.len()
        );
        Ok(self.info)
    }
}
