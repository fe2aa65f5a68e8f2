use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::{Result, StardictError};

/// Literal first line of every `.ifo` file.
pub const IFO_MAGIC: &str = "StarDict's dict ifo file\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DictVersion {
    #[default]
    V2_4_2,
    V3_0_0,
}

impl DictVersion {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "2.4.2" => Some(DictVersion::V2_4_2),
            "3.0.0" => Some(DictVersion::V3_0_0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DictVersion::V2_4_2 => "2.4.2",
            DictVersion::V3_0_0 => "3.0.0",
        }
    }
}

/// Metadata from the `.ifo` file. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryInfo {
    pub path: PathBuf,
    pub version: DictVersion,
    pub book_name: String,
    pub word_count: u64,
    pub synonym_word_count: u64,
    pub index_filesize: u64,
    pub index_offset_bits: u32,
    pub author: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub same_type_sequence: Option<String>,
    pub collation_locale: Option<String>,
}

impl Default for DictionaryInfo {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            version: DictVersion::default(),
            book_name: String::new(),
            word_count: 0,
            synonym_word_count: 0,
            index_filesize: 0,
            index_offset_bits: 32,
            author: None,
            email: None,
            website: None,
            description: None,
            date: None,
            same_type_sequence: None,
            collation_locale: None,
        }
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(StardictError::InvalidData(format!(
            "`{}' is not a non-negative integer: {:?}",
            key, value
        )));
    }
    value
        .parse::<u64>()
        .map_err(|e| StardictError::InvalidData(format!("`{}' out of range: {}", key, e)))
}

impl DictionaryInfo {
    /// Read and validate the `.ifo` file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| StardictError::from(e).in_file(path))?;
        let mut info = Self::parse(&bytes).map_err(|e| e.in_file(path))?;
        info.path = path.to_path_buf();
        Ok(info)
    }

    /// Parse `.ifo` contents. `path` is left empty.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let rest = bytes
            .strip_prefix(IFO_MAGIC.as_bytes())
            .ok_or_else(|| StardictError::InvalidData("not a StarDict info file".to_string()))?;

        let mut info = DictionaryInfo::default();
        let mut seen_version = false;

        for (line_no, raw) in rest.split(|&b| b == b'\n').enumerate() {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let line = std::str::from_utf8(raw).map_err(|_| {
                StardictError::InvalidData(format!("line {}: invalid UTF-8", line_no + 2))
            })?;
            let (key, value) = line
                .split_once('=')
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .ok_or_else(|| {
                    StardictError::InvalidData(format!(
                        "line {}: expected `key=value'",
                        line_no + 2
                    ))
                })?;

            if !seen_version {
                if key != "version" {
                    return Err(StardictError::InvalidData(
                        "the first key must be `version'".to_string(),
                    ));
                }
                info.version = DictVersion::parse(value).ok_or_else(|| {
                    StardictError::InvalidData(format!("unsupported version: {}", value))
                })?;
                seen_version = true;
                continue;
            }

            info.set_key(key, value)?;
        }

        if !seen_version {
            return Err(StardictError::InvalidData("missing `version'".to_string()));
        }
        info.validate()?;
        Ok(info)
    }

    fn set_key(&mut self, key: &str, value: &str) -> Result<()> {
        let value_owned = Some(value.to_string());
        match key {
            "version" => {
                return Err(StardictError::InvalidData("duplicate `version'".to_string()));
            }
            "bookname" => self.book_name = value.to_string(),
            "wordcount" => self.word_count = parse_number(key, value)?,
            "synwordcount" => self.synonym_word_count = parse_number(key, value)?,
            "idxfilesize" => self.index_filesize = parse_number(key, value)?,
            "idxoffsetbits" => {
                self.index_offset_bits = u32::try_from(parse_number(key, value)?)
                    .map_err(|_| StardictError::InvalidData("`idxoffsetbits' too large".into()))?
            }
            "author" => self.author = value_owned,
            "email" => self.email = value_owned,
            "website" => self.website = value_owned,
            "description" => self.description = value_owned,
            "date" => self.date = value_owned,
            "sametypesequence" => self.same_type_sequence = value_owned,
            "collation" => self.collation_locale = value_owned,
            unknown => warn!("ignoring unknown .ifo key `{}'", unknown),
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.book_name.is_empty() {
            return Err(StardictError::InvalidData("missing `bookname'".to_string()));
        }
        if self.word_count == 0 {
            return Err(StardictError::InvalidData("`wordcount' must be positive".to_string()));
        }
        if self.index_filesize == 0 {
            return Err(StardictError::InvalidData(
                "`idxfilesize' must be positive".to_string(),
            ));
        }
        if self.index_offset_bits != 32 && self.index_offset_bits != 64 {
            return Err(StardictError::InvalidData(format!(
                "`idxoffsetbits' must be 32 or 64, got {}",
                self.index_offset_bits
            )));
        }
        Ok(())
    }

    /// Path of a sibling file: the `.ifo` extension replaced by `ext`
    /// (e.g. `"idx"`, `"idx.gz"`, `"dict.dz"`).
    pub fn sibling(&self, ext: &str) -> PathBuf {
        sibling_path(&self.path, ext)
    }

    /// Serialize in a fixed key order. Zero synonym count and 32-bit offsets
    /// are implied and therefore omitted.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(IFO_MAGIC.as_bytes())?;
        writeln!(out, "version={}", self.version.as_str())?;

        let mut line = |key: &str, value: &str| -> Result<()> {
            if value.contains('\n') {
                return Err(StardictError::InvalidArgument(format!(
                    "`{}' must not contain a newline",
                    key
                )));
            }
            writeln!(out, "{}={}", key, value)?;
            Ok(())
        };

        line("bookname", &self.book_name)?;
        line("wordcount", &self.word_count.to_string())?;
        if self.synonym_word_count != 0 {
            line("synwordcount", &self.synonym_word_count.to_string())?;
        }
        line("idxfilesize", &self.index_filesize.to_string())?;
        if self.index_offset_bits != 32 {
            line("idxoffsetbits", &self.index_offset_bits.to_string())?;
        }

        let optionals = [
            ("author", &self.author),
            ("email", &self.email),
            ("website", &self.website),
            ("description", &self.description),
            ("date", &self.date),
            ("sametypesequence", &self.same_type_sequence),
            ("collation", &self.collation_locale),
        ];
        for (key, value) in optionals {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                line(key, value)?;
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }
}

/// Replace the extension of an `.ifo` path. Paths without one get `ext`
/// appended.
pub fn sibling_path(ifo: &Path, ext: &str) -> PathBuf {
    let stem = match ifo.extension() {
        Some(e) if e.eq_ignore_ascii_case("ifo") => ifo.with_extension(""),
        _ => ifo.to_path_buf(),
    };
    let mut s = stem.into_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}
