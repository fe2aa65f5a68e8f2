use crate::error::{Result, StardictError};
use crate::shared_macros::read_be_u32;

/// Field types from the StarDict format. Lower-case types carry text,
/// upper-case ones binary data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Meaning,
    LocaleMeaning,
    PangoMarkup,
    Phonetic,
    Xdxf,
    YinBiaoOrKana,
    PowerWord,
    MediaWiki,
    Html,
    ResourceList,
    Wav,
    Picture,
    Experimental,
    Other(u8),
}

impl FieldType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            b'm' => FieldType::Meaning,
            b'l' => FieldType::LocaleMeaning,
            b'g' => FieldType::PangoMarkup,
            b't' => FieldType::Phonetic,
            b'x' => FieldType::Xdxf,
            b'y' => FieldType::YinBiaoOrKana,
            b'k' => FieldType::PowerWord,
            b'w' => FieldType::MediaWiki,
            b'h' => FieldType::Html,
            b'r' => FieldType::ResourceList,
            b'W' => FieldType::Wav,
            b'P' => FieldType::Picture,
            b'X' => FieldType::Experimental,
            other => FieldType::Other(other),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            FieldType::Meaning => b'm',
            FieldType::LocaleMeaning => b'l',
            FieldType::PangoMarkup => b'g',
            FieldType::Phonetic => b't',
            FieldType::Xdxf => b'x',
            FieldType::YinBiaoOrKana => b'y',
            FieldType::PowerWord => b'k',
            FieldType::MediaWiki => b'w',
            FieldType::Html => b'h',
            FieldType::ResourceList => b'r',
            FieldType::Wav => b'W',
            FieldType::Picture => b'P',
            FieldType::Experimental => b'X',
            FieldType::Other(b) => *b,
        }
    }

    /// Text types are terminated by a NUL inside a field stream; binary
    /// types are prefixed by a big-endian u32 length instead.
    pub fn is_textual(&self) -> bool {
        self.as_byte().is_ascii_lowercase()
    }
}

/// One typed piece of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryField {
    pub kind: u8,
    pub data: Vec<u8>,
}

impl EntryField {
    pub fn new(kind: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    pub fn field_type(&self) -> FieldType {
        FieldType::from_byte(self.kind)
    }

    /// The payload as text, for lower-case types holding valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        if self.field_type().is_textual() {
            std::str::from_utf8(&self.data).ok()
        } else {
            None
        }
    }
}

/// A decoded `.dict` span: its fields in stored order.
pub type DecodedEntry = Vec<EntryField>;

/// Read one field body at `pos`. A final text field spans to the end; a
/// final binary field keeps its length prefix, which must cover the rest.
fn read_field(buf: &[u8], pos: &mut usize, kind: u8, last: bool) -> Result<EntryField> {
    let rest = &buf[*pos..];
    if last && kind.is_ascii_lowercase() {
        *pos = buf.len();
        return Ok(EntryField::new(kind, rest));
    }

    if kind.is_ascii_lowercase() {
        let nul = rest.iter().position(|&b| b == 0).ok_or_else(|| {
            StardictError::InvalidData(format!("unterminated `{}' field", kind as char))
        })?;
        *pos += nul + 1;
        return Ok(EntryField::new(kind, &rest[..nul]));
    }

    let len = read_be_u32!(rest, 0).ok_or_else(|| {
        StardictError::InvalidData(format!("missing length of `{}' field", kind as char))
    })? as usize;
    let data = rest.get(4..4 + len).ok_or_else(|| {
        StardictError::InvalidData(format!(
            "`{}' field claims {} bytes, {} available",
            kind as char,
            len,
            rest.len().saturating_sub(4)
        ))
    })?;
    if last && rest.len() != 4 + len {
        return Err(StardictError::InvalidData(format!(
            "`{}' field claims {} bytes, {} follow",
            kind as char,
            len,
            rest.len() - 4
        )));
    }
    *pos += 4 + len;
    Ok(EntryField::new(kind, data))
}

/// Decode an entry whose field types are fixed by `sametypesequence`.
pub fn decode_with_schema(buf: &[u8], schema: &[u8]) -> Result<DecodedEntry> {
    if schema.is_empty() {
        return Err(StardictError::InvalidData("empty sametypesequence".to_string()));
    }

    let mut pos = 0usize;
    let mut fields = Vec::with_capacity(schema.len());
    for (i, &kind) in schema.iter().enumerate() {
        let last = i + 1 == schema.len();
        fields.push(read_field(buf, &mut pos, kind, last)?);
    }
    Ok(fields)
}

/// Decode an entry where each field is preceded by its type byte.
pub fn decode_tagged(buf: &[u8]) -> Result<DecodedEntry> {
    let mut pos = 0usize;
    let mut fields = Vec::new();
    while pos < buf.len() {
        let kind = buf[pos];
        pos += 1;
        fields.push(read_field(buf, &mut pos, kind, false)?);
    }
    Ok(fields)
}

/// Decode per the dictionary's schema, if it has one.
pub fn decode_entry(buf: &[u8], schema: Option<&str>) -> Result<DecodedEntry> {
    match schema {
        Some(schema) => decode_with_schema(buf, schema.as_bytes()),
        None => decode_tagged(buf),
    }
}

/// Encode fields in schema mode; `fields` must match `schema` type by type.
pub fn encode_with_schema(fields: &[EntryField], schema: &[u8]) -> Result<Vec<u8>> {
    if fields.len() != schema.len() || fields.iter().zip(schema).any(|(f, &k)| f.kind != k) {
        return Err(StardictError::InvalidArgument(format!(
            "fields do not match sametypesequence `{}'",
            String::from_utf8_lossy(schema)
        )));
    }

    let mut out = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        encode_field(&mut out, field, i + 1 == fields.len())?;
    }
    Ok(out)
}

/// Encode fields in tagged mode.
pub fn encode_tagged(fields: &[EntryField]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for field in fields {
        out.push(field.kind);
        encode_field(&mut out, field, false)?;
    }
    Ok(out)
}

fn encode_field(out: &mut Vec<u8>, field: &EntryField, last: bool) -> Result<()> {
    if last && field.kind.is_ascii_lowercase() {
        out.extend_from_slice(&field.data);
    } else if field.kind.is_ascii_lowercase() {
        if field.data.contains(&0) {
            return Err(StardictError::InvalidArgument(format!(
                "`{}' field contains a NUL byte",
                field.kind as char
            )));
        }
        out.extend_from_slice(&field.data);
        out.push(0);
    } else {
        let len = u32::try_from(field.data.len()).map_err(|_| {
            StardictError::InvalidArgument(format!("`{}' field too large", field.kind as char))
        })?;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&field.data);
    }
    Ok(())
}
