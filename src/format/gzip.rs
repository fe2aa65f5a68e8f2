//! gzip member header parsing with support for the dictzip `RA` subfield.

use std::io::{Cursor, Read, Write};

use binrw::{BinRead, BinWrite};

use crate::error::{Result, StardictError};

pub const FLAG_TEXT: u8 = 1 << 0;
pub const FLAG_HCRC: u8 = 1 << 1;
pub const FLAG_EXTRA: u8 = 1 << 2;
pub const FLAG_NAME: u8 = 1 << 3;
pub const FLAG_COMMENT: u8 = 1 << 4;

/// Compression method for deflate, the only one gzip defines.
pub const METHOD_DEFLATE: u8 = 8;

/// Subfield identifier of the dictzip random-access table.
pub const RA_ID: [u8; 2] = *b"RA";

/// The fixed ten bytes every gzip member starts with.
#[derive(Debug, Clone, BinRead, BinWrite)]
#[brw(little, magic = b"\x1f\x8b")]
pub struct GzipFixedHeader {
    pub method: u8,
    pub flags: u8,
    pub mtime: u32,
    pub xflags: u8,
    pub os: u8,
}

/// Body of the `RA` subfield.
#[binrw::binrw]
#[brw(little)]
#[br(assert(version == 1, "unsupported dictzip version"))]
#[br(assert(chunk_length != 0, "dictzip chunk length is zero"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomAccessField {
    pub version: u16,
    pub chunk_length: u16,
    #[br(temp)]
    #[bw(calc = chunk_sizes.len() as u16)]
    chunk_count: u16,
    #[br(count = chunk_count as usize)]
    pub chunk_sizes: Vec<u16>,
}

impl RandomAccessField {
    /// Encoded size of the subfield data (without the id/len prefix).
    pub fn data_len(&self) -> usize {
        6 + 2 * self.chunk_sizes.len()
    }
}

/// What we learned from a gzip member header.
#[derive(Debug, Clone)]
pub struct GzipHeader {
    pub fixed: GzipFixedHeader,
    pub name: Option<Vec<u8>>,
    pub comment: Option<Vec<u8>>,
    /// Present iff the member is a dictzip file.
    pub random_access: Option<RandomAccessField>,
    /// Offset of the first compressed byte, i.e. the header length.
    pub data_offset: u64,
}

/// Reads from an inner reader while keeping a copy of every byte, so the
/// optional header CRC can be checked.
struct Recorder<'a, R: Read> {
    inner: &'a mut R,
    seen: Vec<u8>,
}

impl<'a, R: Read> Recorder<'a, R> {
    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let start = self.seen.len();
        self.seen.resize(start + n, 0);
        self.inner
            .read_exact(&mut self.seen[start..])
            .map_err(|e| StardictError::InvalidHeader(format!("truncated gzip header: {}", e)))?;
        Ok(&self.seen[start..])
    }

    fn take_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn take_zero_terminated(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let b = self.take(1)?[0];
            if b == 0 {
                return Ok(out);
            }
            out.push(b);
        }
    }
}

/// Split an extra field into `(id, data)` subfields.
fn subfields(extra: &[u8]) -> Result<Vec<([u8; 2], &[u8])>> {
    let mut out = Vec::new();
    let mut rest = extra;
    while !rest.is_empty() {
        if rest.len() < 4 {
            return Err(StardictError::InvalidHeader(
                "truncated gzip extra subfield".to_string(),
            ));
        }
        let id = [rest[0], rest[1]];
        let len = u16::from_le_bytes([rest[2], rest[3]]) as usize;
        let data = rest.get(4..4 + len).ok_or_else(|| {
            StardictError::InvalidHeader("gzip extra subfield overruns the field".to_string())
        })?;
        out.push((id, data));
        rest = &rest[4 + len..];
    }
    Ok(out)
}

fn parse_random_access(extra: &[u8]) -> Result<Option<RandomAccessField>> {
    let mut found = None;
    for (id, data) in subfields(extra)? {
        if id != RA_ID {
            continue;
        }
        if found.is_some() {
            return Err(StardictError::InvalidHeader(
                "multiple dictzip RA subfields".to_string(),
            ));
        }
        let mut cur = Cursor::new(data);
        let ra = RandomAccessField::read(&mut cur)?;
        if cur.position() as usize != data.len() {
            return Err(StardictError::InvalidHeader(format!(
                "dictzip RA subfield has {} trailing bytes",
                data.len() - cur.position() as usize
            )));
        }
        found = Some(ra);
    }
    Ok(found)
}

impl GzipHeader {
    /// Parse a gzip member header from `reader`, which must be positioned at
    /// the start of the member. On return the reader sits on the first
    /// compressed byte.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut rec = Recorder {
            inner: reader,
            seen: Vec::with_capacity(64),
        };

        let fixed = {
            let bytes = rec.take(10)?;
            GzipFixedHeader::read(&mut Cursor::new(bytes))
                .map_err(|_| StardictError::InvalidHeader("not a gzip file".to_string()))?
        };
        if fixed.method != METHOD_DEFLATE {
            return Err(StardictError::InvalidHeader(format!(
                "unsupported gzip compression method {}",
                fixed.method
            )));
        }
        if fixed.flags & 0xe0 != 0 {
            return Err(StardictError::InvalidHeader(
                "reserved gzip flags are set".to_string(),
            ));
        }

        let mut random_access = None;
        if fixed.flags & FLAG_EXTRA != 0 {
            let xlen = rec.take_u16()? as usize;
            let extra = rec.take(xlen)?.to_vec();
            random_access = parse_random_access(&extra)?;
        }

        let name = if fixed.flags & FLAG_NAME != 0 {
            Some(rec.take_zero_terminated()?)
        } else {
            None
        };
        let comment = if fixed.flags & FLAG_COMMENT != 0 {
            Some(rec.take_zero_terminated()?)
        } else {
            None
        };

        if fixed.flags & FLAG_HCRC != 0 {
            let expected = (crc32fast::hash(&rec.seen) & 0xffff) as u16;
            let stored = rec.take_u16()?;
            if stored != expected {
                return Err(StardictError::InvalidHeader(format!(
                    "gzip header CRC mismatch: stored {:#06x}, computed {:#06x}",
                    stored, expected
                )));
            }
        }

        Ok(GzipHeader {
            fixed,
            name,
            comment,
            random_access,
            data_offset: rec.seen.len() as u64,
        })
    }

    pub fn is_dictzip(&self) -> bool {
        self.random_access.is_some()
    }
}

/// Serialize a dictzip header: fixed part, one `RA` subfield, no name,
/// comment or header CRC.
pub fn write_dictzip_header(ra: &RandomAccessField, mtime: u32) -> Result<Vec<u8>> {
    let data_len = ra.data_len();
    let xlen = 4 + data_len;
    if xlen > u16::MAX as usize {
        return Err(StardictError::InvalidArgument(format!(
            "too many dictzip chunks ({}) for one RA subfield",
            ra.chunk_sizes.len()
        )));
    }

    let mut cur = Cursor::new(Vec::with_capacity(12 + xlen));
    GzipFixedHeader {
        method: METHOD_DEFLATE,
        flags: FLAG_EXTRA,
        mtime,
        xflags: 0,
        // Unix
        os: 3,
    }
    .write(&mut cur)?;
    (xlen as u16).write_le(&mut cur)?;
    cur.write_all(&RA_ID)?;
    (data_len as u16).write_le(&mut cur)?;
    ra.write(&mut cur)?;
    Ok(cur.into_inner())
}
