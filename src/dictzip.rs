//! Random access into dictzip files.
//!
//! A dictzip file is a single gzip member whose deflate stream was flushed
//! (with a full flush, resetting the dictionary) every `chunk_length`
//! uncompressed bytes. The `RA` subfield in the gzip header lists the
//! compressed size of every chunk, so any chunk can be located by a prefix
//! sum and inflated on its own.

use std::io::{self, Read, Seek, SeekFrom, Write};

use log::debug;
use miniz_oxide::deflate::core::{create_comp_flags_from_zip_params, CompressorOxide};
use miniz_oxide::inflate::stream::InflateState;
use miniz_oxide::{DataFormat, MZError, MZFlush, MZStatus};

use crate::error::{Result, StardictError};
use crate::format::gzip::{write_dictzip_header, GzipHeader, RandomAccessField};

/// Chunk length used by the `dictzip` tool. Leaves headroom so that an
/// incompressible chunk still fits the 16-bit size table.
pub const DEFAULT_CHUNK_LENGTH: u16 = 58315;

/// Seekable reader over the uncompressed contents of a dictzip file.
///
/// Inflated chunks are kept for the lifetime of the reader.
pub struct DictzipReader<R> {
    source: R,
    chunk_length: usize,
    chunk_sizes: Vec<u16>,
    /// Offset in `source` of each compressed chunk.
    chunk_offsets: Vec<u64>,
    cache: Vec<Option<Vec<u8>>>,
    last_chunk_size: Option<usize>,
    pos: u64,
}

impl<R: Read + Seek> DictzipReader<R> {
    /// Parse the gzip header at the start of `source`. Fails with
    /// `InvalidHeader` if the header is malformed or carries no `RA` table.
    pub fn new(mut source: R) -> Result<Self> {
        source.seek(SeekFrom::Start(0))?;
        let header = GzipHeader::read_from(&mut source)?;
        Self::with_header(source, header)
    }

    /// Build a reader from an already parsed header.
    pub fn with_header(source: R, header: GzipHeader) -> Result<Self> {
        let ra = header.random_access.ok_or_else(|| {
            StardictError::InvalidHeader("gzip file has no dictzip RA subfield".to_string())
        })?;

        let mut chunk_offsets = Vec::with_capacity(ra.chunk_sizes.len());
        let mut offset = header.data_offset;
        for &size in &ra.chunk_sizes {
            chunk_offsets.push(offset);
            offset += size as u64;
        }

        let count = ra.chunk_sizes.len();
        Ok(Self {
            source,
            chunk_length: ra.chunk_length as usize,
            chunk_sizes: ra.chunk_sizes,
            chunk_offsets,
            cache: vec![None; count],
            last_chunk_size: if count == 0 { Some(0) } else { None },
            pos: 0,
        })
    }

    pub fn chunk_length(&self) -> usize {
        self.chunk_length
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_sizes.len()
    }

    /// Uncompressed size of the last chunk, once it has been inflated.
    pub fn last_chunk_size(&self) -> Option<usize> {
        self.last_chunk_size
    }

    /// Uncompressed length of the whole file, once the last chunk is known.
    pub fn len(&self) -> Option<u64> {
        let last = self.last_chunk_size? as u64;
        let full = self.chunk_count().saturating_sub(1) as u64;
        Some(full * self.chunk_length as u64 + last)
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_count() == 0
    }

    /// Number of chunks currently held inflated.
    pub fn cached_chunks(&self) -> usize {
        self.cache.iter().filter(|c| c.is_some()).count()
    }

    fn inflate_chunk(&mut self, id: usize) -> Result<Vec<u8>> {
        let size = self.chunk_sizes[id] as usize;
        let mut compressed = vec![0u8; size];
        self.source.seek(SeekFrom::Start(self.chunk_offsets[id]))?;
        self.source.read_exact(&mut compressed).map_err(|e| {
            StardictError::InvalidData(format!("dictzip chunk {} is truncated: {}", id, e))
        })?;

        let data = inflate_raw(&compressed, self.chunk_length)
            .map_err(|e| StardictError::InvalidData(format!("dictzip chunk {}: {}", id, e)))?;

        let is_last = id + 1 == self.chunk_count();
        if is_last {
            self.last_chunk_size = Some(data.len());
        } else if data.len() != self.chunk_length {
            return Err(StardictError::InvalidData(format!(
                "dictzip chunk {} inflated to {} bytes, expected {}",
                id,
                data.len(),
                self.chunk_length
            )));
        }
        debug!("inflated dictzip chunk {} ({} -> {} bytes)", id, size, data.len());
        Ok(data)
    }

    fn chunk(&mut self, id: usize) -> Result<&[u8]> {
        if self.cache[id].is_none() {
            let data = self.inflate_chunk(id)?;
            self.cache[id] = Some(data);
        }
        Ok(self.cache[id].as_deref().unwrap_or(&[]))
    }

    /// Copy uncompressed bytes starting at `offset` into `buf`. Returns the
    /// number of bytes copied, short only at the end of the data.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let chunk_length = self.chunk_length as u64;
        let mut done = 0usize;
        while done < buf.len() {
            let pos = offset + done as u64;
            let id = (pos / chunk_length) as usize;
            if id >= self.chunk_count() {
                break;
            }
            let within = (pos % chunk_length) as usize;
            let chunk = self.chunk(id)?;
            if within >= chunk.len() {
                break;
            }
            let n = (chunk.len() - within).min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&chunk[within..within + n]);
            done += n;
        }
        Ok(done)
    }

    /// Read exactly `len` bytes at `offset`.
    pub fn read_exact_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let n = self.read_at(offset, &mut buf)?;
        if n != len {
            return Err(StardictError::InvalidData(format!(
                "range {}+{} runs past the end of the dictzip data",
                offset, len
            )));
        }
        Ok(buf)
    }
}

impl<R: Read + Seek> Read for DictzipReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(self.pos, buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for DictzipReader<R> {
    fn seek(&mut self, how: SeekFrom) -> io::Result<u64> {
        let new = match how {
            SeekFrom::Start(off) => Some(off),
            SeekFrom::Current(off) => self.pos.checked_add_signed(off),
            SeekFrom::End(off) => {
                let len = self.len().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::Unsupported,
                        "dictzip length unknown until the last chunk is read",
                    )
                })?;
                len.checked_add_signed(off)
            }
        };
        match new {
            Some(pos) => {
                self.pos = pos;
                Ok(pos)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

/// Inflate one raw deflate chunk that must produce at most `limit` bytes.
fn inflate_raw(compressed: &[u8], limit: usize) -> std::result::Result<Vec<u8>, String> {
    let mut state = InflateState::new_boxed(DataFormat::Raw);
    // one spare byte so a full chunk never stalls on its trailing flush marker
    let mut out = vec![0u8; limit + 1];
    let mut in_pos = 0usize;
    let mut out_pos = 0usize;

    loop {
        let res = miniz_oxide::inflate::stream::inflate(
            &mut state,
            &compressed[in_pos..],
            &mut out[out_pos..],
            MZFlush::None,
        );
        in_pos += res.bytes_consumed;
        out_pos += res.bytes_written;
        match res.status {
            Ok(MZStatus::StreamEnd) => break,
            Ok(_) if res.bytes_consumed == 0 && res.bytes_written == 0 => break,
            Ok(_) => {}
            Err(MZError::Buf) => break,
            Err(e) => return Err(format!("inflate failed: {:?}", e)),
        }
    }

    if out_pos > limit {
        return Err(format!("inflates past the chunk length of {}", limit));
    }
    if in_pos < compressed.len() {
        debug!(
            "{} compressed bytes left over after {} bytes of output",
            compressed.len() - in_pos,
            out_pos
        );
    }
    out.truncate(out_pos);
    Ok(out)
}

/// Deflate one chunk, ending it with `flush` so it is byte aligned.
fn deflate_chunk(comp: &mut CompressorOxide, chunk: &[u8], flush: MZFlush) -> Result<Vec<u8>> {
    let mut out = vec![0u8; chunk.len() + chunk.len() / 16 + 256];
    let mut input = chunk;
    let mut written = 0usize;

    loop {
        let res = miniz_oxide::deflate::stream::deflate(comp, input, &mut out[written..], flush);
        input = &input[res.bytes_consumed..];
        written += res.bytes_written;
        match res.status {
            Ok(MZStatus::StreamEnd) => break,
            Ok(_) | Err(MZError::Buf) if written == out.len() => {
                let grow = out.len() / 2 + 256;
                out.resize(out.len() + grow, 0);
            }
            Ok(_) | Err(MZError::Buf) if input.is_empty() => break,
            Ok(_) => {}
            Err(e) => {
                return Err(StardictError::InvalidData(format!("deflate failed: {:?}", e)))
            }
        }
    }

    out.truncate(written);
    Ok(out)
}

/// Compress `data` into a dictzip file written to `out`.
///
/// Returns the number of bytes written. The result is also an ordinary gzip
/// member, so whole-file decompression reproduces `data`.
pub fn write_dictzip<W: Write>(data: &[u8], chunk_length: u16, out: &mut W) -> Result<u64> {
    if chunk_length == 0 {
        return Err(StardictError::InvalidArgument(
            "dictzip chunk length must be non-zero".to_string(),
        ));
    }

    let mut comp = CompressorOxide::new(create_comp_flags_from_zip_params(6, -15, 0));
    let chunks: Vec<&[u8]> = data.chunks(chunk_length as usize).collect();
    if chunks.len() > u16::MAX as usize {
        return Err(StardictError::InvalidArgument(format!(
            "{} bytes need {} chunks of {}, more than a dictzip table holds",
            data.len(),
            chunks.len(),
            chunk_length
        )));
    }

    let mut body = Vec::with_capacity(data.len() / 2 + 64);
    let mut sizes = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let flush = if i + 1 == chunks.len() {
            MZFlush::Finish
        } else {
            MZFlush::Full
        };
        let compressed = deflate_chunk(&mut comp, chunk, flush)?;
        let size = u16::try_from(compressed.len()).map_err(|_| {
            StardictError::InvalidArgument(format!(
                "chunk {} compressed to {} bytes; use a smaller chunk length",
                i,
                compressed.len()
            ))
        })?;
        sizes.push(size);
        body.extend_from_slice(&compressed);
    }
    if chunks.is_empty() {
        // an empty final block keeps the member valid gzip
        body.extend_from_slice(&deflate_chunk(&mut comp, &[], MZFlush::Finish)?);
    }

    let header = write_dictzip_header(
        &RandomAccessField {
            version: 1,
            chunk_length,
            chunk_sizes: sizes,
        },
        0,
    )?;

    out.write_all(&header)?;
    out.write_all(&body)?;
    out.write_all(&crc32fast::hash(data).to_le_bytes())?;
    out.write_all(&(data.len() as u32).to_le_bytes())?;
    Ok((header.len() + body.len() + 8) as u64)
}
