use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

/// A read-only file mapping with its own cursor.
///
/// The mapping itself is shared: cloning a `MappedFile` gives an independent
/// cursor over the same pages, so one map can back several readers.
#[derive(Debug, Clone)]
pub struct MappedFile {
    map: Arc<Mmap>,
    pos: u64,
}

impl MappedFile {
    /// Map the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::map(&file)
    }

    /// Map an already opened file.
    pub fn map(file: &File) -> io::Result<Self> {
        // SAFETY: the dictionary files are treated as immutable while open; a
        // concurrent truncation by another process is outside what we support.
        let map = unsafe { Mmap::map(file)? };
        Ok(Self {
            map: Arc::new(map),
            pos: 0,
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.map[..]
    }

    pub fn len(&self) -> u64 {
        self.map.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Borrow `len` bytes at `offset`, or `None` if the range leaves the map.
    pub fn read_at(&self, offset: u64, len: usize) -> Option<&[u8]> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(len)?;
        self.map.get(start..end)
    }
}

impl Read for MappedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.map.len() as u64;
        if self.pos >= len {
            return Ok(0);
        }
        let start = self.pos as usize;
        let n = buf.len().min((len - self.pos) as usize);
        buf[..n].copy_from_slice(&self.map[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MappedFile {
    fn seek(&mut self, how: SeekFrom) -> io::Result<u64> {
        let new = match how {
            SeekFrom::Start(off) => Some(off),
            SeekFrom::End(off) => self.len().checked_add_signed(off),
            SeekFrom::Current(off) => self.pos.checked_add_signed(off),
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
