//! I/O abstractions for containers and cache streams
//!
//! Cache streams decouple writing patched bytes from consuming them. A
//! [`CacheWriter`] keeps data in memory until a threshold is crossed and then
//! spills everything to an anonymous temporary file; [`CacheWriter::into_reader`]
//! turns the producer side into the consumer side. Both ends release their
//! backing storage when dropped.

use crate::Result;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// Default in-memory limit before a cache stream spills to disk (16 MiB)
pub const DEFAULT_CACHE_THRESHOLD: usize = 16 * 1024 * 1024;

/// Object-safe combination of `Read + Seek`
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Object-safe combination of `Write + Seek`
pub trait WriteSeek: Write + Seek {}

impl<T: Write + Seek + ?Sized> WriteSeek for T {}

/// Read exact number of bytes at the given offset
pub fn read_at<R: Read + Seek + ?Sized>(reader: &mut R, offset: u64, buf: &mut [u8]) -> Result<()> {
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(buf)?;
    Ok(())
}

/// Copy `len` bytes starting at `offset` from `reader` into `writer`
pub fn copy_range<R, W>(reader: &mut R, offset: u64, len: u64, writer: &mut W) -> Result<()>
where
    R: Read + Seek + ?Sized,
    W: Write + ?Sized,
{
    reader.seek(SeekFrom::Start(offset))?;
    let copied = io::copy(&mut reader.take(len), writer)?;
    if copied != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {len} bytes at offset {offset}, got {copied}"),
        )
        .into());
    }
    Ok(())
}

/// Create a new cache stream with the default threshold
pub fn cache_stream() -> CacheWriter {
    CacheWriter::with_threshold(DEFAULT_CACHE_THRESHOLD)
}

#[derive(Debug)]
enum CacheStore {
    Memory(Cursor<Vec<u8>>),
    Disk(File),
}

/// Producer side of a cache stream
#[derive(Debug)]
pub struct CacheWriter {
    store: CacheStore,
    threshold: usize,
}

impl CacheWriter {
    /// Create a cache stream that spills to disk beyond `threshold` bytes
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            store: CacheStore::Memory(Cursor::new(Vec::new())),
            threshold,
        }
    }

    /// Whether the stream has moved to disk
    pub fn is_spilled(&self) -> bool {
        matches!(self.store, CacheStore::Disk(_))
    }

    /// Finish writing and obtain the consumer side, positioned at the start
    pub fn into_reader(mut self) -> Result<CacheReader> {
        self.flush()?;
        let store = match self.store {
            CacheStore::Memory(cursor) => CacheStore::Memory(Cursor::new(cursor.into_inner())),
            CacheStore::Disk(mut file) => {
                file.seek(SeekFrom::Start(0))?;
                CacheStore::Disk(file)
            }
        };
        Ok(CacheReader { store })
    }

    fn spill(&mut self) -> io::Result<()> {
        if let CacheStore::Memory(cursor) = &self.store {
            let position = cursor.position();
            let mut file = tempfile::tempfile()?;
            file.write_all(cursor.get_ref())?;
            file.seek(SeekFrom::Start(position))?;
            log::debug!(
                "Cache stream spilled {} bytes to disk",
                cursor.get_ref().len()
            );
            self.store = CacheStore::Disk(file);
        }
        Ok(())
    }
}

impl Write for CacheWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let CacheStore::Memory(cursor) = &self.store {
            let end = cursor.position() as usize + buf.len();
            if end > self.threshold {
                self.spill()?;
            }
        }
        match &mut self.store {
            CacheStore::Memory(cursor) => cursor.write(buf),
            CacheStore::Disk(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.store {
            CacheStore::Memory(_) => Ok(()),
            CacheStore::Disk(file) => file.flush(),
        }
    }
}

impl Seek for CacheWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.store {
            CacheStore::Memory(cursor) => cursor.seek(pos),
            CacheStore::Disk(file) => file.seek(pos),
        }
    }
}

/// Consumer side of a cache stream
#[derive(Debug)]
pub struct CacheReader {
    store: CacheStore,
}

impl CacheReader {
    /// Read the remaining stream into memory
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl Read for CacheReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.store {
            CacheStore::Memory(cursor) => cursor.read(buf),
            CacheStore::Disk(file) => file.read(buf),
        }
    }
}

impl Seek for CacheReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.store {
            CacheStore::Memory(cursor) => cursor.seek(pos),
            CacheStore::Disk(file) => file.seek(pos),
        }
    }
}
