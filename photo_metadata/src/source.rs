//! Random-access byte sources, and bounded windows over them.
//!
//! Containers never copy large payloads out of the input. Instead, they keep
//! [`Section`]s: cheap, cloneable views that read from the shared source on
//! demand.

use std::{
    fs::File,
    io::{self, Read as _, Seek as _, SeekFrom, Write},
    path::Path,
    sync::Arc,
};

use parking_lot::Mutex;

/// How many bytes we move at a time when copying a section to a sink.
pub const COPY_CHUNK: usize = 32 * 1024;

/// A sized source of bytes with random access.
pub trait ByteSource: Send + Sync + core::fmt::Debug {
    /// The total number of bytes in the source.
    fn size(&self) -> u64;

    /// Fills `buf` with the bytes starting at `offset`.
    ///
    /// Reading past the end is an [`io::ErrorKind::UnexpectedEof`] error.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

fn past_end(offset: u64, len: usize, size: u64) -> io::Error {
    log::error!("Tried to read `{len}` bytes at offset `{offset}`, but the source only has `{size}`.");
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "read past the end of the byte source",
    )
}

fn in_bounds(offset: u64, len: usize, size: u64) -> io::Result<()> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= size => Ok(()),
        _ => Err(past_end(offset, len, size)),
    }
}

/// Bytes that are already in memory.
#[derive(Clone, Debug)]
pub struct MemorySource(Arc<[u8]>);

impl MemorySource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }
}

impl ByteSource for MemorySource {
    fn size(&self) -> u64 {
        self.0.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        in_bounds(offset, buf.len(), self.size())?;

        // in range, so these casts can't truncate
        let start = offset as usize;
        buf.copy_from_slice(&self.0[start..start + buf.len()]);
        Ok(())
    }
}

/// A file on disk.
///
/// The handle sits behind a lock since every read is a seek followed by a
/// read.
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    size: u64,
}

impl FileSource {
    pub fn new(file: File) -> io::Result<Self> {
        let size = file.metadata()?.len();
        log::trace!("Opened a file source with `{size}` bytes.");
        Ok(Self {
            file: Mutex::new(file),
            size,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::new(File::open(path)?)
    }
}

impl ByteSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        in_bounds(offset, buf.len(), self.size)?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }
}

/// Several sections, read back to back as though they were one.
///
/// JPEG uses this to glue a payload split across many segments back
/// together.
#[derive(Clone, Debug)]
pub struct ChainSource {
    parts: Vec<Section>,
    size: u64,
}

impl ChainSource {
    pub fn new(parts: Vec<Section>) -> Self {
        let size = parts.iter().map(Section::len).sum();
        Self { parts, size }
    }
}

impl ByteSource for ChainSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&self, mut offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
        in_bounds(offset, buf.len(), self.size)?;

        for part in &self.parts {
            if buf.is_empty() {
                break;
            }
            if offset >= part.len() {
                offset -= part.len();
                continue;
            }

            let n = (part.len() - offset).min(buf.len() as u64) as usize;
            let (head, tail) = core::mem::take(&mut buf).split_at_mut(n);
            part.read_at(offset, head)?;
            buf = tail;
            offset = 0;
        }

        Ok(())
    }
}

/// A window of `len` bytes into a shared source, starting at `offset`.
#[derive(Clone, Debug)]
pub struct Section {
    source: Arc<dyn ByteSource>,
    offset: u64,
    len: u64,
}

impl Section {
    /// A view of the whole source.
    pub fn new(source: Arc<dyn ByteSource>) -> Self {
        let len = source.size();
        Self {
            source,
            offset: 0,
            len,
        }
    }

    /// A view of some bytes we already have.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(Arc::new(MemorySource::new(bytes)))
    }

    /// A view of nothing at all.
    pub fn empty() -> Self {
        Self::from_bytes(Vec::new())
    }

    /// Glues several sections together into one view.
    pub fn chain(parts: Vec<Section>) -> Self {
        match parts.len() {
            1 => parts.into_iter().next().unwrap_or_else(Self::empty),
            _ => Self::new(Arc::new(ChainSource::new(parts))),
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fills `buf` with bytes starting at `offset` within this section.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        in_bounds(offset, buf.len(), self.len)?;
        self.source.read_at(self.offset + offset, buf)
    }

    /// Reads `len` bytes at `offset` into a new buffer.
    pub fn read_vec(&self, offset: u64, len: u64) -> io::Result<Vec<u8>> {
        let len = usize::try_from(len).map_err(|_| past_end(offset, usize::MAX, self.len))?;
        let mut buf = vec![0_u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Reads as many bytes as are available at `offset`, up to `len`.
    pub fn read_upto(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let available = self.len.saturating_sub(offset).min(len as u64);
        self.read_vec(offset, available)
    }

    /// Copies the whole section into memory.
    pub fn to_vec(&self) -> io::Result<Vec<u8>> {
        self.read_vec(0, self.len)
    }

    /// A narrower view of this section.
    pub fn slice(&self, offset: u64, len: u64) -> io::Result<Section> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(Self {
                source: Arc::clone(&self.source),
                offset: self.offset + offset,
                len,
            }),
            _ => Err(past_end(offset, len as usize, self.len)),
        }
    }

    /// Copies the whole section to `out`.
    pub fn copy_to(&self, out: &mut dyn Write) -> io::Result<u64> {
        self.copy_range_to(0, self.len, out)
    }

    /// Copies `[from, to)` to `out`, stopping early at the end of the
    /// section. Returns how many bytes were copied.
    pub fn copy_range_to(&self, from: u64, to: u64, out: &mut dyn Write) -> io::Result<u64> {
        let to = to.min(self.len);
        let mut buf = vec![0_u8; COPY_CHUNK];
        let mut at = from;

        while at < to {
            let n = (to - at).min(COPY_CHUNK as u64) as usize;
            self.read_at(at, &mut buf[..n])?;
            out.write_all(&buf[..n])?;
            at += n as u64;
        }

        Ok(at.saturating_sub(from))
    }
}

impl ByteSource for Section {
    fn size(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        Section::read_at(self, offset, buf)
    }
}

impl From<Vec<u8>> for Section {
    fn from(value: Vec<u8>) -> Self {
        Self::from_bytes(value)
    }
}

impl From<&[u8]> for Section {
    fn from(value: &[u8]) -> Self {
        Self::from_bytes(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{ByteSource as _, ChainSource, Section};
    use crate::util::logger;

    #[test]
    fn sections_nest() {
        logger();

        let whole = Section::from_bytes(b"0123456789".to_vec());
        let mid = whole.slice(2, 6).unwrap();
        assert_eq!(mid.to_vec().unwrap(), b"234567");

        let inner = mid.slice(1, 3).unwrap();
        assert_eq!(inner.to_vec().unwrap(), b"345");
        assert!(mid.slice(4, 3).is_err());
        assert!(inner.read_vec(2, 2).is_err());
    }

    #[test]
    fn chains_read_across_parts() {
        logger();

        let a = Section::from_bytes(b"abc".to_vec());
        let b = Section::from_bytes(b"".to_vec());
        let c = Section::from_bytes(b"defg".to_vec());
        let chain = ChainSource::new(vec![a, b, c]);
        assert_eq!(chain.size(), 7);

        let mut buf = [0_u8; 4];
        chain.read_at(1, &mut buf).unwrap();
        assert_eq!(&buf, b"bcde");
        assert!(chain.read_at(5, &mut buf).is_err());

        let view = Section::new(Arc::new(chain));
        let mut out = Vec::new();
        assert_eq!(view.copy_range_to(2, 100, &mut out).unwrap(), 5);
        assert_eq!(out, b"cdefg");
    }
}
