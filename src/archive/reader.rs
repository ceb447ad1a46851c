//! Shared, lazily-decompressing access to an open archive.

use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::ArchiveError;

use super::MAGIC;

/// Anything an archive can be read back from.
pub trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Offset and compressed length of one stored entry.
#[derive(Debug, Clone, Copy)]
struct EntrySpan {
    offset: u64,
    compressed_len: u32,
}

/// A cloneable handle to an open archive.
///
/// Entries are decompressed on demand, one read per request, so loading
/// an archive never materializes its content up front. The underlying
/// source carries its own lock: assets on different request threads read
/// concurrently without involving the server guard, and no code path
/// takes the server guard while holding this one.
#[derive(Clone)]
pub struct SharedReader {
    inner: Arc<ReaderInner>,
}

struct ReaderInner {
    src: Mutex<Box<dyn ReadSeek>>,
    index: FxHashMap<String, EntrySpan>,
}

impl std::fmt::Debug for SharedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedReader")
            .field("entries", &self.inner.index.len())
            .finish()
    }
}

impl SharedReader {
    /// Open an archive held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ArchiveError> {
        Self::new(Box::new(Cursor::new(bytes)))
    }

    /// Open an archive from any seekable source.
    pub fn new(mut src: Box<dyn ReadSeek>) -> Result<Self, ArchiveError> {
        let index = scan_index(&mut src)?;
        Ok(Self {
            inner: Arc::new(ReaderInner {
                src: Mutex::new(src),
                index,
            }),
        })
    }

    /// Whether the archive contains an entry of this name.
    pub fn contains(&self, entry: &str) -> bool {
        self.inner.index.contains_key(entry)
    }

    /// Names of all stored entries, in unspecified order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.inner.index.keys().map(String::as_str)
    }

    /// Read and decompress one entry.
    pub fn read(&self, entry: &str) -> io::Result<Vec<u8>> {
        let span = *self.inner.index.get(entry).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no archive entry `{entry}`"),
            )
        })?;

        // Hold the source lock only for the raw read; inflate outside it.
        let compressed = {
            let mut src = self.inner.src.lock();
            src.seek(SeekFrom::Start(span.offset))?;
            let mut buf = vec![0u8; span.compressed_len as usize];
            src.read_exact(&mut buf)?;
            buf
        };

        let mut out = Vec::new();
        DeflateDecoder::new(compressed.as_slice()).read_to_end(&mut out)?;
        Ok(out)
    }
}

/// Scan the container once, recording where every entry's payload sits.
fn scan_index(src: &mut Box<dyn ReadSeek>) -> Result<FxHashMap<String, EntrySpan>, ArchiveError> {
    let total_len = src.seek(SeekFrom::End(0))?;
    src.seek(SeekFrom::Start(0))?;

    let mut magic = [0u8; MAGIC.len()];
    src.read_exact(&mut magic).map_err(|_| ArchiveError::BadMagic)?;
    if magic != *MAGIC {
        return Err(ArchiveError::BadMagic);
    }

    let mut index = FxHashMap::default();
    loop {
        let name_len = match read_u32(src)? {
            Some(len) => len,
            None => break,
        };

        let mut name = vec![0u8; name_len as usize];
        src.read_exact(&mut name).map_err(|_| ArchiveError::Corrupt)?;
        let name = String::from_utf8(name).map_err(|_| ArchiveError::Corrupt)?;

        let compressed_len = read_u32(src)?.ok_or(ArchiveError::Corrupt)?;
        let offset = src.stream_position()?;
        // Seeking past the end succeeds on most sources; bounds-check instead.
        if offset + u64::from(compressed_len) > total_len {
            return Err(ArchiveError::Corrupt);
        }
        src.seek(SeekFrom::Current(i64::from(compressed_len)))?;

        index.insert(
            name,
            EntrySpan {
                offset,
                compressed_len,
            },
        );
    }

    Ok(index)
}

/// Read a little-endian `u32`, or `None` at a clean end of the stream.
fn read_u32(src: &mut Box<dyn ReadSeek>) -> Result<Option<u32>, ArchiveError> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(ArchiveError::Corrupt),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ArchiveError::Io(e)),
        }
    }
    Ok(Some(u32::from_le_bytes(buf)))
}
