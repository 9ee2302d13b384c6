//! Byte-oriented random-access reader with a sliding cached slice
//!
//! The [`Reader`] keeps a logical cursor over any [`Source`] and satisfies
//! reads from a single cached [`FileSlice`] of at least 64 KiB. A read
//! that misses or straddles the slice reloads it at the current position;
//! after a reload the request is re-checked and reported as end-of-input
//! when it still cannot be satisfied.

use crate::error::{Error, Result};
use crate::io::source::Source;
use bytes::Bytes;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

/// Minimum size of the cached slice
pub const SLICE_MIN: usize = 64 * 1024;

/// Cached window over the source: an owned byte run plus its absolute offset
#[derive(Debug, Clone)]
pub struct FileSlice {
    data: Bytes,
    offset: u64,
}

impl FileSlice {
    /// Create a slice from owned bytes at an absolute offset
    pub fn new(data: Bytes, offset: u64) -> Self {
        FileSlice { data, offset }
    }

    /// Whether `len` bytes at absolute position `pos` fall inside the slice
    pub fn contains(&self, pos: u64, len: usize) -> bool {
        pos >= self.offset && pos + len as u64 <= self.offset + self.data.len() as u64
    }

    /// Copy out `len` bytes at absolute position `pos`.
    ///
    /// Only call when `contains(pos, len)` holds.
    pub fn get(&self, pos: u64, len: usize) -> Bytes {
        let start = (pos - self.offset) as usize;
        self.data.slice(start..start + len)
    }

    /// Slice length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the slice holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Character encoding for fixed-length string reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Utf8,
    Ascii,
    Latin1,
}

/// Backing state for each source kind, opened lazily
enum Backend {
    Buffer(Bytes),
    File {
        path: PathBuf,
        file: Option<File>,
    },
    Url {
        url: String,
        headers: Vec<(String, String)>,
        client: Option<reqwest::blocking::Client>,
    },
    Stream {
        inner: Box<dyn Read + Send>,
        consumed: u64,
        finished: bool,
    },
}

/// Random-access reader over a [`Source`]
pub struct Reader {
    backend: Backend,
    position: u64,
    size: Option<u64>,
    size_known: bool,
    slice: Option<FileSlice>,
}

impl Reader {
    /// Create a reader; no I/O happens until the first read
    pub fn new(source: Source) -> Self {
        let backend = match source {
            Source::Buffer(data) => Backend::Buffer(data),
            Source::File(path) => Backend::File { path, file: None },
            Source::Url { url, headers } => Backend::Url {
                url,
                headers,
                client: None,
            },
            Source::Stream(inner) => Backend::Stream {
                inner,
                consumed: 0,
                finished: false,
            },
        };
        Reader {
            backend,
            position: 0,
            size: None,
            size_known: false,
            slice: None,
        }
    }

    /// Current cursor position
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total source size in bytes, when known
    ///
    /// Buffer and file sources always know their size; a URL source learns
    /// it from a `HEAD` request's `Content-Length` when the server provides
    /// one; streams never know.
    pub fn size(&mut self) -> Result<Option<u64>> {
        if self.size_known {
            return Ok(self.size);
        }
        self.size = match &mut self.backend {
            Backend::Buffer(data) => Some(data.len() as u64),
            Backend::File { path, file } => {
                if file.is_none() {
                    *file = Some(File::open(&*path)?);
                }
                Some(file.as_ref().unwrap().metadata()?.len())
            }
            Backend::Url {
                url,
                headers,
                client,
            } => {
                let client = Self::http_client(client)?;
                let mut request = client.head(&*url);
                for (name, value) in headers.iter() {
                    request = request.header(name.as_str(), value.as_str());
                }
                let response = request
                    .send()
                    .map_err(|e| Error::Io(std::io::Error::other(e)))?;
                response
                    .headers()
                    .get(reqwest::header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
            }
            Backend::Stream { .. } => None,
        };
        self.size_known = true;
        Ok(self.size)
    }

    /// Reposition the cursor
    ///
    /// The cached slice stays valid; it is reloaded only when a later read
    /// falls outside it. Stream sources reject any actual repositioning
    /// (a seek to the current position is a no-op).
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos == self.position {
            return Ok(());
        }
        if matches!(self.backend, Backend::Stream { .. }) {
            return Err(Error::non_seekable("seek on a stream source"));
        }
        self.position = pos;
        Ok(())
    }

    /// Advance the cursor by `n` bytes
    ///
    /// On a stream source this reads and discards, which keeps consumption
    /// sequential.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        if let Backend::Stream { .. } = self.backend {
            let mut remaining = n;
            while remaining > 0 {
                let step = remaining.min(SLICE_MIN as u64) as usize;
                match self.read_bytes(step)? {
                    Some(chunk) if !chunk.is_empty() => remaining -= chunk.len() as u64,
                    _ => break,
                }
            }
            self.position += remaining;
            return Ok(());
        }
        self.position += n;
        Ok(())
    }

    /// Whether the cursor is at or past the end of the source
    pub fn is_eof(&mut self) -> Result<bool> {
        if let Some(size) = self.size()? {
            return Ok(self.position >= size);
        }
        Ok(self.peek(1)?.is_none())
    }

    /// Read `n` bytes at the cursor, advancing past them
    ///
    /// Returns `None` when the source cannot supply all `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<Option<Bytes>> {
        if n == 0 {
            return Ok(Some(Bytes::new()));
        }
        if !self.ensure(n)? {
            return Ok(None);
        }
        let data = self.slice.as_ref().unwrap().get(self.position, n);
        self.position += n as u64;
        Ok(Some(data))
    }

    /// Read `n` bytes without advancing the cursor
    pub fn peek(&mut self, n: usize) -> Result<Option<Bytes>> {
        if n == 0 {
            return Ok(Some(Bytes::new()));
        }
        if !self.ensure(n)? {
            return Ok(None);
        }
        Ok(Some(self.slice.as_ref().unwrap().get(self.position, n)))
    }

    /// Make sure `len` bytes at the cursor are inside the cached slice,
    /// reloading it when needed. Returns false when the source is
    /// exhausted before `len` bytes.
    fn ensure(&mut self, len: usize) -> Result<bool> {
        if let Some(slice) = &self.slice {
            if slice.contains(self.position, len) {
                return Ok(true);
            }
        }
        let want = len.max(SLICE_MIN);
        let slice = self.load_slice(self.position, want)?;
        let ok = slice.contains(self.position, len);
        self.slice = Some(slice);
        Ok(ok)
    }

    /// Load a fresh slice of up to `want` bytes at absolute position `pos`
    fn load_slice(&mut self, pos: u64, want: usize) -> Result<FileSlice> {
        match &mut self.backend {
            Backend::Buffer(data) => {
                let len = data.len() as u64;
                let start = pos.min(len) as usize;
                let end = (pos + want as u64).min(len) as usize;
                Ok(FileSlice::new(data.slice(start..end), pos))
            }
            Backend::File { path, file } => {
                if file.is_none() {
                    *file = Some(File::open(&*path)?);
                }
                let f = file.as_mut().unwrap();
                f.seek(SeekFrom::Start(pos))?;
                let mut buf = vec![0u8; want];
                let mut filled = 0;
                while filled < want {
                    let n = f.read(&mut buf[filled..])?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                }
                buf.truncate(filled);
                Ok(FileSlice::new(Bytes::from(buf), pos))
            }
            Backend::Url {
                url,
                headers,
                client,
            } => {
                let client = Self::http_client(client)?;
                let end = pos + want as u64 - 1;
                let mut request = client
                    .get(&*url)
                    .header(reqwest::header::RANGE, format!("bytes={}-{}", pos, end));
                for (name, value) in headers.iter() {
                    request = request.header(name.as_str(), value.as_str());
                }
                let response = request
                    .send()
                    .map_err(|e| Error::Io(std::io::Error::other(e)))?;
                if response.status() == reqwest::StatusCode::RANGE_NOT_SATISFIABLE {
                    return Ok(FileSlice::new(Bytes::new(), pos));
                }
                let body = response
                    .error_for_status()
                    .and_then(|r| r.bytes())
                    .map_err(|e| Error::Io(std::io::Error::other(e)))?;
                Ok(FileSlice::new(body, pos))
            }
            Backend::Stream {
                inner,
                consumed,
                finished,
            } => {
                if pos < *consumed {
                    return Err(Error::non_seekable(format!(
                        "stream read at {} behind consumed watermark {}",
                        pos, consumed
                    )));
                }
                // Discard forward to the requested position.
                let mut gap = pos - *consumed;
                let mut scratch = [0u8; 8192];
                while gap > 0 && !*finished {
                    let step = gap.min(scratch.len() as u64) as usize;
                    let n = inner.read(&mut scratch[..step])?;
                    if n == 0 {
                        *finished = true;
                        break;
                    }
                    *consumed += n as u64;
                    gap -= n as u64;
                }
                if *finished && gap > 0 {
                    return Ok(FileSlice::new(Bytes::new(), pos));
                }
                let mut buf = vec![0u8; want];
                let mut filled = 0;
                while filled < want {
                    let n = inner.read(&mut buf[filled..])?;
                    if n == 0 {
                        *finished = true;
                        break;
                    }
                    filled += n;
                }
                *consumed += filled as u64;
                buf.truncate(filled);
                Ok(FileSlice::new(Bytes::from(buf), pos))
            }
        }
    }

    fn http_client(
        slot: &mut Option<reqwest::blocking::Client>,
    ) -> Result<&reqwest::blocking::Client> {
        if slot.is_none() {
            let client = reqwest::blocking::Client::builder()
                .build()
                .map_err(|e| Error::Io(std::io::Error::other(e)))?;
            *slot = Some(client);
        }
        Ok(slot.as_ref().unwrap())
    }

    /// Close the reader, releasing any file handle
    pub fn close(&mut self) {
        if let Backend::File { file, .. } = &mut self.backend {
            *file = None;
        }
        self.slice = None;
    }

    fn require(&mut self, n: usize) -> Result<Bytes> {
        let at = self.position;
        self.read_bytes(n)?
            .ok_or_else(|| Error::truncated(format!("need {} bytes at offset {}", n, at)))
    }

    // Typed accessors. Exhaustion surfaces as `Error::TruncatedInput`.

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.require(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        let b = self.require(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        let b = self.require(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_i16_be(&mut self) -> Result<i16> {
        Ok(self.read_u16_be()? as i16)
    }

    pub fn read_i16_le(&mut self) -> Result<i16> {
        Ok(self.read_u16_le()? as i16)
    }

    pub fn read_u24_be(&mut self) -> Result<u32> {
        let b = self.require(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn read_u24_le(&mut self) -> Result<u32> {
        let b = self.require(3)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
    }

    pub fn read_i24_be(&mut self) -> Result<i32> {
        Ok(((self.read_u24_be()? << 8) as i32) >> 8)
    }

    pub fn read_i24_le(&mut self) -> Result<i32> {
        Ok(((self.read_u24_le()? << 8) as i32) >> 8)
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        let b = self.require(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let b = self.require(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32_be(&mut self) -> Result<i32> {
        Ok(self.read_u32_be()? as i32)
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(self.read_u32_le()? as i32)
    }

    pub fn read_u64_be(&mut self) -> Result<u64> {
        let b = self.require(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        let b = self.require(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_i64_be(&mut self) -> Result<i64> {
        Ok(self.read_u64_be()? as i64)
    }

    pub fn read_i64_le(&mut self) -> Result<i64> {
        Ok(self.read_u64_le()? as i64)
    }

    pub fn read_f32_be(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32_be()?))
    }

    pub fn read_f32_le(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32_le()?))
    }

    pub fn read_f64_be(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64_be()?))
    }

    pub fn read_f64_le(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64_le()?))
    }

    /// Read a fixed-length string in the given encoding
    pub fn read_string(&mut self, n: usize, encoding: StringEncoding) -> Result<String> {
        let bytes = self.require(n)?;
        Ok(decode_string(&bytes, encoding))
    }

    /// Read a NUL-terminated string, stopping at `max` bytes
    ///
    /// The terminating NUL is consumed; bytes past it are not.
    pub fn read_c_string(&mut self, max: usize) -> Result<String> {
        let mut out = Vec::new();
        for _ in 0..max {
            match self.read_bytes(1)? {
                Some(b) if b[0] != 0 => out.push(b[0]),
                _ => break,
            }
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Read a four-character code: exactly 4 ASCII bytes, stored verbatim
    pub fn read_four_cc(&mut self) -> Result<[u8; 4]> {
        let b = self.require(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// Read an ID3v2 syncsafe integer: four bytes with bit 7 clear,
    /// packed 7 bits per byte big-endian
    pub fn read_syncsafe_int(&mut self) -> Result<u32> {
        let b = self.require(4)?;
        Ok(((b[0] as u32 & 0x7F) << 21)
            | ((b[1] as u32 & 0x7F) << 14)
            | ((b[2] as u32 & 0x7F) << 7)
            | (b[3] as u32 & 0x7F))
    }
}

/// Decode raw bytes into a string under the chosen encoding
pub fn decode_string(bytes: &[u8], encoding: StringEncoding) -> String {
    match encoding {
        StringEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        StringEncoding::Ascii => bytes
            .iter()
            .map(|&b| if b < 0x80 { b as char } else { '\u{FFFD}' })
            .collect(),
        StringEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
    }
}
