//! Append-only writer with deferred flush, the mirror of the reader
//!
//! Buffer and file targets collect byte fragments in memory and assemble
//! them on [`Writer::close`]; stream targets pass writes straight through.

use crate::error::{Error, Result};
use crate::io::source::Target;
use bytes::{Bytes, BytesMut};
use std::io::Write;
use std::path::PathBuf;

enum Sink {
    Fragments(Vec<Bytes>),
    Stream(Box<dyn Write + Send>),
}

/// Append-only writer over a [`Target`]
pub struct Writer {
    sink: Sink,
    file_path: Option<PathBuf>,
    position: u64,
    closed: bool,
}

impl Writer {
    /// Create a writer; file targets are created on close
    pub fn new(target: Target) -> Self {
        let (sink, file_path) = match target {
            Target::Buffer => (Sink::Fragments(Vec::new()), None),
            Target::File(path) => (Sink::Fragments(Vec::new()), Some(path)),
            Target::Stream(inner) => (Sink::Stream(inner), None),
        };
        Writer {
            sink,
            file_path,
            position: 0,
            closed: false,
        }
    }

    /// Total bytes written so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Append raw bytes
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::muxer_state("write after writer close"));
        }
        match &mut self.sink {
            Sink::Fragments(fragments) => {
                fragments.push(Bytes::copy_from_slice(data));
            }
            Sink::Stream(inner) => {
                inner.write_all(data)?;
            }
        }
        self.position += data.len() as u64;
        Ok(())
    }

    /// Append already-owned bytes without copying
    pub fn write_buffer(&mut self, data: Bytes) -> Result<()> {
        if self.closed {
            return Err(Error::muxer_state("write after writer close"));
        }
        self.position += data.len() as u64;
        match &mut self.sink {
            Sink::Fragments(fragments) => fragments.push(data),
            Sink::Stream(inner) => inner.write_all(&data)?,
        }
        Ok(())
    }

    /// Write `n` copies of `byte`
    pub fn padding(&mut self, n: usize, byte: u8) -> Result<()> {
        self.write_buffer(Bytes::from(vec![byte; n]))
    }

    // Typed writers, mirroring the reader's accessors.

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    pub fn write_i8(&mut self, v: i8) -> Result<()> {
        self.write_u8(v as u8)
    }

    pub fn write_u16_be(&mut self, v: u16) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    pub fn write_u16_le(&mut self, v: u16) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_i16_be(&mut self, v: i16) -> Result<()> {
        self.write_u16_be(v as u16)
    }

    pub fn write_i16_le(&mut self, v: i16) -> Result<()> {
        self.write_u16_le(v as u16)
    }

    pub fn write_u24_be(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&v.to_be_bytes()[1..])
    }

    pub fn write_u24_le(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&v.to_le_bytes()[..3])
    }

    pub fn write_i24_be(&mut self, v: i32) -> Result<()> {
        self.write_u24_be((v as u32) & 0x00FF_FFFF)
    }

    pub fn write_i24_le(&mut self, v: i32) -> Result<()> {
        self.write_u24_le((v as u32) & 0x00FF_FFFF)
    }

    pub fn write_u32_be(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    pub fn write_u32_le(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_i32_be(&mut self, v: i32) -> Result<()> {
        self.write_u32_be(v as u32)
    }

    pub fn write_i32_le(&mut self, v: i32) -> Result<()> {
        self.write_u32_le(v as u32)
    }

    pub fn write_u64_be(&mut self, v: u64) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    pub fn write_u64_le(&mut self, v: u64) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_i64_be(&mut self, v: i64) -> Result<()> {
        self.write_u64_be(v as u64)
    }

    pub fn write_i64_le(&mut self, v: i64) -> Result<()> {
        self.write_u64_le(v as u64)
    }

    pub fn write_f32_be(&mut self, v: f32) -> Result<()> {
        self.write_u32_be(v.to_bits())
    }

    pub fn write_f32_le(&mut self, v: f32) -> Result<()> {
        self.write_u32_le(v.to_bits())
    }

    pub fn write_f64_be(&mut self, v: f64) -> Result<()> {
        self.write_u64_be(v.to_bits())
    }

    pub fn write_f64_le(&mut self, v: f64) -> Result<()> {
        self.write_u64_le(v.to_bits())
    }

    /// Write a string's UTF-8 bytes verbatim
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_bytes(s.as_bytes())
    }

    /// Write a four-character code: space-padded if short, truncated if long
    pub fn write_four_cc(&mut self, code: &str) -> Result<()> {
        let mut four = [b' '; 4];
        for (slot, byte) in four.iter_mut().zip(code.bytes()) {
            *slot = byte;
        }
        self.write_bytes(&four)
    }

    /// Write an ID3v2 syncsafe integer (28 significant bits)
    pub fn write_syncsafe_int(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&[
            ((v >> 21) & 0x7F) as u8,
            ((v >> 14) & 0x7F) as u8,
            ((v >> 7) & 0x7F) as u8,
            (v & 0x7F) as u8,
        ])
    }

    /// Close the writer and return the assembled output
    ///
    /// Buffer targets get the complete output back; file targets flush the
    /// assembly to disk and return empty bytes; stream targets flush the
    /// underlying stream. A second close is a no-op returning empty bytes.
    pub fn close(&mut self) -> Result<Bytes> {
        if self.closed {
            return Ok(Bytes::new());
        }
        self.closed = true;
        match &mut self.sink {
            Sink::Fragments(fragments) => {
                let total: usize = fragments.iter().map(|f| f.len()).sum();
                let mut assembled = BytesMut::with_capacity(total);
                for fragment in fragments.drain(..) {
                    assembled.extend_from_slice(&fragment);
                }
                let assembled = assembled.freeze();
                if let Some(path) = &self.file_path {
                    let mut file = std::fs::File::create(path)?;
                    file.write_all(&assembled)?;
                    file.flush()?;
                    return Ok(Bytes::new());
                }
                Ok(assembled)
            }
            Sink::Stream(inner) => {
                inner.flush()?;
                Ok(Bytes::new())
            }
        }
    }
}
