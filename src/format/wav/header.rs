//! WAV `fmt ` and `ds64` chunk structures

use crate::error::{Error, Result};
use crate::format::track::{codecs, SampleFormat};
use crate::io::Reader;

/// Known `fmt ` format codes
pub const WAVE_FORMAT_PCM: u16 = 0x0001;
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
pub const WAVE_FORMAT_ALAW: u16 = 0x0006;
pub const WAVE_FORMAT_MULAW: u16 = 0x0007;
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Decoded `fmt ` chunk
#[derive(Debug, Clone)]
pub struct WavFormat {
    pub format_code: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// WAVE_FORMAT_EXTENSIBLE only
    pub valid_bits: Option<u16>,
    pub channel_mask: Option<u32>,
    pub sub_format: Option<[u8; 16]>,
}

impl WavFormat {
    /// Parse a `fmt ` chunk payload of `chunk_size` bytes at the reader
    ///
    /// Leaves the reader just past the consumed fields; the caller skips
    /// any remainder.
    pub fn parse(reader: &mut Reader, chunk_size: u32) -> Result<Self> {
        if chunk_size < 16 {
            return Err(Error::invalid_container("fmt chunk shorter than 16 bytes"));
        }
        let format_code = reader.read_u16_le()?;
        let channels = reader.read_u16_le()?;
        let sample_rate = reader.read_u32_le()?;
        let byte_rate = reader.read_u32_le()?;
        let block_align = reader.read_u16_le()?;
        let bits_per_sample = reader.read_u16_le()?;

        let mut format = WavFormat {
            format_code,
            channels,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample,
            valid_bits: None,
            channel_mask: None,
            sub_format: None,
        };

        if chunk_size > 16 {
            let ext_size = reader.read_u16_le()?;
            if format_code == WAVE_FORMAT_EXTENSIBLE && ext_size >= 22 {
                format.valid_bits = Some(reader.read_u16_le()?);
                format.channel_mask = Some(reader.read_u32_le()?);
                let guid = reader
                    .read_bytes(16)?
                    .ok_or_else(|| Error::truncated("extensible fmt sub-format GUID"))?;
                let mut sub = [0u8; 16];
                sub.copy_from_slice(&guid);
                format.sub_format = Some(sub);
            }
        }

        if format.channels == 0 {
            return Err(Error::invalid_container("fmt chunk with zero channels"));
        }
        if format.sample_rate == 0 {
            return Err(Error::invalid_container("fmt chunk with zero sample rate"));
        }
        Ok(format)
    }

    /// The effective format code, resolving WAVE_FORMAT_EXTENSIBLE
    /// through the sub-format GUID's leading two bytes
    pub fn effective_code(&self) -> u16 {
        if self.format_code == WAVE_FORMAT_EXTENSIBLE {
            if let Some(guid) = &self.sub_format {
                return u16::from_le_bytes([guid[0], guid[1]]);
            }
        }
        self.format_code
    }

    /// Codec tag and sample format for the track descriptor
    pub fn codec(&self) -> (&'static str, Option<SampleFormat>) {
        match self.effective_code() {
            WAVE_FORMAT_IEEE_FLOAT => {
                let sample_format = if self.bits_per_sample == 64 {
                    SampleFormat::F64
                } else {
                    SampleFormat::F32
                };
                (codecs::PCM, Some(sample_format))
            }
            WAVE_FORMAT_ALAW => (codecs::ALAW, None),
            WAVE_FORMAT_MULAW => (codecs::ULAW, None),
            _ => {
                let sample_format = match self.bits_per_sample {
                    8 => Some(SampleFormat::U8),
                    16 => Some(SampleFormat::I16),
                    24 => Some(SampleFormat::I24),
                    32 => Some(SampleFormat::I32),
                    _ => None,
                };
                (codecs::PCM, sample_format)
            }
        }
    }
}

/// Decoded `ds64` chunk: the true 64-bit sizes of an RF64 file
#[derive(Debug, Clone, Copy)]
pub struct Ds64Chunk {
    pub riff_size: u64,
    pub data_size: u64,
    pub sample_count: u64,
    pub table_length: u32,
}

impl Ds64Chunk {
    /// Parse the fixed 28-byte prefix of a ds64 payload; each 64-bit
    /// value is stored low word first
    pub fn parse(reader: &mut Reader) -> Result<Self> {
        let riff_size = read_u64_split(reader)?;
        let data_size = read_u64_split(reader)?;
        let sample_count = read_u64_split(reader)?;
        let table_length = reader.read_u32_le()?;
        Ok(Ds64Chunk {
            riff_size,
            data_size,
            sample_count,
            table_length,
        })
    }
}

fn read_u64_split(reader: &mut Reader) -> Result<u64> {
    let low = reader.read_u32_le()? as u64;
    let high = reader.read_u32_le()? as u64;
    Ok(low | (high << 32))
}
