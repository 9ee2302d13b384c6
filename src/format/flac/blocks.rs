//! FLAC metadata block structures
//!
//! STREAMINFO's packed 20/3/5/36-bit layout goes through the bit cursor;
//! everything else is plain byte fields. The Vorbis-comment structure
//! here is also what OGG comment headers carry, so the OGG demuxer
//! borrows it.

use crate::error::{Error, Result};
use crate::format::metadata::AudioMetadata;
use crate::io::{BitReader, BitWriter};
use bytes::Bytes;
use std::collections::HashMap;

/// FLAC metadata block types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    StreamInfo,
    Padding,
    Application,
    SeekTable,
    VorbisComment,
    CueSheet,
    Picture,
    Unknown(u8),
}

impl From<u8> for BlockType {
    fn from(value: u8) -> Self {
        match value {
            0 => BlockType::StreamInfo,
            1 => BlockType::Padding,
            2 => BlockType::Application,
            3 => BlockType::SeekTable,
            4 => BlockType::VorbisComment,
            5 => BlockType::CueSheet,
            6 => BlockType::Picture,
            other => BlockType::Unknown(other),
        }
    }
}

/// STREAMINFO: sample-exact stream parameters
#[derive(Debug, Clone)]
pub struct FlacStreamInfo {
    pub min_block_size: u16,
    pub max_block_size: u16,
    /// 0 means unknown
    pub min_frame_size: u32,
    pub max_frame_size: u32,
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u8,
    /// 0 means unknown
    pub total_samples: u64,
    pub md5: [u8; 16],
}

impl FlacStreamInfo {
    /// Parse a 34-byte STREAMINFO payload
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < 34 {
            return Err(Error::truncated("STREAMINFO needs 34 bytes"));
        }
        let mut bits = BitReader::new(payload);
        let min_block_size = bits.read_bits(16)? as u16;
        let max_block_size = bits.read_bits(16)? as u16;
        let min_frame_size = bits.read_bits(24)?;
        let max_frame_size = bits.read_bits(24)?;
        let sample_rate = bits.read_bits(20)?;
        let channels = bits.read_bits(3)? as u8 + 1;
        let bits_per_sample = bits.read_bits(5)? as u8 + 1;
        let total_samples = bits.read_bits_long(36)?;
        let mut md5 = [0u8; 16];
        for slot in md5.iter_mut() {
            *slot = bits.read_bits(8)? as u8;
        }
        if sample_rate == 0 {
            return Err(Error::invalid_container("STREAMINFO with zero sample rate"));
        }
        Ok(FlacStreamInfo {
            min_block_size,
            max_block_size,
            min_frame_size,
            max_frame_size,
            sample_rate,
            channels,
            bits_per_sample,
            total_samples,
            md5,
        })
    }

    /// Serialize back into the 34-byte payload
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bits = BitWriter::new();
        bits.write_bits(self.min_block_size as u32, 16);
        bits.write_bits(self.max_block_size as u32, 16);
        bits.write_bits(self.min_frame_size, 24);
        bits.write_bits(self.max_frame_size, 24);
        bits.write_bits(self.sample_rate, 20);
        bits.write_bits(self.channels as u32 - 1, 3);
        bits.write_bits(self.bits_per_sample as u32 - 1, 5);
        bits.write_bits_long(self.total_samples, 36);
        for byte in self.md5 {
            bits.write_bits(byte as u32, 8);
        }
        bits.into_bytes()
    }

    /// Stream duration in seconds, when the sample count is known
    pub fn duration(&self) -> Option<f64> {
        if self.total_samples == 0 {
            None
        } else {
            Some(self.total_samples as f64 / self.sample_rate as f64)
        }
    }
}

/// Vorbis comment block: vendor string plus repeated KEY=value pairs
///
/// Keys are uppercased on store (they are case-insensitive by
/// convention); repeated keys accumulate values.
#[derive(Debug, Clone, Default)]
pub struct VorbisComment {
    pub vendor: String,
    pub comments: HashMap<String, Vec<String>>,
    /// Keys in first-seen order, for deterministic re-emission
    order: Vec<String>,
}

impl VorbisComment {
    /// Parse the little-endian comment structure
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = 0usize;
        let vendor_len = read_u32_le(data, &mut cursor)? as usize;
        let vendor = read_utf8(data, &mut cursor, vendor_len)?;
        let count = read_u32_le(data, &mut cursor)?;
        let mut comment = VorbisComment {
            vendor,
            ..Default::default()
        };
        for _ in 0..count {
            let len = read_u32_le(data, &mut cursor)? as usize;
            let entry = read_utf8(data, &mut cursor, len)?;
            if let Some(eq) = entry.find('=') {
                let key = entry[..eq].to_uppercase();
                let value = entry[eq + 1..].to_string();
                comment.push(key, value);
            }
        }
        Ok(comment)
    }

    /// Add a value under a key (key stored as given)
    pub fn push(&mut self, key: String, value: String) {
        if !self.comments.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.comments.entry(key).or_default().push(value);
    }

    /// First value under an (uppercase) key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.comments.get(key)?.first().map(String::as_str)
    }

    /// Map onto the shared metadata model
    pub fn to_metadata(&self) -> AudioMetadata {
        let mut m = AudioMetadata::default();
        for key in &self.order {
            if let Some(values) = self.comments.get(key) {
                for value in values {
                    m.apply_vorbis_comment(key, value);
                }
            }
        }
        m
    }
}

/// PICTURE block: typed embedded image
#[derive(Debug, Clone)]
pub struct FlacPicture {
    pub picture_type: u32,
    pub mime: String,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub color_depth: u32,
    pub color_count: u32,
    pub data: Bytes,
}

impl FlacPicture {
    /// Parse a PICTURE block payload (big-endian fields)
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = 0usize;
        let picture_type = read_u32_be(data, &mut cursor)?;
        let mime_len = read_u32_be(data, &mut cursor)? as usize;
        let mime = read_utf8(data, &mut cursor, mime_len)?;
        let desc_len = read_u32_be(data, &mut cursor)? as usize;
        let description = read_utf8(data, &mut cursor, desc_len)?;
        let width = read_u32_be(data, &mut cursor)?;
        let height = read_u32_be(data, &mut cursor)?;
        let color_depth = read_u32_be(data, &mut cursor)?;
        let color_count = read_u32_be(data, &mut cursor)?;
        let picture_len = read_u32_be(data, &mut cursor)? as usize;
        if cursor + picture_len > data.len() {
            return Err(Error::truncated("PICTURE block image data"));
        }
        let image = Bytes::copy_from_slice(&data[cursor..cursor + picture_len]);
        Ok(FlacPicture {
            picture_type,
            mime,
            description,
            width,
            height,
            color_depth,
            color_count,
            data: image,
        })
    }
}

fn read_u32_le(data: &[u8], cursor: &mut usize) -> Result<u32> {
    if *cursor + 4 > data.len() {
        return Err(Error::truncated("vorbis comment length field"));
    }
    let v = u32::from_le_bytes([
        data[*cursor],
        data[*cursor + 1],
        data[*cursor + 2],
        data[*cursor + 3],
    ]);
    *cursor += 4;
    Ok(v)
}

fn read_u32_be(data: &[u8], cursor: &mut usize) -> Result<u32> {
    if *cursor + 4 > data.len() {
        return Err(Error::truncated("picture block field"));
    }
    let v = u32::from_be_bytes([
        data[*cursor],
        data[*cursor + 1],
        data[*cursor + 2],
        data[*cursor + 3],
    ]);
    *cursor += 4;
    Ok(v)
}

fn read_utf8(data: &[u8], cursor: &mut usize, len: usize) -> Result<String> {
    if *cursor + len > data.len() {
        return Err(Error::truncated("string field"));
    }
    let s = String::from_utf8_lossy(&data[*cursor..*cursor + len]).into_owned();
    *cursor += len;
    Ok(s)
}
