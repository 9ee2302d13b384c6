//! MPEG audio frame header parsing

use crate::error::{Error, Result};

/// MPEG Audio version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    /// Unofficial low-rate extension
    Mpeg25,
}

impl MpegVersion {
    /// Parse the 2-bit version field; 0b01 is reserved
    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b11 => Some(MpegVersion::Mpeg1),
            0b10 => Some(MpegVersion::Mpeg2),
            0b00 => Some(MpegVersion::Mpeg25),
            _ => None,
        }
    }
}

/// MPEG Audio layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegLayer {
    Layer1,
    Layer2,
    Layer3,
}

impl MpegLayer {
    /// Parse the 2-bit layer field; 0b00 is reserved
    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b01 => Some(MpegLayer::Layer3),
            0b10 => Some(MpegLayer::Layer2),
            0b11 => Some(MpegLayer::Layer1),
            _ => None,
        }
    }
}

/// Bitrate tables in kbps, indexed 1..=14; index 0 (free format) and 15
/// are invalid here. Published MPEG tables.
const MPEG1_LAYER1_BITRATES: [u16; 15] = [
    0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448,
];
const MPEG1_LAYER2_BITRATES: [u16; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384,
];
const MPEG1_LAYER3_BITRATES: [u16; 15] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];
const MPEG2_LAYER1_BITRATES: [u16; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256,
];
// Layer II and Layer III share the low-rate table for MPEG-2/2.5.
const MPEG2_LAYER2_BITRATES: [u16; 15] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160,
];
const MPEG2_LAYER3_BITRATES: [u16; 15] = MPEG2_LAYER2_BITRATES;

const MPEG1_SAMPLE_RATES: [u32; 3] = [44100, 48000, 32000];
const MPEG2_SAMPLE_RATES: [u32; 3] = [22050, 24000, 16000];
const MPEG25_SAMPLE_RATES: [u32; 3] = [11025, 12000, 8000];

/// Decoded MPEG audio frame header
///
/// The header is 4 bytes:
/// - 11 sync bits (0xFFE)
/// - 2 bits version, 2 bits layer, 1 bit protection (0 = CRC present)
/// - 4 bits bitrate index, 2 bits sample-rate index, 1 bit padding
/// - 2 bits channel mode (3 = mono)
#[derive(Debug, Clone)]
pub struct Mp3FrameHeader {
    pub version: MpegVersion,
    pub layer: MpegLayer,
    /// CRC-16 follows the header when set
    pub crc_protected: bool,
    /// Bitrate in kbps
    pub bitrate: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    pub padding: bool,
    pub channels: u16,
    /// Whole frame size in bytes, header included
    pub frame_size: usize,
    pub samples_per_frame: u32,
}

impl Mp3FrameHeader {
    /// Parse a frame header from at least 4 bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::truncated("MP3 frame header needs 4 bytes"));
        }
        if data[0] != 0xFF || (data[1] & 0xE0) != 0xE0 {
            return Err(Error::invalid_container("bad MP3 frame sync"));
        }

        let version = MpegVersion::from_bits((data[1] >> 3) & 0x03)
            .ok_or_else(|| Error::invalid_container("reserved MPEG version"))?;
        let layer = MpegLayer::from_bits((data[1] >> 1) & 0x03)
            .ok_or_else(|| Error::invalid_container("reserved MPEG layer"))?;
        let crc_protected = (data[1] & 0x01) == 0;

        let bitrate_index = (data[2] >> 4) as usize;
        if bitrate_index == 0 || bitrate_index == 15 {
            return Err(Error::invalid_container("invalid MP3 bitrate index"));
        }
        let bitrate = bitrate_table(version, layer)[bitrate_index];

        let sample_rate_index = ((data[2] >> 2) & 0x03) as usize;
        if sample_rate_index == 3 {
            return Err(Error::invalid_container("invalid MP3 sample-rate index"));
        }
        let sample_rate = match version {
            MpegVersion::Mpeg1 => MPEG1_SAMPLE_RATES[sample_rate_index],
            MpegVersion::Mpeg2 => MPEG2_SAMPLE_RATES[sample_rate_index],
            MpegVersion::Mpeg25 => MPEG25_SAMPLE_RATES[sample_rate_index],
        };

        let padding = (data[2] >> 1) & 0x01 == 1;
        let channel_mode = (data[3] >> 6) & 0x03;
        let channels = if channel_mode == 3 { 1 } else { 2 };

        let samples_per_frame = match layer {
            MpegLayer::Layer1 => 384,
            MpegLayer::Layer2 => 1152,
            MpegLayer::Layer3 => {
                if version == MpegVersion::Mpeg1 {
                    1152
                } else {
                    576
                }
            }
        };

        let br = bitrate as usize;
        let sr = sample_rate as usize;
        let pad = padding as usize;
        let frame_size = match layer {
            MpegLayer::Layer1 => (12 * br * 1000 / sr + pad) * 4,
            _ => {
                let slot = if layer == MpegLayer::Layer3 && version != MpegVersion::Mpeg1 {
                    72
                } else {
                    144
                };
                slot * br * 1000 / sr + pad
            }
        };

        Ok(Mp3FrameHeader {
            version,
            layer,
            crc_protected,
            bitrate,
            sample_rate,
            padding,
            channels,
            frame_size,
            samples_per_frame,
        })
    }

    /// Frame duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples_per_frame as f64 / self.sample_rate as f64
    }
}

fn bitrate_table(version: MpegVersion, layer: MpegLayer) -> &'static [u16; 15] {
    match (version, layer) {
        (MpegVersion::Mpeg1, MpegLayer::Layer1) => &MPEG1_LAYER1_BITRATES,
        (MpegVersion::Mpeg1, MpegLayer::Layer2) => &MPEG1_LAYER2_BITRATES,
        (MpegVersion::Mpeg1, MpegLayer::Layer3) => &MPEG1_LAYER3_BITRATES,
        (_, MpegLayer::Layer1) => &MPEG2_LAYER1_BITRATES,
        (_, MpegLayer::Layer2) => &MPEG2_LAYER2_BITRATES,
        (_, MpegLayer::Layer3) => &MPEG2_LAYER3_BITRATES,
    }
}
