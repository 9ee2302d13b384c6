//! AAC (ADTS) audio format support
//!
//! ADTS frames are self-synchronizing: a 7-byte header (9 with CRC)
//! carrying a 13-bit frame length, followed by the raw AAC payload.

pub mod demuxer;
pub mod muxer;

pub use demuxer::{AacDemuxer, AdtsHeader};
pub use muxer::AacMuxer;

use crate::error::Result;
use crate::format::{Demuxer, InputFormat, Muxer, OutputFormat};
use crate::io::{Reader, Writer};

/// ADTS sampling-frequency table; indices 13..=15 are invalid
pub const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Samples per AAC frame (canonical)
pub const SAMPLES_PER_FRAME: u32 = 1024;

/// Whether two bytes look like an ADTS sync (12 sync bits + layer 0)
pub fn is_adts_sync(b0: u8, b1: u8) -> bool {
    b0 == 0xFF && (b1 & 0xF6) == 0xF0
}

/// Index of a sample rate in the ADTS table
pub fn sample_rate_index(rate: u32) -> Option<u8> {
    SAMPLE_RATES.iter().position(|&r| r == rate).map(|i| i as u8)
}

/// AAC input format descriptor
pub struct AacInputFormat;

impl InputFormat for AacInputFormat {
    fn name(&self) -> &'static str {
        "aac"
    }

    fn mime(&self) -> &'static str {
        "audio/aac"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["aac", "adts"]
    }

    fn can_read(&self, reader: &mut Reader) -> Result<bool> {
        Ok(matches!(reader.peek(2)?, Some(b) if is_adts_sync(b[0], b[1])))
    }

    fn create_demuxer(&self, reader: Reader) -> Result<Box<dyn Demuxer>> {
        Ok(Box::new(AacDemuxer::new(reader)?))
    }
}

/// AAC output format descriptor
pub struct AacOutputFormat;

impl OutputFormat for AacOutputFormat {
    fn name(&self) -> &'static str {
        "aac"
    }

    fn mime(&self) -> &'static str {
        "audio/aac"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["aac", "adts"]
    }

    fn create_muxer(&self, writer: Writer) -> Result<Box<dyn Muxer>> {
        Ok(Box::new(AacMuxer::new(writer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_check() {
        assert!(is_adts_sync(0xFF, 0xF1));
        assert!(is_adts_sync(0xFF, 0xF9));
        // MP3 sync is not ADTS: layer bits nonzero.
        assert!(!is_adts_sync(0xFF, 0xFB));
        assert!(!is_adts_sync(0xFE, 0xF1));
    }

    #[test]
    fn test_sample_rate_index() {
        assert_eq!(sample_rate_index(44100), Some(4));
        assert_eq!(sample_rate_index(96000), Some(0));
        assert_eq!(sample_rate_index(12345), None);
    }
}
