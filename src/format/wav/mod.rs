//! WAV / RF64 audio format support
//!
//! RIFF/WAVE is a little-endian chunked container; RF64 is its 64-bit
//! variant where the 32-bit size fields hold the sentinel 0xFFFFFFFF and
//! a mandatory `ds64` chunk carries the true sizes.

pub mod demuxer;
pub mod header;
pub mod muxer;

pub use demuxer::WavDemuxer;
pub use header::{Ds64Chunk, WavFormat};
pub use muxer::WavMuxer;

use crate::error::Result;
use crate::format::{Demuxer, InputFormat, Muxer, OutputFormat};
use crate::io::{Reader, Writer};

/// WAV format magic numbers
pub const RIFF_MAGIC: &[u8; 4] = b"RIFF";
pub const RF64_MAGIC: &[u8; 4] = b"RF64";
pub const WAVE_MAGIC: &[u8; 4] = b"WAVE";
pub const FMT_CHUNK: &[u8; 4] = b"fmt ";
pub const DATA_CHUNK: &[u8; 4] = b"data";
pub const DS64_CHUNK: &[u8; 4] = b"ds64";
pub const LIST_CHUNK: &[u8; 4] = b"LIST";
pub const INFO_TYPE: &[u8; 4] = b"INFO";

/// The 32-bit size sentinel that defers to ds64
pub const SIZE_SENTINEL: u32 = 0xFFFF_FFFF;

/// WAV input format descriptor
pub struct WavInputFormat;

impl InputFormat for WavInputFormat {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn mime(&self) -> &'static str {
        "audio/wav"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["wav", "wave", "rf64"]
    }

    fn can_read(&self, reader: &mut Reader) -> Result<bool> {
        let header = match reader.peek(12)? {
            Some(h) => h,
            None => return Ok(false),
        };
        let magic_ok = &header[0..4] == RIFF_MAGIC || &header[0..4] == RF64_MAGIC;
        Ok(magic_ok && &header[8..12] == WAVE_MAGIC)
    }

    fn create_demuxer(&self, reader: Reader) -> Result<Box<dyn Demuxer>> {
        Ok(Box::new(WavDemuxer::new(reader)?))
    }
}

/// WAV output format descriptor; produces the auto-upgrading muxer
pub struct WavOutputFormat;

impl OutputFormat for WavOutputFormat {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn mime(&self) -> &'static str {
        "audio/wav"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["wav", "wave", "rf64"]
    }

    fn create_muxer(&self, writer: Writer) -> Result<Box<dyn Muxer>> {
        Ok(Box::new(WavMuxer::new_auto(writer)))
    }
}
