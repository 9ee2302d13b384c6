//! FLAC audio format support
//!
//! A FLAC stream is the `fLaC` magic, a chain of metadata blocks (the
//! last one flagged), then raw frames found by scanning for the 14-bit
//! sync word. Frames stay opaque: this crate indexes and slices them
//! without decoding subframes.

pub mod blocks;
pub mod demuxer;
pub mod muxer;

pub use blocks::{BlockType, FlacPicture, FlacStreamInfo, VorbisComment};
pub use demuxer::FlacDemuxer;
pub use muxer::FlacMuxer;

use crate::error::Result;
use crate::format::{Demuxer, InputFormat, Muxer, OutputFormat};
use crate::io::{Reader, Writer};

/// Stream magic
pub const FLAC_MAGIC: &[u8; 4] = b"fLaC";

/// The 14-bit frame sync word
pub const FRAME_SYNC: u16 = 0x3FFE;

/// FLAC input format descriptor
pub struct FlacInputFormat;

impl InputFormat for FlacInputFormat {
    fn name(&self) -> &'static str {
        "flac"
    }

    fn mime(&self) -> &'static str {
        "audio/flac"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["flac"]
    }

    fn can_read(&self, reader: &mut Reader) -> Result<bool> {
        Ok(matches!(reader.peek(4)?, Some(m) if &m[..] == FLAC_MAGIC))
    }

    fn create_demuxer(&self, reader: Reader) -> Result<Box<dyn Demuxer>> {
        Ok(Box::new(FlacDemuxer::new(reader)?))
    }
}

/// FLAC output format descriptor
pub struct FlacOutputFormat;

impl OutputFormat for FlacOutputFormat {
    fn name(&self) -> &'static str {
        "flac"
    }

    fn mime(&self) -> &'static str {
        "audio/flac"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["flac"]
    }

    fn create_muxer(&self, writer: Writer) -> Result<Box<dyn Muxer>> {
        Ok(Box::new(FlacMuxer::new(writer)))
    }
}
