//! OGG container support (Vorbis, Opus, FLAC-in-OGG detection)
//!
//! Pages are the framing unit. Packet extraction here collapses each
//! nonzero segment into its own packet, which is exact for the
//! one-segment Opus/Vorbis frames this crate produces and a known
//! limitation for packets legitimately spanning segments.

pub mod demuxer;
pub mod muxer;
pub mod page;

pub use demuxer::OggDemuxer;
pub use muxer::OggMuxer;
pub use page::OggPage;

use crate::error::Result;
use crate::format::{Demuxer, InputFormat, Muxer, OutputFormat};
use crate::io::{Reader, Writer};

/// Page magic
pub const PAGE_MAGIC: &[u8; 4] = b"OggS";

/// Samples per Opus packet at the 48 kHz internal rate
pub const OPUS_SAMPLES_PER_PACKET: u64 = 960;

/// Samples per Vorbis packet assumed by the muxer
pub const VORBIS_SAMPLES_PER_PACKET: u64 = 1024;

/// OGG input format descriptor
pub struct OggInputFormat;

impl InputFormat for OggInputFormat {
    fn name(&self) -> &'static str {
        "ogg"
    }

    fn mime(&self) -> &'static str {
        "audio/ogg"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ogg", "oga", "opus"]
    }

    fn can_read(&self, reader: &mut Reader) -> Result<bool> {
        Ok(matches!(reader.peek(4)?, Some(m) if &m[..] == PAGE_MAGIC))
    }

    fn create_demuxer(&self, reader: Reader) -> Result<Box<dyn Demuxer>> {
        Ok(Box::new(OggDemuxer::new(reader)?))
    }
}

/// OGG output format descriptor
pub struct OggOutputFormat;

impl OutputFormat for OggOutputFormat {
    fn name(&self) -> &'static str {
        "ogg"
    }

    fn mime(&self) -> &'static str {
        "audio/ogg"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ogg", "oga", "opus"]
    }

    fn create_muxer(&self, writer: Writer) -> Result<Box<dyn Muxer>> {
        Ok(Box::new(OggMuxer::new(writer)))
    }
}
