//! MP3 (MPEG audio) container support
//!
//! An MP3 file is a bare frame stream, optionally wrapped by an ID3v2 tag
//! at the front and an ID3v1 tag in the last 128 bytes. The demuxer scans
//! frame headers (resynchronizing byte-by-byte over garbage), the muxer
//! passes already-formed frames through untouched.

pub mod demuxer;
pub mod header;
pub mod id3;
pub mod muxer;

pub use demuxer::Mp3Demuxer;
pub use header::{Mp3FrameHeader, MpegLayer, MpegVersion};
pub use id3::{Id3v1Tag, Id3v2Frame, Id3v2Tag};
pub use muxer::Mp3Muxer;

use crate::error::Result;
use crate::format::{Demuxer, InputFormat, Muxer, OutputFormat};
use crate::io::{Reader, Writer};

/// MP3 input format descriptor
pub struct Mp3InputFormat;

impl InputFormat for Mp3InputFormat {
    fn name(&self) -> &'static str {
        "mp3"
    }

    fn mime(&self) -> &'static str {
        "audio/mpeg"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["mp3"]
    }

    fn can_read(&self, reader: &mut Reader) -> Result<bool> {
        let header = match reader.peek(3)? {
            Some(h) => h,
            None => return Ok(false),
        };
        // ID3v2 tag or a bare frame sync.
        Ok(&header[..3] == b"ID3" || (header[0] == 0xFF && (header[1] & 0xE0) == 0xE0))
    }

    fn create_demuxer(&self, reader: Reader) -> Result<Box<dyn Demuxer>> {
        Ok(Box::new(Mp3Demuxer::new(reader)?))
    }
}

/// MP3 output format descriptor
pub struct Mp3OutputFormat;

impl OutputFormat for Mp3OutputFormat {
    fn name(&self) -> &'static str {
        "mp3"
    }

    fn mime(&self) -> &'static str {
        "audio/mpeg"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["mp3"]
    }

    fn create_muxer(&self, writer: Writer) -> Result<Box<dyn Muxer>> {
        Ok(Box::new(Mp3Muxer::new(writer)))
    }
}
