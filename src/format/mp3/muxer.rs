//! MP3 muxer implementation
//!
//! A pass-through: incoming packets are already-formed MP3 frames and are
//! concatenated verbatim. ID3 tag emission is an extension point that is
//! currently a no-op.

use crate::error::{Error, Result};
use crate::format::metadata::AudioMetadata;
use crate::format::track::{codecs, AudioTrackConfig};
use crate::format::{EncodedPacket, Muxer, MuxerContext};
use crate::io::Writer;
use bytes::Bytes;

/// MP3 muxer
pub struct Mp3Muxer {
    context: MuxerContext,
}

impl Mp3Muxer {
    /// Create a muxer over a writer
    pub fn new(writer: Writer) -> Self {
        Mp3Muxer {
            context: MuxerContext::new(writer),
        }
    }

    /// Emit leading tags; extension point, currently a no-op
    fn write_id3(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Muxer for Mp3Muxer {
    fn add_track(&mut self, config: AudioTrackConfig) -> Result<u32> {
        if config.codec != codecs::MP3 {
            return Err(Error::unsupported(format!(
                "MP3 muxer cannot carry codec '{}'",
                config.codec
            )));
        }
        self.context.add_track(config)
    }

    fn set_metadata(&mut self, metadata: AudioMetadata) -> Result<()> {
        self.context.set_metadata(metadata)
    }

    fn write_packet(&mut self, packet: &EncodedPacket) -> Result<()> {
        self.context.check_packet(packet)?;
        if !self.context.header_written() {
            self.write_id3()?;
            self.context.set_header_written();
        }
        self.context.writer.write_buffer(packet.data.clone())
    }

    fn finalize(&mut self) -> Result<Bytes> {
        self.context.begin_finalize()?;
        self.context.writer.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Target;

    #[test]
    fn test_pass_through_concatenation() {
        let mut muxer = Mp3Muxer::new(Writer::new(Target::buffer()));
        let id = muxer
            .add_track(AudioTrackConfig::new(codecs::MP3, 44100, 2))
            .unwrap();
        muxer
            .write_packet(&EncodedPacket::new(id, Bytes::from_static(b"AAAA"), 0.0))
            .unwrap();
        muxer
            .write_packet(&EncodedPacket::new(id, Bytes::from_static(b"BBBB"), 0.026))
            .unwrap();
        let out = muxer.finalize().unwrap();
        assert_eq!(out.as_ref(), b"AAAABBBB");
    }

    #[test]
    fn test_write_without_track_rejected() {
        let mut muxer = Mp3Muxer::new(Writer::new(Target::buffer()));
        let packet = EncodedPacket::new(1, Bytes::new(), 0.0);
        assert!(matches!(
            muxer.write_packet(&packet),
            Err(Error::MuxerState(_))
        ));
    }

    #[test]
    fn test_write_after_finalize_rejected() {
        let mut muxer = Mp3Muxer::new(Writer::new(Target::buffer()));
        let id = muxer
            .add_track(AudioTrackConfig::new(codecs::MP3, 44100, 2))
            .unwrap();
        muxer.finalize().unwrap();
        let packet = EncodedPacket::new(id, Bytes::new(), 0.0);
        assert!(matches!(
            muxer.write_packet(&packet),
            Err(Error::MuxerState(_))
        ));
    }

    #[test]
    fn test_wrong_codec_rejected() {
        let mut muxer = Mp3Muxer::new(Writer::new(Target::buffer()));
        assert!(muxer
            .add_track(AudioTrackConfig::new(codecs::AAC, 44100, 2))
            .is_err());
    }
}
