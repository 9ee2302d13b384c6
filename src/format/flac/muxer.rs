//! FLAC muxer implementation
//!
//! Emits the `fLaC` magic and a single STREAMINFO block, then
//! concatenates opaque FLAC frames. Frame sizes are unknown at this
//! layer, so the block carries zeros there and estimates the total
//! sample count from the packet count.

use super::blocks::FlacStreamInfo;
use super::FLAC_MAGIC;
use crate::error::{Error, Result};
use crate::format::metadata::AudioMetadata;
use crate::format::track::{codecs, AudioTrackConfig};
use crate::format::{EncodedPacket, Muxer, MuxerContext};
use crate::io::Writer;
use bytes::Bytes;

/// Block size advertised in the emitted STREAMINFO
const DEFAULT_BLOCK_SIZE: u16 = 4096;

/// FLAC muxer
pub struct FlacMuxer {
    context: MuxerContext,
    config: Option<AudioTrackConfig>,
    frames: Vec<Bytes>,
}

impl FlacMuxer {
    /// Create a muxer over a writer
    pub fn new(writer: Writer) -> Self {
        FlacMuxer {
            context: MuxerContext::new(writer),
            config: None,
            frames: Vec::new(),
        }
    }
}

impl Muxer for FlacMuxer {
    fn add_track(&mut self, config: AudioTrackConfig) -> Result<u32> {
        if config.codec != codecs::FLAC {
            return Err(Error::unsupported(format!(
                "FLAC muxer cannot carry codec '{}'",
                config.codec
            )));
        }
        let id = self.context.add_track(config.clone())?;
        self.config = Some(config);
        Ok(id)
    }

    fn set_metadata(&mut self, metadata: AudioMetadata) -> Result<()> {
        self.context.set_metadata(metadata)
    }

    fn write_packet(&mut self, packet: &EncodedPacket) -> Result<()> {
        self.context.check_packet(packet)?;
        self.frames.push(packet.data.clone());
        Ok(())
    }

    fn finalize(&mut self) -> Result<Bytes> {
        self.context.begin_finalize()?;
        let config = self
            .config
            .clone()
            .ok_or_else(|| Error::muxer_state("no track added before finalize"))?;

        let stream_info = FlacStreamInfo {
            min_block_size: DEFAULT_BLOCK_SIZE,
            max_block_size: DEFAULT_BLOCK_SIZE,
            min_frame_size: 0,
            max_frame_size: 0,
            sample_rate: config.sample_rate,
            channels: config.channels.clamp(1, 8) as u8,
            bits_per_sample: config.bit_depth.unwrap_or(16).clamp(4, 32) as u8,
            total_samples: self.frames.len() as u64 * DEFAULT_BLOCK_SIZE as u64,
            md5: [0; 16],
        };

        let writer = &mut self.context.writer;
        writer.write_bytes(FLAC_MAGIC)?;
        // Single metadata block: STREAMINFO with the last-block flag.
        writer.write_u8(0x80)?;
        let payload = stream_info.to_bytes();
        writer.write_u24_be(payload.len() as u32)?;
        writer.write_bytes(&payload)?;
        for frame in std::mem::take(&mut self.frames) {
            writer.write_buffer(frame)?;
        }
        writer.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Target;

    #[test]
    fn test_layout_magic_then_streaminfo() {
        let mut muxer = FlacMuxer::new(Writer::new(Target::buffer()));
        let mut config = AudioTrackConfig::new(codecs::FLAC, 44100, 2);
        config.bit_depth = Some(16);
        let id = muxer.add_track(config).unwrap();
        muxer
            .write_packet(&EncodedPacket::new(id, Bytes::from_static(b"framedata"), 0.0))
            .unwrap();
        let out = muxer.finalize().unwrap();
        assert_eq!(&out[0..4], b"fLaC");
        assert_eq!(out[4], 0x80);
        assert_eq!(&out[5..8], &[0, 0, 34]);
        let info = FlacStreamInfo::parse(&out[8..42]).unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.total_samples, 4096);
        assert_eq!(&out[42..], b"framedata");
    }

    #[test]
    fn test_wrong_codec_rejected() {
        let mut muxer = FlacMuxer::new(Writer::new(Target::buffer()));
        assert!(muxer
            .add_track(AudioTrackConfig::new(codecs::PCM, 44100, 2))
            .is_err());
    }
}
