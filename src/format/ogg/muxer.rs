//! OGG muxer implementation
//!
//! One packet per page: round-trip exact, larger than an aggregating
//! muxer would produce. The codec-private header goes out as a BOS page
//! on finalize, each packet as its own page with the granule position
//! accumulating 960 (Opus) or 1024 (Vorbis) samples, and the final page
//! flagged EOS.

use super::page::{build_page, HEADER_TYPE_BOS, HEADER_TYPE_EOS};
use super::{OPUS_SAMPLES_PER_PACKET, VORBIS_SAMPLES_PER_PACKET};
use crate::error::{Error, Result};
use crate::format::metadata::AudioMetadata;
use crate::format::track::{codecs, AudioTrackConfig};
use crate::format::{EncodedPacket, Muxer, MuxerContext};
use crate::io::Writer;
use bytes::Bytes;

/// Serial number stamped on the produced logical stream
const OUTPUT_SERIAL: u32 = 1;

/// OGG muxer
pub struct OggMuxer {
    context: MuxerContext,
    config: Option<AudioTrackConfig>,
    packets: Vec<Bytes>,
}

impl OggMuxer {
    /// Create a muxer over a writer
    pub fn new(writer: Writer) -> Self {
        OggMuxer {
            context: MuxerContext::new(writer),
            config: None,
            packets: Vec::new(),
        }
    }

    /// The identification header for the BOS page: the track's own
    /// codec-private data when present, else a minimal constructed one
    fn identification_header(config: &AudioTrackConfig) -> Vec<u8> {
        if let Some(description) = &config.codec_description {
            return description.to_vec();
        }
        match config.codec.as_str() {
            codecs::OPUS => {
                let mut h = Vec::with_capacity(19);
                h.extend_from_slice(b"OpusHead");
                h.push(1); // version
                h.push(config.channels.min(255) as u8);
                h.extend_from_slice(&0u16.to_le_bytes()); // pre-skip
                h.extend_from_slice(&config.sample_rate.to_le_bytes());
                h.extend_from_slice(&0i16.to_le_bytes()); // output gain
                h.push(0); // mapping family
                h
            }
            _ => {
                let mut h = Vec::with_capacity(30);
                h.push(0x01);
                h.extend_from_slice(b"vorbis");
                h.extend_from_slice(&0u32.to_le_bytes()); // version
                h.push(config.channels.min(255) as u8);
                h.extend_from_slice(&config.sample_rate.to_le_bytes());
                h.extend_from_slice(&0i32.to_le_bytes()); // max bitrate
                h.extend_from_slice(&0i32.to_le_bytes()); // nominal
                h.extend_from_slice(&0i32.to_le_bytes()); // min
                h.push(0xB8); // blocksizes
                h.push(0x01); // framing
                h
            }
        }
    }
}

impl Muxer for OggMuxer {
    fn add_track(&mut self, config: AudioTrackConfig) -> Result<u32> {
        match config.codec.as_str() {
            codecs::OPUS | codecs::VORBIS => {}
            other => {
                return Err(Error::unsupported(format!(
                    "OGG muxer cannot carry codec '{}'",
                    other
                )))
            }
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
        self.packets.push(packet.data.clone());
        Ok(())
    }

    fn finalize(&mut self) -> Result<Bytes> {
        self.context.begin_finalize()?;
        let config = self
            .config
            .clone()
            .ok_or_else(|| Error::muxer_state("no track added before finalize"))?;
        let samples_per_packet = match config.codec.as_str() {
            codecs::OPUS => OPUS_SAMPLES_PER_PACKET,
            _ => VORBIS_SAMPLES_PER_PACKET,
        };

        let header = Self::identification_header(&config);
        let packets = std::mem::take(&mut self.packets);

        let bos_type = if packets.is_empty() {
            HEADER_TYPE_BOS | HEADER_TYPE_EOS
        } else {
            HEADER_TYPE_BOS
        };
        self.context
            .writer
            .write_bytes(&build_page(bos_type, 0, OUTPUT_SERIAL, 0, &header))?;

        let mut granule: u64 = 0;
        let count = packets.len();
        for (i, packet) in packets.into_iter().enumerate() {
            granule += samples_per_packet;
            let header_type = if i + 1 == count { HEADER_TYPE_EOS } else { 0 };
            let page = build_page(
                header_type,
                granule as i64,
                OUTPUT_SERIAL,
                (i + 1) as u32,
                &packet,
            );
            self.context.writer.write_bytes(&page)?;
        }
        self.context.writer.close()
    }
}
