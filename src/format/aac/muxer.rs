//! ADTS muxer implementation
//!
//! Payloads that already begin with an ADTS sync pass through untouched;
//! bare AAC payloads get a freshly built 7-byte header prepended.

use super::{is_adts_sync, sample_rate_index, SAMPLES_PER_FRAME};
use crate::error::{Error, Result};
use crate::format::metadata::AudioMetadata;
use crate::format::track::{codecs, AudioTrackConfig};
use crate::format::{EncodedPacket, Muxer, MuxerContext};
use crate::io::{BitWriter, Writer};
use bytes::Bytes;

/// VBR marker for the buffer-fullness field
const BUFFER_FULLNESS_VBR: u32 = 0x7FF;

/// AAC profile field for Low Complexity (object type 2 minus one)
const PROFILE_LC: u32 = 1;

/// Build a 7-byte ADTS header (MPEG-4, LC, no CRC) for one frame
pub(crate) fn build_adts_header(
    sample_rate_index: u8,
    channels: u16,
    payload_len: usize,
) -> Vec<u8> {
    let frame_length = (payload_len + 7) as u32;
    let mut bits = BitWriter::new();
    bits.write_bits(0xFFF, 12); // sync
    bits.write_bit(false); // MPEG-4
    bits.write_bits(0, 2); // layer
    bits.write_bit(true); // no CRC
    bits.write_bits(PROFILE_LC, 2);
    bits.write_bits(sample_rate_index as u32, 4);
    bits.write_bit(false); // private
    bits.write_bits(channels.min(7) as u32, 3);
    bits.write_bits(0, 4); // original/copy, home, copyright id + start
    bits.write_bits(frame_length & 0x1FFF, 13);
    bits.write_bits(BUFFER_FULLNESS_VBR, 11);
    bits.write_bits(0, 2); // one raw data block
    bits.into_bytes()
}

/// ADTS muxer
pub struct AacMuxer {
    context: MuxerContext,
    sample_rate_index: u8,
    channels: u16,
}

impl AacMuxer {
    /// Create a muxer over a writer
    pub fn new(writer: Writer) -> Self {
        AacMuxer {
            context: MuxerContext::new(writer),
            sample_rate_index: 4, // 44100 until a track says otherwise
            channels: 2,
        }
    }

    /// Frame duration implied by the configured sample rate
    pub fn frame_duration(&self) -> f64 {
        SAMPLES_PER_FRAME as f64 / super::SAMPLE_RATES[self.sample_rate_index as usize] as f64
    }
}

impl Muxer for AacMuxer {
    fn add_track(&mut self, config: AudioTrackConfig) -> Result<u32> {
        if config.codec != codecs::AAC {
            return Err(Error::unsupported(format!(
                "ADTS muxer cannot carry codec '{}'",
                config.codec
            )));
        }
        // Unknown rates fall back to the 44100 table slot.
        self.sample_rate_index = sample_rate_index(config.sample_rate).unwrap_or(4);
        self.channels = config.channels;
        self.context.add_track(config)
    }

    fn set_metadata(&mut self, metadata: AudioMetadata) -> Result<()> {
        self.context.set_metadata(metadata)
    }

    fn write_packet(&mut self, packet: &EncodedPacket) -> Result<()> {
        self.context.check_packet(packet)?;
        let data = &packet.data;
        let already_framed = data.len() >= 2 && is_adts_sync(data[0], data[1]);
        if already_framed {
            self.context.writer.write_buffer(data.clone())
        } else {
            let header = build_adts_header(self.sample_rate_index, self.channels, data.len());
            self.context.writer.write_bytes(&header)?;
            self.context.writer.write_buffer(data.clone())
        }
    }

    fn finalize(&mut self) -> Result<Bytes> {
        self.context.begin_finalize()?;
        self.context.writer.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::aac::demuxer::AdtsHeader;
    use crate::io::Target;

    fn muxer_with_track(sample_rate: u32, channels: u16) -> (AacMuxer, u32) {
        let mut muxer = AacMuxer::new(Writer::new(Target::buffer()));
        let id = muxer
            .add_track(AudioTrackConfig::new(codecs::AAC, sample_rate, channels))
            .unwrap();
        (muxer, id)
    }

    #[test]
    fn test_bare_payload_gets_header() {
        let (mut muxer, id) = muxer_with_track(48000, 2);
        muxer
            .write_packet(&EncodedPacket::new(id, Bytes::from(vec![0x21; 50]), 0.0))
            .unwrap();
        let out = muxer.finalize().unwrap();
        let header = AdtsHeader::parse(&out).unwrap();
        assert_eq!(header.sample_rate, 48000);
        assert_eq!(header.channel_config, 2);
        assert_eq!(header.frame_length, 57);
        assert_eq!(&out[7..], &vec![0x21; 50][..]);
    }

    #[test]
    fn test_framed_payload_passes_through() {
        let (mut muxer, id) = muxer_with_track(44100, 2);
        let mut framed = build_adts_header(4, 2, 3);
        framed.extend_from_slice(&[1, 2, 3]);
        muxer
            .write_packet(&EncodedPacket::new(id, Bytes::from(framed.clone()), 0.0))
            .unwrap();
        let out = muxer.finalize().unwrap();
        assert_eq!(out.as_ref(), &framed[..]);
    }

    #[test]
    fn test_unknown_rate_defaults_to_44100_slot() {
        let (muxer, _) = muxer_with_track(12345, 2);
        assert_eq!(muxer.sample_rate_index, 4);
    }
}
