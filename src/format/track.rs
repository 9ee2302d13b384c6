//! Track descriptors

use bytes::Bytes;
use serde::Serialize;

/// Codec tags used across the crate
pub mod codecs {
    pub const PCM: &str = "pcm";
    pub const ALAW: &str = "alaw";
    pub const ULAW: &str = "ulaw";
    pub const MP3: &str = "mp3";
    pub const FLAC: &str = "flac";
    pub const AAC: &str = "aac";
    pub const VORBIS: &str = "vorbis";
    pub const OPUS: &str = "opus";
}

/// Sample format of uncompressed audio payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    I16,
    I24,
    I32,
    F32,
    F64,
}

impl SampleFormat {
    /// Bits per sample for this format
    pub fn bit_depth(&self) -> u16 {
        match self {
            SampleFormat::U8 => 8,
            SampleFormat::I16 => 16,
            SampleFormat::I24 => 24,
            SampleFormat::I32 | SampleFormat::F32 => 32,
            SampleFormat::F64 => 64,
        }
    }
}

/// Descriptor of a demuxed input track
///
/// `id` is assigned by the owning demuxer or muxer, starting at 1.
#[derive(Debug, Clone, Serialize)]
pub struct AudioTrack {
    pub id: u32,
    pub index: usize,
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub channel_layout: Option<String>,
    pub bit_depth: Option<u16>,
    pub sample_format: Option<SampleFormat>,
    /// Bitrate in bits per second, when known
    pub bitrate: Option<u64>,
    /// Duration in seconds, when known
    pub duration: Option<f64>,
    pub is_default: bool,
    /// Codec-private initialization data (e.g. an OpusHead payload)
    #[serde(skip)]
    pub codec_description: Option<Bytes>,
}

impl AudioTrack {
    /// Build a track from an output config, with muxer-assigned id/index
    pub fn from_config(id: u32, index: usize, config: &AudioTrackConfig) -> Self {
        AudioTrack {
            id,
            index,
            codec: config.codec.clone(),
            sample_rate: config.sample_rate,
            channels: config.channels,
            channel_layout: config.channel_layout.clone(),
            bit_depth: config.bit_depth,
            sample_format: config.sample_format,
            bitrate: config.bitrate,
            duration: None,
            is_default: config.is_default,
            codec_description: config.codec_description.clone(),
        }
    }
}

/// Output track descriptor: the same shape as [`AudioTrack`] minus the
/// muxer-assigned fields
#[derive(Debug, Clone)]
pub struct AudioTrackConfig {
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub channel_layout: Option<String>,
    pub bit_depth: Option<u16>,
    pub sample_format: Option<SampleFormat>,
    pub bitrate: Option<u64>,
    pub is_default: bool,
    pub codec_description: Option<Bytes>,
}

impl AudioTrackConfig {
    /// Create a config with the required fields and defaults elsewhere
    pub fn new(codec: impl Into<String>, sample_rate: u32, channels: u16) -> Self {
        AudioTrackConfig {
            codec: codec.into(),
            sample_rate,
            channels,
            channel_layout: None,
            bit_depth: None,
            sample_format: None,
            bitrate: None,
            is_default: true,
            codec_description: None,
        }
    }

    /// Derive a config from an existing input track
    pub fn from_track(track: &AudioTrack) -> Self {
        AudioTrackConfig {
            codec: track.codec.clone(),
            sample_rate: track.sample_rate,
            channels: track.channels,
            channel_layout: track.channel_layout.clone(),
            bit_depth: track.bit_depth,
            sample_format: track.sample_format,
            bitrate: track.bitrate,
            is_default: track.is_default,
            codec_description: track.codec_description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_track_roundtrip() {
        let config = AudioTrackConfig::new(codecs::PCM, 48000, 2);
        let track = AudioTrack::from_config(1, 0, &config);
        assert_eq!(track.id, 1);
        assert_eq!(track.codec, "pcm");
        assert_eq!(track.sample_rate, 48000);
        let back = AudioTrackConfig::from_track(&track);
        assert_eq!(back.channels, 2);
    }

    #[test]
    fn test_sample_format_depths() {
        assert_eq!(SampleFormat::I16.bit_depth(), 16);
        assert_eq!(SampleFormat::F64.bit_depth(), 64);
    }
}
