//! audiox - an audio container toolkit written in Rust
//!
//! audiox parses (demuxes) and emits (muxes) audio files across a small
//! family of container formats, preserving per-frame encoded packet
//! boundaries and file metadata. Audio frames are treated as opaque
//! encoded payloads; no sample decoding happens in this crate.
//!
//! # Architecture
//!
//! audiox is organized into several key modules:
//!
//! - `io`: Byte sources and targets, the sliced random-access reader,
//!   the append-only writer, bit-level cursors, and CRC kernels
//! - `format`: Container format handling (demuxing/muxing) for MP3,
//!   WAV/RF64, FLAC, AAC (ADTS), and OGG, plus the format registry
//! - `convert`: The conversion orchestrator coupling one demuxer to
//!   one muxer with time-range gating and progress reporting

pub mod convert;
pub mod error;
pub mod format;
pub mod io;

pub use error::{Error, Result};

/// audiox version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration for the audiox library
///
/// Options flow into the conversion orchestrator as overrides.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Enable verbose logging
    pub verbose: bool,
    /// Output codec override (e.g. "pcm", "mp3", "aac")
    pub codec: Option<String>,
    /// Output bitrate override (e.g. "128k")
    pub bitrate: Option<String>,
    /// Output channel-count override
    pub channels: Option<u16>,
    /// Output sample-rate override
    pub sample_rate: Option<u32>,
    /// Encoder quality hint (codec-specific, unused by pass-through muxers)
    pub quality: Option<u32>,
    /// Extra metadata key/value pairs merged into the output
    pub metadata: Option<std::collections::HashMap<String, String>>,
}

/// Initialize the audiox library with the given configuration
pub fn init(config: &Config) -> Result<()> {
    if config.verbose {
        // A second init (e.g. from tests) is fine; keep the first subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info")
            .try_init();
    }
    Ok(())
}
