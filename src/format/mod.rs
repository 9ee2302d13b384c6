//! Container format handling (demuxing and muxing)
//!
//! Each format pair exposes an [`InputFormat`] / [`OutputFormat`]
//! capability; the [`FormatRegistry`] resolves names, extensions, and
//! magic bytes to the right one and dispatches to a demuxer or muxer.

pub mod aac;
pub mod demuxer;
pub mod flac;
pub mod metadata;
pub mod mp3;
pub mod muxer;
pub mod ogg;
pub mod packet;
pub mod track;
pub mod wav;

pub use demuxer::{Demuxer, DemuxerContext};
pub use metadata::{AudioMetadata, CoverArt, ReplayGain};
pub use muxer::{Muxer, MuxerContext, SharedMuxer};
pub use packet::EncodedPacket;
pub use track::{AudioTrack, AudioTrackConfig, SampleFormat};

use crate::error::{Error, Result};
use crate::io::{Reader, Source, Target, Writer};
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Reader-side format capability
pub trait InputFormat: Send + Sync {
    /// Short format name (e.g. "wav")
    fn name(&self) -> &'static str;

    /// Primary MIME type
    fn mime(&self) -> &'static str;

    /// Recognized file extensions, lowercase
    fn extensions(&self) -> &'static [&'static str];

    /// Whether the source looks like this format; peeks at most 16 bytes
    fn can_read(&self, reader: &mut Reader) -> Result<bool>;

    /// Build a demuxer over the reader; parses headers eagerly
    fn create_demuxer(&self, reader: Reader) -> Result<Box<dyn Demuxer>>;
}

/// Writer-side format capability
pub trait OutputFormat: Send + Sync {
    /// Short format name (e.g. "wav")
    fn name(&self) -> &'static str;

    /// Primary MIME type
    fn mime(&self) -> &'static str;

    /// Recognized file extensions, lowercase
    fn extensions(&self) -> &'static [&'static str];

    /// Build a muxer over the writer
    fn create_muxer(&self, writer: Writer) -> Result<Box<dyn Muxer>>;
}

/// Name/extension/magic-byte resolution for registered formats
///
/// Detection asks each registered input format `can_read` in registration
/// order; the first match wins and the cursor is returned to 0.
#[derive(Default)]
pub struct FormatRegistry {
    inputs: Vec<Arc<dyn InputFormat>>,
    outputs: Vec<Arc<dyn OutputFormat>>,
}

impl FormatRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all built-in formats registered
    ///
    /// ADTS is probed before MP3: both sync on 0xFF, and the ADTS check
    /// is the stricter of the two.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_input(Arc::new(wav::WavInputFormat));
        registry.register_input(Arc::new(flac::FlacInputFormat));
        registry.register_input(Arc::new(ogg::OggInputFormat));
        registry.register_input(Arc::new(aac::AacInputFormat));
        registry.register_input(Arc::new(mp3::Mp3InputFormat));
        registry.register_output(Arc::new(wav::WavOutputFormat));
        registry.register_output(Arc::new(flac::FlacOutputFormat));
        registry.register_output(Arc::new(ogg::OggOutputFormat));
        registry.register_output(Arc::new(aac::AacOutputFormat));
        registry.register_output(Arc::new(mp3::Mp3OutputFormat));
        registry
    }

    /// Register an input format; idempotent per format name
    pub fn register_input(&mut self, format: Arc<dyn InputFormat>) {
        if !self.inputs.iter().any(|f| f.name() == format.name()) {
            self.inputs.push(format);
        }
    }

    /// Register an output format; idempotent per format name
    pub fn register_output(&mut self, format: Arc<dyn OutputFormat>) {
        if !self.outputs.iter().any(|f| f.name() == format.name()) {
            self.outputs.push(format);
        }
    }

    /// Registered input formats, in registration order
    pub fn inputs(&self) -> &[Arc<dyn InputFormat>] {
        &self.inputs
    }

    /// Registered output formats, in registration order
    pub fn outputs(&self) -> &[Arc<dyn OutputFormat>] {
        &self.outputs
    }

    /// Look up an input format by name
    pub fn input_by_name(&self, name: &str) -> Option<Arc<dyn InputFormat>> {
        self.inputs.iter().find(|f| f.name() == name).cloned()
    }

    /// Look up an output format by name
    pub fn output_by_name(&self, name: &str) -> Option<Arc<dyn OutputFormat>> {
        self.outputs.iter().find(|f| f.name() == name).cloned()
    }

    /// Look up an input format by file extension
    pub fn input_by_extension(&self, ext: &str) -> Option<Arc<dyn InputFormat>> {
        let ext = ext.to_lowercase();
        self.inputs
            .iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
            .cloned()
    }

    /// Look up an output format by file extension
    pub fn output_by_extension(&self, ext: &str) -> Option<Arc<dyn OutputFormat>> {
        let ext = ext.to_lowercase();
        self.outputs
            .iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
            .cloned()
    }

    /// Detect the input format by magic bytes
    ///
    /// Returns `None` (without error) when nothing matches, including for
    /// an empty source. The reader cursor is back at 0 afterwards.
    pub fn detect(&self, reader: &mut Reader) -> Result<Option<Arc<dyn InputFormat>>> {
        for format in &self.inputs {
            reader.seek(0)?;
            let matched = format.can_read(reader)?;
            reader.seek(0)?;
            if matched {
                return Ok(Some(format.clone()));
            }
        }
        Ok(None)
    }
}

static DEFAULT_REGISTRY: Lazy<FormatRegistry> = Lazy::new(FormatRegistry::with_defaults);

/// The process-wide registry with all built-in formats
pub fn default_registry() -> &'static FormatRegistry {
    &DEFAULT_REGISTRY
}

/// Detect the format of a source, returning its name
pub fn detect_format(source: Source) -> Result<Option<&'static str>> {
    let mut reader = Reader::new(source);
    Ok(default_registry().detect(&mut reader)?.map(|f| f.name()))
}

/// Open a demuxer over a source, detecting the format by magic bytes
pub fn open_input(source: Source) -> Result<Box<dyn Demuxer>> {
    let mut reader = Reader::new(source);
    match default_registry().detect(&mut reader)? {
        Some(format) => format.create_demuxer(reader),
        None => Err(Error::unsupported("no registered format matched the input")),
    }
}

/// Open a muxer for a format name or file extension
pub fn open_output(format_or_ext: &str, target: Target) -> Result<Box<dyn Muxer>> {
    let registry = default_registry();
    let format = registry
        .output_by_name(format_or_ext)
        .or_else(|| registry.output_by_extension(format_or_ext))
        .ok_or_else(|| {
            Error::unsupported(format!("no registered output format for '{}'", format_or_ext))
        })?;
    format.create_muxer(Writer::new(target))
}
