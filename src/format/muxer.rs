//! Muxer trait, shared muxer state, and the shared-handle wrapper

use crate::error::{Error, Result};
use crate::format::metadata::AudioMetadata;
use crate::format::packet::EncodedPacket;
use crate::format::track::{AudioTrack, AudioTrackConfig};
use crate::io::Writer;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;

/// Muxer: writer-side state turning a track config plus encoded packets
/// into a container byte stream
///
/// The single audio track must be added before any packet is written;
/// after [`Muxer::finalize`] further writes are rejected.
pub trait Muxer {
    /// Add the output track; returns the assigned track id (starting at 1)
    fn add_track(&mut self, config: AudioTrackConfig) -> Result<u32>;

    /// Set the file-level metadata to be written
    fn set_metadata(&mut self, metadata: AudioMetadata) -> Result<()>;

    /// Write one encoded packet
    fn write_packet(&mut self, packet: &EncodedPacket) -> Result<()>;

    /// Finish the container and close the writer, returning the complete
    /// assembled output for buffer targets
    fn finalize(&mut self) -> Result<Bytes>;
}

/// State shared by every muxer implementation
pub struct MuxerContext {
    pub writer: Writer,
    tracks: Vec<AudioTrack>,
    metadata: AudioMetadata,
    header_written: bool,
    finalized: bool,
}

impl MuxerContext {
    /// Create a context over a writer
    pub fn new(writer: Writer) -> Self {
        MuxerContext {
            writer,
            tracks: Vec::new(),
            metadata: AudioMetadata::default(),
            header_written: false,
            finalized: false,
        }
    }

    /// All added tracks
    pub fn tracks(&self) -> &[AudioTrack] {
        &self.tracks
    }

    /// Add the single output track
    pub fn add_track(&mut self, config: AudioTrackConfig) -> Result<u32> {
        if self.finalized {
            return Err(Error::muxer_state("add_track after finalize"));
        }
        if !self.tracks.is_empty() {
            return Err(Error::muxer_state("only one audio track per file"));
        }
        let id = self.tracks.len() as u32 + 1;
        self.tracks
            .push(AudioTrack::from_config(id, self.tracks.len(), &config));
        Ok(id)
    }

    /// File-level metadata
    pub fn metadata(&self) -> &AudioMetadata {
        &self.metadata
    }

    /// Replace the metadata (before finalize)
    pub fn set_metadata(&mut self, metadata: AudioMetadata) -> Result<()> {
        if self.finalized {
            return Err(Error::muxer_state("set_metadata after finalize"));
        }
        self.metadata = metadata;
        Ok(())
    }

    /// Validate a packet write against the muxer lifecycle
    pub fn check_packet(&self, packet: &EncodedPacket) -> Result<()> {
        if self.finalized {
            return Err(Error::muxer_state("write_packet after finalize"));
        }
        if self.tracks.is_empty() {
            return Err(Error::muxer_state("no track added before write_packet"));
        }
        if !self.tracks.iter().any(|t| t.id == packet.track_id) {
            return Err(Error::UnknownTrack(packet.track_id));
        }
        Ok(())
    }

    /// Whether the container header has been emitted
    pub fn header_written(&self) -> bool {
        self.header_written
    }

    /// Mark the container header as emitted
    pub fn set_header_written(&mut self) {
        self.header_written = true;
    }

    /// Transition into the finalized state; a second call is an error
    pub fn begin_finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Err(Error::muxer_state("finalize called twice"));
        }
        if self.tracks.is_empty() {
            return Err(Error::muxer_state("no track added before finalize"));
        }
        self.finalized = true;
        Ok(())
    }

    /// Whether the muxer has been finalized
    pub fn finalized(&self) -> bool {
        self.finalized
    }
}

/// A muxer handle shareable across callers
///
/// `write_packet` and `finalize` run as serialized critical sections
/// behind an internal mutex; queued callers block in turn. Bytes reach
/// the writer in the exact order the sections are acquired, and the lazy
/// header emission of the wrapped muxer happens inside the first section.
#[derive(Clone)]
pub struct SharedMuxer {
    inner: Arc<Mutex<Box<dyn Muxer + Send>>>,
}

impl SharedMuxer {
    /// Wrap a muxer in a shareable handle
    pub fn new(muxer: Box<dyn Muxer + Send>) -> Self {
        SharedMuxer {
            inner: Arc::new(Mutex::new(muxer)),
        }
    }

    /// See [`Muxer::add_track`]
    pub fn add_track(&self, config: AudioTrackConfig) -> Result<u32> {
        self.inner.lock().add_track(config)
    }

    /// See [`Muxer::set_metadata`]
    pub fn set_metadata(&self, metadata: AudioMetadata) -> Result<()> {
        self.inner.lock().set_metadata(metadata)
    }

    /// See [`Muxer::write_packet`]
    pub fn write_packet(&self, packet: &EncodedPacket) -> Result<()> {
        self.inner.lock().write_packet(packet)
    }

    /// See [`Muxer::finalize`]
    pub fn finalize(&self) -> Result<Bytes> {
        self.inner.lock().finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{Target, Writer};

    fn context() -> MuxerContext {
        MuxerContext::new(Writer::new(Target::buffer()))
    }

    #[test]
    fn test_single_track_rule() {
        let mut ctx = context();
        let id = ctx.add_track(AudioTrackConfig::new("mp3", 44100, 2)).unwrap();
        assert_eq!(id, 1);
        assert!(matches!(
            ctx.add_track(AudioTrackConfig::new("mp3", 44100, 2)),
            Err(Error::MuxerState(_))
        ));
    }

    #[test]
    fn test_packet_requires_track() {
        let ctx = context();
        let packet = EncodedPacket::new(1, Bytes::new(), 0.0);
        assert!(matches!(
            ctx.check_packet(&packet),
            Err(Error::MuxerState(_))
        ));
    }

    #[test]
    fn test_packet_unknown_track() {
        let mut ctx = context();
        ctx.add_track(AudioTrackConfig::new("mp3", 44100, 2)).unwrap();
        let packet = EncodedPacket::new(9, Bytes::new(), 0.0);
        assert!(matches!(
            ctx.check_packet(&packet),
            Err(Error::UnknownTrack(9))
        ));
    }

    #[test]
    fn test_shared_muxer_serializes_writers() {
        use crate::format::mp3::Mp3Muxer;
        use crate::format::track::codecs;

        let shared = SharedMuxer::new(Box::new(Mp3Muxer::new(Writer::new(Target::buffer()))));
        let id = shared
            .add_track(AudioTrackConfig::new(codecs::MP3, 44100, 2))
            .unwrap();
        let mut handles = Vec::new();
        for worker in 0..4u8 {
            let shared = shared.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..25 {
                    let packet = EncodedPacket::new(
                        id,
                        Bytes::from(vec![worker; 8]),
                        i as f64 * 0.026,
                    );
                    shared.write_packet(&packet).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let out = shared.finalize().unwrap();
        // Every write landed whole: critical sections never interleave.
        assert_eq!(out.len(), 4 * 25 * 8);
        for chunk in out.chunks(8) {
            assert!(chunk.iter().all(|&b| b == chunk[0]));
        }
    }

    #[test]
    fn test_double_finalize_rejected() {
        let mut ctx = context();
        ctx.add_track(AudioTrackConfig::new("mp3", 44100, 2)).unwrap();
        ctx.begin_finalize().unwrap();
        assert!(matches!(ctx.begin_finalize(), Err(Error::MuxerState(_))));
        let packet = EncodedPacket::new(1, Bytes::new(), 0.0);
        assert!(matches!(
            ctx.check_packet(&packet),
            Err(Error::MuxerState(_))
        ));
    }
}
