//! Demuxer trait and shared demuxer state

use crate::error::{Error, Result};
use crate::format::metadata::AudioMetadata;
use crate::format::packet::EncodedPacket;
use crate::format::track::AudioTrack;

/// Demuxer: reader-side state turning a container byte stream into a
/// track descriptor plus a lazy sequence of encoded packets
///
/// All demuxers here produce at most one track (multi-track containers
/// are reduced to the primary). Packet timestamps are non-negative and
/// monotonically non-decreasing within a track.
pub trait Demuxer {
    /// Tracks discovered during init
    fn tracks(&self) -> &[AudioTrack];

    /// File-level metadata discovered during init
    fn metadata(&self) -> &AudioMetadata;

    /// Total duration in seconds, when known
    fn duration(&self) -> Option<f64>;

    /// Read the next packet for the given track, or `None` at end
    fn read_packet(&mut self, track_id: u32) -> Result<Option<EncodedPacket>>;

    /// Reposition the packet iterator to the given time in seconds
    fn seek(&mut self, time: f64) -> Result<()>;

    /// Close the demuxer, releasing the underlying reader
    fn close(&mut self) -> Result<()>;

    /// The primary audio track, if any
    fn primary_track(&self) -> Option<&AudioTrack> {
        self.tracks().first()
    }
}

/// State shared by every demuxer implementation
#[derive(Debug, Default)]
pub struct DemuxerContext {
    tracks: Vec<AudioTrack>,
    metadata: AudioMetadata,
    duration: Option<f64>,
}

impl DemuxerContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// All tracks
    pub fn tracks(&self) -> &[AudioTrack] {
        &self.tracks
    }

    /// Add a track, assigning the next id (starting at 1)
    pub fn add_track(&mut self, mut track: AudioTrack) -> u32 {
        let id = self.tracks.len() as u32 + 1;
        track.id = id;
        track.index = self.tracks.len();
        self.tracks.push(track);
        id
    }

    /// Error unless `track_id` names a produced track
    pub fn check_track(&self, track_id: u32) -> Result<()> {
        if self.tracks.iter().any(|t| t.id == track_id) {
            Ok(())
        } else {
            Err(Error::UnknownTrack(track_id))
        }
    }

    /// File-level metadata
    pub fn metadata(&self) -> &AudioMetadata {
        &self.metadata
    }

    /// Replace the metadata
    pub fn set_metadata(&mut self, metadata: AudioMetadata) {
        self.metadata = metadata;
    }

    /// Total duration
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Set the total duration
    pub fn set_duration(&mut self, duration: Option<f64>) {
        self.duration = duration;
    }
}

/// One indexed frame inside a scanned container
#[derive(Debug, Clone, Copy)]
pub struct FrameIndexEntry {
    /// Absolute byte offset of the frame
    pub offset: u64,
    /// Frame length in bytes
    pub size: usize,
    /// Presentation time in seconds
    pub timestamp: f64,
    /// Frame duration in seconds
    pub duration: f64,
}

/// Linear seek over a frame index: position at the frame before the first
/// frame whose timestamp reaches `time`. Seeking past the end leaves the
/// iterator exhausted.
pub fn seek_frame_index(entries: &[FrameIndexEntry], time: f64) -> usize {
    match entries.iter().position(|e| e.timestamp >= time) {
        Some(0) => 0,
        Some(i) => i - 1,
        None => entries.len(),
    }
}
