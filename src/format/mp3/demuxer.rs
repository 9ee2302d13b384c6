//! MP3 demuxer implementation

use super::header::Mp3FrameHeader;
use super::id3::{Id3v1Tag, Id3v2Tag};
use crate::error::{Error, Result};
use crate::format::demuxer::{seek_frame_index, DemuxerContext, FrameIndexEntry};
use crate::format::metadata::AudioMetadata;
use crate::format::track::{codecs, AudioTrack};
use crate::format::{Demuxer, EncodedPacket};
use crate::io::Reader;
use tracing::debug;

/// MP3 demuxer
///
/// Init scans the whole frame region and builds a per-frame index; a
/// failed header parse advances the scan by one byte (resynchronization),
/// so garbage between frames only costs the bytes it occupies.
pub struct Mp3Demuxer {
    reader: Reader,
    context: DemuxerContext,
    frames: Vec<FrameIndexEntry>,
    cursor: usize,
}

impl Mp3Demuxer {
    /// Open and index an MP3 stream
    pub fn new(mut reader: Reader) -> Result<Self> {
        reader.seek(0)?;
        let id3v2 = Id3v2Tag::parse(&mut reader)?;
        let audio_start = id3v2.as_ref().map(|t| t.total_size()).unwrap_or(0);

        let file_size = reader.size()?;
        let mut id3v1 = None;
        let mut audio_end = file_size.unwrap_or(u64::MAX);
        if let Some(size) = file_size {
            if size >= 128 {
                reader.seek(size - 128)?;
                if let Some(trailer) = reader.read_bytes(128)? {
                    if let Some(tag) = Id3v1Tag::parse(&trailer) {
                        id3v1 = Some(tag);
                        audio_end = size - 128;
                    }
                }
            }
        }

        let frames = scan_frames(&mut reader, audio_start, audio_end)?;
        debug!(
            frames = frames.len(),
            audio_start, audio_end, "indexed MP3 frames"
        );

        let mut context = DemuxerContext::new();
        if let Some(first) = frames.first() {
            reader.seek(first.offset)?;
            let header_bytes = reader
                .read_bytes(4)?
                .ok_or_else(|| Error::truncated("MP3 frame header"))?;
            let header = Mp3FrameHeader::parse(&header_bytes)?;
            let duration = frames
                .last()
                .map(|last| last.timestamp + last.duration);
            context.add_track(AudioTrack {
                id: 0,
                index: 0,
                codec: codecs::MP3.to_string(),
                sample_rate: header.sample_rate,
                channels: header.channels,
                channel_layout: None,
                bit_depth: None,
                sample_format: None,
                bitrate: Some(header.bitrate as u64 * 1000),
                duration,
                is_default: true,
                codec_description: None,
            });
            context.set_duration(duration);
        } else {
            return Err(Error::invalid_container("no MP3 frames found"));
        }

        let mut metadata = id3v2.map(|t| t.to_metadata()).unwrap_or_default();
        if let Some(v1) = id3v1 {
            metadata.merge_fallback(v1.to_metadata());
        }
        context.set_metadata(metadata);

        Ok(Mp3Demuxer {
            reader,
            context,
            frames,
            cursor: 0,
        })
    }
}

/// Scan the frame region, resynchronizing byte-by-byte over garbage
fn scan_frames(
    reader: &mut Reader,
    audio_start: u64,
    audio_end: u64,
) -> Result<Vec<FrameIndexEntry>> {
    let mut frames = Vec::new();
    let mut pos = audio_start;
    let mut timestamp = 0.0f64;
    while pos + 4 <= audio_end {
        reader.seek(pos)?;
        let header_bytes = match reader.peek(4)? {
            Some(b) => b,
            None => break,
        };
        match Mp3FrameHeader::parse(&header_bytes) {
            Ok(header) => {
                let mut size = header.frame_size;
                if pos + size as u64 > audio_end {
                    // Truncated trailing frame: keep what is there.
                    size = (audio_end - pos) as usize;
                }
                let duration = header.duration();
                frames.push(FrameIndexEntry {
                    offset: pos,
                    size,
                    timestamp,
                    duration,
                });
                timestamp += duration;
                pos += size.max(1) as u64;
            }
            Err(_) => {
                // Resync: advance one byte and try again.
                pos += 1;
            }
        }
    }
    Ok(frames)
}

impl Demuxer for Mp3Demuxer {
    fn tracks(&self) -> &[AudioTrack] {
        self.context.tracks()
    }

    fn metadata(&self) -> &AudioMetadata {
        self.context.metadata()
    }

    fn duration(&self) -> Option<f64> {
        self.context.duration()
    }

    fn read_packet(&mut self, track_id: u32) -> Result<Option<EncodedPacket>> {
        self.context.check_track(track_id)?;
        let entry = match self.frames.get(self.cursor) {
            Some(e) => *e,
            None => return Ok(None),
        };
        self.reader.seek(entry.offset)?;
        let data = self
            .reader
            .read_bytes(entry.size)?
            .ok_or_else(|| Error::truncated("MP3 frame body"))?;
        self.cursor += 1;
        Ok(Some(
            EncodedPacket::new(track_id, data, entry.timestamp).with_duration(entry.duration),
        ))
    }

    fn seek(&mut self, time: f64) -> Result<()> {
        self.cursor = seek_frame_index(&self.frames, time);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.reader.close();
        Ok(())
    }
}
