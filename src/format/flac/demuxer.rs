//! FLAC demuxer implementation

use super::blocks::{BlockType, FlacPicture, FlacStreamInfo, VorbisComment};
use super::{FLAC_MAGIC, FRAME_SYNC};
use crate::error::{Error, Result};
use crate::format::demuxer::{seek_frame_index, DemuxerContext, FrameIndexEntry};
use crate::format::metadata::{AudioMetadata, CoverArt};
use crate::format::track::{codecs, AudioTrack};
use crate::format::{Demuxer, EncodedPacket};
use crate::io::Reader;
use tracing::debug;

/// FLAC demuxer
///
/// Frame boundaries come from scanning for the next 14-bit sync word,
/// which is approximate at the last frame of a file (footer variance can
/// be absorbed into it). Frames are never decoded here.
pub struct FlacDemuxer {
    reader: Reader,
    context: DemuxerContext,
    stream_info: FlacStreamInfo,
    frames: Vec<FrameIndexEntry>,
    cursor: usize,
}

impl FlacDemuxer {
    /// Open and index a FLAC stream
    pub fn new(mut reader: Reader) -> Result<Self> {
        reader.seek(0)?;
        let magic = reader.read_four_cc()?;
        if &magic != FLAC_MAGIC {
            return Err(Error::invalid_container("missing fLaC magic"));
        }

        let mut stream_info = None;
        let mut comment = None;
        let mut pictures = Vec::new();

        // Metadata blocks until one with the top bit of its header set.
        loop {
            let header = reader.read_u8()?;
            let is_last = header & 0x80 != 0;
            let block_type = BlockType::from(header & 0x7F);
            let length = reader.read_u24_be()? as usize;
            let payload = reader
                .read_bytes(length)?
                .ok_or_else(|| Error::truncated("FLAC metadata block payload"))?;
            match block_type {
                BlockType::StreamInfo => stream_info = Some(FlacStreamInfo::parse(&payload)?),
                BlockType::VorbisComment => comment = Some(VorbisComment::parse(&payload)?),
                BlockType::Picture => pictures.push(FlacPicture::parse(&payload)?),
                _ => {}
            }
            if is_last {
                break;
            }
        }

        let stream_info =
            stream_info.ok_or_else(|| Error::invalid_container("missing STREAMINFO block"))?;
        let audio_start = reader.position();
        let file_size = reader.size()?.unwrap_or(u64::MAX);

        let frames = scan_frames(&mut reader, audio_start, file_size, &stream_info)?;
        debug!(frames = frames.len(), audio_start, "indexed FLAC frames");

        let duration = stream_info.duration();
        let mut metadata = comment.map(|c| c.to_metadata()).unwrap_or_default();
        for picture in pictures {
            metadata.cover_art.push(CoverArt {
                data: picture.data.clone(),
                mime_type: picture.mime.clone(),
                description: picture.description.clone(),
            });
        }

        let mut context = DemuxerContext::new();
        context.add_track(AudioTrack {
            id: 0,
            index: 0,
            codec: codecs::FLAC.to_string(),
            sample_rate: stream_info.sample_rate,
            channels: stream_info.channels as u16,
            channel_layout: None,
            bit_depth: Some(stream_info.bits_per_sample as u16),
            sample_format: None,
            bitrate: None,
            duration,
            is_default: true,
            codec_description: None,
        });
        context.set_duration(duration);
        context.set_metadata(metadata);

        Ok(FlacDemuxer {
            reader,
            context,
            stream_info,
            frames,
            cursor: 0,
        })
    }

    /// The parsed STREAMINFO block
    pub fn stream_info(&self) -> &FlacStreamInfo {
        &self.stream_info
    }
}

/// Whether the two bytes at `pos` hold the frame sync word
fn is_sync(reader: &mut Reader, pos: u64) -> Result<bool> {
    reader.seek(pos)?;
    match reader.peek(2)? {
        Some(b) => Ok((u16::from_be_bytes([b[0], b[1]]) >> 2) == FRAME_SYNC),
        None => Ok(false),
    }
}

/// Decode the block-size code in a frame header's third byte
fn block_size_from_code(code: u8, stream_info: &FlacStreamInfo) -> u32 {
    match code {
        1 => 192,
        2..=5 => 576 << (code - 2),
        8..=15 => 256 << (code - 8),
        // 6 and 7 store the size at the header's end; 0 is reserved.
        // Both fall back to the stream's max block size here.
        _ => stream_info.max_block_size as u32,
    }
}

/// Index frames by scanning sync word to sync word
fn scan_frames(
    reader: &mut Reader,
    audio_start: u64,
    file_size: u64,
    stream_info: &FlacStreamInfo,
) -> Result<Vec<FrameIndexEntry>> {
    let mut frames = Vec::new();
    let mut pos = audio_start;
    let mut samples: u64 = 0;

    // Find the first sync word.
    while pos + 2 <= file_size && !is_sync(reader, pos)? {
        pos += 1;
    }

    while pos + 4 <= file_size {
        if !is_sync(reader, pos)? {
            break;
        }
        reader.seek(pos)?;
        let header = match reader.peek(4)? {
            Some(h) => h,
            None => break,
        };
        let block_size = block_size_from_code((header[2] >> 4) & 0x0F, stream_info);

        // The frame runs to the next sync word or EOF.
        let mut next = pos + 2;
        while next + 2 <= file_size {
            if is_sync(reader, next)? {
                break;
            }
            next += 1;
        }
        let end = if next + 2 <= file_size { next } else { file_size };

        let timestamp = samples as f64 / stream_info.sample_rate as f64;
        let duration = block_size as f64 / stream_info.sample_rate as f64;
        frames.push(FrameIndexEntry {
            offset: pos,
            size: (end - pos) as usize,
            timestamp,
            duration,
        });
        samples += block_size as u64;
        pos = end;
    }
    Ok(frames)
}

impl Demuxer for FlacDemuxer {
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
            .ok_or_else(|| Error::truncated("FLAC frame body"))?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Source;

    /// Minimal FLAC file: magic, STREAMINFO (last), then `frames` fake
    /// frames whose headers carry a 4096 block-size code
    pub(crate) fn flac_file(
        sample_rate: u32,
        channels: u8,
        bits: u8,
        total_samples: u64,
        frame_count: usize,
    ) -> Vec<u8> {
        let info = FlacStreamInfo {
            min_block_size: 4096,
            max_block_size: 4096,
            min_frame_size: 0,
            max_frame_size: 0,
            sample_rate,
            channels,
            bits_per_sample: bits,
            total_samples,
            md5: [0; 16],
        };
        let mut f = Vec::new();
        f.extend_from_slice(b"fLaC");
        f.push(0x80); // last block, type 0
        let payload = info.to_bytes();
        f.extend_from_slice(&(payload.len() as u32).to_be_bytes()[1..]);
        f.extend_from_slice(&payload);
        for i in 0..frame_count {
            // Sync (0x3FFE << 2), block-size code 12 = 4096.
            f.extend_from_slice(&[0xFF, 0xF8, 0xC9, 0x08]);
            f.extend_from_slice(&[i as u8; 12]); // opaque frame body
        }
        f
    }

    #[test]
    fn test_duration_from_streaminfo() {
        let file = flac_file(48000, 2, 24, 96000, 4);
        let demuxer = FlacDemuxer::new(Reader::new(Source::buffer(file))).unwrap();
        assert_eq!(demuxer.duration(), Some(2.0));
        let track = demuxer.primary_track().unwrap();
        assert_eq!(track.codec, "flac");
        assert_eq!(track.sample_rate, 48000);
        assert_eq!(track.channels, 2);
        assert_eq!(track.bit_depth, Some(24));
    }

    #[test]
    fn test_frame_scan_finds_all_frames() {
        let file = flac_file(44100, 2, 16, 0, 5);
        let mut demuxer = FlacDemuxer::new(Reader::new(Source::buffer(file))).unwrap();
        let mut count = 0;
        let mut samples = 0u64;
        while let Some(packet) = demuxer.read_packet(1).unwrap() {
            let expected = samples as f64 / 44100.0;
            assert!((packet.timestamp - expected).abs() < 1e-9);
            assert_eq!(packet.size(), 16);
            samples += 4096;
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn test_missing_magic_rejected() {
        let file = vec![0u8; 64];
        assert!(matches!(
            FlacDemuxer::new(Reader::new(Source::buffer(file))),
            Err(Error::InvalidContainer(_))
        ));
    }

    #[test]
    fn test_missing_streaminfo_rejected() {
        let mut f = Vec::new();
        f.extend_from_slice(b"fLaC");
        f.push(0x81); // last block, type 1 (padding)
        f.extend_from_slice(&[0, 0, 2, 0, 0]);
        assert!(matches!(
            FlacDemuxer::new(Reader::new(Source::buffer(f))),
            Err(Error::InvalidContainer(_))
        ));
    }

    #[test]
    fn test_vorbis_comment_and_picture_blocks() {
        let info = FlacStreamInfo {
            min_block_size: 4096,
            max_block_size: 4096,
            min_frame_size: 0,
            max_frame_size: 0,
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
            total_samples: 44100,
            md5: [0; 16],
        };
        let mut f = Vec::new();
        f.extend_from_slice(b"fLaC");
        // STREAMINFO, not last.
        f.push(0x00);
        let si = info.to_bytes();
        f.extend_from_slice(&(si.len() as u32).to_be_bytes()[1..]);
        f.extend_from_slice(&si);
        // VORBIS_COMMENT, last.
        let mut vc = Vec::new();
        vc.extend_from_slice(&6u32.to_le_bytes());
        vc.extend_from_slice(b"vendor");
        vc.extend_from_slice(&1u32.to_le_bytes());
        let entry = b"TITLE=FlacTitle";
        vc.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        vc.extend_from_slice(entry);
        f.push(0x84);
        f.extend_from_slice(&(vc.len() as u32).to_be_bytes()[1..]);
        f.extend_from_slice(&vc);
        let demuxer = FlacDemuxer::new(Reader::new(Source::buffer(f))).unwrap();
        assert_eq!(demuxer.metadata().title.as_deref(), Some("FlacTitle"));
    }

    #[test]
    fn test_seek_over_index() {
        let file = flac_file(44100, 2, 16, 0, 6);
        let mut demuxer = FlacDemuxer::new(Reader::new(Source::buffer(file))).unwrap();
        demuxer.seek(3.5 * 4096.0 / 44100.0).unwrap();
        let packet = demuxer.read_packet(1).unwrap().unwrap();
        assert!((packet.timestamp - 3.0 * 4096.0 / 44100.0).abs() < 1e-9);
    }
}
