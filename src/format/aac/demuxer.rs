//! ADTS demuxer implementation

use super::{SAMPLES_PER_FRAME, SAMPLE_RATES};
use crate::error::{Error, Result};
use crate::format::demuxer::{seek_frame_index, DemuxerContext, FrameIndexEntry};
use crate::format::metadata::AudioMetadata;
use crate::format::track::{codecs, AudioTrack};
use crate::format::{Demuxer, EncodedPacket};
use crate::io::{BitReader, Reader};
use tracing::debug;

/// Decoded ADTS frame header
#[derive(Debug, Clone)]
pub struct AdtsHeader {
    /// True for MPEG-2 framing, false for MPEG-4
    pub mpeg2: bool,
    /// Profile field (audio object type minus one): 0 Main, 1 LC, 2 SSR, 3 LTP
    pub profile: u8,
    pub sample_rate_index: u8,
    pub sample_rate: u32,
    /// 0 means the channel layout is defined externally
    pub channel_config: u8,
    pub protection_absent: bool,
    /// Whole frame length in bytes, header included
    pub frame_length: usize,
    pub buffer_fullness: u16,
    /// Raw data blocks in frame, minus one
    pub raw_data_blocks: u8,
}

impl AdtsHeader {
    /// Header length in bytes (9 when a CRC follows)
    pub fn header_len(&self) -> usize {
        if self.protection_absent {
            7
        } else {
            9
        }
    }

    /// Parse a header from at least 7 bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 7 {
            return Err(Error::truncated("ADTS header needs 7 bytes"));
        }
        let mut bits = BitReader::new(data);
        if bits.read_bits(12)? != 0xFFF {
            return Err(Error::invalid_container("bad ADTS sync"));
        }
        let mpeg2 = bits.read_bit()?;
        let layer = bits.read_bits(2)?;
        if layer != 0 {
            return Err(Error::invalid_container("ADTS layer must be 0"));
        }
        let protection_absent = bits.read_bit()?;
        let profile = bits.read_bits(2)? as u8;
        let sample_rate_index = bits.read_bits(4)? as u8;
        if sample_rate_index as usize >= SAMPLE_RATES.len() {
            return Err(Error::invalid_container("invalid ADTS sampling index"));
        }
        let _private = bits.read_bit()?;
        let channel_config = bits.read_bits(3)? as u8;
        bits.read_bits(4)?; // original/copy, home, copyright id bit + start
        let frame_length = bits.read_bits(13)? as usize;
        let buffer_fullness = bits.read_bits(11)? as u16;
        let raw_data_blocks = bits.read_bits(2)? as u8;
        if frame_length < 7 {
            return Err(Error::invalid_container("ADTS frame length below header"));
        }
        Ok(AdtsHeader {
            mpeg2,
            profile,
            sample_rate_index,
            sample_rate: SAMPLE_RATES[sample_rate_index as usize],
            channel_config,
            protection_absent,
            frame_length,
            buffer_fullness,
            raw_data_blocks,
        })
    }
}

/// ADTS demuxer
pub struct AacDemuxer {
    reader: Reader,
    context: DemuxerContext,
    frames: Vec<FrameIndexEntry>,
    cursor: usize,
}

impl AacDemuxer {
    /// Open and index an ADTS stream
    pub fn new(mut reader: Reader) -> Result<Self> {
        let file_size = reader.size()?.unwrap_or(u64::MAX);
        let mut frames = Vec::new();
        let mut first_header: Option<AdtsHeader> = None;
        let mut pos = 0u64;
        let mut timestamp = 0.0f64;

        while pos + 7 <= file_size {
            reader.seek(pos)?;
            let header_bytes = match reader.peek(9)? {
                Some(b) => b,
                None => match reader.peek(7)? {
                    Some(b) => b,
                    None => break,
                },
            };
            match AdtsHeader::parse(&header_bytes) {
                Ok(header) => {
                    let mut size = header.frame_length;
                    if pos + size as u64 > file_size {
                        size = (file_size - pos) as usize;
                    }
                    let duration = SAMPLES_PER_FRAME as f64 / header.sample_rate as f64;
                    frames.push(FrameIndexEntry {
                        offset: pos,
                        size,
                        timestamp,
                        duration,
                    });
                    timestamp += duration;
                    pos += size.max(1) as u64;
                    if first_header.is_none() {
                        first_header = Some(header);
                    }
                }
                Err(_) => {
                    // Resync: advance one byte and retry.
                    pos += 1;
                }
            }
        }

        let header =
            first_header.ok_or_else(|| Error::invalid_container("no ADTS frames found"))?;
        debug!(frames = frames.len(), "indexed ADTS frames");

        let duration = frames.last().map(|f| f.timestamp + f.duration);
        let channels = if header.channel_config == 0 {
            // Defined externally (PCE); report stereo as the working guess.
            2
        } else {
            header.channel_config as u16
        };

        let mut context = DemuxerContext::new();
        context.add_track(AudioTrack {
            id: 0,
            index: 0,
            codec: codecs::AAC.to_string(),
            sample_rate: header.sample_rate,
            channels,
            channel_layout: None,
            bit_depth: None,
            sample_format: None,
            bitrate: None,
            duration,
            is_default: true,
            codec_description: None,
        });
        context.set_duration(duration);
        context.set_metadata(AudioMetadata::default());

        Ok(AacDemuxer {
            reader,
            context,
            frames,
            cursor: 0,
        })
    }
}

impl Demuxer for AacDemuxer {
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
            .ok_or_else(|| Error::truncated("ADTS frame body"))?;
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
