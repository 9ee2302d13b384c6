//! OGG demuxer implementation

use super::page::OggPage;
use super::PAGE_MAGIC;
use crate::error::{Error, Result};
use crate::format::demuxer::{seek_frame_index, DemuxerContext, FrameIndexEntry};
use crate::format::flac::blocks::VorbisComment;
use crate::format::metadata::AudioMetadata;
use crate::format::track::{codecs, AudioTrack};
use crate::format::{Demuxer, EncodedPacket};
use crate::io::Reader;
use bytes::Bytes;
use std::collections::HashMap;
use tracing::debug;

/// Per-serial logical stream state gathered during the scan
#[derive(Debug)]
struct OggStream {
    codec: Option<&'static str>,
    sample_rate: u32,
    channels: u16,
    /// Identification header payload (first packet of the stream)
    header: Option<Bytes>,
    comment: Option<VorbisComment>,
    /// Packets seen so far, header packets included
    packets_seen: u64,
    last_granule: i64,
}

impl OggStream {
    fn new() -> Self {
        OggStream {
            codec: None,
            sample_rate: 0,
            channels: 0,
            header: None,
            comment: None,
            packets_seen: 0,
            last_granule: 0,
        }
    }

    /// Packets at the head of the stream that are headers, not audio
    fn header_packets(&self) -> u64 {
        match self.codec {
            Some(codecs::VORBIS) | Some(codecs::OPUS) => 2,
            Some(codecs::FLAC) => 1,
            _ => 0,
        }
    }
}

/// Codec detection from a stream's identification packet
fn detect_codec(payload: &[u8]) -> Option<(&'static str, u32, u16)> {
    if payload.len() >= 16 && payload[0] == 0x01 && &payload[1..7] == b"vorbis" {
        let channels = payload[11] as u16;
        let sample_rate = u32::from_le_bytes([payload[12], payload[13], payload[14], payload[15]]);
        return Some((codecs::VORBIS, sample_rate, channels));
    }
    if payload.len() >= 10 && &payload[0..8] == b"OpusHead" {
        // Opus always decodes at the 48 kHz internal rate.
        let channels = payload[9] as u16;
        return Some((codecs::OPUS, 48000, channels));
    }
    if payload.len() >= 5 && payload[0] == 0x7F && &payload[1..5] == b"FLAC" {
        return Some((codecs::FLAC, 0, 0));
    }
    None
}

/// Comment-header recognition for the second packet of a stream
fn parse_comment_header(codec: &str, payload: &[u8]) -> Option<VorbisComment> {
    let body = match codec {
        codecs::VORBIS if payload.len() > 7 && payload[0] == 0x03 && &payload[1..7] == b"vorbis" => {
            &payload[7..]
        }
        codecs::OPUS if payload.len() > 8 && &payload[0..8] == b"OpusTags" => &payload[8..],
        _ => return None,
    };
    VorbisComment::parse(body).ok()
}

/// OGG demuxer
///
/// Multi-stream files are reduced to the primary (first recognized)
/// stream; packets of other serials are ignored.
pub struct OggDemuxer {
    reader: Reader,
    context: DemuxerContext,
    packets: Vec<FrameIndexEntry>,
    cursor: usize,
    stream_count: usize,
}

impl OggDemuxer {
    /// Open and index an OGG stream
    pub fn new(mut reader: Reader) -> Result<Self> {
        let file_size = reader.size()?.unwrap_or(u64::MAX);
        let mut streams: HashMap<u32, OggStream> = HashMap::new();
        let mut primary_serial: Option<u32> = None;
        // (absolute offset, size, granule of the carrying page)
        let mut audio_segments: Vec<(u64, usize, i64)> = Vec::new();

        let mut pos = 0u64;
        while pos + 27 <= file_size {
            reader.seek(pos)?;
            match reader.peek(4)? {
                Some(m) if &m[..] == PAGE_MAGIC => {}
                Some(_) => {
                    pos += 1;
                    continue;
                }
                None => break,
            }
            reader.seek(pos)?;
            let page = match OggPage::parse(&mut reader) {
                Ok(p) => p,
                Err(Error::TruncatedInput(_)) => break,
                Err(_) => {
                    pos += 1;
                    continue;
                }
            };
            let next_pos = reader.position();

            let stream = streams.entry(page.serial).or_insert_with(OggStream::new);

            // Walk the segment table so packet offsets stay file-absolute.
            let mut segment_offset = page.payload_offset;
            for &len in &page.segment_table {
                let len = len as usize;
                if len == 0 {
                    continue;
                }
                stream.packets_seen += 1;
                let packet_no = stream.packets_seen;

                if packet_no == 1 {
                    // Identification header.
                    let payload = page.payload.slice(
                        (segment_offset - page.payload_offset) as usize
                            ..(segment_offset - page.payload_offset) as usize + len,
                    );
                    if let Some((codec, sample_rate, channels)) = detect_codec(&payload) {
                        stream.codec = Some(codec);
                        stream.sample_rate = sample_rate;
                        stream.channels = channels;
                        stream.header = Some(payload);
                        if primary_serial.is_none() {
                            primary_serial = Some(page.serial);
                        }
                    }
                } else if packet_no == 2 && stream.codec.is_some() {
                    let payload = page.payload.slice(
                        (segment_offset - page.payload_offset) as usize
                            ..(segment_offset - page.payload_offset) as usize + len,
                    );
                    if let Some(codec) = stream.codec {
                        stream.comment = parse_comment_header(codec, &payload);
                    }
                }

                if Some(page.serial) == primary_serial && packet_no > stream.header_packets() {
                    audio_segments.push((segment_offset, len, page.granule_position));
                }
                segment_offset += len as u64;
            }

            if page.granule_position >= 0 {
                stream.last_granule = page.granule_position;
            }
            pos = next_pos;
        }

        let stream_count = streams.len();
        let mut context = DemuxerContext::new();
        let mut packets = Vec::with_capacity(audio_segments.len());

        // A file with pages but no recognized identification header still
        // parses: one stream, zero tracks, zero packets.
        if let Some(serial) = primary_serial {
            let stream = streams.remove(&serial).unwrap();
            let codec = stream.codec.unwrap();
            let sample_rate = if stream.sample_rate == 0 {
                48000
            } else {
                stream.sample_rate
            };
            debug!(
                codec,
                sample_rate,
                segments = audio_segments.len(),
                "indexed OGG stream"
            );

            // Timestamps derive from granule positions; the first packet
            // of the stream starts at 0 and each page's packets share the
            // span up to that page's granule.
            let mut page_start_granule: i64 = 0;
            let mut i = 0usize;
            while i < audio_segments.len() {
                let granule = audio_segments[i].2;
                let mut j = i;
                while j < audio_segments.len() && audio_segments[j].2 == granule {
                    j += 1;
                }
                let span = (granule.max(0) - page_start_granule).max(0) as f64;
                let per_packet = span / (j - i) as f64;
                for (k, &(offset, size, _)) in audio_segments[i..j].iter().enumerate() {
                    let timestamp =
                        (page_start_granule as f64 + per_packet * k as f64) / sample_rate as f64;
                    packets.push(FrameIndexEntry {
                        offset,
                        size,
                        timestamp,
                        duration: per_packet / sample_rate as f64,
                    });
                }
                if granule >= 0 {
                    page_start_granule = granule;
                }
                i = j;
            }

            let duration = if stream.last_granule > 0 {
                Some(stream.last_granule as f64 / sample_rate as f64)
            } else {
                None
            };

            let metadata = stream
                .comment
                .as_ref()
                .map(|c| c.to_metadata())
                .unwrap_or_default();

            context.add_track(AudioTrack {
                id: 0,
                index: 0,
                codec: codec.to_string(),
                sample_rate,
                channels: stream.channels,
                channel_layout: None,
                bit_depth: None,
                sample_format: None,
                bitrate: None,
                duration,
                is_default: true,
                codec_description: stream.header.clone(),
            });
            context.set_duration(duration);
            context.set_metadata(metadata);
        }

        Ok(OggDemuxer {
            reader,
            context,
            packets,
            cursor: 0,
            stream_count,
        })
    }

    /// Number of logical streams (distinct serials) seen in the file
    pub fn stream_count(&self) -> usize {
        self.stream_count
    }
}

impl Demuxer for OggDemuxer {
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
        let entry = match self.packets.get(self.cursor) {
            Some(e) => *e,
            None => return Ok(None),
        };
        self.reader.seek(entry.offset)?;
        let data = self
            .reader
            .read_bytes(entry.size)?
            .ok_or_else(|| Error::truncated("OGG packet body"))?;
        self.cursor += 1;
        Ok(Some(
            EncodedPacket::new(track_id, data, entry.timestamp).with_duration(entry.duration),
        ))
    }

    fn seek(&mut self, time: f64) -> Result<()> {
        self.cursor = seek_frame_index(&self.packets, time);
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
    use crate::format::ogg::page::{build_page, HEADER_TYPE_BOS, HEADER_TYPE_EOS};
    use crate::io::Source;

    pub(crate) fn opus_head(channels: u8) -> Vec<u8> {
        let mut h = Vec::new();
        h.extend_from_slice(b"OpusHead");
        h.push(1); // version
        h.push(channels);
        h.extend_from_slice(&0u16.to_le_bytes()); // pre-skip
        h.extend_from_slice(&48000u32.to_le_bytes());
        h.extend_from_slice(&0i16.to_le_bytes()); // gain
        h.push(0); // mapping family
        h
    }

    fn opus_tags() -> Vec<u8> {
        let mut t = Vec::new();
        t.extend_from_slice(b"OpusTags");
        t.extend_from_slice(&6u32.to_le_bytes());
        t.extend_from_slice(b"vendor");
        t.extend_from_slice(&1u32.to_le_bytes());
        let entry = b"TITLE=OggSong";
        t.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        t.extend_from_slice(entry);
        t
    }

    /// BOS + comment page + `n` single-packet audio pages
    pub(crate) fn opus_file(n: u64) -> Vec<u8> {
        let serial = 1;
        let mut f = Vec::new();
        f.extend_from_slice(&build_page(HEADER_TYPE_BOS, 0, serial, 0, &opus_head(2)));
        f.extend_from_slice(&build_page(0, 0, serial, 1, &opus_tags()));
        for i in 0..n {
            let header_type = if i == n - 1 { HEADER_TYPE_EOS } else { 0 };
            let granule = (i + 1) * 960;
            f.extend_from_slice(&build_page(
                header_type,
                granule as i64,
                serial,
                (i + 2) as u32,
                &[0x55; 40],
            ));
        }
        f
    }

    #[test]
    fn test_opus_duration_from_granules() {
        let file = opus_file(50);
        let demuxer = OggDemuxer::new(Reader::new(Source::buffer(file))).unwrap();
        assert_eq!(demuxer.duration(), Some(1.0));
        let track = demuxer.primary_track().unwrap();
        assert_eq!(track.codec, "opus");
        assert_eq!(track.sample_rate, 48000);
        assert_eq!(track.channels, 2);
    }

    #[test]
    fn test_header_packets_not_emitted() {
        let file = opus_file(5);
        let mut demuxer = OggDemuxer::new(Reader::new(Source::buffer(file))).unwrap();
        let mut count = 0;
        let mut last_ts = -1.0;
        while let Some(packet) = demuxer.read_packet(1).unwrap() {
            assert!(packet.timestamp >= last_ts);
            last_ts = packet.timestamp;
            assert_eq!(packet.size(), 40);
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn test_comment_header_metadata() {
        let file = opus_file(2);
        let demuxer = OggDemuxer::new(Reader::new(Source::buffer(file))).unwrap();
        assert_eq!(demuxer.metadata().title.as_deref(), Some("OggSong"));
    }

    #[test]
    fn test_vorbis_identification() {
        let mut id = vec![0x01];
        id.extend_from_slice(b"vorbis");
        id.extend_from_slice(&0u32.to_le_bytes()); // version
        id.push(2); // channels
        id.extend_from_slice(&44100u32.to_le_bytes());
        id.extend_from_slice(&[0u8; 13]); // bitrates, blocksizes, framing
        let mut f = Vec::new();
        f.extend_from_slice(&build_page(HEADER_TYPE_BOS, 0, 9, 0, &id));
        let demuxer = OggDemuxer::new(Reader::new(Source::buffer(f))).unwrap();
        let track = demuxer.primary_track().unwrap();
        assert_eq!(track.codec, "vorbis");
        assert_eq!(track.sample_rate, 44100);
        assert_eq!(track.channels, 2);
    }

    #[test]
    fn test_flac_in_ogg_detection() {
        let mut id = vec![0x7F];
        id.extend_from_slice(b"FLAC");
        id.extend_from_slice(&[1, 0]);
        let mut f = Vec::new();
        f.extend_from_slice(&build_page(HEADER_TYPE_BOS, 0, 3, 0, &id));
        let demuxer = OggDemuxer::new(Reader::new(Source::buffer(f))).unwrap();
        assert_eq!(demuxer.primary_track().unwrap().codec, "flac");
    }

    #[test]
    fn test_garbage_before_first_page_resyncs() {
        let mut f = vec![0x13, 0x37, 0x00];
        f.extend_from_slice(&opus_file(3));
        let demuxer = OggDemuxer::new(Reader::new(Source::buffer(f))).unwrap();
        assert_eq!(demuxer.packets.len(), 3);
    }

    #[test]
    fn test_unrecognized_stream_has_no_tracks() {
        let f = build_page(HEADER_TYPE_BOS, 0, 1, 0, b"not a codec header");
        let demuxer = OggDemuxer::new(Reader::new(Source::buffer(f))).unwrap();
        assert_eq!(demuxer.stream_count(), 1);
        assert!(demuxer.tracks().is_empty());
    }

    #[test]
    fn test_crc_fixture_page_parses_to_empty_stream() {
        // "OggS" | 0 | BOS | granule 0 | serial 1 | seq 0 | crc | one
        // zero-length segment and no payload: one stream, zero packets.
        let f = build_page(HEADER_TYPE_BOS, 0, 1, 0, &[]);
        assert_eq!(f[26], 1); // one segment entry
        assert_eq!(f[27], 0); // of length zero
        let mut demuxer = OggDemuxer::new(Reader::new(Source::buffer(f))).unwrap();
        assert_eq!(demuxer.stream_count(), 1);
        assert!(demuxer.tracks().is_empty());
        assert!(matches!(
            demuxer.read_packet(1),
            Err(Error::UnknownTrack(1))
        ));
    }

    #[test]
    fn test_zero_packet_stream_parses() {
        // A lone BOS page with an OpusHead: one stream, no audio packets.
        let f = build_page(HEADER_TYPE_BOS, 0, 1, 0, &opus_head(2));
        let mut demuxer = OggDemuxer::new(Reader::new(Source::buffer(f))).unwrap();
        assert!(demuxer.read_packet(1).unwrap().is_none());
        assert_eq!(demuxer.duration(), None);
    }
}
