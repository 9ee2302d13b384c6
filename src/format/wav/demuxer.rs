//! WAV / RF64 demuxer implementation

use super::header::{Ds64Chunk, WavFormat};
use super::{
    DATA_CHUNK, DS64_CHUNK, FMT_CHUNK, INFO_TYPE, LIST_CHUNK, RF64_MAGIC, RIFF_MAGIC,
    SIZE_SENTINEL, WAVE_MAGIC,
};
use crate::error::{Error, Result};
use crate::format::demuxer::DemuxerContext;
use crate::format::metadata::AudioMetadata;
use crate::format::track::AudioTrack;
use crate::format::{Demuxer, EncodedPacket};
use crate::io::{Reader, StringEncoding};
use tracing::debug;

/// Sample-frames emitted per packet
const FRAMES_PER_PACKET: u64 = 4096;

/// WAV / RF64 demuxer
///
/// The data chunk is never read eagerly; packets slice it on demand.
pub struct WavDemuxer {
    reader: Reader,
    context: DemuxerContext,
    format: WavFormat,
    data_offset: u64,
    data_size: u64,
    total_frames: u64,
    frames_read: u64,
    is_rf64: bool,
}

impl WavDemuxer {
    /// Open and parse a RIFF/RF64 WAVE stream
    pub fn new(mut reader: Reader) -> Result<Self> {
        reader.seek(0)?;
        let magic = reader.read_four_cc()?;
        let is_rf64 = &magic == RF64_MAGIC;
        if !is_rf64 && &magic != RIFF_MAGIC {
            return Err(Error::invalid_container("missing RIFF/RF64 magic"));
        }
        let riff_size = reader.read_u32_le()?;
        if &reader.read_four_cc()? != WAVE_MAGIC {
            return Err(Error::invalid_container("missing WAVE form type"));
        }

        // RF64 mandates ds64 as the very next chunk; its 64-bit values
        // override the 32-bit sentinel fields.
        let mut ds64 = None;
        if is_rf64 {
            let id = reader.read_four_cc()?;
            if &id != DS64_CHUNK {
                return Err(Error::invalid_container("RF64 without leading ds64 chunk"));
            }
            let chunk_size = reader.read_u32_le()?;
            let chunk_start = reader.position();
            let parsed = Ds64Chunk::parse(&mut reader)?;
            // Skip the optional chunk-size table.
            reader.seek(chunk_start + chunk_size as u64)?;
            if chunk_size % 2 != 0 {
                reader.skip(1)?;
            }
            ds64 = Some(parsed);
        }

        let declared_end = match ds64 {
            Some(d) => 8 + d.riff_size,
            None if riff_size != SIZE_SENTINEL => 8 + riff_size as u64,
            None => u64::MAX,
        };
        let file_size = reader.size()?.unwrap_or(u64::MAX);
        let scan_end = declared_end.min(file_size);

        let mut format = None;
        let mut data: Option<(u64, u64)> = None;
        let mut metadata = AudioMetadata::default();

        while reader.position() + 8 <= scan_end {
            let id = match reader.read_bytes(4)? {
                Some(b) => [b[0], b[1], b[2], b[3]],
                None => break,
            };
            let size32 = reader.read_u32_le()?;
            let payload_start = reader.position();
            let size = if &id == DATA_CHUNK && size32 == SIZE_SENTINEL {
                ds64.map(|d| d.data_size).unwrap_or(size32 as u64)
            } else {
                size32 as u64
            };

            match &id {
                id if id == FMT_CHUNK => {
                    format = Some(WavFormat::parse(&mut reader, size32)?);
                }
                id if id == DATA_CHUNK => {
                    data = Some((payload_start, size));
                }
                id if id == LIST_CHUNK => {
                    if size >= 4 {
                        let list_type = reader.read_four_cc()?;
                        if &list_type == INFO_TYPE {
                            parse_info_list(
                                &mut reader,
                                payload_start + size,
                                &mut metadata,
                            )?;
                        }
                    }
                }
                _ => {}
            }

            // Chunks are 16-bit aligned: odd sizes carry one pad byte.
            let mut next = payload_start + size;
            if size % 2 != 0 {
                next += 1;
            }
            reader.seek(next)?;
        }

        let format = format.ok_or_else(|| Error::invalid_container("missing fmt chunk"))?;
        let (data_offset, mut data_size) =
            data.ok_or_else(|| Error::invalid_container("missing data chunk"))?;
        if file_size != u64::MAX && data_offset + data_size > file_size {
            data_size = file_size.saturating_sub(data_offset);
        }

        let total_frames = data_size / format.block_align.max(1) as u64;
        let duration = total_frames as f64 / format.sample_rate as f64;
        debug!(
            is_rf64,
            data_size, total_frames, duration, "parsed WAVE container"
        );

        let (codec, sample_format) = format.codec();
        let mut context = DemuxerContext::new();
        context.add_track(AudioTrack {
            id: 0,
            index: 0,
            codec: codec.to_string(),
            sample_rate: format.sample_rate,
            channels: format.channels,
            channel_layout: None,
            bit_depth: Some(format.bits_per_sample),
            sample_format,
            bitrate: Some(format.byte_rate as u64 * 8),
            duration: Some(duration),
            is_default: true,
            codec_description: None,
        });
        context.set_duration(Some(duration));
        context.set_metadata(metadata);

        Ok(WavDemuxer {
            reader,
            context,
            format,
            data_offset,
            data_size,
            total_frames,
            frames_read: 0,
            is_rf64,
        })
    }

    /// Whether the container used the RF64 layout
    pub fn is_rf64(&self) -> bool {
        self.is_rf64
    }

    /// Size of the audio payload in bytes
    pub fn data_size(&self) -> u64 {
        self.data_size
    }
}

/// Iterate a LIST INFO chunk's {fourcc, size, NUL-padded data} tuples
fn parse_info_list(reader: &mut Reader, end: u64, metadata: &mut AudioMetadata) -> Result<()> {
    while reader.position() + 8 <= end {
        let id = match reader.read_bytes(4)? {
            Some(b) => [b[0], b[1], b[2], b[3]],
            None => break,
        };
        let size = reader.read_u32_le()? as u64;
        if reader.position() + size > end {
            break;
        }
        let raw = match reader.read_bytes(size as usize)? {
            Some(b) => b,
            None => break,
        };
        let value = crate::io::reader::decode_string(&raw, StringEncoding::Utf8)
            .trim_end_matches('\0')
            .to_string();
        if !value.is_empty() {
            apply_info_value(&id, &value, metadata);
        }
        if size % 2 != 0 {
            reader.skip(1)?;
        }
    }
    Ok(())
}

fn apply_info_value(id: &[u8; 4], value: &str, metadata: &mut AudioMetadata) {
    match id {
        b"INAM" => metadata.title = Some(value.to_string()),
        b"IART" => metadata.artist = Some(value.to_string()),
        b"IPRD" => metadata.album = Some(value.to_string()),
        b"ICMT" => metadata.comment = Some(value.to_string()),
        b"ICOP" => metadata.copyright = Some(value.to_string()),
        b"ICRD" => {
            metadata.date = Some(value.to_string());
            metadata.year = value.get(..4).and_then(|y| y.parse().ok());
        }
        b"IGNR" => metadata.genre = Some(value.to_string()),
        b"ITRK" => metadata.track_number = value.trim().parse().ok(),
        b"ISFT" => metadata.encoder = Some(value.to_string()),
        _ => {
            metadata
                .custom
                .insert(String::from_utf8_lossy(id).into_owned(), value.to_string());
        }
    }
}

impl Demuxer for WavDemuxer {
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
        if self.frames_read >= self.total_frames {
            return Ok(None);
        }
        let frames = FRAMES_PER_PACKET.min(self.total_frames - self.frames_read);
        let bytes = frames * self.format.block_align as u64;
        let offset = self.data_offset + self.frames_read * self.format.block_align as u64;
        self.reader.seek(offset)?;
        let data = self
            .reader
            .read_bytes(bytes as usize)?
            .ok_or_else(|| Error::truncated("WAV data chunk payload"))?;
        let timestamp = self.frames_read as f64 / self.format.sample_rate as f64;
        let duration = frames as f64 / self.format.sample_rate as f64;
        self.frames_read += frames;
        Ok(Some(
            EncodedPacket::new(track_id, data, timestamp).with_duration(duration),
        ))
    }

    fn seek(&mut self, time: f64) -> Result<()> {
        let frame = (time.max(0.0) * self.format.sample_rate as f64).floor() as u64;
        self.frames_read = frame.min(self.total_frames);
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

    /// Build a canonical PCM WAV file around the given payload
    pub(crate) fn wav_file(
        channels: u16,
        sample_rate: u32,
        bits: u16,
        payload: &[u8],
    ) -> Vec<u8> {
        let block_align = channels * bits / 8;
        let byte_rate = sample_rate * block_align as u32;
        let mut f = Vec::new();
        f.extend_from_slice(b"RIFF");
        f.extend_from_slice(&(36 + payload.len() as u32).to_le_bytes());
        f.extend_from_slice(b"WAVE");
        f.extend_from_slice(b"fmt ");
        f.extend_from_slice(&16u32.to_le_bytes());
        f.extend_from_slice(&1u16.to_le_bytes());
        f.extend_from_slice(&channels.to_le_bytes());
        f.extend_from_slice(&sample_rate.to_le_bytes());
        f.extend_from_slice(&byte_rate.to_le_bytes());
        f.extend_from_slice(&block_align.to_le_bytes());
        f.extend_from_slice(&bits.to_le_bytes());
        f.extend_from_slice(b"data");
        f.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        f.extend_from_slice(payload);
        f
    }

    #[test]
    fn test_one_second_mono_duration() {
        // 88200 samples of 16-bit mono at 44100 Hz is exactly 2 seconds;
        // 88200 bytes (44100 samples) is exactly 1 second.
        let payload = vec![0u8; 88200];
        let file = wav_file(1, 44100, 16, &payload);
        let demuxer = WavDemuxer::new(Reader::new(Source::buffer(file))).unwrap();
        assert_eq!(demuxer.duration(), Some(1.0));
    }

    #[test]
    fn test_track_descriptor() {
        let file = wav_file(2, 48000, 16, &[0u8; 192]);
        let demuxer = WavDemuxer::new(Reader::new(Source::buffer(file))).unwrap();
        let track = demuxer.primary_track().unwrap();
        assert_eq!(track.codec, "pcm");
        assert_eq!(track.channels, 2);
        assert_eq!(track.sample_rate, 48000);
        assert_eq!(track.bit_depth, Some(16));
    }

    #[test]
    fn test_packet_iteration_chunks_at_4096_frames() {
        // 5000 stereo 16-bit frames -> packets of 4096 then 904.
        let file = wav_file(2, 44100, 16, &vec![0u8; 5000 * 4]);
        let mut demuxer = WavDemuxer::new(Reader::new(Source::buffer(file))).unwrap();
        let first = demuxer.read_packet(1).unwrap().unwrap();
        assert_eq!(first.size(), 4096 * 4);
        assert_eq!(first.timestamp, 0.0);
        let second = demuxer.read_packet(1).unwrap().unwrap();
        assert_eq!(second.size(), 904 * 4);
        assert!((second.timestamp - 4096.0 / 44100.0).abs() < 1e-12);
        assert!(demuxer.read_packet(1).unwrap().is_none());
    }

    #[test]
    fn test_seek_clamps_to_data() {
        let file = wav_file(1, 8000, 16, &vec![0u8; 16000]);
        let mut demuxer = WavDemuxer::new(Reader::new(Source::buffer(file))).unwrap();
        demuxer.seek(0.5).unwrap();
        let packet = demuxer.read_packet(1).unwrap().unwrap();
        assert!((packet.timestamp - 0.5).abs() < 1e-12);
        demuxer.seek(100.0).unwrap();
        assert!(demuxer.read_packet(1).unwrap().is_none());
    }

    #[test]
    fn test_missing_fmt_rejected() {
        let mut f = Vec::new();
        f.extend_from_slice(b"RIFF");
        f.extend_from_slice(&12u32.to_le_bytes());
        f.extend_from_slice(b"WAVE");
        f.extend_from_slice(b"data");
        f.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            WavDemuxer::new(Reader::new(Source::buffer(f))),
            Err(Error::InvalidContainer(_))
        ));
    }

    #[test]
    fn test_list_info_metadata() {
        let mut info = Vec::new();
        info.extend_from_slice(b"INFO");
        for (id, value) in [(b"INAM", "My Title\0"), (b"IART", "Me\0\0")] {
            info.extend_from_slice(id);
            info.extend_from_slice(&(value.len() as u32).to_le_bytes());
            info.extend_from_slice(value.as_bytes());
        }
        let mut f = Vec::new();
        f.extend_from_slice(b"RIFF");
        let payload = vec![0u8; 4];
        let riff_size = 4 + 8 + 16 + 8 + info.len() as u32 + 8 + payload.len() as u32;
        f.extend_from_slice(&riff_size.to_le_bytes());
        f.extend_from_slice(b"WAVE");
        f.extend_from_slice(b"fmt ");
        f.extend_from_slice(&16u32.to_le_bytes());
        f.extend_from_slice(&1u16.to_le_bytes());
        f.extend_from_slice(&2u16.to_le_bytes());
        f.extend_from_slice(&44100u32.to_le_bytes());
        f.extend_from_slice(&176400u32.to_le_bytes());
        f.extend_from_slice(&4u16.to_le_bytes());
        f.extend_from_slice(&16u16.to_le_bytes());
        f.extend_from_slice(b"LIST");
        f.extend_from_slice(&(info.len() as u32).to_le_bytes());
        f.extend_from_slice(&info);
        f.extend_from_slice(b"data");
        f.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        f.extend_from_slice(&payload);
        let demuxer = WavDemuxer::new(Reader::new(Source::buffer(f))).unwrap();
        assert_eq!(demuxer.metadata().title.as_deref(), Some("My Title"));
        assert_eq!(demuxer.metadata().artist.as_deref(), Some("Me"));
    }

    #[test]
    fn test_rf64_layout() {
        let payload = vec![0xAAu8; 400];
        let mut f = Vec::new();
        f.extend_from_slice(b"RF64");
        f.extend_from_slice(&SIZE_SENTINEL.to_le_bytes());
        f.extend_from_slice(b"WAVE");
        f.extend_from_slice(b"ds64");
        f.extend_from_slice(&28u32.to_le_bytes());
        let riff_size: u64 = 4 + (8 + 28) + (8 + 16) + 8 + payload.len() as u64;
        f.extend_from_slice(&(riff_size as u32).to_le_bytes());
        f.extend_from_slice(&((riff_size >> 32) as u32).to_le_bytes());
        f.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        f.extend_from_slice(&0u32.to_le_bytes());
        f.extend_from_slice(&100u32.to_le_bytes()); // sample count
        f.extend_from_slice(&0u32.to_le_bytes());
        f.extend_from_slice(&0u32.to_le_bytes()); // table length
        f.extend_from_slice(b"fmt ");
        f.extend_from_slice(&16u32.to_le_bytes());
        f.extend_from_slice(&1u16.to_le_bytes());
        f.extend_from_slice(&2u16.to_le_bytes());
        f.extend_from_slice(&44100u32.to_le_bytes());
        f.extend_from_slice(&176400u32.to_le_bytes());
        f.extend_from_slice(&4u16.to_le_bytes());
        f.extend_from_slice(&16u16.to_le_bytes());
        f.extend_from_slice(b"data");
        f.extend_from_slice(&SIZE_SENTINEL.to_le_bytes());
        f.extend_from_slice(&payload);
        let demuxer = WavDemuxer::new(Reader::new(Source::buffer(f))).unwrap();
        assert!(demuxer.is_rf64());
        assert_eq!(demuxer.data_size(), 400);
    }
}
