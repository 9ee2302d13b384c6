//! Shared fixture builders for the integration tests
#![allow(dead_code)]

use audiox::io::BitWriter;

/// One MPEG1 Layer III frame: 128 kbps, 44100 Hz, stereo, 417 bytes
pub fn mp3_frame(fill: u8) -> Vec<u8> {
    let mut frame = vec![fill; 417];
    frame[0] = 0xFF;
    frame[1] = 0xFB;
    frame[2] = 0x90;
    frame[3] = 0x00;
    frame
}

/// A stream of `count` MP3 frames
pub fn mp3_stream(count: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..count {
        data.extend_from_slice(&mp3_frame((i % 7) as u8 + 1));
    }
    data
}

/// One ADTS frame (MPEG-4, LC, 44100 Hz stereo, no CRC) around a payload
pub fn adts_frame(payload: &[u8]) -> Vec<u8> {
    let frame_length = (payload.len() + 7) as u32;
    let mut bits = BitWriter::new();
    bits.write_bits(0xFFF, 12);
    bits.write_bit(false); // MPEG-4
    bits.write_bits(0, 2); // layer
    bits.write_bit(true); // no CRC
    bits.write_bits(1, 2); // LC
    bits.write_bits(4, 4); // 44100
    bits.write_bit(false);
    bits.write_bits(2, 3); // stereo
    bits.write_bits(0, 4);
    bits.write_bits(frame_length & 0x1FFF, 13);
    bits.write_bits(0x7FF, 11);
    bits.write_bits(0, 2);
    let mut frame = bits.into_bytes();
    frame.extend_from_slice(payload);
    frame
}

/// A canonical 16-bit PCM WAV file around a payload
pub fn wav_file(channels: u16, sample_rate: u32, payload: &[u8]) -> Vec<u8> {
    let block_align = channels * 2;
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
    f.extend_from_slice(&16u16.to_le_bytes());
    f.extend_from_slice(b"data");
    f.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    f.extend_from_slice(payload);
    f
}

/// An ID3v2.3 tag wrapping the given (id, frame-payload) pairs
pub fn id3v23_tag(frames: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (id, data) in frames {
        body.extend_from_slice(id.as_bytes());
        body.extend_from_slice(&(data.len() as u32).to_be_bytes());
        body.extend_from_slice(&[0, 0]);
        body.extend_from_slice(data);
    }
    let mut tag = Vec::new();
    tag.extend_from_slice(b"ID3\x03\x00\x00");
    let size = body.len() as u32;
    tag.extend_from_slice(&[
        ((size >> 21) & 0x7F) as u8,
        ((size >> 14) & 0x7F) as u8,
        ((size >> 7) & 0x7F) as u8,
        (size & 0x7F) as u8,
    ]);
    tag.extend_from_slice(&body);
    tag
}
