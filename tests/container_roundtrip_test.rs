//! Mux-to-demux round trips across every supported format, plus the
//! end-to-end detection and conversion scenarios.

mod common;

use audiox::convert::{Conversion, ConversionOptions};
use audiox::format::track::{codecs, SampleFormat};
use audiox::format::{
    detect_format, open_input, open_output, AudioTrackConfig, Demuxer, EncodedPacket, Muxer,
};
use audiox::io::{Source, Target};
use bytes::Bytes;

/// Two seconds of 44100 Hz stereo 16-bit silence-ish PCM
fn dummy_pcm() -> Vec<u8> {
    (0..(2 * 44100 * 4)).map(|i| (i % 251) as u8).collect()
}

#[test]
fn test_wav_roundtrip() {
    let pcm = dummy_pcm();
    let mut config = AudioTrackConfig::new(codecs::PCM, 44100, 2);
    config.sample_format = Some(SampleFormat::I16);
    config.bit_depth = Some(16);

    let mut muxer = open_output("wav", Target::buffer()).unwrap();
    let id = muxer.add_track(config).unwrap();
    // Feed in 4096-frame slices like a demuxer would.
    for (i, chunk) in pcm.chunks(4096 * 4).enumerate() {
        let packet = EncodedPacket::new(
            id,
            Bytes::copy_from_slice(chunk),
            i as f64 * 4096.0 / 44100.0,
        );
        muxer.write_packet(&packet).unwrap();
    }
    let bytes = muxer.finalize().unwrap();

    assert_eq!(detect_format(Source::buffer(bytes.clone())).unwrap(), Some("wav"));
    let mut demuxer = open_input(Source::buffer(bytes)).unwrap();
    let track = demuxer.primary_track().unwrap();
    assert_eq!(track.codec, "pcm");
    assert_eq!(track.sample_rate, 44100);
    assert_eq!(track.channels, 2);
    assert_eq!(track.duration, Some(2.0));

    let mut collected = Vec::new();
    while let Some(packet) = demuxer.read_packet(1).unwrap() {
        collected.extend_from_slice(&packet.data);
    }
    assert_eq!(collected, pcm);
}

#[test]
fn test_mp3_roundtrip() {
    let frames = common::mp3_stream(20);
    let mut muxer = open_output("mp3", Target::buffer()).unwrap();
    let id = muxer
        .add_track(AudioTrackConfig::new(codecs::MP3, 44100, 2))
        .unwrap();
    for (i, frame) in frames.chunks(417).enumerate() {
        muxer
            .write_packet(&EncodedPacket::new(
                id,
                Bytes::copy_from_slice(frame),
                i as f64 * 1152.0 / 44100.0,
            ))
            .unwrap();
    }
    let bytes = muxer.finalize().unwrap();

    assert_eq!(detect_format(Source::buffer(bytes.clone())).unwrap(), Some("mp3"));
    let mut demuxer = open_input(Source::buffer(bytes)).unwrap();
    let track = demuxer.primary_track().unwrap();
    assert_eq!(track.codec, "mp3");
    assert_eq!(track.sample_rate, 44100);
    assert_eq!(track.channels, 2);

    let mut collected = Vec::new();
    let mut count = 0;
    while let Some(packet) = demuxer.read_packet(1).unwrap() {
        collected.extend_from_slice(&packet.data);
        count += 1;
    }
    assert_eq!(count, 20);
    assert_eq!(collected, frames);
}

#[test]
fn test_aac_roundtrip_preframed() {
    // Pre-framed ADTS input: the muxer must pass it through untouched.
    let mut frames = Vec::new();
    let mut stream = Vec::new();
    for i in 0..25usize {
        let frame = common::adts_frame(&vec![(i % 256) as u8; 64 + i]);
        stream.extend_from_slice(&frame);
        frames.push(frame);
    }

    let mut muxer = open_output("aac", Target::buffer()).unwrap();
    let id = muxer
        .add_track(AudioTrackConfig::new(codecs::AAC, 44100, 2))
        .unwrap();
    for (i, frame) in frames.iter().enumerate() {
        muxer
            .write_packet(&EncodedPacket::new(
                id,
                Bytes::copy_from_slice(frame),
                i as f64 * 1024.0 / 44100.0,
            ))
            .unwrap();
    }
    let bytes = muxer.finalize().unwrap();

    assert_eq!(detect_format(Source::buffer(bytes.clone())).unwrap(), Some("aac"));
    let mut demuxer = open_input(Source::buffer(bytes)).unwrap();
    let track = demuxer.primary_track().unwrap();
    assert_eq!(track.codec, "aac");
    assert_eq!(track.sample_rate, 44100);
    assert_eq!(track.channels, 2);

    let mut collected = Vec::new();
    while let Some(packet) = demuxer.read_packet(1).unwrap() {
        collected.extend_from_slice(&packet.data);
    }
    assert_eq!(collected, stream);
}

#[test]
fn test_flac_roundtrip() {
    // Opaque FLAC frames with valid sync headers and a 4096 block code.
    let mut frames = Vec::new();
    let mut stream = Vec::new();
    for i in 0..12usize {
        let mut frame = vec![0xFF, 0xF8, 0xC9, 0x08];
        frame.extend_from_slice(&vec![(i % 200) as u8; 20]);
        stream.extend_from_slice(&frame);
        frames.push(frame);
    }

    let mut config = AudioTrackConfig::new(codecs::FLAC, 44100, 2);
    config.bit_depth = Some(16);
    let mut muxer = open_output("flac", Target::buffer()).unwrap();
    let id = muxer.add_track(config).unwrap();
    for (i, frame) in frames.iter().enumerate() {
        muxer
            .write_packet(&EncodedPacket::new(
                id,
                Bytes::copy_from_slice(frame),
                i as f64 * 4096.0 / 44100.0,
            ))
            .unwrap();
    }
    let bytes = muxer.finalize().unwrap();

    assert_eq!(detect_format(Source::buffer(bytes.clone())).unwrap(), Some("flac"));
    let mut demuxer = open_input(Source::buffer(bytes)).unwrap();
    let track = demuxer.primary_track().unwrap();
    assert_eq!(track.codec, "flac");
    assert_eq!(track.sample_rate, 44100);
    assert_eq!(track.channels, 2);
    // STREAMINFO estimates 12 * 4096 samples.
    assert_eq!(track.duration, Some(12.0 * 4096.0 / 44100.0));

    let mut collected = Vec::new();
    while let Some(packet) = demuxer.read_packet(1).unwrap() {
        collected.extend_from_slice(&packet.data);
    }
    assert_eq!(collected, stream);
}

#[test]
fn test_ogg_opus_roundtrip() {
    let payloads: Vec<Vec<u8>> = (0..50).map(|i| vec![(i % 256) as u8; 40]).collect();
    let mut muxer = open_output("ogg", Target::buffer()).unwrap();
    let id = muxer
        .add_track(AudioTrackConfig::new(codecs::OPUS, 48000, 2))
        .unwrap();
    for (i, payload) in payloads.iter().enumerate() {
        muxer
            .write_packet(&EncodedPacket::new(
                id,
                Bytes::copy_from_slice(payload),
                i as f64 * 960.0 / 48000.0,
            ))
            .unwrap();
    }
    let bytes = muxer.finalize().unwrap();

    assert_eq!(detect_format(Source::buffer(bytes.clone())).unwrap(), Some("ogg"));
    let mut demuxer = open_input(Source::buffer(bytes)).unwrap();
    let track = demuxer.primary_track().unwrap();
    assert_eq!(track.codec, "opus");
    assert_eq!(track.sample_rate, 48000);
    assert_eq!(track.channels, 2);
    // 50 packets at 960 samples of 48 kHz: exactly one second.
    assert_eq!(demuxer.duration(), Some(1.0));

    let mut collected = Vec::new();
    while let Some(packet) = demuxer.read_packet(1).unwrap() {
        collected.extend_from_slice(&packet.data);
    }
    let expected: Vec<u8> = payloads.concat();
    assert_eq!(collected, expected);
}

#[test]
fn test_empty_source_detects_nothing() {
    assert_eq!(detect_format(Source::buffer(Vec::<u8>::new())).unwrap(), None);
}

#[test]
fn test_mp3_resync_after_inserted_noise() {
    let mut data = common::mp3_stream(3);
    data.extend_from_slice(&[0x51, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0x00,
        0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]);
    data.extend_from_slice(&common::mp3_stream(4));
    let mut demuxer = open_input(Source::buffer(data)).unwrap();
    let mut count = 0;
    while demuxer.read_packet(1).unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 7);
}

#[test]
fn test_wav_to_wav_conversion_with_window() {
    // Four seconds of 8 kHz mono PCM, trimmed to the middle two.
    let pcm: Vec<u8> = (0..(4 * 8000 * 2)).map(|i| (i % 13) as u8).collect();
    let input = common::wav_file(1, 8000, &pcm);

    let demuxer = open_input(Source::buffer(input)).unwrap();
    let muxer = open_output("wav", Target::buffer()).unwrap();
    let mut conversion = Conversion::new(
        demuxer,
        muxer,
        ConversionOptions {
            start_time: Some(1.0),
            end_time: Some(3.0),
            ..Default::default()
        },
    );
    conversion.initialize().unwrap();
    let out = conversion.execute().unwrap();
    conversion.close().unwrap();

    let mut demuxer = open_input(Source::buffer(out)).unwrap();
    let duration = demuxer.duration().unwrap();
    // Packet granularity is 4096 frames at 8 kHz, so the window is
    // honored to within one packet.
    assert!(duration >= 2.0 && duration < 2.0 + 2.0 * 4096.0 / 8000.0);
    demuxer.close().unwrap();
}

#[test]
fn test_conversion_stream_target() {
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);
    impl std::io::Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let sink = SharedSink(Arc::new(Mutex::new(Vec::new())));
    let demuxer = open_input(Source::buffer(common::mp3_stream(5))).unwrap();
    let muxer = open_output("mp3", Target::stream(sink.clone())).unwrap();
    let mut conversion = Conversion::new(demuxer, muxer, ConversionOptions::default());
    conversion.initialize().unwrap();
    let returned = conversion.execute().unwrap();
    conversion.close().unwrap();
    // Stream targets get their bytes through the sink, not the return.
    assert!(returned.is_empty());
    assert_eq!(sink.0.lock().unwrap().len(), 5 * 417);
}
