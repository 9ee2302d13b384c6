//! Conversion orchestrator
//!
//! Couples one demuxer's packet stream to one muxer, with optional
//! start/end-time gating and progress reporting. The orchestrator does
//! not recover from errors: failures on either side abort and propagate,
//! and partial output is the caller's to clean up.

use crate::error::{Error, Result};
use crate::format::{AudioTrackConfig, Demuxer, EncodedPacket, Muxer};
use bytes::Bytes;
use std::time::Instant;
use tracing::info;

/// Per-field overrides applied to the output track
#[derive(Debug, Clone, Default)]
pub struct ConversionOptions {
    /// Skip packets before this time (seconds)
    pub start_time: Option<f64>,
    /// Stop after the first packet past this time (seconds)
    pub end_time: Option<f64>,
    pub codec: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub bit_depth: Option<u16>,
    pub bitrate: Option<u64>,
}

/// Progress snapshot delivered after each written packet
#[derive(Debug, Clone)]
pub struct Progress {
    /// 0..=100, against the effective duration
    pub percentage: f64,
    /// Seconds of output written so far
    pub current_time: f64,
    /// Effective total duration in seconds (0 when unknown)
    pub total_time: f64,
    pub input_bytes: u64,
    pub output_bytes: u64,
    /// Input bytes per wall-clock second
    pub speed: f64,
}

/// Progress callback type
pub type ProgressCallback = Box<dyn FnMut(&Progress) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Initialized,
    Finalized,
    Closed,
}

/// A single demuxer-to-muxer conversion
pub struct Conversion {
    demuxer: Box<dyn Demuxer>,
    muxer: Box<dyn Muxer>,
    options: ConversionOptions,
    progress: Option<ProgressCallback>,
    state: State,
    input_track_id: u32,
    output_track_id: u32,
    total_time: f64,
    input_bytes: u64,
    output_bytes: u64,
}

impl Conversion {
    /// Tie a demuxer and a muxer together
    pub fn new(
        demuxer: Box<dyn Demuxer>,
        muxer: Box<dyn Muxer>,
        options: ConversionOptions,
    ) -> Self {
        Conversion {
            demuxer,
            muxer,
            options,
            progress: None,
            state: State::Created,
            input_track_id: 0,
            output_track_id: 0,
            total_time: 0.0,
            input_bytes: 0,
            output_bytes: 0,
        }
    }

    /// Install a progress callback, invoked after each written packet
    pub fn on_progress(&mut self, callback: ProgressCallback) {
        self.progress = Some(callback);
    }

    /// Pick the primary track, size the effective duration, add the
    /// output track (input values with per-field overrides), copy the
    /// metadata, and seek the input when a start time is set
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != State::Created {
            return Err(Error::muxer_state("conversion already initialized"));
        }
        let track = self
            .demuxer
            .primary_track()
            .ok_or_else(|| Error::invalid_container("input has no audio track"))?
            .clone();
        self.input_track_id = track.id;

        let start = self.options.start_time.unwrap_or(0.0).max(0.0);
        let source_duration = track.duration.or_else(|| self.demuxer.duration());
        let capped_end = match (source_duration, self.options.end_time) {
            (Some(d), Some(e)) => Some(d.min(e)),
            (Some(d), None) => Some(d),
            (None, e) => e,
        };
        self.total_time = capped_end.map(|e| (e - start).max(0.0)).unwrap_or(0.0);

        let mut config = AudioTrackConfig::from_track(&track);
        if let Some(codec) = &self.options.codec {
            config.codec = codec.clone();
        }
        if let Some(sample_rate) = self.options.sample_rate {
            config.sample_rate = sample_rate;
        }
        if let Some(channels) = self.options.channels {
            config.channels = channels;
        }
        if let Some(bit_depth) = self.options.bit_depth {
            config.bit_depth = Some(bit_depth);
        }
        if let Some(bitrate) = self.options.bitrate {
            config.bitrate = Some(bitrate);
        }
        self.output_track_id = self.muxer.add_track(config)?;
        self.muxer.set_metadata(self.demuxer.metadata().clone())?;

        if start > 0.0 {
            self.demuxer.seek(start)?;
        }
        self.state = State::Initialized;
        info!(
            track = self.input_track_id,
            total_time = self.total_time,
            "conversion initialized"
        );
        Ok(())
    }

    /// Pump packets from the demuxer into the muxer and finalize
    ///
    /// Returns the assembled container bytes for buffer targets.
    pub fn execute(&mut self) -> Result<Bytes> {
        if self.state != State::Initialized {
            return Err(Error::muxer_state("conversion not initialized"));
        }
        let start = self.options.start_time.unwrap_or(0.0).max(0.0);
        let end = self.options.end_time;
        let clock = Instant::now();
        let mut current_time = 0.0f64;

        while let Some(packet) = self.demuxer.read_packet(self.input_track_id)? {
            if let Some(end) = end {
                if packet.timestamp > end {
                    break;
                }
            }
            if packet.timestamp < start {
                // Before the requested window: skip but keep reading.
                continue;
            }
            let shifted = EncodedPacket {
                track_id: self.output_track_id,
                timestamp: packet.timestamp - start,
                ..packet
            };
            self.input_bytes += shifted.data.len() as u64;
            self.output_bytes += shifted.data.len() as u64;
            current_time = shifted.timestamp + shifted.duration.unwrap_or(0.0);
            self.muxer.write_packet(&shifted)?;
            self.emit_progress(current_time, clock.elapsed().as_secs_f64(), false);
        }

        let output = self.muxer.finalize()?;
        self.state = State::Finalized;
        self.emit_progress(current_time, clock.elapsed().as_secs_f64(), true);
        Ok(output)
    }

    fn emit_progress(&mut self, current_time: f64, elapsed: f64, done: bool) {
        let callback = match self.progress.as_mut() {
            Some(cb) => cb,
            None => return,
        };
        let percentage = if done {
            100.0
        } else if self.total_time > 0.0 {
            (current_time / self.total_time * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let speed = if elapsed > 0.0 {
            self.input_bytes as f64 / elapsed
        } else {
            0.0
        };
        callback(&Progress {
            percentage,
            current_time,
            total_time: self.total_time,
            input_bytes: self.input_bytes,
            output_bytes: self.output_bytes,
            speed,
        });
    }

    /// Release the input; explicit and idempotent
    pub fn close(&mut self) -> Result<()> {
        if self.state != State::Closed {
            self.demuxer.close()?;
            self.state = State::Closed;
        }
        Ok(())
    }
}

/// Parse a `HH:MM:SS(.mmm)`, `MM:SS`, or plain-seconds time spec
pub fn parse_time_spec(spec: &str) -> Option<f64> {
    let spec = spec.trim();
    if spec.is_empty() {
        return None;
    }
    if !spec.contains(':') {
        return spec.parse::<f64>().ok().filter(|v| *v >= 0.0);
    }
    let mut seconds = 0.0f64;
    for part in spec.split(':') {
        let value = part.parse::<f64>().ok()?;
        if value < 0.0 {
            return None;
        }
        seconds = seconds * 60.0 + value;
    }
    Some(seconds)
}
