//! Encoded packet representation

use bytes::Bytes;
use std::fmt;

/// A packet of encoded audio data: the atomic unit crossing the
/// demuxer/muxer boundary
///
/// For the codecs handled here every packet is independently decodable,
/// so `is_keyframe` defaults to true.
#[derive(Debug, Clone)]
pub struct EncodedPacket {
    /// Track this packet belongs to
    pub track_id: u32,
    /// Opaque encoded payload
    pub data: Bytes,
    /// Presentation time in seconds
    pub timestamp: f64,
    /// Packet duration in seconds, when known
    pub duration: Option<f64>,
    /// Whether the packet is independently decodable
    pub is_keyframe: bool,
    /// Presentation timestamp in codec sample units, when known
    pub pts: Option<i64>,
    /// Decode timestamp in codec sample units, when known
    pub dts: Option<i64>,
}

impl EncodedPacket {
    /// Create a keyframe packet
    pub fn new(track_id: u32, data: Bytes, timestamp: f64) -> Self {
        EncodedPacket {
            track_id,
            data,
            timestamp,
            duration: None,
            is_keyframe: true,
            pts: None,
            dts: None,
        }
    }

    /// Attach a duration
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Display for EncodedPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EncodedPacket(track={}, size={}, t={:.6}, key={})",
            self.track_id,
            self.size(),
            self.timestamp,
            self.is_keyframe
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_defaults() {
        let p = EncodedPacket::new(1, Bytes::from_static(&[1, 2, 3]), 0.5);
        assert!(p.is_keyframe);
        assert_eq!(p.size(), 3);
        assert_eq!(p.timestamp, 0.5);
        assert!(p.duration.is_none());
    }

    #[test]
    fn test_with_duration() {
        let p = EncodedPacket::new(1, Bytes::new(), 0.0).with_duration(0.02);
        assert_eq!(p.duration, Some(0.02));
    }
}
