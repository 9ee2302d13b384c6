//! OGG page parsing and serialization
//!
//! Layout: `"OggS" | ver | header_type | granule i64 LE | serial u32 LE |
//! sequence u32 LE | checksum u32 LE | segment_count | segment_table |
//! payload`. The checksum is the MSB-first CRC-32 over the whole page
//! with the checksum field zero-filled.

use super::PAGE_MAGIC;
use crate::error::{Error, Result};
use crate::io::crc::crc32_ogg;
use crate::io::Reader;
use bytes::Bytes;

/// Continuation flag
pub const HEADER_TYPE_CONTINUATION: u8 = 0x01;
/// Beginning-of-stream flag
pub const HEADER_TYPE_BOS: u8 = 0x02;
/// End-of-stream flag
pub const HEADER_TYPE_EOS: u8 = 0x04;

/// Byte offset of the checksum field inside a page
pub const CHECKSUM_OFFSET: usize = 22;

/// One parsed OGG page
#[derive(Debug, Clone)]
pub struct OggPage {
    pub version: u8,
    pub header_type: u8,
    pub granule_position: i64,
    pub serial: u32,
    pub sequence: u32,
    pub checksum: u32,
    pub segment_table: Vec<u8>,
    pub payload: Bytes,
    /// Absolute file offset of the payload
    pub payload_offset: u64,
}

impl OggPage {
    pub fn is_continuation(&self) -> bool {
        self.header_type & HEADER_TYPE_CONTINUATION != 0
    }

    pub fn is_bos(&self) -> bool {
        self.header_type & HEADER_TYPE_BOS != 0
    }

    pub fn is_eos(&self) -> bool {
        self.header_type & HEADER_TYPE_EOS != 0
    }

    /// Parse a page at the reader's current position
    ///
    /// The magic must already be in place; a mismatch is an
    /// `InvalidContainer` error the caller may treat as a resync signal.
    pub fn parse(reader: &mut Reader) -> Result<Self> {
        let magic = reader.read_four_cc()?;
        if &magic != PAGE_MAGIC {
            return Err(Error::invalid_container("missing OggS capture pattern"));
        }
        let version = reader.read_u8()?;
        let header_type = reader.read_u8()?;
        let granule_position = reader.read_i64_le()?;
        let serial = reader.read_u32_le()?;
        let sequence = reader.read_u32_le()?;
        let checksum = reader.read_u32_le()?;
        let segment_count = reader.read_u8()? as usize;
        let table = reader
            .read_bytes(segment_count)?
            .ok_or_else(|| Error::truncated("OGG segment table"))?;
        let payload_len: usize = table.iter().map(|&b| b as usize).sum();
        let payload_offset = reader.position();
        let payload = reader
            .read_bytes(payload_len)?
            .ok_or_else(|| Error::truncated("OGG page payload"))?;
        Ok(OggPage {
            version,
            header_type,
            granule_position,
            serial,
            sequence,
            checksum,
            segment_table: table.to_vec(),
            payload,
            payload_offset,
        })
    }

    /// Split the payload into segments per the segment table
    ///
    /// Zero-length segments (lacing terminators) are dropped; each run of
    /// bytes a nonzero entry covers becomes one slice.
    pub fn segments(&self) -> Vec<Bytes> {
        let mut out = Vec::new();
        let mut offset = 0usize;
        for &len in &self.segment_table {
            let len = len as usize;
            if len > 0 {
                out.push(self.payload.slice(offset..offset + len));
            }
            offset += len;
        }
        out
    }
}

/// Lacing values for a payload of `len` bytes: full 255-entries followed
/// by a final sub-255 entry (so a multiple of 255 gets a 0 terminator)
pub fn segment_table_for(len: usize) -> Vec<u8> {
    let mut table = vec![255u8; len / 255];
    table.push((len % 255) as u8);
    table
}

/// Serialize a page, computing the checksum over the zero-filled field
pub fn build_page(
    header_type: u8,
    granule_position: i64,
    serial: u32,
    sequence: u32,
    payload: &[u8],
) -> Vec<u8> {
    let table = segment_table_for(payload.len());
    let mut page = Vec::with_capacity(27 + table.len() + payload.len());
    page.extend_from_slice(PAGE_MAGIC);
    page.push(0); // version
    page.push(header_type);
    page.extend_from_slice(&granule_position.to_le_bytes());
    page.extend_from_slice(&serial.to_le_bytes());
    page.extend_from_slice(&sequence.to_le_bytes());
    page.extend_from_slice(&[0u8; 4]); // checksum, filled below
    page.push(table.len() as u8);
    page.extend_from_slice(&table);
    page.extend_from_slice(payload);
    let checksum = crc32_ogg(&page);
    page[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&checksum.to_le_bytes());
    page
}

/// Verify a parsed page's checksum against a rebuilt zero-filled image
pub fn verify_checksum(raw_page: &[u8]) -> bool {
    if raw_page.len() < 27 {
        return false;
    }
    let mut copy = raw_page.to_vec();
    let stored = u32::from_le_bytes([copy[22], copy[23], copy[24], copy[25]]);
    copy[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].fill(0);
    crc32_ogg(&copy) == stored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Source;

    #[test]
    fn test_segment_table() {
        assert_eq!(segment_table_for(0), vec![0]);
        assert_eq!(segment_table_for(100), vec![100]);
        assert_eq!(segment_table_for(255), vec![255, 0]);
        assert_eq!(segment_table_for(300), vec![255, 45]);
    }

    #[test]
    fn test_build_parse_roundtrip() {
        let raw = build_page(HEADER_TYPE_BOS, 960, 7, 0, b"payload bytes");
        assert!(verify_checksum(&raw));
        let mut reader = Reader::new(Source::buffer(raw));
        let page = OggPage::parse(&mut reader).unwrap();
        assert!(page.is_bos());
        assert!(!page.is_eos());
        assert_eq!(page.granule_position, 960);
        assert_eq!(page.serial, 7);
        assert_eq!(page.sequence, 0);
        assert_eq!(page.payload.as_ref(), b"payload bytes");
    }

    #[test]
    fn test_checksum_is_positional() {
        let a = build_page(0, 0, 1, 0, b"data");
        let b = build_page(0, 0, 1, 1, b"data");
        let ca = u32::from_le_bytes([a[22], a[23], a[24], a[25]]);
        let cb = u32::from_le_bytes([b[22], b[23], b[24], b[25]]);
        assert_ne!(ca, cb);
    }

    #[test]
    fn test_corrupted_page_fails_checksum() {
        let mut raw = build_page(0, 0, 1, 0, b"data");
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        assert!(!verify_checksum(&raw));
    }

    #[test]
    fn test_segments_split_and_drop_zero() {
        let raw = build_page(0, 0, 1, 0, &[0xAA; 255]);
        let mut reader = Reader::new(Source::buffer(raw));
        let page = OggPage::parse(&mut reader).unwrap();
        // Table is [255, 0]; the zero terminator yields no segment.
        let segments = page.segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].len(), 255);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut reader = Reader::new(Source::buffer(b"NotAPage...".to_vec()));
        assert!(OggPage::parse(&mut reader).is_err());
    }
}
