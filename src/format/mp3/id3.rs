//! ID3v1 and ID3v2 tag parsing
//!
//! ID3v2.2, 2.3, and 2.4 differ in frame-id width (3 vs 4 bytes), frame
//! size encoding (big-endian vs syncsafe), and frame flag presence; the
//! version-specific rules are all in [`Id3v2Tag::parse`].

use crate::error::Result;
use crate::format::metadata::{parse_number_pair, AudioMetadata, CoverArt};
use crate::io::reader::decode_string;
use crate::io::{Reader, StringEncoding};
use bytes::Bytes;

/// Canonical ID3v1 genre names, indices 0..=79
const ID3V1_GENRES: [&str; 80] = [
    "Blues", "Classic Rock", "Country", "Dance", "Disco", "Funk", "Grunge", "Hip-Hop", "Jazz",
    "Metal", "New Age", "Oldies", "Other", "Pop", "R&B", "Rap", "Reggae", "Rock", "Techno",
    "Industrial", "Alternative", "Ska", "Death Metal", "Pranks", "Soundtrack", "Euro-Techno",
    "Ambient", "Trip-Hop", "Vocal", "Jazz+Funk", "Fusion", "Trance", "Classical", "Instrumental",
    "Acid", "House", "Game", "Sound Clip", "Gospel", "Noise", "AlternRock", "Bass", "Soul",
    "Punk", "Space", "Meditative", "Instrumental Pop", "Instrumental Rock", "Ethnic", "Gothic",
    "Darkwave", "Techno-Industrial", "Electronic", "Pop-Folk", "Eurodance", "Dream",
    "Southern Rock", "Comedy", "Cult", "Gangsta", "Top 40", "Christian Rap", "Pop/Funk",
    "Jungle", "Native American", "Cabaret", "New Wave", "Psychadelic", "Rave", "Showtunes",
    "Trailer", "Lo-Fi", "Tribal", "Acid Punk", "Acid Jazz", "Polka", "Retro", "Musical",
    "Rock & Roll", "Hard Rock",
];

/// Parsed ID3v1 tag (the fixed 128-byte trailer)
#[derive(Debug, Clone)]
pub struct Id3v1Tag {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<u32>,
    pub comment: String,
    pub track: Option<u32>,
    pub genre: u8,
}

impl Id3v1Tag {
    /// Parse a 128-byte trailer beginning with "TAG"
    pub fn parse(block: &[u8]) -> Option<Self> {
        if block.len() < 128 || &block[0..3] != b"TAG" {
            return None;
        }
        let field = |range: std::ops::Range<usize>| -> String {
            decode_string(&block[range], StringEncoding::Latin1)
                .trim_end_matches(['\0', ' '])
                .to_string()
        };
        let year = field(93..97).parse::<u32>().ok();
        // Track number convention: byte 125 NUL, byte 126 the number.
        let track = if block[125] == 0 && block[126] != 0 {
            Some(block[126] as u32)
        } else {
            None
        };
        Some(Id3v1Tag {
            title: field(3..33),
            artist: field(33..63),
            album: field(63..93),
            year,
            comment: field(97..125),
            track,
            genre: block[127],
        })
    }

    /// The genre name, when the index is in the canonical table
    pub fn genre_name(&self) -> Option<&'static str> {
        ID3V1_GENRES.get(self.genre as usize).copied()
    }

    /// Map to the shared metadata model
    pub fn to_metadata(&self) -> AudioMetadata {
        let mut m = AudioMetadata::default();
        if !self.title.is_empty() {
            m.title = Some(self.title.clone());
        }
        if !self.artist.is_empty() {
            m.artist = Some(self.artist.clone());
        }
        if !self.album.is_empty() {
            m.album = Some(self.album.clone());
        }
        m.year = self.year;
        if !self.comment.is_empty() {
            m.comment = Some(self.comment.clone());
        }
        m.track_number = self.track;
        if let Some(genre) = self.genre_name() {
            m.genre = Some(genre.to_string());
        }
        m
    }
}

/// One raw ID3v2 frame
#[derive(Debug, Clone)]
pub struct Id3v2Frame {
    pub id: String,
    pub flags: u16,
    pub data: Bytes,
}

/// Parsed ID3v2 tag header plus its frames
#[derive(Debug, Clone)]
pub struct Id3v2Tag {
    /// Major version (2, 3, or 4)
    pub version: u8,
    pub revision: u8,
    pub flags: u8,
    /// Tag payload size, excluding the 10-byte header
    pub size: u32,
    pub frames: Vec<Id3v2Frame>,
}

impl Id3v2Tag {
    /// Total tag footprint from file start
    pub fn total_size(&self) -> u64 {
        10 + self.size as u64
    }

    /// Parse a tag at the reader's current position (must be offset 0 of
    /// the tag); returns `None` when no "ID3" marker is present
    pub fn parse(reader: &mut Reader) -> Result<Option<Self>> {
        let start = reader.position();
        let head = match reader.peek(10)? {
            Some(h) => h,
            None => return Ok(None),
        };
        if &head[..3] != b"ID3" {
            return Ok(None);
        }
        reader.skip(3)?;
        let version = reader.read_u8()?;
        let revision = reader.read_u8()?;
        let flags = reader.read_u8()?;
        let size = reader.read_syncsafe_int()?;
        let tag_end = start + 10 + size as u64;

        // Extended header: length is syncsafe in v2.4, big-endian in v2.3.
        if flags & 0x40 != 0 {
            let ext_len = if version >= 4 {
                reader.read_syncsafe_int()?
            } else {
                reader.read_u32_be()?
            };
            reader.skip(ext_len as u64)?;
        }

        let id_len: u64 = if version <= 2 { 3 } else { 4 };
        let header_len: u64 = if version <= 2 { 6 } else { 10 };

        let mut frames = Vec::new();
        while reader.position() + header_len <= tag_end {
            let id_bytes = match reader.read_bytes(id_len as usize)? {
                Some(b) => b,
                None => break,
            };
            if id_bytes[0] == 0 {
                // First NUL frame id marks the padding region.
                break;
            }
            let frame_size = match version {
                4.. => reader.read_syncsafe_int()?,
                3 => reader.read_u32_be()?,
                _ => reader.read_u24_be()?,
            };
            let frame_flags = if version >= 3 { reader.read_u16_be()? } else { 0 };
            if reader.position() + frame_size as u64 > tag_end {
                break;
            }
            let data = match reader.read_bytes(frame_size as usize)? {
                Some(d) => d,
                None => break,
            };
            frames.push(Id3v2Frame {
                id: String::from_utf8_lossy(&id_bytes).into_owned(),
                flags: frame_flags,
                data,
            });
        }

        Ok(Some(Id3v2Tag {
            version,
            revision,
            flags,
            size,
            frames,
        }))
    }

    /// Map the tag's frames onto the shared metadata model
    pub fn to_metadata(&self) -> AudioMetadata {
        let mut m = AudioMetadata::default();
        for frame in &self.frames {
            match frame.id.as_str() {
                "TIT2" | "TT2" => m.title = text(&frame.data),
                "TPE1" | "TP1" => m.artist = text(&frame.data),
                "TALB" | "TAL" => m.album = text(&frame.data),
                "TPE2" | "TP2" => m.album_artist = text(&frame.data),
                "TCOM" | "TCM" => m.composer = text(&frame.data),
                "TCON" | "TCO" => m.genre = text(&frame.data),
                "TYER" | "TYE" | "TDRC" => {
                    if let Some(value) = text(&frame.data) {
                        m.year = value.get(..4).and_then(|y| y.parse().ok());
                        if frame.id == "TDRC" {
                            m.date = Some(value);
                        }
                    }
                }
                "TRCK" | "TRK" => {
                    if let Some(value) = text(&frame.data) {
                        let (number, total) = parse_number_pair(&value);
                        m.track_number = number;
                        m.track_total = total;
                    }
                }
                "TPOS" | "TPA" => {
                    if let Some(value) = text(&frame.data) {
                        let (number, total) = parse_number_pair(&value);
                        m.disc_number = number;
                        m.disc_total = total;
                    }
                }
                "COMM" | "COM" => m.comment = language_text(&frame.data),
                "USLT" | "ULT" => m.lyrics = language_text(&frame.data),
                "TCOP" | "TCR" => m.copyright = text(&frame.data),
                "TENC" | "TEN" => m.encoded_by = text(&frame.data),
                "TSSE" | "TSS" => m.encoder = text(&frame.data),
                "TBPM" | "TBP" => {
                    m.bpm = text(&frame.data)
                        .and_then(|v| v.trim().parse::<f64>().ok())
                        .map(|v| v as u32);
                }
                "TSRC" => m.isrc = text(&frame.data),
                "APIC" => {
                    if let Some(art) = parse_apic(&frame.data) {
                        m.cover_art.push(art);
                    }
                }
                "PIC" => {
                    if let Some(art) = parse_pic_v22(&frame.data) {
                        m.cover_art.push(art);
                    }
                }
                id if id.starts_with('T') => {
                    if let Some(value) = text(&frame.data) {
                        m.custom.insert(id.to_string(), value);
                    }
                }
                _ => {}
            }
        }
        m
    }
}

/// Decode a text frame: encoding byte followed by text
fn text(data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    let decoded = decode_encoded_text(data[0], &data[1..]);
    if decoded.is_empty() {
        None
    } else {
        Some(decoded)
    }
}

/// Decode a COMM/USLT frame: encoding byte, 3-byte language, terminated
/// descriptor, then the text itself
fn language_text(data: &[u8]) -> Option<String> {
    if data.len() < 4 {
        return None;
    }
    let encoding = data[0];
    let rest = &data[4..];
    let after_descriptor = skip_terminated(rest, encoding)?;
    let decoded = decode_encoded_text(encoding, after_descriptor);
    if decoded.is_empty() {
        None
    } else {
        Some(decoded)
    }
}

/// Decode an APIC frame (v2.3/2.4): encoding, MIME (NUL-terminated
/// Latin-1), picture type, terminated description, image data
fn parse_apic(data: &[u8]) -> Option<CoverArt> {
    if data.len() < 4 {
        return None;
    }
    let encoding = data[0];
    let rest = &data[1..];
    let mime_end = rest.iter().position(|&b| b == 0)?;
    let mime = decode_string(&rest[..mime_end], StringEncoding::Latin1);
    let rest = &rest[mime_end + 1..];
    if rest.is_empty() {
        return None;
    }
    let rest = &rest[1..]; // picture type
    let description_len = terminated_len(rest, encoding)?;
    let description = decode_encoded_text(encoding, &rest[..description_len.0]);
    let image = &rest[description_len.1..];
    Some(CoverArt {
        data: Bytes::copy_from_slice(image),
        mime_type: mime,
        description,
    })
}

/// Decode a PIC frame (v2.2): encoding, 3-byte image format, picture
/// type, terminated description, image data
fn parse_pic_v22(data: &[u8]) -> Option<CoverArt> {
    if data.len() < 6 {
        return None;
    }
    let encoding = data[0];
    let image_format = decode_string(&data[1..4], StringEncoding::Latin1);
    let rest = &data[5..]; // skip picture type
    let description_len = terminated_len(rest, encoding)?;
    let description = decode_encoded_text(encoding, &rest[..description_len.0]);
    let image = &rest[description_len.1..];
    let mime = match image_format.as_str() {
        "PNG" => "image/png".to_string(),
        "JPG" => "image/jpeg".to_string(),
        other => format!("image/{}", other.to_lowercase()),
    };
    Some(CoverArt {
        data: Bytes::copy_from_slice(image),
        mime_type: mime,
        description,
    })
}

/// Byte length of a terminated string and the offset just past its
/// terminator, under the frame's text encoding
fn terminated_len(data: &[u8], encoding: u8) -> Option<(usize, usize)> {
    if encoding == 1 || encoding == 2 {
        // UTF-16: double-NUL terminator on a code-unit boundary.
        let mut i = 0;
        while i + 1 < data.len() {
            if data[i] == 0 && data[i + 1] == 0 {
                return Some((i, i + 2));
            }
            i += 2;
        }
        None
    } else {
        let end = data.iter().position(|&b| b == 0)?;
        Some((end, end + 1))
    }
}

/// Slice past a terminated descriptor string
fn skip_terminated(data: &[u8], encoding: u8) -> Option<&[u8]> {
    let (_, after) = terminated_len(data, encoding)?;
    Some(&data[after..])
}

/// Decode text under an ID3v2 encoding byte, trimming trailing NULs
fn decode_encoded_text(encoding: u8, bytes: &[u8]) -> String {
    let decoded = match encoding {
        0 => decode_string(bytes, StringEncoding::Latin1),
        1 => {
            // UTF-16 with BOM; default to little-endian without one.
            if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
                decode_utf16(&bytes[2..], true)
            } else if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xFE {
                decode_utf16(&bytes[2..], false)
            } else {
                decode_utf16(bytes, false)
            }
        }
        2 => decode_utf16(bytes, true),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    decoded.trim_end_matches('\0').to_string()
}

fn decode_utf16(bytes: &[u8], big_endian: bool) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}
