//! Audio metadata model and tag-key mapping
//!
//! [`AudioMetadata`] is a sparse record: every field is optional and
//! formats fill in what they carry. The Vorbis-comment key mapping lives
//! here because FLAC and OGG share it; ID3 frame mapping lives with the
//! MP3 code and RIFF INFO mapping with the WAV code.

use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;

/// ReplayGain loudness values
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayGain {
    pub track_gain: Option<f64>,
    pub track_peak: Option<f64>,
    pub album_gain: Option<f64>,
    pub album_peak: Option<f64>,
}

impl ReplayGain {
    /// Whether no value is set
    pub fn is_empty(&self) -> bool {
        self.track_gain.is_none()
            && self.track_peak.is_none()
            && self.album_gain.is_none()
            && self.album_peak.is_none()
    }
}

/// Embedded cover art
#[derive(Debug, Clone, Serialize)]
pub struct CoverArt {
    #[serde(skip)]
    pub data: Bytes,
    pub mime_type: String,
    pub description: String,
}

/// Sparse audio file metadata
#[derive(Debug, Clone, Default, Serialize)]
pub struct AudioMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub composer: Option<String>,
    pub genre: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    pub track_total: Option<u32>,
    pub disc_number: Option<u32>,
    pub disc_total: Option<u32>,
    pub comment: Option<String>,
    pub lyrics: Option<String>,
    pub copyright: Option<String>,
    pub encoded_by: Option<String>,
    pub encoder: Option<String>,
    pub date: Option<String>,
    pub isrc: Option<String>,
    pub bpm: Option<u32>,
    pub replay_gain: ReplayGain,
    pub cover_art: Vec<CoverArt>,
    /// Keys with no dedicated field
    pub custom: HashMap<String, String>,
}

impl AudioMetadata {
    /// Whether nothing at all is set
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.album_artist.is_none()
            && self.composer.is_none()
            && self.genre.is_none()
            && self.year.is_none()
            && self.track_number.is_none()
            && self.track_total.is_none()
            && self.disc_number.is_none()
            && self.disc_total.is_none()
            && self.comment.is_none()
            && self.lyrics.is_none()
            && self.copyright.is_none()
            && self.encoded_by.is_none()
            && self.encoder.is_none()
            && self.date.is_none()
            && self.isrc.is_none()
            && self.bpm.is_none()
            && self.replay_gain.is_empty()
            && self.cover_art.is_empty()
            && self.custom.is_empty()
    }

    /// Fill unset fields from `other` (used to layer ID3v1 under ID3v2)
    pub fn merge_fallback(&mut self, other: AudioMetadata) {
        macro_rules! fill {
            ($($field:ident),*) => {
                $(if self.$field.is_none() { self.$field = other.$field; })*
            };
        }
        fill!(
            title,
            artist,
            album,
            album_artist,
            composer,
            genre,
            year,
            track_number,
            track_total,
            disc_number,
            disc_total,
            comment,
            lyrics,
            copyright,
            encoded_by,
            encoder,
            date,
            isrc,
            bpm
        );
        if self.replay_gain.is_empty() {
            self.replay_gain = other.replay_gain;
        }
        if self.cover_art.is_empty() {
            self.cover_art = other.cover_art;
        }
        for (key, value) in other.custom {
            self.custom.entry(key).or_insert(value);
        }
    }

    /// Apply a single Vorbis comment (key already uppercased on store)
    pub fn apply_vorbis_comment(&mut self, key: &str, value: &str) {
        match key {
            "TITLE" => self.title = Some(value.to_string()),
            "ARTIST" => self.artist = Some(value.to_string()),
            "ALBUM" => self.album = Some(value.to_string()),
            "ALBUMARTIST" => self.album_artist = Some(value.to_string()),
            "COMPOSER" => self.composer = Some(value.to_string()),
            "GENRE" => self.genre = Some(value.to_string()),
            "DATE" => {
                self.date = Some(value.to_string());
                // Year is the first four characters; non-numeric prefixes
                // are dropped silently.
                if let Some(year) = value.get(..4).and_then(|y| y.parse::<u32>().ok()) {
                    self.year = Some(year);
                }
            }
            "TRACKNUMBER" => {
                let (number, total) = parse_number_pair(value);
                self.track_number = number;
                if total.is_some() {
                    self.track_total = total;
                }
            }
            "TRACKTOTAL" | "TOTALTRACKS" => self.track_total = value.trim().parse().ok(),
            "DISCNUMBER" => {
                let (number, total) = parse_number_pair(value);
                self.disc_number = number;
                if total.is_some() {
                    self.disc_total = total;
                }
            }
            "DISCTOTAL" | "TOTALDISCS" => self.disc_total = value.trim().parse().ok(),
            "COMMENT" | "DESCRIPTION" => self.comment = Some(value.to_string()),
            "COPYRIGHT" => self.copyright = Some(value.to_string()),
            "ENCODER" => self.encoder = Some(value.to_string()),
            "ISRC" => self.isrc = Some(value.to_string()),
            "BPM" => self.bpm = value.trim().parse().ok(),
            "LYRICS" | "UNSYNCEDLYRICS" => self.lyrics = Some(value.to_string()),
            "REPLAYGAIN_TRACK_GAIN" => self.replay_gain.track_gain = parse_gain(value),
            "REPLAYGAIN_TRACK_PEAK" => self.replay_gain.track_peak = parse_gain(value),
            "REPLAYGAIN_ALBUM_GAIN" => self.replay_gain.album_gain = parse_gain(value),
            "REPLAYGAIN_ALBUM_PEAK" => self.replay_gain.album_peak = parse_gain(value),
            _ => {
                self.custom.insert(key.to_string(), value.to_string());
            }
        }
    }

    /// Emit the metadata back out as Vorbis comment key/value pairs
    pub fn to_vorbis_comments(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let mut push = |key: &str, value: &Option<String>| {
            if let Some(v) = value {
                out.push((key.to_string(), v.clone()));
            }
        };
        push("TITLE", &self.title);
        push("ARTIST", &self.artist);
        push("ALBUM", &self.album);
        push("ALBUMARTIST", &self.album_artist);
        push("COMPOSER", &self.composer);
        push("GENRE", &self.genre);
        push("COMMENT", &self.comment);
        push("COPYRIGHT", &self.copyright);
        push("ENCODER", &self.encoder);
        push("ISRC", &self.isrc);
        push("LYRICS", &self.lyrics);
        if let Some(date) = &self.date {
            out.push(("DATE".to_string(), date.clone()));
        } else if let Some(year) = self.year {
            out.push(("DATE".to_string(), year.to_string()));
        }
        if let Some(n) = self.track_number {
            out.push(("TRACKNUMBER".to_string(), n.to_string()));
        }
        if let Some(n) = self.track_total {
            out.push(("TRACKTOTAL".to_string(), n.to_string()));
        }
        if let Some(n) = self.disc_number {
            out.push(("DISCNUMBER".to_string(), n.to_string()));
        }
        if let Some(n) = self.disc_total {
            out.push(("DISCTOTAL".to_string(), n.to_string()));
        }
        if let Some(n) = self.bpm {
            out.push(("BPM".to_string(), n.to_string()));
        }
        for (key, value) in &self.custom {
            out.push((key.clone(), value.clone()));
        }
        out
    }
}

/// Parse `"3"` or `"3/12"` into (number, total)
pub fn parse_number_pair(value: &str) -> (Option<u32>, Option<u32>) {
    let mut parts = value.trim().splitn(2, '/');
    let number = parts.next().and_then(|p| p.trim().parse().ok());
    let total = parts.next().and_then(|p| p.trim().parse().ok());
    (number, total)
}

/// Parse a ReplayGain value like `"-6.54 dB"` or `"0.988"`
fn parse_gain(value: &str) -> Option<f64> {
    value.trim().split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vorbis_mapping_basic() {
        let mut m = AudioMetadata::default();
        m.apply_vorbis_comment("TITLE", "Song");
        m.apply_vorbis_comment("ARTIST", "Someone");
        m.apply_vorbis_comment("TRACKNUMBER", "3/12");
        m.apply_vorbis_comment("DATE", "2019-05-01");
        assert_eq!(m.title.as_deref(), Some("Song"));
        assert_eq!(m.artist.as_deref(), Some("Someone"));
        assert_eq!(m.track_number, Some(3));
        assert_eq!(m.track_total, Some(12));
        assert_eq!(m.year, Some(2019));
        assert_eq!(m.date.as_deref(), Some("2019-05-01"));
    }

    #[test]
    fn test_vorbis_non_numeric_date_drops_year() {
        let mut m = AudioMetadata::default();
        m.apply_vorbis_comment("DATE", "circa 2001");
        assert_eq!(m.year, None);
        assert_eq!(m.date.as_deref(), Some("circa 2001"));
    }

    #[test]
    fn test_vorbis_replaygain() {
        let mut m = AudioMetadata::default();
        m.apply_vorbis_comment("REPLAYGAIN_TRACK_GAIN", "-6.54 dB");
        m.apply_vorbis_comment("REPLAYGAIN_ALBUM_PEAK", "0.987654");
        assert_eq!(m.replay_gain.track_gain, Some(-6.54));
        assert_eq!(m.replay_gain.album_peak, Some(0.987654));
    }

    #[test]
    fn test_unknown_key_goes_to_custom() {
        let mut m = AudioMetadata::default();
        m.apply_vorbis_comment("CATALOGNUMBER", "XYZ-1");
        assert_eq!(m.custom.get("CATALOGNUMBER").map(String::as_str), Some("XYZ-1"));
    }

    #[test]
    fn test_merge_fallback_prefers_existing() {
        let mut primary = AudioMetadata {
            title: Some("Keep".into()),
            ..Default::default()
        };
        let fallback = AudioMetadata {
            title: Some("Drop".into()),
            artist: Some("Adopt".into()),
            ..Default::default()
        };
        primary.merge_fallback(fallback);
        assert_eq!(primary.title.as_deref(), Some("Keep"));
        assert_eq!(primary.artist.as_deref(), Some("Adopt"));
    }

    #[test]
    fn test_number_pair() {
        assert_eq!(parse_number_pair("7"), (Some(7), None));
        assert_eq!(parse_number_pair("7/10"), (Some(7), Some(10)));
        assert_eq!(parse_number_pair("x"), (None, None));
    }

    #[test]
    fn test_is_empty() {
        assert!(AudioMetadata::default().is_empty());
        let mut m = AudioMetadata::default();
        m.bpm = Some(120);
        assert!(!m.is_empty());
    }
}
