//! Track descriptors decoded from a `TrackEntry` subtree.

use std::fmt;

use crate::master::TrackEntry;

/// Content encoding applied to a track's frame data (typically compression).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentEncoding {
    /// Compression/encryption algorithm. 0 = zlib, 1 = bzlib, 2 = lzo1x, 3 = header-strip.
    pub algorithm: u64,
    /// Bitmask: bit 1 = applies to track frames, bit 2 = applies to private data.
    pub scope: u64,
    /// 0 = compression, 1 = encryption.
    pub kind: u64,
}

impl ContentEncoding {
    /// Whether this encoding is zlib compression scoped to the frame data (bit 1).
    pub fn is_zlib_on_frames(&self) -> bool {
        self.kind == 0 && self.scope & 1 != 0 && self.algorithm == 0
    }
}

/// A decoded `TrackEntry`, describing one track in a Matroska Segment.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackDescriptor {
    /// The track number as referenced from Block headers (1-based).
    pub track_number: u64,
    /// Codec identifier, e.g. `S_TEXT/UTF8`, `S_HDMV/PGS`.
    pub codec_id: String,
    /// Human-readable track name, if present.
    pub name: Option<String>,
    /// Language of the track, ISO 639-2/B; defaults to "eng".
    pub language: String,
    /// Default frame duration in nanoseconds, if the track has a constant frame rate.
    pub default_duration_ns: Option<u64>,
    /// Whether this is a video track (TrackType == 1).
    pub is_video: bool,
    /// Whether this is an audio track (TrackType == 2).
    pub is_audio: bool,
    /// Whether this is a subtitle track (TrackType == 17).
    pub is_subtitle: bool,
    /// Whether the track is eligible for playback by default.
    pub is_default: bool,
    /// Whether the track must be played regardless of user preference.
    ///
    /// Kept separate from `is_default`: the original decoder this crate is
    /// modeled on conflated `FlagForced` into `is_default`; this crate tracks
    /// the two independently.
    pub is_forced: bool,
    /// The first content encoding declared for this track, if any.
    pub content_encoding: Option<ContentEncoding>,
}

impl TrackDescriptor {
    /// Frame rate in frames per second, derived from `default_duration_ns`, if known.
    pub fn frame_rate(&self) -> Option<f64> {
        self.default_duration_ns
            .filter(|&d| d > 0)
            .map(|d| 1_000_000_000.0 / d as f64)
    }
}

impl fmt::Display for TrackDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Codec: {} , Duration: {:?} , Name: {:?} , Language: {} , Subtitle? {} , Video? {}",
            self.codec_id,
            self.default_duration_ns,
            self.name,
            self.language,
            self.is_subtitle,
            self.is_video
        )
    }
}

impl From<&TrackEntry> for TrackDescriptor {
    fn from(entry: &TrackEntry) -> Self {
        let track_type = *entry.track_type;
        let content_encoding = entry
            .content_encodings
            .as_ref()
            .and_then(|encs| encs.content_encoding.first())
            .map(|enc| ContentEncoding {
                algorithm: enc
                    .content_compression
                    .as_ref()
                    .and_then(|c| c.content_comp_algo.as_ref())
                    .map(|a| **a)
                    .unwrap_or(0),
                scope: enc
                    .content_encoding_scope
                    .as_ref()
                    .map(|s| **s)
                    .unwrap_or(1),
                kind: enc
                    .content_encoding_type
                    .as_ref()
                    .map(|t| **t)
                    .unwrap_or(0),
            });

        Self {
            track_number: *entry.track_number,
            codec_id: entry.codec_id.0.clone(),
            name: entry.name.as_ref().map(|n| n.0.clone()),
            language: entry
                .language
                .as_ref()
                .map(|l| l.0.clone())
                .unwrap_or_else(|| "eng".to_string()),
            default_duration_ns: entry.default_duration.as_ref().map(|d| **d),
            is_video: track_type == 1,
            is_audio: track_type == 2,
            is_subtitle: track_type == 17,
            is_default: entry.flag_default.as_ref().map(|f| **f != 0).unwrap_or(true),
            is_forced: entry.flag_forced.as_ref().map(|f| **f != 0).unwrap_or(false),
            content_encoding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::*;
    use crate::master::*;

    fn subtitle_entry(forced: bool, default: bool) -> TrackEntry {
        TrackEntry {
            crc32: None,
            void: None,
            track_number: TrackNumber(2),
            track_uid: TrackUid(1234),
            track_type: TrackType(17),
            flag_default: Some(FlagDefault(default as u64)),
            flag_forced: Some(FlagForced(forced as u64)),
            name: None,
            language: None,
            codec_id: CodecId("S_HDMV/PGS".to_string()),
            codec_private: None,
            default_duration: None,
            video: None,
            audio: None,
            content_encodings: None,
        }
    }

    #[test]
    fn is_default_and_is_forced_are_independent() {
        let entry = subtitle_entry(true, false);
        let track = TrackDescriptor::from(&entry);
        assert!(track.is_forced);
        assert!(!track.is_default);
        assert!(track.is_subtitle);
        assert_eq!(track.language, "eng");
    }

    #[test]
    fn defaults_apply_when_flags_absent() {
        let mut entry = subtitle_entry(false, true);
        entry.flag_default = None;
        entry.flag_forced = None;
        let track = TrackDescriptor::from(&entry);
        assert!(track.is_default);
        assert!(!track.is_forced);
    }
}
