//! Leaf (non-master) Matroska/EBML elements.
//!
//! The upstream crate generated these from the Matroska XML schema via a
//! `build.rs` step; without that schema available here they are hand-written,
//! but follow the same shape: a newtype over the element's primitive type,
//! `Deref`-ing to it, implementing [`Element`] directly.

use crate::base::VInt64;
use crate::element::Element;
use crate::functional::*;
use std::ops::Deref;

fn decode_uint(buf: &mut &[u8]) -> crate::Result<u64> {
    if buf.is_empty() {
        return Ok(0);
    }
    if buf.remaining() > 8 {
        return Err(crate::Error::UnderDecode(VInt64::from_encoded(0)));
    }
    let len = buf.remaining();
    let mut value = [0u8; 8];
    value[8 - len..].copy_from_slice(buf.slice(len));
    buf.advance(len);
    Ok(u64::from_be_bytes(value))
}

fn encode_uint<B: BufMut>(value: u64, buf: &mut B) -> crate::Result<()> {
    let bytes = value.to_be_bytes();
    let first_non_zero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    buf.append_slice(&bytes[first_non_zero..]);
    Ok(())
}

fn decode_int(buf: &mut &[u8]) -> crate::Result<i64> {
    if buf.is_empty() {
        return Ok(0);
    }
    if buf.remaining() > 8 {
        return Err(crate::Error::UnderDecode(VInt64::from_encoded(0)));
    }
    let len = buf.remaining();
    let negative = buf.slice(1)[0] & 0x80 != 0;
    let fill = if negative { 0xFFu8 } else { 0u8 };
    let mut value = [fill; 8];
    value[8 - len..].copy_from_slice(buf.slice(len));
    buf.advance(len);
    Ok(i64::from_be_bytes(value))
}

fn encode_int<B: BufMut>(value: i64, buf: &mut B) -> crate::Result<()> {
    let bytes = value.to_be_bytes();
    if value >= 0 {
        let first_non_zero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
        buf.append_slice(&bytes[first_non_zero..]);
    } else {
        let first_non_ff = bytes.iter().position(|&b| b != 0xFF).unwrap_or(0);
        // keep at least one sign byte so the top bit stays set
        let start = if first_non_ff > 0 && bytes[first_non_ff] & 0x80 == 0 {
            first_non_ff - 1
        } else {
            first_non_ff
        };
        buf.append_slice(&bytes[start..]);
    }
    Ok(())
}

fn decode_float(buf: &mut &[u8]) -> crate::Result<f64> {
    match buf.remaining() {
        0 => Ok(0.0),
        4 => {
            let bytes: [u8; 4] = Decode::decode(buf)?;
            Ok(f32::from_be_bytes(bytes) as f64)
        }
        8 => {
            let bytes: [u8; 8] = Decode::decode(buf)?;
            Ok(f64::from_be_bytes(bytes))
        }
        _ => Err(crate::Error::UnderDecode(VInt64::from_encoded(0))),
    }
}

fn encode_float<B: BufMut>(value: f64, buf: &mut B) -> crate::Result<()> {
    buf.append_slice(&value.to_be_bytes());
    Ok(())
}

fn decode_text(buf: &mut &[u8]) -> crate::Result<String> {
    let bytes = buf.slice(buf.remaining()).to_vec();
    buf.advance(bytes.len());
    String::from_utf8(bytes).map_err(|_| crate::Error::UnderDecode(VInt64::from_encoded(0)))
}

fn encode_text<B: BufMut>(value: &str, buf: &mut B) -> crate::Result<()> {
    buf.append_slice(value.as_bytes());
    Ok(())
}

fn decode_bin(buf: &mut &[u8]) -> crate::Result<Vec<u8>> {
    let bytes = buf.slice(buf.remaining()).to_vec();
    buf.advance(bytes.len());
    Ok(bytes)
}

fn encode_bin<B: BufMut>(value: &[u8], buf: &mut B) -> crate::Result<()> {
    buf.append_slice(value);
    Ok(())
}

macro_rules! uint_leaf {
    ($(#[$meta:meta])* $name:ident, $id:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
        impl Deref for $name {
            type Target = u64;
            fn deref(&self) -> &u64 { &self.0 }
        }
        impl Element for $name {
            const ID: VInt64 = VInt64::from_encoded($id);
            fn decode_body(buf: &mut &[u8]) -> crate::Result<Self> {
                Ok(Self(decode_uint(buf)?))
            }
            fn encode_body<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
                encode_uint(self.0, buf)
            }
        }
    };
    ($(#[$meta:meta])* $name:ident, $id:expr, default = $default:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
        impl Deref for $name {
            type Target = u64;
            fn deref(&self) -> &u64 { &self.0 }
        }
        impl Default for $name {
            fn default() -> Self { Self($default) }
        }
        impl Element for $name {
            const ID: VInt64 = VInt64::from_encoded($id);
            const HAS_DEFAULT_VALUE: bool = true;
            fn decode_body(buf: &mut &[u8]) -> crate::Result<Self> {
                Ok(Self(decode_uint(buf)?))
            }
            fn encode_body<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
                encode_uint(self.0, buf)
            }
        }
    };
}

macro_rules! int_leaf {
    ($(#[$meta:meta])* $name:ident, $id:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub i64);
        impl Deref for $name {
            type Target = i64;
            fn deref(&self) -> &i64 { &self.0 }
        }
        impl Element for $name {
            const ID: VInt64 = VInt64::from_encoded($id);
            fn decode_body(buf: &mut &[u8]) -> crate::Result<Self> {
                Ok(Self(decode_int(buf)?))
            }
            fn encode_body<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
                encode_int(self.0, buf)
            }
        }
    };
}

macro_rules! float_leaf {
    ($(#[$meta:meta])* $name:ident, $id:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
        pub struct $name(pub f64);
        impl Deref for $name {
            type Target = f64;
            fn deref(&self) -> &f64 { &self.0 }
        }
        impl Element for $name {
            const ID: VInt64 = VInt64::from_encoded($id);
            fn decode_body(buf: &mut &[u8]) -> crate::Result<Self> {
                Ok(Self(decode_float(buf)?))
            }
            fn encode_body<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
                encode_float(self.0, buf)
            }
        }
    };
}

macro_rules! text_leaf {
    ($(#[$meta:meta])* $name:ident, $id:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub String);
        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str { &self.0 }
        }
        impl Element for $name {
            const ID: VInt64 = VInt64::from_encoded($id);
            fn decode_body(buf: &mut &[u8]) -> crate::Result<Self> {
                Ok(Self(decode_text(buf)?))
            }
            fn encode_body<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
                encode_text(&self.0, buf)
            }
        }
    };
    ($(#[$meta:meta])* $name:ident, $id:expr, default = $default:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub String);
        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str { &self.0 }
        }
        impl Default for $name {
            fn default() -> Self { Self($default.to_string()) }
        }
        impl Element for $name {
            const ID: VInt64 = VInt64::from_encoded($id);
            const HAS_DEFAULT_VALUE: bool = true;
            fn decode_body(buf: &mut &[u8]) -> crate::Result<Self> {
                Ok(Self(decode_text(buf)?))
            }
            fn encode_body<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
                encode_text(&self.0, buf)
            }
        }
    };
}

macro_rules! bin_leaf {
    ($(#[$meta:meta])* $name:ident, $id:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub Vec<u8>);
        impl Deref for $name {
            type Target = [u8];
            fn deref(&self) -> &[u8] { &self.0 }
        }
        impl Element for $name {
            const ID: VInt64 = VInt64::from_encoded($id);
            fn decode_body(buf: &mut &[u8]) -> crate::Result<Self> {
                Ok(Self(decode_bin(buf)?))
            }
            fn encode_body<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
                encode_bin(&self.0, buf)
            }
        }
    };
}

// --- EBML header leaves ---

uint_leaf!(
    /// Maximum length, in octets, of the IDs in this EBML document.
    EbmlMaxIdLength, 0x42F2, default = 4
);
uint_leaf!(
    /// Maximum length, in octets, of the sizes in this EBML document.
    EbmlMaxSizeLength, 0x42F3, default = 8
);
uint_leaf!(
    /// The version of EBML parser used to create this document.
    EbmlVersion, 0x4286, default = 1
);
uint_leaf!(
    /// Minimum version of EBML parser needed to read this document.
    EbmlReadVersion, 0x42F7, default = 1
);
text_leaf!(
    /// A string identifying the type of document, e.g. "matroska" or "webm".
    DocType, 0x4282
);
uint_leaf!(
    /// Version of the DocType this document follows.
    DocTypeVersion, 0x4287, default = 1
);
uint_leaf!(
    /// Minimum DocType version an implementation must support to read this document.
    DocTypeReadVersion, 0x4285, default = 1
);

// --- Seeking leaves ---

bin_leaf!(
    /// Binary EBML ID of a Top-Level Element.
    SeekId, 0x53AB
);
uint_leaf!(
    /// Segment Position of a Top-Level Element.
    SeekPosition, 0x53AC
);

// --- Segment Info leaves ---

bin_leaf!(
    /// Random, unique 128-bit ID identifying a Segment.
    SegmentUuid, 0x73A4
);
text_leaf!(
    /// Filename corresponding to this Segment.
    SegmentFilename, 0x7384
);
bin_leaf!(
    /// ID of the previous Segment of a Linked Segment.
    PrevUuid, 0x3CB923
);
text_leaf!(
    /// Filename corresponding to the previous Linked Segment.
    PrevFilename, 0x3C83AB
);
bin_leaf!(
    /// ID of the next Segment of a Linked Segment.
    NextUuid, 0x3EB923
);
text_leaf!(
    /// Filename corresponding to the next Linked Segment.
    NextFilename, 0x3E83BB
);
bin_leaf!(
    /// Unique ID shared by all Segments of a Linked Segment.
    SegmentFamily, 0x4444
);
bin_leaf!(
    /// Mapping value used in the given Chapter Codec's data.
    ChapterTranslateId, 0x69A5
);
uint_leaf!(
    /// The chapter codec this translation applies to (0 = Matroska Script, 1 = DVD-menu).
    ChapterTranslateCodec, 0x69BF
);
uint_leaf!(
    /// A chapter edition UID this ChapterTranslate applies to.
    ChapterTranslateEditionUid, 0x69FC
);
uint_leaf!(
    /// Base unit for Segment/Track Ticks, in nanoseconds.
    TimestampScale, 0x2AD7B1, default = 1_000_000
);
float_leaf!(
    /// Duration of the Segment, in Segment Ticks.
    Duration, 0x4489
);
bin_leaf!(
    /// Date and time the Segment was created, as an 8-byte EBML date.
    DateUtc, 0x4461
);
text_leaf!(
    /// General name of the Segment.
    Title, 0x7BA9
);
text_leaf!(
    /// Muxing application or library.
    MuxingApp, 0x4D80, default = ""
);
text_leaf!(
    /// Writing application.
    WritingApp, 0x5741, default = ""
);

// --- Cluster/Block leaves ---

uint_leaf!(
    /// Absolute timestamp of the Cluster, in Segment Ticks.
    Timestamp, 0xE7
);
uint_leaf!(
    /// Segment Position of the Cluster.
    Position, 0xA7
);
uint_leaf!(
    /// Size, in octets, of the previous Cluster.
    PrevSize, 0xAB
);
bin_leaf!(
    /// Raw Block payload: track number VINT, relative timestamp, flags, frame data.
    Block, 0xA1
);
bin_leaf!(
    /// Raw SimpleBlock payload, same layout as [`Block`].
    SimpleBlock, 0xA3
);
uint_leaf!(
    /// Cache priority of a referenced frame; 0 means unreferenced.
    ReferencePriority, 0xFA, default = 0
);
int_leaf!(
    /// Relative timestamp of another frame this Block depends on.
    ReferenceBlock, 0xFB
);
bin_leaf!(
    /// New codec state, interpretation private to the codec.
    CodecState, 0xA4
);
int_leaf!(
    /// Duration of padding added to the Block, in nanoseconds.
    DiscardPadding, 0x75A2
);
uint_leaf!(
    /// Duration of the Block, in Track Ticks.
    BlockDuration, 0x9B
);
bin_leaf!(
    /// Interpreted by the codec using BlockAddId.
    BlockAdditional, 0xA5
);
uint_leaf!(
    /// Identifies how to interpret BlockAdditional data.
    BlockAddId, 0xEE, default = 1
);

// --- Track leaves ---

uint_leaf!(
    /// The track number, as referenced by Blocks.
    TrackNumber, 0xD7
);
uint_leaf!(
    /// A unique ID to identify the track.
    TrackUid, 0x73C5
);
uint_leaf!(
    /// The type of track: 1 = video, 2 = audio, 17 = subtitle.
    TrackType, 0x83
);
uint_leaf!(
    /// Whether the track is eligible for playback by default.
    FlagDefault, 0x88, default = 1
);
uint_leaf!(
    /// Whether the track **must** be played, regardless of user preferences.
    FlagForced, 0x55AA, default = 0
);
text_leaf!(
    /// Human-readable track name.
    Name, 0x536E
);
text_leaf!(
    /// Language of the track, ISO 639-2/B.
    Language, 0x22B59C, default = "eng"
);
text_leaf!(
    /// An ID corresponding to the codec, e.g. `S_TEXT/UTF8`, `S_HDMV/PGS`.
    CodecId, 0x86
);
bin_leaf!(
    /// Private data only known to the codec.
    CodecPrivate, 0x63A2
);
uint_leaf!(
    /// Default duration of a frame, in nanoseconds, for constant-frame-rate tracks.
    DefaultDuration, 0x23E383
);
uint_leaf!(
    /// Width of the video frame, in pixels.
    PixelWidth, 0xB0
);
uint_leaf!(
    /// Height of the video frame, in pixels.
    PixelHeight, 0xBA
);
uint_leaf!(
    /// Order in which ContentEncodings are applied; lower values apply first.
    ContentEncodingOrder, 0x5031, default = 0
);
uint_leaf!(
    /// Scope of this ContentEncoding: bit 1 = the frame data, bit 2 = private data.
    ContentEncodingScope, 0x5032, default = 1
);
uint_leaf!(
    /// Type of content encoding: 0 = compression, 1 = encryption.
    ContentEncodingType, 0x5033, default = 0
);
uint_leaf!(
    /// Compression algorithm used: 0 = zlib, 1 = bzlib, 2 = lzo1x, 3 = header-strip.
    ContentCompAlgo, 0x4254, default = 0
);
bin_leaf!(
    /// Settings for the compression algorithm, e.g. the header bytes for header-strip.
    ContentCompSettings, 0x4255
);
