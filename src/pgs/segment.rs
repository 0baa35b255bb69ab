//! PGS segment framing and payload parsing.
//!
//! A PG stream is a concatenation of segments. Embedded in a Matroska Block
//! each segment has a 3-byte mini-header (type, 16-bit size); a standalone
//! `.sup` file prefixes each segment with a 13-byte header carrying a PTS.

use crate::error::Error;
use crate::functional::{Buf, Decode};

/// One segment as framed off the wire, before its body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSegment<'a> {
    /// The segment type byte (0x14 PDS, 0x15 ODS, 0x16 PCS, 0x17 WDS, 0x80 END).
    pub kind: u8,
    /// Presentation timestamp, 90 kHz ticks. Zero for Matroska-embedded segments,
    /// which carry no per-segment PTS of their own.
    pub pts: u32,
    /// The segment's undecoded body.
    pub body: &'a [u8],
}

fn read_u24(buf: &mut &[u8]) -> crate::Result<u32> {
    if buf.remaining() < 3 {
        return Err(Error::UnexpectedEndOfData);
    }
    let bytes = buf.slice(3);
    let value = ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32;
    buf.advance(3);
    Ok(value)
}

/// Frame a Matroska Block payload (3-byte mini-headers) into segments.
pub fn iter_matroska(data: &[u8]) -> impl Iterator<Item = crate::Result<RawSegment<'_>>> {
    let mut cursor = data;
    std::iter::from_fn(move || {
        if cursor.is_empty() {
            return None;
        }
        Some((|| {
            let kind = u8::decode(&mut cursor)?;
            let size = u16::decode(&mut cursor)? as usize;
            if cursor.remaining() < size {
                return Err(Error::UnexpectedEndOfData);
            }
            let body = cursor.slice(size);
            cursor.advance(size);
            Ok(RawSegment { kind, pts: 0, body })
        })())
    })
}

/// Frame a standalone `.sup` byte stream (13-byte headers) into segments.
pub fn iter_sup(data: &[u8]) -> impl Iterator<Item = crate::Result<RawSegment<'_>>> {
    let mut cursor = data;
    std::iter::from_fn(move || {
        if cursor.is_empty() {
            return None;
        }
        Some((|| {
            if cursor.remaining() < 13 {
                return Err(Error::UnexpectedEndOfData);
            }
            let magic: [u8; 2] = Decode::decode(&mut cursor)?;
            if &magic != b"PG" {
                return Err(Error::InvalidContainer("missing PG magic in .sup segment"));
            }
            let pts = u32::decode(&mut cursor)?;
            let _dts = u32::decode(&mut cursor)?;
            let kind = u8::decode(&mut cursor)?;
            let size = u16::decode(&mut cursor)? as usize;
            if cursor.remaining() < size {
                return Err(Error::UnexpectedEndOfData);
            }
            let body = cursor.slice(size);
            cursor.advance(size);
            Ok(RawSegment { kind, pts, body })
        })())
    })
}

/// Sentinel check from spec § 6: does this Matroska Block payload frame at
/// least one segment whose *type byte* is `0x80` (END)? Walks the real 3-byte
/// mini-header framing rather than scanning the raw bytes for `0x80`, since
/// that value turns up routinely inside object/palette data that has nothing
/// to do with PGS framing. Callers use this to decide whether a Block is
/// worth handing to the PGS assembler at all.
pub fn looks_like_pgs(data: &[u8]) -> bool {
    let mut cursor = data;
    while cursor.len() >= 3 {
        let kind = cursor[0];
        let size = u16::from_be_bytes([cursor[1], cursor[2]]) as usize;
        if kind == 0x80 {
            return true;
        }
        let rest = &cursor[3..];
        if rest.len() < size {
            return false;
        }
        cursor = &rest[size..];
    }
    false
}

// --- PDS ---

/// One palette entry: index plus YCbCr + alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    /// Palette index, 0..255.
    pub index: u8,
    /// Luma.
    pub y: u8,
    /// Red-difference chroma.
    pub cr: u8,
    /// Blue-difference chroma.
    pub cb: u8,
    /// Alpha.
    pub alpha: u8,
}

/// A parsed Palette Definition Segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteDefinition {
    /// Which of the 8 palette slots this updates.
    pub palette_id: u8,
    /// Monotonically increasing version number.
    pub palette_version: u8,
    /// The palette entries carried by this segment.
    pub entries: Vec<PaletteEntry>,
}

/// Parse a PDS body (§ 4.H).
pub fn parse_pds(mut body: &[u8]) -> crate::Result<PaletteDefinition> {
    let palette_id = u8::decode(&mut body)?;
    let palette_version = u8::decode(&mut body)?;
    let mut entries = Vec::new();
    while body.remaining() >= 5 {
        let index = u8::decode(&mut body)?;
        let y = u8::decode(&mut body)?;
        let cr = u8::decode(&mut body)?;
        let cb = u8::decode(&mut body)?;
        let alpha = u8::decode(&mut body)?;
        entries.push(PaletteEntry { index, y, cr, cb, alpha });
    }
    Ok(PaletteDefinition {
        palette_id,
        palette_version,
        entries,
    })
}

// --- ODS ---

/// A parsed Object Definition Segment, possibly one of several fragments
/// making up the full object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDefinitionFragment {
    /// Object this fragment belongs to.
    pub object_id: u16,
    /// Object version; bumped when the object's bitmap changes.
    pub version: u8,
    /// Whether this is the first fragment of the object (carries `size`).
    pub is_first: bool,
    /// Whether this is the last fragment of the object.
    pub is_last: bool,
    /// Width/height in pixels; only present on the first fragment.
    pub size: Option<(u16, u16)>,
    /// Declared total size of the object's run-length data; only present on
    /// the first fragment.
    pub packet_size: Option<u32>,
    /// This fragment's slice of the run-length encoded bitmap data.
    pub data: Vec<u8>,
}

/// Parse an ODS body (§ 4.H).
pub fn parse_ods(mut body: &[u8]) -> crate::Result<ObjectDefinitionFragment> {
    let object_id = u16::decode(&mut body)?;
    let version = u8::decode(&mut body)?;
    let flags = u8::decode(&mut body)?;
    let is_first = flags & 0x80 != 0;
    let is_last = flags & 0x40 != 0;

    let (packet_size, size) = if is_first {
        let packet_size = read_u24(&mut body)?;
        let width = u16::decode(&mut body)?;
        let height = u16::decode(&mut body)?;
        (Some(packet_size), Some((width, height)))
    } else {
        (None, None)
    };

    let data = body.to_vec();
    Ok(ObjectDefinitionFragment {
        object_id,
        version,
        is_first,
        is_last,
        size,
        packet_size,
        data,
    })
}

// --- PCS ---

/// The lifecycle state a PCS declares itself to be in within its epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionState {
    /// A regular update within an ongoing epoch.
    Normal,
    /// A refresh point a decoder can join the stream at, without starting a new epoch.
    AcquisitionPoint,
    /// The first composition of a new epoch; clears palette and object tables.
    EpochStart,
    /// A continuation of the current epoch (carried over e.g. across a Matroska Block boundary).
    EpochContinue,
}

impl CompositionState {
    fn from_byte(b: u8) -> crate::Result<Self> {
        match b {
            0x00 => Ok(Self::Normal),
            0x40 => Ok(Self::AcquisitionPoint),
            0x80 => Ok(Self::EpochStart),
            0xC0 => Ok(Self::EpochContinue),
            other => Err(Error::InvalidComposition(other)),
        }
    }
}

/// One composition object referenced by a PCS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionObject {
    /// The object whose bitmap is placed at `origin`.
    pub object_id: u16,
    /// The window this object is drawn within (informational; see [`WindowDefinition`]).
    pub window_id: u8,
    /// Whether this object must always be displayed (e.g. a forced narrative subtitle).
    pub is_forced: bool,
    /// Top-left corner, in video-plane pixel coordinates.
    pub origin: (i32, i32),
}

/// A parsed Presentation Composition Segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationComposition {
    /// Video width this composition was authored against.
    pub width: u16,
    /// Video height this composition was authored against.
    pub height: u16,
    /// Frame rate code (informational; not interpreted).
    pub frame_rate: u8,
    /// Monotonically increasing composition number.
    pub composition_number: u16,
    /// Epoch lifecycle state.
    pub state: CompositionState,
    /// Whether this PCS reuses the prior bitmap with only a palette change.
    pub palette_update: bool,
    /// Which palette slot this composition references.
    pub palette_id: u8,
    /// The composition's objects, in PCS order.
    pub objects: Vec<CompositionObject>,
}

/// Parse a PCS body (§ 4.H).
pub fn parse_pcs(mut body: &[u8]) -> crate::Result<PresentationComposition> {
    let width = u16::decode(&mut body)?;
    let height = u16::decode(&mut body)?;
    let frame_rate = u8::decode(&mut body)?;
    let composition_number = u16::decode(&mut body)?;
    let state = CompositionState::from_byte(u8::decode(&mut body)?)?;
    let palette_update = u8::decode(&mut body)? & 0x80 != 0;
    let palette_id = u8::decode(&mut body)?;
    let n_objects = u8::decode(&mut body)?;

    let mut objects = Vec::with_capacity(n_objects as usize);
    for _ in 0..n_objects {
        let object_id = u16::decode(&mut body)?;
        let window_id = u8::decode(&mut body)?;
        let flags = u8::decode(&mut body)?;
        let is_forced = flags & 0x40 != 0;
        let cropped = flags & 0x80 != 0;
        let x = u16::decode(&mut body)?;
        let y = u16::decode(&mut body)?;
        if cropped {
            let _crop_x = u16::decode(&mut body)?;
            let _crop_y = u16::decode(&mut body)?;
            let _crop_w = u16::decode(&mut body)?;
            let _crop_h = u16::decode(&mut body)?;
        }
        objects.push(CompositionObject {
            object_id,
            window_id,
            is_forced,
            origin: (x as i32, y as i32),
        });
    }

    Ok(PresentationComposition {
        width,
        height,
        frame_rate,
        composition_number,
        state,
        palette_update,
        palette_id,
        objects,
    })
}

// --- WDS ---

/// One window entry in a WDS. Informational: the compositor derives its
/// canvas from composition object bounding boxes, not from window rects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDefinitionEntry {
    /// Window identifier, referenced by composition objects.
    pub window_id: u8,
    /// Window origin x.
    pub x: u16,
    /// Window origin y.
    pub y: u16,
    /// Window width.
    pub width: u16,
    /// Window height.
    pub height: u16,
}

/// A parsed Window Definition Segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDefinition {
    /// The windows this WDS defines.
    pub windows: Vec<WindowDefinitionEntry>,
}

/// Parse a WDS body (§ 4.H).
pub fn parse_wds(mut body: &[u8]) -> crate::Result<WindowDefinition> {
    let n_windows = u8::decode(&mut body)?;
    let mut windows = Vec::with_capacity(n_windows as usize);
    for _ in 0..n_windows {
        let window_id = u8::decode(&mut body)?;
        let x = u16::decode(&mut body)?;
        let y = u16::decode(&mut body)?;
        let width = u16::decode(&mut body)?;
        let height = u16::decode(&mut body)?;
        windows.push(WindowDefinitionEntry {
            window_id,
            x,
            y,
            width,
            height,
        });
    }
    Ok(WindowDefinition { windows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_matroska_mini_headers() {
        let mut data = vec![0x80, 0x00, 0x00]; // END, size 0
        data.extend_from_slice(&[0x14, 0x00, 0x02, 0xAA, 0xBB]); // PDS, size 2

        let segments: Vec<_> = iter_matroska(&data).collect::<crate::Result<_>>().unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].kind, 0x80);
        assert_eq!(segments[1].kind, 0x14);
        assert_eq!(segments[1].body, &[0xAA, 0xBB]);
    }

    #[test]
    fn frames_sup_headers() {
        let mut data = vec![];
        data.extend_from_slice(b"PG");
        data.extend_from_slice(&900u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.push(0x80);
        data.extend_from_slice(&0u16.to_be_bytes());

        let segments: Vec<_> = iter_sup(&data).collect::<crate::Result<_>>().unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].pts, 900);
        assert_eq!(segments[0].kind, 0x80);
    }

    #[test]
    fn looks_like_pgs_finds_an_end_segment_by_its_type_byte() {
        let mut data = vec![0x14, 0x00, 0x02, 0xAA, 0xBB]; // PDS, size 2
        data.extend_from_slice(&[0x80, 0x00, 0x00]); // END, size 0
        assert!(looks_like_pgs(&data));
    }

    #[test]
    fn looks_like_pgs_ignores_0x80_inside_segment_bodies() {
        // PDS whose body happens to contain the byte 0x80, and no END segment.
        let data = vec![0x14, 0x00, 0x02, 0x80, 0x80];
        assert!(!looks_like_pgs(&data));
    }

    #[test]
    fn looks_like_pgs_rejects_truncated_framing() {
        let data = vec![0x14, 0x00, 0xFF]; // declares 255 bytes of body, has none
        assert!(!looks_like_pgs(&data));
    }

    #[test]
    fn rejects_bad_sup_magic() {
        let mut data = vec![];
        data.extend_from_slice(b"XX");
        data.extend_from_slice(&[0u8; 11]);
        assert!(iter_sup(&data).next().unwrap().is_err());
    }

    #[test]
    fn parses_pds_entries() {
        let body = [0u8, 1, 1, 180, 150, 100, 255];
        let pds = parse_pds(&body).unwrap();
        assert_eq!(pds.palette_id, 0);
        assert_eq!(pds.palette_version, 1);
        assert_eq!(pds.entries.len(), 1);
        assert_eq!(pds.entries[0].index, 1);
        assert_eq!(pds.entries[0].alpha, 255);
    }

    #[test]
    fn parses_first_and_continuation_ods() {
        let mut first = vec![0u8, 1]; // object_id = 1
        first.push(5); // version
        first.push(0x80); // first, not last
        first.extend_from_slice(&[0, 0, 3]); // packet_size = 3
        first.extend_from_slice(&2u16.to_be_bytes());
        first.extend_from_slice(&1u16.to_be_bytes());
        first.push(0xAA);

        let ods = parse_ods(&first).unwrap();
        assert!(ods.is_first);
        assert!(!ods.is_last);
        assert_eq!(ods.size, Some((2, 1)));
        assert_eq!(ods.packet_size, Some(3));
        assert_eq!(ods.data, vec![0xAA]);

        let mut cont = vec![0u8, 1, 5, 0x40];
        cont.push(0xBB);
        let ods2 = parse_ods(&cont).unwrap();
        assert!(!ods2.is_first);
        assert!(ods2.is_last);
        assert_eq!(ods2.size, None);
        assert_eq!(ods2.data, vec![0xBB]);
    }

    #[test]
    fn parses_pcs_with_one_object() {
        let mut body = vec![];
        body.extend_from_slice(&2u16.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        body.push(0x10); // frame_rate
        body.extend_from_slice(&0u16.to_be_bytes());
        body.push(0x80); // EpochStart
        body.push(0x00); // no palette update
        body.push(0); // palette_id
        body.push(1); // n_objects
        body.extend_from_slice(&0u16.to_be_bytes()); // object_id
        body.push(0); // window_id
        body.push(0x00); // flags
        body.extend_from_slice(&0u16.to_be_bytes()); // x
        body.extend_from_slice(&0u16.to_be_bytes()); // y

        let pcs = parse_pcs(&body).unwrap();
        assert_eq!(pcs.state, CompositionState::EpochStart);
        assert_eq!(pcs.objects.len(), 1);
        assert_eq!(pcs.objects[0].object_id, 0);
        assert_eq!(pcs.objects[0].origin, (0, 0));
    }
}
