//! Top-level extraction pipeline: open a Matroska/WebM file, read its track
//! list, and decode subtitle events for a chosen track (spec § 6).

use std::io::{Read, Seek};
use std::path::Path;

use crate::byte_source::{BufferedSource, MmapSource};
use crate::decompress::{decompress, normalize_text};
use crate::event::{PgsEvent, TextEvent};
use crate::master::{Cluster, Tracks};
use crate::pgs::compositor::composite;
use crate::pgs::epoch::EpochAssembler;
use crate::pgs::palette::ColorModel;
use crate::pgs::segment::{iter_matroska, iter_sup, looks_like_pgs};
use crate::segment::SegmentScanner;
use crate::track::TrackDescriptor;
use crate::Error;

/// Reads tracks and subtitle events out of a Matroska/WebM Segment.
pub struct MkvSubtitles<S> {
    scanner: SegmentScanner<S>,
    tracks: Vec<TrackDescriptor>,
    /// Nanoseconds per Segment Tick (the unit Block/Cluster timestamps are in).
    timestamp_scale_ns: i64,
}

impl MkvSubtitles<MmapSource> {
    /// Open `path`, memory-mapping the file for random access.
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        Self::from_source(MmapSource::open(path)?)
    }
}

impl MkvSubtitles<BufferedSource> {
    /// Open `path` through a buffered sequential reader, for sources mmap can't handle.
    pub fn open_buffered(path: impl AsRef<Path>) -> crate::Result<Self> {
        Self::from_source(BufferedSource::open(path)?)
    }
}

impl<S: Read + Seek> MkvSubtitles<S> {
    /// Wrap an already-open byte source: reads the EBML/Segment headers and
    /// the Segment's Info and Tracks elements up front.
    pub fn from_source(source: S) -> crate::Result<Self> {
        let mut scanner = SegmentScanner::open(source)?;
        let (info, tracks) = scanner.read_info_and_tracks()?;

        let timestamp_scale_ns = info.map(|i| *i.timestamp_scale as i64).unwrap_or(1_000_000);
        let tracks = tracks
            .map(|t: Tracks| t.track_entry.iter().map(|e| TrackDescriptor::from(e)).collect())
            .unwrap_or_default();

        Ok(Self {
            scanner,
            tracks,
            timestamp_scale_ns,
        })
    }

    /// The tracks declared by this Segment's `Tracks` element.
    pub fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    fn track(&self, track_number: u64) -> crate::Result<TrackDescriptor> {
        self.tracks
            .iter()
            .find(|t| t.track_number == track_number)
            .cloned()
            .ok_or(Error::InvalidContainer("unknown track number"))
    }

    /// Decode every plain-text subtitle event for `track_number`, applying
    /// [`decompress`] and [`normalize_text`] to each frame's payload.
    ///
    /// Events with no known duration (no `BlockDuration` and no track
    /// `DefaultDuration`) have their end time repaired to the next event's
    /// start time, the same overlap-repair rule PGS epochs use (spec § 4.F).
    pub fn text_events(&mut self, track_number: u64) -> crate::Result<Vec<TextEvent>> {
        let track = self.track(track_number)?;
        let default_duration_ticks = track
            .default_duration_ns
            .map(|ns| ns as i64 / self.timestamp_scale_ns);
        let scale = self.timestamp_scale_ns;

        let mut events = Vec::new();
        self.scanner.read_clusters(
            |cluster: Cluster| {
                for frame in cluster.frames(default_duration_ticks)? {
                    if frame.track_number != track_number {
                        continue;
                    }
                    let payload = decompress(track.content_encoding.as_ref(), frame.data)?;
                    let text = normalize_text(&payload);
                    let start_ms = frame.timestamp * scale / 1_000_000;
                    let end_ms = (frame.timestamp + frame.duration_ticks) * scale / 1_000_000;
                    events.push(TextEvent {
                        start_ms,
                        end_ms,
                        text,
                        track_number,
                    });
                }
                Ok(())
            },
            |_pos| {},
        )?;

        repair_zero_duration_events(&mut events);
        Ok(events)
    }

    /// Decode every PGS subtitle event for `track_number`, compositing each
    /// completed composition into an RGBA bitmap under `model`.
    ///
    /// Each Block's own start time (converted to 90 kHz ticks, spec § 6) is
    /// fed to the assembler as the PTS of every PGS segment it carries, since
    /// Matroska-embedded PGS segments have no PTS of their own.
    ///
    /// A Block whose mini-header framing doesn't parse (e.g. a truncated
    /// 3-byte segment header) is logged and skipped rather than aborting the
    /// whole decode, the same skip-and-continue tolerance
    /// [`EpochAssembler::feed`](crate::pgs::epoch::EpochAssembler::feed)
    /// already gives malformed segment bodies (spec § 7).
    pub fn pgs_events(&mut self, track_number: u64, model: ColorModel) -> crate::Result<Vec<PgsEvent>> {
        let track = self.track(track_number)?;
        let scale = self.timestamp_scale_ns;

        let mut assembler = EpochAssembler::new();
        self.scanner.read_clusters(
            |cluster: Cluster| {
                for frame in cluster.frames(None)? {
                    if frame.track_number != track_number {
                        continue;
                    }
                    let payload = decompress(track.content_encoding.as_ref(), frame.data)?;
                    if !looks_like_pgs(&payload) {
                        continue;
                    }
                    let start_ms = frame.timestamp * scale / 1_000_000;
                    let pts_override = (start_ms * 90).clamp(0, u32::MAX as i64) as u32;
                    for seg in iter_matroska(&payload) {
                        match seg {
                            Ok(seg) => assembler.feed(&seg, Some(pts_override)),
                            Err(e) => log::warn!("skipping malformed PGS mini-header framing: {e}"),
                        }
                    }
                }
                Ok(())
            },
            |_pos| {},
        )?;
        assembler.finish();

        render_all(assembler, model)
    }
}

/// Decode PGS events directly from a standalone `.sup` byte stream: no
/// Matroska container, each PCS carries its own PTS (spec § 6).
pub fn pgs_events_from_sup(data: &[u8], model: ColorModel) -> crate::Result<Vec<PgsEvent>> {
    let mut assembler = EpochAssembler::new();
    for seg in iter_sup(data) {
        assembler.feed(&seg?, None);
    }
    assembler.finish();
    render_all(assembler, model)
}

fn render_all(assembler: EpochAssembler, model: ColorModel) -> crate::Result<Vec<PgsEvent>> {
    let mut events = Vec::new();
    for completed in assembler.into_events() {
        let frame = composite(&completed, model)?;
        events.push(PgsEvent {
            start_pts: completed.start_pts as u64,
            end_pts: completed.end_pts as u64,
            canvas_size: frame.image.dimensions(),
            origin: frame.origin,
            is_forced: frame.is_forced,
            bitmap: frame.image,
        });
    }
    Ok(events)
}

/// Fill in the end time of any event whose duration is still unknown (zero)
/// from the following event's start time, after sorting by start time.
fn repair_zero_duration_events(events: &mut [TextEvent]) {
    events.sort_by_key(|e| e.start_ms);
    for i in 0..events.len().saturating_sub(1) {
        if events[i].end_ms <= events[i].start_ms {
            events[i].end_ms = events[i + 1].start_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Minimal big-endian byte form of an EBML ID constant (these already
    /// carry their length marker in the top bits, e.g. `0x1549A966`).
    fn vint_id(id: u32) -> Vec<u8> {
        let bytes = id.to_be_bytes();
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(3);
        bytes[start..].to_vec()
    }

    fn element(id: u32, body: &[u8]) -> Vec<u8> {
        assert!(body.len() < 0x7F, "fixture body too long for a 1-byte VINT size");
        let mut out = vint_id(id);
        out.push(0x80 | body.len() as u8);
        out.extend_from_slice(body);
        out
    }

    fn simple_block(track_number: u8, relative_ts: i16, data: &[u8]) -> Vec<u8> {
        let mut body = vec![0x80 | track_number];
        body.extend_from_slice(&relative_ts.to_be_bytes());
        body.push(0x00); // flags: no lacing
        body.extend_from_slice(data);
        body
    }

    fn build_minimal_text_file(track_number: u8, text: &[u8]) -> Vec<u8> {
        let mut data = vec![0x1A, 0x45, 0xDF, 0xA3, 0x80]; // EBML header, size 0

        let mut info_body = Vec::new();
        info_body.extend_from_slice(&element(0x2AD7B1, &[1]));
        info_body.extend_from_slice(&element(0x4D80, b"test"));
        info_body.extend_from_slice(&element(0x5741, b"test"));
        let info_elem = element(0x1549A966, &info_body);

        let mut track_entry_body = Vec::new();
        track_entry_body.extend_from_slice(&element(0xD7, &[track_number]));
        track_entry_body.extend_from_slice(&element(0x73C5, &[track_number]));
        track_entry_body.extend_from_slice(&element(0x83, &[17])); // subtitle
        track_entry_body.extend_from_slice(&element(0x86, b"S_TEXT/UTF8"));
        let track_entry = element(0xAE, &track_entry_body);
        let tracks_elem = element(0x1654AE6B, &track_entry);

        let mut cluster_body = Vec::new();
        cluster_body.extend_from_slice(&element(0xE7, &[0])); // Timestamp = 0
        cluster_body.extend_from_slice(&element(0xA3, &simple_block(track_number, 0, text)));
        let cluster_elem = element(0x1F43B675, &cluster_body);

        let mut segment_body = Vec::new();
        segment_body.extend_from_slice(&info_elem);
        segment_body.extend_from_slice(&tracks_elem);
        segment_body.extend_from_slice(&cluster_elem);

        data.extend_from_slice(&element(0x18538067, &segment_body));
        data
    }

    fn build_pgs_file(track_number: u8, blocks: &[Vec<u8>]) -> Vec<u8> {
        let mut data = vec![0x1A, 0x45, 0xDF, 0xA3, 0x80]; // EBML header, size 0

        let mut info_body = Vec::new();
        info_body.extend_from_slice(&element(0x2AD7B1, &[1]));
        info_body.extend_from_slice(&element(0x4D80, b"test"));
        info_body.extend_from_slice(&element(0x5741, b"test"));
        let info_elem = element(0x1549A966, &info_body);

        let mut track_entry_body = Vec::new();
        track_entry_body.extend_from_slice(&element(0xD7, &[track_number]));
        track_entry_body.extend_from_slice(&element(0x73C5, &[track_number]));
        track_entry_body.extend_from_slice(&element(0x83, &[17])); // subtitle
        track_entry_body.extend_from_slice(&element(0x86, b"S_HDMV/PGS"));
        let track_entry = element(0xAE, &track_entry_body);
        let tracks_elem = element(0x1654AE6B, &track_entry);

        let mut cluster_body = Vec::new();
        cluster_body.extend_from_slice(&element(0xE7, &[0])); // Timestamp = 0
        for (i, block) in blocks.iter().enumerate() {
            cluster_body.extend_from_slice(&element(0xA3, &simple_block(track_number, i as i16, block)));
        }
        let cluster_elem = element(0x1F43B675, &cluster_body);

        let mut segment_body = Vec::new();
        segment_body.extend_from_slice(&info_elem);
        segment_body.extend_from_slice(&tracks_elem);
        segment_body.extend_from_slice(&cluster_elem);

        data.extend_from_slice(&element(0x18538067, &segment_body));
        data
    }

    /// A single-object PGS composition as Matroska mini-header-framed segments:
    /// PCS (EpochStart, one object) + PDS (one opaque entry) + ODS (2x1,
    /// first+last) + END.
    fn valid_pgs_composition() -> Vec<u8> {
        let mut pcs_body = vec![];
        pcs_body.extend_from_slice(&2u16.to_be_bytes()); // width
        pcs_body.extend_from_slice(&1u16.to_be_bytes()); // height
        pcs_body.push(0x10); // frame_rate
        pcs_body.extend_from_slice(&1u16.to_be_bytes()); // composition_number
        pcs_body.push(0x80); // EpochStart
        pcs_body.push(0x00); // no palette update
        pcs_body.push(0); // palette_id
        pcs_body.push(1); // n_objects
        pcs_body.extend_from_slice(&7u16.to_be_bytes()); // object_id
        pcs_body.push(0); // window_id
        pcs_body.push(0x00); // flags
        pcs_body.extend_from_slice(&0u16.to_be_bytes()); // x
        pcs_body.extend_from_slice(&0u16.to_be_bytes()); // y

        let pds_body = vec![0u8, 1, 1, 180, 150, 100, 255]; // palette_id, version, index, Y, Cr, Cb, alpha

        let mut ods_body = vec![];
        ods_body.extend_from_slice(&7u16.to_be_bytes()); // object_id
        ods_body.push(1); // version
        ods_body.push(0xC0); // first + last
        ods_body.extend_from_slice(&[0, 0, 2]); // packet_size
        ods_body.extend_from_slice(&2u16.to_be_bytes()); // width
        ods_body.extend_from_slice(&1u16.to_be_bytes()); // height
        ods_body.extend_from_slice(&[1, 0]); // raster: opaque pixel, transparent pixel

        let mut out = vec![];
        out.push(0x16);
        out.extend_from_slice(&(pcs_body.len() as u16).to_be_bytes());
        out.extend_from_slice(&pcs_body);
        out.push(0x14);
        out.extend_from_slice(&(pds_body.len() as u16).to_be_bytes());
        out.extend_from_slice(&pds_body);
        out.push(0x15);
        out.extend_from_slice(&(ods_body.len() as u16).to_be_bytes());
        out.extend_from_slice(&ods_body);
        out.push(0x80);
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }

    #[test]
    fn pgs_events_survives_a_block_with_truncated_mini_header_framing() {
        // One Block with a complete, valid composition, followed by one Block
        // whose framing still contains an END type byte (so `looks_like_pgs`
        // accepts it) but is truncated past that: a PDS segment declaring a
        // 255-byte body with none actually present.
        let good = valid_pgs_composition();
        let mut bad = vec![0x80, 0x00, 0x00]; // END, size 0 (satisfies looks_like_pgs)
        bad.extend_from_slice(&[0x14, 0x00, 0xFF]); // PDS claiming 255 bytes, zero present

        let data = build_pgs_file(3, &[good, bad]);
        let mut subs = MkvSubtitles::from_source(Cursor::new(data)).unwrap();

        let events = subs.pgs_events(3, crate::pgs::palette::ColorModel::Bt709).unwrap();
        assert_eq!(events.len(), 1, "the good block's composition must survive the bad block's framing error");
    }

    #[test]
    fn reads_tracks_and_a_text_event_from_a_minimal_file() {
        let data = build_minimal_text_file(1, b"hello");
        let mut subs = MkvSubtitles::from_source(Cursor::new(data)).unwrap();

        assert_eq!(subs.tracks().len(), 1);
        assert!(subs.tracks()[0].is_subtitle);

        let events = subs.text_events(1).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "hello");
        assert_eq!(events[0].start_ms, 0);
    }

    #[test]
    fn unknown_track_number_is_an_error() {
        let data = build_minimal_text_file(1, b"hi");
        let mut subs = MkvSubtitles::from_source(Cursor::new(data)).unwrap();
        assert!(subs.text_events(99).is_err());
    }

    #[test]
    fn repair_fills_gaps_between_zero_duration_events() {
        let mut events = vec![
            TextEvent {
                start_ms: 0,
                end_ms: 0,
                text: "a".into(),
                track_number: 1,
            },
            TextEvent {
                start_ms: 1000,
                end_ms: 1000,
                text: "b".into(),
                track_number: 1,
            },
        ];
        repair_zero_duration_events(&mut events);
        assert_eq!(events[0].end_ms, 1000);
    }
}
