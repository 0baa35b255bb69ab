//! PGS epoch state machine (spec § 4.I): tracks palette history and
//! in-progress object fragments across a run of segments and assembles
//! completed presentation compositions.

use std::collections::HashMap;

use super::segment::{
    CompositionObject, CompositionState, ObjectDefinitionFragment, PaletteDefinition, PresentationComposition,
    RawSegment, parse_ods, parse_pcs, parse_pds, parse_wds,
};

/// A composition with its palette and object bitmaps resolved.
#[derive(Debug, Clone)]
pub struct CompletedComposition {
    /// The parsed PCS this composition was built from.
    pub pcs: PresentationComposition,
    /// Presentation start time, 90 kHz ticks.
    pub start_pts: u32,
    /// Presentation end time, 90 kHz ticks. Zero until overlap repair (or a
    /// following composition) establishes it.
    pub end_pts: u32,
    /// The resolved palette's version history at the time this composition completed.
    pub palette: Vec<PaletteDefinition>,
    /// Each referenced composition object, paired with its single,
    /// already-reassembled ODS fragment.
    pub objects: Vec<(CompositionObject, ObjectDefinitionFragment)>,
}

struct Pending {
    pcs: PresentationComposition,
    start_pts: u32,
}

/// Maintains epoch-scoped palette and object tables and assembles completed
/// compositions as segments are fed in.
pub struct EpochAssembler {
    /// Palette version history, keyed by palette slot (0..7).
    ///
    /// This map persists across Matroska Block boundaries by construction
    /// (only an `EpochStart` PCS clears it) which is what spec § 4.I's
    /// "persistent palette table from the previous decoder invocation" falls
    /// out to when one assembler is kept alive for a whole track.
    pub palettes: HashMap<u8, Vec<PaletteDefinition>>,
    objects: HashMap<u16, Vec<ObjectDefinitionFragment>>,
    pending: Option<Pending>,
    any_ods_since_pcs: bool,
    completed: Vec<CompletedComposition>,
}

impl Default for EpochAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl EpochAssembler {
    /// Construct an assembler with empty palette and object tables.
    pub fn new() -> Self {
        Self {
            palettes: HashMap::new(),
            objects: HashMap::new(),
            pending: None,
            any_ods_since_pcs: false,
            completed: Vec::new(),
        }
    }

    /// Construct an assembler seeded with a palette table carried over from a
    /// prior assembler (e.g. a previous Matroska Block's invocation).
    pub fn with_persistent_palettes(palettes: HashMap<u8, Vec<PaletteDefinition>>) -> Self {
        Self {
            palettes,
            ..Self::new()
        }
    }

    /// Feed one raw segment. `pts_override` supplies the PCS's presentation
    /// timestamp when the segment stream doesn't carry its own (Matroska
    /// mini-headers carry no PTS; callers pass the Block's start time,
    /// normalised to 90 kHz ticks, instead). Standalone `.sup` callers pass
    /// `None` so the segment's own PTS is used.
    ///
    /// Malformed segment bodies are logged and skipped rather than
    /// propagated, per spec § 7: subtitle streams routinely carry garbage a
    /// decoder must tolerate.
    pub fn feed(&mut self, raw: &RawSegment<'_>, pts_override: Option<u32>) {
        match raw.kind {
            0x14 => match parse_pds(raw.body) {
                Ok(pds) => self.on_pds(pds),
                Err(e) => log::warn!("skipping malformed PDS: {e}"),
            },
            0x15 => match parse_ods(raw.body) {
                Ok(ods) => self.on_ods(ods),
                Err(e) => log::warn!("skipping malformed ODS: {e}"),
            },
            0x16 => match parse_pcs(raw.body) {
                Ok(pcs) => self.on_pcs(pcs, pts_override.unwrap_or(raw.pts)),
                Err(e) => log::warn!("skipping malformed or invalid PCS: {e}"),
            },
            0x17 => {
                // Window Definition Segments are informational only (spec §
                // 4.L derives the canvas from object bounding boxes instead).
                if let Err(e) = parse_wds(raw.body) {
                    log::warn!("skipping malformed WDS: {e}");
                }
            }
            0x80 => self.on_end(),
            other => log::debug!("ignoring unknown PGS segment type 0x{other:02X}"),
        }
    }

    fn on_pcs(&mut self, pcs: PresentationComposition, start_pts: u32) {
        if pcs.state == CompositionState::EpochStart {
            if let Some(p) = self.pending.take() {
                self.complete_and_push(p);
            }
            self.palettes.clear();
            self.objects.clear();
        } else if let Some(p) = self.pending.take() {
            self.complete_and_push(p);
        }
        self.pending = Some(Pending { pcs, start_pts });
        self.any_ods_since_pcs = false;
    }

    fn on_pds(&mut self, pds: PaletteDefinition) {
        if pds.entries.is_empty() {
            return;
        }
        let Some(pending) = &self.pending else { return };
        let palette_update = pending.pcs.palette_update;
        let versions = self.palettes.entry(pds.palette_id).or_default();
        if palette_update {
            if let Some(last) = versions.last_mut() {
                *last = pds;
            } else {
                versions.push(pds);
            }
        } else {
            versions.push(pds);
        }
    }

    fn on_ods(&mut self, frag: ObjectDefinitionFragment) {
        let Some(pending) = &self.pending else { return };
        if pending.pcs.palette_update {
            // This frame reuses the prior bitmap with only a palette change.
            return;
        }
        let is_new = frag.is_first || !self.any_ods_since_pcs;
        self.any_ods_since_pcs = true;
        let list = self.objects.entry(frag.object_id).or_default();
        if is_new {
            *list = vec![frag];
        } else {
            list.push(frag);
        }
    }

    fn on_end(&mut self) {
        if let Some(p) = self.pending.take() {
            self.complete_and_push(p);
        }
    }

    /// Resolve `pending`'s palette and objects and, if successful, push it
    /// onto the completed list. Per spec § 4.I: missing palette or zero
    /// resolved objects silently drop the composition rather than erroring.
    fn complete_and_push(&mut self, pending: Pending) {
        if pending.pcs.objects.is_empty() {
            return;
        }

        let palette = match self.palettes.get(&pending.pcs.palette_id) {
            Some(versions) if !versions.is_empty() => versions.clone(),
            _ => {
                log::warn!(
                    "composition {} references missing palette {}, dropping",
                    pending.pcs.composition_number,
                    pending.pcs.palette_id
                );
                return;
            }
        };

        let mut objects = Vec::with_capacity(pending.pcs.objects.len());
        for obj in &pending.pcs.objects {
            if let Some(fragments) = self.objects.get(&obj.object_id) {
                if let Some(reassembled) = reassemble(fragments) {
                    objects.push((*obj, reassembled));
                }
            }
        }
        if objects.is_empty() {
            return;
        }

        self.completed.push(CompletedComposition {
            pcs: pending.pcs,
            start_pts: pending.start_pts,
            end_pts: 0,
            palette,
            objects,
        });
    }

    /// Flush a still-pending composition at stream end (spec § 4.I).
    pub fn finish(&mut self) {
        if let Some(p) = self.pending.take() {
            self.complete_and_push(p);
        }
    }

    /// Consume the assembler, returning completed compositions with overlap
    /// repair applied: any composition whose end time is still zero inherits
    /// the next composition's start time (spec § 4.I, § 8 invariant 2).
    pub fn into_events(mut self) -> Vec<CompletedComposition> {
        for i in 1..self.completed.len() {
            if self.completed[i - 1].end_pts == 0 {
                self.completed[i - 1].end_pts = self.completed[i].start_pts;
            }
        }
        std::mem::take(&mut self.completed)
    }
}

/// Concatenate an object's fragments (arrival order) into a single fragment,
/// per spec § 4.I "fragment reassembly". `None` if the fragment list is empty.
fn reassemble(fragments: &[ObjectDefinitionFragment]) -> Option<ObjectDefinitionFragment> {
    match fragments {
        [] => None,
        [only] => Some(only.clone()),
        [first, rest @ ..] => {
            let mut data = first.data.clone();
            let mut packet_size = first.packet_size.unwrap_or(0);
            for frag in rest {
                data.extend_from_slice(&frag.data);
                packet_size += frag.packet_size.unwrap_or(0);
            }
            Some(ObjectDefinitionFragment {
                object_id: first.object_id,
                version: first.version,
                is_first: true,
                is_last: rest.last().map(|f| f.is_last).unwrap_or(first.is_last),
                size: first.size,
                packet_size: Some(packet_size),
                data,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pds_body(palette_id: u8, index: u8, alpha: u8) -> Vec<u8> {
        // palette_id, version=1, then one 5-byte entry.
        vec![palette_id, 1, index, 180, 150, 100, alpha]
    }

    fn ods_first_body(object_id: u16, w: u16, h: u16, data: &[u8]) -> Vec<u8> {
        let mut body = vec![];
        body.extend_from_slice(&object_id.to_be_bytes());
        body.push(1); // version
        body.push(0xC0); // first + last
        body.extend_from_slice(&[0, 0, data.len() as u8]);
        body.extend_from_slice(&w.to_be_bytes());
        body.extend_from_slice(&h.to_be_bytes());
        body.extend_from_slice(data);
        body
    }

    fn pcs_body(state: u8, composition_number: u16, palette_id: u8, object_id: u16) -> Vec<u8> {
        let mut body = vec![];
        body.extend_from_slice(&2u16.to_be_bytes()); // width
        body.extend_from_slice(&1u16.to_be_bytes()); // height
        body.push(0x10); // frame_rate
        body.extend_from_slice(&composition_number.to_be_bytes());
        body.push(state);
        body.push(0x00); // no palette update
        body.push(palette_id);
        body.push(1); // n_objects
        body.extend_from_slice(&object_id.to_be_bytes());
        body.push(0); // window_id
        body.push(0x00); // flags
        body.extend_from_slice(&0u16.to_be_bytes()); // x
        body.extend_from_slice(&0u16.to_be_bytes()); // y
        body
    }

    fn seg(kind: u8, body: &[u8]) -> RawSegment<'_> {
        RawSegment { kind, pts: 0, body }
    }

    #[test]
    fn single_object_composition_resolves() {
        let mut asm = EpochAssembler::new();
        asm.feed(&seg(0x16, &pcs_body(0x80, 1, 0, 7)), Some(1000));
        asm.feed(&seg(0x14, &pds_body(0, 1, 255)), None);
        asm.feed(&seg(0x15, &ods_first_body(7, 2, 1, &[1, 0])), None);
        asm.feed(&seg(0x80, &[]), None);
        asm.finish();

        let events = asm.into_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].objects.len(), 1);
        assert_eq!(events[0].palette.len(), 1);
        assert_eq!(events[0].start_pts, 1000);
    }

    #[test]
    fn missing_palette_drops_the_composition() {
        let mut asm = EpochAssembler::new();
        asm.feed(&seg(0x16, &pcs_body(0x80, 1, 3, 7)), Some(1000));
        asm.feed(&seg(0x15, &ods_first_body(7, 2, 1, &[1, 0])), None);
        asm.feed(&seg(0x80, &[]), None);
        asm.finish();

        assert!(asm.into_events().is_empty());
    }

    #[test]
    fn epoch_start_clears_prior_epoch_tables() {
        let mut asm = EpochAssembler::new();
        asm.feed(&seg(0x16, &pcs_body(0x80, 1, 0, 7)), Some(1000));
        asm.feed(&seg(0x14, &pds_body(0, 1, 255)), None);
        asm.feed(&seg(0x15, &ods_first_body(7, 2, 1, &[1, 0])), None);
        asm.feed(&seg(0x80, &[]), None);

        // A new epoch starts: palette 0 from the old epoch must not resolve.
        asm.feed(&seg(0x16, &pcs_body(0x80, 2, 0, 7)), Some(2000));
        asm.feed(&seg(0x80, &[]), None);
        asm.finish();

        let events = asm.into_events();
        assert_eq!(events.len(), 1, "second composition has no local palette or objects");
    }

    #[test]
    fn overlap_repair_fills_zero_end_times_from_the_next_composition() {
        let mut asm = EpochAssembler::new();
        asm.feed(&seg(0x16, &pcs_body(0x80, 1, 0, 7)), Some(1000));
        asm.feed(&seg(0x14, &pds_body(0, 1, 255)), None);
        asm.feed(&seg(0x15, &ods_first_body(7, 2, 1, &[1, 0])), None);
        asm.feed(&seg(0x80, &[]), None);
        asm.feed(&seg(0x16, &pcs_body(0x00, 2, 0, 7)), Some(5000));
        asm.feed(&seg(0x80, &[]), None);
        asm.finish();

        let events = asm.into_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].end_pts, 5000);
    }

    #[test]
    fn multi_fragment_objects_reassemble_into_one_concatenated_buffer() {
        let first = ObjectDefinitionFragment {
            object_id: 1,
            version: 0,
            is_first: true,
            is_last: false,
            size: Some((2, 1)),
            packet_size: Some(2),
            data: vec![0xAA],
        };
        let second = ObjectDefinitionFragment {
            object_id: 1,
            version: 0,
            is_first: false,
            is_last: true,
            size: None,
            packet_size: None,
            data: vec![0xBB],
        };
        let combined = reassemble(&[first, second]).unwrap();
        assert_eq!(combined.data, vec![0xAA, 0xBB]);
        assert_eq!(combined.size, Some((2, 1)));
    }
}
