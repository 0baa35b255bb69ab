//! Canvas assembly for a completed PGS composition (spec § 4.L).

use image::{Rgba, RgbaImage};

use super::epoch::CompletedComposition;
use super::palette::{ColorModel, Palette};
use super::rle::decode_raster;
use super::segment::ObjectDefinitionFragment;

/// A composited frame: its pixels, the canvas's top-left corner in
/// video-plane coordinates, and whether it must always be shown.
pub struct CompositedFrame {
    /// The rendered canvas.
    pub image: RgbaImage,
    /// Top-left corner of `image` in video-plane pixel coordinates.
    pub origin: (i32, i32),
    /// Whether any composition object in this frame is forced.
    pub is_forced: bool,
}

/// Render a completed composition to a bitmap under `model`.
///
/// A single-object composition is returned verbatim at its own origin, with
/// no canvas math. Multiple objects are blended onto a shared canvas sized to
/// their union bounding box, source-over, in PCS order (spec § 4.L).
pub fn composite(completed: &CompletedComposition, model: ColorModel) -> crate::Result<CompositedFrame> {
    let palette = resolve_palette(completed, model);
    let is_forced = completed.objects.iter().any(|(obj, _)| obj.is_forced);

    if completed.objects.len() == 1 {
        let (obj, frag) = &completed.objects[0];
        let image = render_object(frag, &palette)?;
        return Ok(CompositedFrame {
            image,
            origin: obj.origin,
            is_forced,
        });
    }

    let (min_x, min_y, max_x, max_y) = completed
        .objects
        .iter()
        .filter_map(|(obj, frag)| {
            let (w, h) = frag.size?;
            let (x, y) = obj.origin;
            Some((x, y, x + w as i32, y + h as i32))
        })
        .fold(None, |acc, (x0, y0, x1, y1)| match acc {
            None => Some((x0, y0, x1, y1)),
            Some((ax0, ay0, ax1, ay1)) => Some((ax0.min(x0), ay0.min(y0), ax1.max(x1), ay1.max(y1))),
        })
        .ok_or(crate::Error::InvalidComposition(0))?;

    let canvas_w = (max_x - min_x).max(0) as u32;
    let canvas_h = (max_y - min_y).max(0) as u32;
    let mut canvas = RgbaImage::from_pixel(canvas_w, canvas_h, Rgba([0, 0, 0, 0]));

    for (obj, frag) in &completed.objects {
        let layer = render_object(frag, &palette)?;
        let dst_x = obj.origin.0 - min_x;
        let dst_y = obj.origin.1 - min_y;
        blit_over(&mut canvas, &layer, dst_x, dst_y);
    }

    Ok(CompositedFrame {
        image: canvas,
        origin: (min_x, min_y),
        is_forced,
    })
}

fn resolve_palette(completed: &CompletedComposition, model: ColorModel) -> Palette {
    let mut palette = Palette::new(model);
    for version in &completed.palette {
        for e in &version.entries {
            palette.apply_entry(e.index, e.y, e.cb, e.cr, e.alpha);
        }
    }
    palette
}

fn render_object(frag: &ObjectDefinitionFragment, palette: &Palette) -> crate::Result<RgbaImage> {
    let (w, h) = frag.size.ok_or(crate::Error::InvalidComposition(0))?;
    let raster = decode_raster(&frag.data, w as usize, h as usize);
    let mut image = RgbaImage::new(w as u32, h as u32);
    for (i, &index) in raster.iter().enumerate() {
        let slot = palette.get(index);
        let x = (i % w as usize) as u32;
        let y = (i / w as usize) as u32;
        image.put_pixel(x, y, Rgba([slot.r, slot.g, slot.b, slot.a]));
    }
    Ok(image)
}

fn blit_over(canvas: &mut RgbaImage, layer: &RgbaImage, dst_x: i32, dst_y: i32) {
    for (x, y, px) in layer.enumerate_pixels() {
        let cx = dst_x + x as i32;
        let cy = dst_y + y as i32;
        if cx < 0 || cy < 0 || cx as u32 >= canvas.width() || cy as u32 >= canvas.height() {
            continue;
        }
        if px.0[3] == 0 {
            continue;
        }
        let dst = canvas.get_pixel_mut(cx as u32, cy as u32);
        *dst = blend_over(*px, *dst);
    }
}

/// Source-over alpha blend `src` atop `dst`, both straight (non-premultiplied) alpha.
fn blend_over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src.0[3] as f32 / 255.0;
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let s = src.0[c] as f32 / 255.0;
        let d = dst.0[c] as f32 / 255.0;
        let blended = (s * sa + d * da * (1.0 - sa)) / out_a;
        out[c] = (blended * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgs::epoch::EpochAssembler;
    use crate::pgs::segment::{iter_matroska, parse_pcs, parse_pds};

    fn make_assembler() -> Vec<u8> {
        let mut data = vec![];

        let mut pcs_body = vec![];
        pcs_body.extend_from_slice(&2u16.to_be_bytes());
        pcs_body.extend_from_slice(&1u16.to_be_bytes());
        pcs_body.push(0x10);
        pcs_body.extend_from_slice(&1u16.to_be_bytes());
        pcs_body.push(0x80); // EpochStart
        pcs_body.push(0x00);
        pcs_body.push(0); // palette_id
        pcs_body.push(1); // n_objects
        pcs_body.extend_from_slice(&7u16.to_be_bytes());
        pcs_body.push(0);
        pcs_body.push(0x00);
        pcs_body.extend_from_slice(&0u16.to_be_bytes());
        pcs_body.extend_from_slice(&0u16.to_be_bytes());
        data.push(0x16);
        data.extend_from_slice(&(pcs_body.len() as u16).to_be_bytes());
        data.extend_from_slice(&pcs_body);

        // palette: index 1 opaque white, index 0 stays transparent black.
        let pds_body = vec![0u8, 1, 1, 235, 128, 128, 255];
        data.push(0x14);
        data.extend_from_slice(&(pds_body.len() as u16).to_be_bytes());
        data.extend_from_slice(&pds_body);

        // ODS: 2x1 object, pixel 0 = index 1 (opaque), pixel 1 = index 0 (transparent).
        let mut ods_body = vec![];
        ods_body.extend_from_slice(&7u16.to_be_bytes());
        ods_body.push(1);
        ods_body.push(0xC0);
        let raster = [0x01u8, 0x00, 0x01]; // pixel 1, then short transparent run of 1
        ods_body.extend_from_slice(&[0, 0, raster.len() as u8]);
        ods_body.extend_from_slice(&2u16.to_be_bytes());
        ods_body.extend_from_slice(&1u16.to_be_bytes());
        ods_body.extend_from_slice(&raster);
        data.push(0x15);
        data.extend_from_slice(&(ods_body.len() as u16).to_be_bytes());
        data.extend_from_slice(&ods_body);

        data.push(0x80);
        data.extend_from_slice(&0u16.to_be_bytes());

        data
    }

    #[test]
    fn single_object_composition_renders_opaque_and_transparent_pixels() {
        let data = make_assembler();
        let mut asm = EpochAssembler::new();
        for seg in iter_matroska(&data) {
            asm.feed(&seg.unwrap(), Some(0));
        }
        asm.finish();
        let events = asm.into_events();
        assert_eq!(events.len(), 1);

        let frame = composite(&events[0], ColorModel::Bt709).unwrap();
        assert_eq!(frame.image.dimensions(), (2, 1));
        assert_eq!(frame.image.get_pixel(0, 0).0[3], 255);
        assert_eq!(frame.image.get_pixel(1, 0).0[3], 0);
        assert_eq!(frame.origin, (0, 0));
        assert!(!frame.is_forced);
    }

    #[test]
    fn blend_over_opaque_source_replaces_destination() {
        let src = Rgba([10, 20, 30, 255]);
        let dst = Rgba([200, 200, 200, 255]);
        assert_eq!(blend_over(src, dst), src);
    }

    #[test]
    fn blend_over_transparent_source_keeps_destination() {
        let src = Rgba([10, 20, 30, 0]);
        let dst = Rgba([200, 200, 200, 255]);
        assert_eq!(blend_over(src, dst), dst);
    }

    #[test]
    fn parse_helpers_still_agree_with_segment_module() {
        let body = [0u8, 1, 1, 180, 150, 100, 255];
        let pds = parse_pds(&body).unwrap();
        assert_eq!(pds.entries[0].alpha, 255);

        let mut pcs_body = vec![];
        pcs_body.extend_from_slice(&2u16.to_be_bytes());
        pcs_body.extend_from_slice(&1u16.to_be_bytes());
        pcs_body.push(0x10);
        pcs_body.extend_from_slice(&0u16.to_be_bytes());
        pcs_body.push(0x80);
        pcs_body.push(0x00);
        pcs_body.push(0);
        pcs_body.push(0);
        let pcs = parse_pcs(&pcs_body).unwrap();
        assert!(pcs.objects.is_empty());
    }
}
