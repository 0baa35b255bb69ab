//! Output event types yielded to callers of this crate.

use image::RgbaImage;

/// A decoded plain-text subtitle event.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEvent {
    /// Presentation start time, in milliseconds.
    pub start_ms: i64,
    /// Presentation end time, in milliseconds.
    pub end_ms: i64,
    /// The subtitle text, NUL-truncated and newline-normalised.
    pub text: String,
    /// The Matroska track number this event was read from.
    pub track_number: u64,
}

/// A fully rendered PGS subtitle event.
#[derive(Debug, Clone, PartialEq)]
pub struct PgsEvent {
    /// Presentation start time, in 90 kHz ticks.
    pub start_pts: u64,
    /// Presentation end time, in 90 kHz ticks.
    pub end_pts: u64,
    /// Size, in pixels, of the composition canvas (the union of all object bounding boxes).
    pub canvas_size: (u32, u32),
    /// Top-left corner of the canvas, relative to the PGS video plane.
    pub origin: (i32, i32),
    /// Whether any composition object in this event carries the `forced` flag.
    pub is_forced: bool,
    /// The composited RGBA raster.
    pub bitmap: RgbaImage,
}

impl PgsEvent {
    /// Duration in 90 kHz ticks; zero until overlap repair assigns an end time.
    pub fn duration_ticks(&self) -> u64 {
        self.end_pts.saturating_sub(self.start_pts)
    }
}
