#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

/// Error types for this crate.
mod error;
mod functional;
pub use error::*;

/// I/O utilities.
pub mod io;

/// base types for Matroska elements. ie. `VInt64`, `Header`, etc.
mod base;
mod frame;
/// Leaf elements in Matroska.
mod leaf;
/// Master elements in Matroska.
mod master;
/// Supplementary elements in Matroska. Void elements, CRC-32, etc.
///
/// These elements are not from the Matroska specification, but Matroska specifications inherit them from EBML specifications.
mod supplement;
// Element body definitions and traits.
mod element;

/// Random-access byte sources backing a [`SegmentScanner`](segment::SegmentScanner).
pub mod byte_source;
/// Lacing (Xiph/fixed-size/EBML) splitting and joining for laced Block payloads.
mod lacer;
/// Top-level Segment traversal, with corruption-recovery rescan.
mod segment;
/// Track descriptors decoded from a Segment's `Tracks` element.
mod track;

/// Subtitle payload decompression and text normalisation.
mod decompress;
/// Output event types yielded to callers of this crate.
mod event;

/// Blu-ray Presentation Graphics Stream (PGS/"SUP") decoding.
pub mod pgs;

mod subtitles;

pub use byte_source::{BufferedSource, ByteSource, MmapSource};
pub use event::{PgsEvent, TextEvent};
pub use subtitles::{pgs_events_from_sup, MkvSubtitles};
pub use track::TrackDescriptor;

/// A prelude for common types and traits.
pub mod prelude {
    pub use crate::base::*;
    pub use crate::element::*;
    pub use crate::frame::*;
    pub use crate::leaf::*;
    pub use crate::master::*;
    pub use crate::supplement::*;
}
