mod buf;
mod coding;

pub use buf::{Buf, BufMut};
pub use coding::{Decode, DecodeElement, Encode};
