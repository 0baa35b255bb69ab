//! Byte-level (de)serialization traits used to build up element bodies.

use super::buf::{Buf, BufMut};
use crate::base::Header;
use crate::element::Element;
use crate::error::Error;

/// Decode `Self` from the front of a byte slice, advancing it past what was consumed.
pub trait Decode: Sized {
    /// Decode a value, advancing `buf` past the bytes consumed.
    fn decode(buf: &mut &[u8]) -> crate::Result<Self>;

    /// Decode a value that must consume exactly `len` bytes of `buf`.
    fn decode_exact(buf: &mut &[u8], len: usize) -> crate::Result<Self> {
        if buf.remaining() != len {
            return Err(Error::ShortRead);
        }
        Self::decode(buf)
    }
}

/// Encode `Self` onto the end of a buffer.
pub trait Encode {
    /// Append the encoded form of `self` to `buf`.
    fn encode<B: BufMut>(&self, buf: &mut B) -> crate::Result<()>;
}

/// Decode an [`Element`] body given an already-read [`Header`].
///
/// This differs from [`Decode`] in that the header has already been consumed
/// from the stream (typically while scanning a master element's children for
/// the next child ID), so only the body needs to be sliced off and parsed.
pub trait DecodeElement: Element {
    /// Decode the element's body, given its header, advancing `buf` past the body.
    fn decode_element(header: &Header, buf: &mut &[u8]) -> crate::Result<Self> {
        let body_size = *header.size as usize;
        if buf.remaining() < body_size {
            return Err(Error::OutOfBounds);
        }
        let mut body = buf.slice(body_size);
        let element = match Self::decode_body(&mut body) {
            Ok(e) => e,
            Err(Error::OutOfBounds) => return Err(Error::OverDecode(Self::ID)),
            Err(Error::ShortRead) => return Err(Error::UnderDecode(Self::ID)),
            Err(e) => return Err(e),
        };
        if body.has_remaining() {
            return Err(Error::UnderDecode(Self::ID));
        }
        buf.advance(body_size);
        Ok(element)
    }
}
impl<T: Element> DecodeElement for T {}

macro_rules! impl_int_coding {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Decode for $ty {
                fn decode(buf: &mut &[u8]) -> crate::Result<Self> {
                    const N: usize = std::mem::size_of::<$ty>();
                    if buf.remaining() < N {
                        return Err(Error::OutOfBounds);
                    }
                    let mut bytes = [0u8; N];
                    bytes.copy_from_slice(buf.slice(N));
                    buf.advance(N);
                    Ok(<$ty>::from_be_bytes(bytes))
                }
            }
            impl Encode for $ty {
                fn encode<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
                    buf.append_slice(&self.to_be_bytes());
                    Ok(())
                }
            }
        )*
    };
}

impl_int_coding!(u16, u32, u64, u128, i16, i32, i64, i128, f32, f64);

impl Decode for u8 {
    fn decode(buf: &mut &[u8]) -> crate::Result<Self> {
        if !buf.has_remaining() {
            return Err(Error::OutOfBounds);
        }
        let b = buf.slice(1)[0];
        buf.advance(1);
        Ok(b)
    }
}
impl Encode for u8 {
    fn encode<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
        buf.append_slice(&[*self]);
        Ok(())
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(buf: &mut &[u8]) -> crate::Result<Self> {
        if buf.remaining() < N {
            return Err(Error::OutOfBounds);
        }
        let mut out = [0u8; N];
        out.copy_from_slice(buf.slice(N));
        buf.advance(N);
        Ok(out)
    }
}
impl<const N: usize> Encode for [u8; N] {
    fn encode<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
        buf.append_slice(self);
        Ok(())
    }
}

impl Encode for str {
    fn encode<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
        buf.append_slice(self.as_bytes());
        Ok(())
    }
}

impl Encode for [u8] {
    fn encode<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
        buf.append_slice(self);
        Ok(())
    }
}

/// Decoding a [`Header`] only fails when the underlying VInt64 encoding is invalid;
/// reaching the end of the buffer just means there is no more header to read.
impl Decode for Option<Header> {
    fn decode(buf: &mut &[u8]) -> crate::Result<Self> {
        if !buf.has_remaining() {
            return Ok(None);
        }
        Header::decode(buf).map(Some)
    }
}

/// Peeks the next header in `buf`; only consumes it (and the body) if its ID matches `T`.
///
/// This is how master elements recognise a leading, optional CRC-32 without
/// mistaking an arbitrary first child for one.
impl<T: Element> Decode for Option<T> {
    fn decode(buf: &mut &[u8]) -> crate::Result<Self> {
        if !buf.has_remaining() {
            return Ok(None);
        }
        let mut peek = *buf;
        let header = Header::decode(&mut peek)?;
        if header.id != T::ID {
            return Ok(None);
        }
        *buf = peek;
        T::decode_element(&header, buf).map(Some)
    }
}

impl<T: Element> Encode for Option<T> {
    fn encode<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
        if let Some(value) = self {
            value.encode(buf)?;
        }
        Ok(())
    }
}

impl<T: Element> Encode for Vec<T> {
    fn encode<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
        for item in self {
            item.encode(buf)?;
        }
        Ok(())
    }
}
