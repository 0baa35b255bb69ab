//! Minimal buffer abstractions used during decoding and encoding.
//!
//! Unlike `bytes::Buf`, `Buf::slice` only peeks at bytes; callers must call
//! `advance` themselves. This lets decoders look ahead (to peek an element ID)
//! without committing to consuming it.

/// A readable, advanceable view over a byte slice.
pub trait Buf {
    /// Number of bytes left to read.
    fn remaining(&self) -> usize;

    /// Whether there is at least one byte left to read.
    fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    /// Peek at the next `len` bytes without consuming them.
    fn slice(&self, len: usize) -> &[u8];

    /// Consume the next `len` bytes.
    fn advance(&mut self, len: usize);
}

impl Buf for &[u8] {
    fn remaining(&self) -> usize {
        self.len()
    }

    fn slice(&self, len: usize) -> &[u8] {
        &self[..len]
    }

    fn advance(&mut self, len: usize) {
        *self = &self[len..];
    }
}

/// A growable buffer that bytes can be appended to.
pub trait BufMut {
    /// Append raw bytes to the end of the buffer.
    fn append_slice(&mut self, data: &[u8]);
}

impl BufMut for Vec<u8> {
    fn append_slice(&mut self, data: &[u8]) {
        self.extend_from_slice(data);
    }
}

impl<T: BufMut + ?Sized> BufMut for &mut T {
    fn append_slice(&mut self, data: &[u8]) {
        (**self).append_slice(data);
    }
}
