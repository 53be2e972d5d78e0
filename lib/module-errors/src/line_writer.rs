//! A `core::fmt::Write` sink over a fixed `&mut [u8]` that truncates
//! instead of erroring when the formatted text doesn't fit.
//!
//! Every host-comms task formats its replies straight into a
//! caller-provided transmit buffer of bounded size (there is no heap to
//! grow into); this is the shared plumbing that makes `write!(...)`
//! ergonomic for that without ever writing out of bounds.

/// Writes are ASCII in this kernel, so truncation only ever needs to avoid
/// splitting a byte, not a multi-byte UTF-8 sequence -- but we still slice
/// on a UTF-8 boundary to keep `write_str`'s contract honest for any
/// non-ASCII description a future G-code might carry.
pub struct LineWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> LineWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    /// Bytes written so far (and, after formatting completes, the total
    /// length of the line -- possibly truncated to `buf.len()`).
    pub fn written(&self) -> usize {
        self.len
    }

    /// True if every byte offered to this writer fit.
    pub fn overflowed(&self, total_offered: usize) -> bool {
        self.len < total_offered
    }
}

impl core::fmt::Write for LineWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let space = self.buf.len() - self.len;
        let mut take = space.min(s.len());
        while take > 0 && !s.is_char_boundary(take) {
            take -= 1;
        }
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}
