//! A cursor over a caller-provided, non-growing output buffer.
//!
//! Encoding writes sequentially into a pre-allocated buffer, with
//! occasional in-place shifts to make room for a length or tag prefix
//! that becomes known only after its content has been written.

use crate::error::{BufferTooSmallSnafu, EncodeError};
use snafu::ensure;

/// Sequential writer over `&mut [u8]` with backward-insert support for
/// back-patching SEQUENCE/SET lengths and explicit tag wrappers.
pub struct OutBuf<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> OutBuf<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn push(&mut self, byte: u8) -> Result<(), EncodeError> {
        ensure!(
            self.pos < self.buf.len(),
            BufferTooSmallSnafu {
                needed: self.pos + 1,
                available: self.buf.len(),
            }
        );
        self.buf[self.pos] = byte;
        self.pos += 1;
        Ok(())
    }

    pub fn extend(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let end = self.pos.saturating_add(bytes.len());
        ensure!(
            end <= self.buf.len(),
            BufferTooSmallSnafu {
                needed: end,
                available: self.buf.len(),
            }
        );
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    /// Shifts the tail starting at `at` forward to make room for `bytes`,
    /// then writes `bytes` at `at`. Used to back-patch a length or tag
    /// header once the content it describes has already been written.
    pub fn insert_at(&mut self, at: usize, bytes: &[u8]) -> Result<(), EncodeError> {
        debug_assert!(at <= self.pos);
        let new_end = self.pos.saturating_add(bytes.len());
        ensure!(
            new_end <= self.buf.len(),
            BufferTooSmallSnafu {
                needed: new_end,
                available: self.buf.len(),
            }
        );
        self.buf.copy_within(at..self.pos, at + bytes.len());
        self.buf[at..at + bytes.len()].copy_from_slice(bytes);
        self.pos = new_end;
        Ok(())
    }

    pub fn written(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    /// Returns a mutable view of an already-written region, for in-place
    /// reordering (SET/SET OF canonicalisation).
    pub fn slice_mut(&mut self, start: usize, end: usize) -> &mut [u8] {
        &mut self.buf[start..end]
    }

    /// Resets the cursor to an earlier position, discarding everything
    /// written since. Used to omit a DEFAULT-valued element whose tag was
    /// already written before the omission was decided.
    pub fn truncate_to(&mut self, pos: usize) {
        debug_assert!(pos <= self.pos);
        self.pos = pos;
    }
}
