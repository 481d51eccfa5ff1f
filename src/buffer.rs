//! Bounds-checked, non-owning access to one header inside a frame buffer.
//!
//! Every view and builder in this crate is a thin wrapper around either a
//! [`FrameSlice`] or a [`FrameSliceMut`]. Both remember the whole frame buffer
//! plus the offset of the header they describe, so the next layer can be
//! located without copying anything. The length check happens once, at
//! construction, which is what lets the field accessors index directly.

use crate::error::{FrameError, Result};

fn check_bounds(len: usize, offset: usize, header_len: usize) -> Result<()> {
    let available = len.saturating_sub(offset);
    if offset > len || available < header_len {
        return Err(FrameError::Bounds {
            offset,
            required: header_len,
            available,
        });
    }
    Ok(())
}

/// Read-only header overlay: a frame buffer and the offset of one header in it.
///
/// Field access is left to the views in this crate, which only read within
/// the header length checked at construction.
///
/// ```compile_fail
/// let slice = rawframe::buffer::view_at(&[0u8; 4], 2, 2).unwrap();
/// slice.read_u32(0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FrameSlice<'a> {
    buffer: &'a [u8],
    offset: usize,
}

/// Places a read-only overlay of `header_len` bytes at `offset`.
///
/// Fails with [`FrameError::Bounds`] if the buffer ends before the header does.
pub fn view_at(buffer: &[u8], offset: usize, header_len: usize) -> Result<FrameSlice<'_>> {
    check_bounds(buffer.len(), offset, header_len)?;
    Ok(FrameSlice { buffer, offset })
}

impl<'a> FrameSlice<'a> {
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The whole frame buffer, not just this header.
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// Bytes from the start of this header to the end of the buffer.
    pub fn tail(&self) -> &'a [u8] {
        &self.buffer[self.offset..]
    }

    pub(crate) fn bytes(&self, at: usize, len: usize) -> &'a [u8] {
        &self.buffer[self.offset + at..self.offset + at + len]
    }

    pub(crate) fn read_u8(&self, at: usize) -> u8 {
        self.buffer[self.offset + at]
    }

    pub(crate) fn read_u16(&self, at: usize) -> u16 {
        let start = self.offset + at;
        u16::from_be_bytes([self.buffer[start], self.buffer[start + 1]])
    }

    pub(crate) fn read_u32(&self, at: usize) -> u32 {
        let start = self.offset + at;
        u32::from_be_bytes([
            self.buffer[start],
            self.buffer[start + 1],
            self.buffer[start + 2],
            self.buffer[start + 3],
        ])
    }

    /// Overlay of the next layer, `parent_len` bytes past this header.
    pub fn child(&self, parent_len: usize, header_len: usize) -> Result<FrameSlice<'a>> {
        view_at(self.buffer, self.offset + parent_len, header_len)
    }

    /// The same overlay with the buffer cut short at `end`.
    ///
    /// `end` is clamped to the buffer, and never cuts into the header itself.
    pub fn truncated(&self, end: usize, header_len: usize) -> FrameSlice<'a> {
        let floor = (self.offset + header_len).min(self.buffer.len());
        let end = end.clamp(floor, self.buffer.len());
        FrameSlice {
            buffer: &self.buffer[..end],
            offset: self.offset,
        }
    }
}

/// Writable header overlay over a caller-owned frame buffer.
///
/// ```compile_fail
/// let mut buffer = [0u8; 4];
/// let mut slice = rawframe::buffer::view_at_mut(&mut buffer, 2, 2).unwrap();
/// slice.write_u16(0, 1);
/// ```
#[derive(Debug)]
pub struct FrameSliceMut<'a> {
    buffer: &'a mut [u8],
    offset: usize,
}

/// Places a writable overlay of `header_len` bytes at `offset`.
pub fn view_at_mut(buffer: &mut [u8], offset: usize, header_len: usize) -> Result<FrameSliceMut<'_>> {
    check_bounds(buffer.len(), offset, header_len)?;
    Ok(FrameSliceMut { buffer, offset })
}

impl<'a> FrameSliceMut<'a> {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn as_slice(&self) -> FrameSlice<'_> {
        FrameSlice {
            buffer: &*self.buffer,
            offset: self.offset,
        }
    }

    pub(crate) fn write_u8(&mut self, at: usize, value: u8) {
        self.buffer[self.offset + at] = value;
    }

    pub(crate) fn write_u16(&mut self, at: usize, value: u16) {
        self.write_bytes(at, &value.to_be_bytes());
    }

    pub(crate) fn write_bytes(&mut self, at: usize, bytes: &[u8]) {
        let start = self.offset + at;
        self.buffer[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Writable overlay of the next layer, reborrowing this one.
    pub fn child(&mut self, parent_len: usize, header_len: usize) -> Result<FrameSliceMut<'_>> {
        view_at_mut(&mut *self.buffer, self.offset + parent_len, header_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_at_bounds() {
        let buffer = [0u8; 20];
        assert!(view_at(&buffer, 0, 20).is_ok());
        assert!(view_at(&buffer, 6, 14).is_ok());

        match view_at(&buffer, 7, 14) {
            Err(FrameError::Bounds { offset, required, available }) => {
                assert_eq!(offset, 7);
                assert_eq!(required, 14);
                assert_eq!(available, 13);
            }
            other => panic!("Expected Bounds error, got {:?}", other),
        }

        // Offsets past the end must not underflow.
        assert!(matches!(view_at(&buffer, 40, 0), Err(FrameError::Bounds { .. })));
    }

    #[test]
    fn test_big_endian_access() {
        let mut buffer = [0u8; 8];
        {
            let mut slice = view_at_mut(&mut buffer, 2, 6).unwrap();
            slice.write_u16(0, 0x0800);
            slice.write_bytes(2, &0xDEADBEEFu32.to_be_bytes());
        }
        assert_eq!(buffer, [0, 0, 0x08, 0x00, 0xDE, 0xAD, 0xBE, 0xEF]);

        let slice = view_at(&buffer, 2, 6).unwrap();
        assert_eq!(slice.read_u16(0), 0x0800);
        assert_eq!(slice.read_u32(2), 0xDEADBEEF);
        assert_eq!(slice.read_u8(1), 0x00);
    }

    #[test]
    fn test_short_slice_public_access() {
        let buffer = [1u8, 2, 3, 4];
        let slice = view_at(&buffer, 2, 2).unwrap();
        assert_eq!(slice.tail(), &[3, 4]);
        assert!(matches!(slice.child(2, 1), Err(FrameError::Bounds { .. })));
        assert_eq!(slice.truncated(0, 2).buffer().len(), 4);
    }

    #[test]
    fn test_child_offsets() {
        let buffer = [0u8; 34];
        let parent = view_at(&buffer, 0, 14).unwrap();
        let child = parent.child(14, 20).unwrap();
        assert_eq!(child.offset(), 14);
        assert!(child.child(20, 1).is_err());
    }

    #[test]
    fn test_truncated_keeps_header() {
        let buffer = [0u8; 64];
        let slice = view_at(&buffer, 14, 20).unwrap();
        assert_eq!(slice.truncated(40, 20).buffer().len(), 40);
        assert_eq!(slice.truncated(20, 20).buffer().len(), 34);
        assert_eq!(slice.truncated(1000, 20).buffer().len(), 64);
    }
}
