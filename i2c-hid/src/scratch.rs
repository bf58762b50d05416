//! Scratch rings for bus transactions
//!
//! Each ring hands out zero-filled regions from a fixed arena. The cursor only
//! moves forward and wraps to the start once the next request (plus a small
//! margin) would run past the end. There is no free: a region is reclaimed when
//! the cursor comes around again. Regions borrow the ring mutably, so one can
//! never outlive the bus guard that owns the ring.

use crate::error::I2cHidError;
use crate::protocol::scratch::MARGIN;

/// Fixed-capacity byte arena with a wrapping write cursor
pub struct ScratchRing {
    buf: Box<[u8]>,
    cursor: usize,
}

impl ScratchRing {
    /// Create a ring of `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Grow the arena so a request of `size` bytes fits. Returns whether it grew.
    pub fn reserve(&mut self, size: usize) -> bool {
        let needed = size + MARGIN;
        if needed <= self.buf.len() {
            return false;
        }
        self.buf = vec![0u8; needed].into_boxed_slice();
        self.cursor = 0;
        true
    }

    /// Offset the next allocation of `size` bytes would start at
    pub fn next_offset(&self, size: usize) -> usize {
        if self.cursor + size + MARGIN >= self.buf.len() {
            0
        } else {
            self.cursor
        }
    }

    /// Hand out a zero-filled region of `size` bytes.
    ///
    /// Fails only when the request cannot fit even at offset 0.
    pub fn allocate(&mut self, size: usize) -> Result<&mut [u8], I2cHidError> {
        if size + MARGIN > self.buf.len() {
            return Err(I2cHidError::NoResources {
                requested: size,
                capacity: self.buf.len(),
            });
        }

        let start = self.next_offset(size);
        self.cursor = start + size + MARGIN;

        let region = &mut self.buf[start..start + size];
        region.fill(0);
        Ok(region)
    }
}
