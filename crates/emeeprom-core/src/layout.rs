//! Storage region geometry and wear-leveling arithmetic
//!
//! The region is a ring of `N × W` primary rows (N logical rows
//! replicated across W wear blocks), optionally followed by a mirror
//! of the whole ring. Rows are addressed by index into the ring; only
//! this module turns indices into device addresses.

use serde::{Deserialize, Serialize};

/// Region geometry, fixed at initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// First device address of the region
    base: u32,
    /// Physical row size in bytes
    row_size: u32,
    /// Bytes of logical address space owned by one row (`R/2` in
    /// extended mode, `R` in simple mode)
    slice_len: u32,
    /// Number of logical rows (N)
    rows: u32,
    /// Wear-leveling factor (W)
    wear_factor: u32,
    /// Whether a mirror ring follows the primary ring
    redundant: bool,
}

impl Layout {
    /// Describe a region
    pub fn new(
        base: u32,
        row_size: u32,
        slice_len: u32,
        rows: u32,
        wear_factor: u32,
        redundant: bool,
    ) -> Self {
        debug_assert!(rows > 0 && wear_factor > 0);
        Self {
            base,
            row_size,
            slice_len,
            rows,
            wear_factor,
            redundant,
        }
    }

    /// Number of logical rows (N)
    pub fn logical_rows(&self) -> u32 {
        self.rows
    }

    /// Number of rows in the primary ring (N × W)
    pub fn ring_rows(&self) -> u32 {
        self.rows * self.wear_factor
    }

    /// Device address of primary row `idx`
    pub fn addr(&self, idx: u32) -> u32 {
        debug_assert!(idx < self.ring_rows());
        self.base + idx * self.row_size
    }

    /// Device address of the mirror of row `idx`
    pub fn mirror_addr(&self, idx: u32) -> u32 {
        debug_assert!(self.redundant);
        self.addr(idx) + self.ring_rows() * self.row_size
    }

    /// The row after `idx`, wrapping within the primary ring
    pub fn next(&self, idx: u32) -> u32 {
        (idx + 1) % self.ring_rows()
    }

    /// The row `steps` positions before `idx` in the ring
    pub fn back(&self, idx: u32, steps: u32) -> u32 {
        debug_assert!(steps < self.ring_rows());
        (idx + self.ring_rows() - steps) % self.ring_rows()
    }

    /// The row holding the previous historic snapshot of the same
    /// logical slice as `idx`
    ///
    /// With wear leveling that is the matching row one wear block
    /// back (the head has not yet rewritten the slice in the current
    /// block); with `W = 1` it is the row itself.
    pub fn companion(&self, idx: u32) -> u32 {
        if self.wear_factor > 1 {
            if idx < self.rows {
                idx + (self.wear_factor - 1) * self.rows
            } else {
                idx - self.rows
            }
        } else {
            idx
        }
    }

    /// Logical address of the first byte owned by row `idx`'s
    /// historic slice
    pub fn slice_start(&self, idx: u32) -> u32 {
        (idx % self.rows) * self.slice_len
    }

    /// Ring index (within the first wear block) of the row owning the
    /// logical address `addr`
    pub fn row_for_addr(&self, addr: u32) -> u32 {
        addr / self.slice_len
    }

    /// Total device bytes the region occupies, mirror included
    ///
    /// `None` when the geometry does not fit the 32-bit address
    /// space; callers reject such a region before using the layout.
    pub fn physical_size(&self) -> Option<u32> {
        let copies = if self.redundant { 2u32 } else { 1 };
        self.rows
            .checked_mul(self.wear_factor)
            .and_then(|ring| ring.checked_mul(self.row_size))
            .and_then(|bytes| bytes.checked_mul(copies))
    }
}
