//! Physical row codec
//!
//! An extended-mode row starts with four little-endian `u32` header
//! fields — checksum, sequence number, logical address, and payload
//! length — followed by the header-data payload in the first half of
//! the row and the historic snapshot in the second half. [`Row`] and
//! [`RowMut`] are views over a row image already materialized in RAM;
//! callers fill that image through a blank-aware read, so on memories
//! where "erased ≠ zero" an erased row still decodes as all-zero.

use crate::checksum::crc8;

/// Byte offset of the checksum field
pub const CHECKSUM_OFFSET: usize = 0;
/// Byte offset of the sequence number field
pub const SEQ_OFFSET: usize = 4;
/// Byte offset of the logical address field
pub const ADDR_OFFSET: usize = 8;
/// Byte offset of the payload length field
pub const LEN_OFFSET: usize = 12;
/// Byte offset of the header-data payload
pub const HEADER_DATA_OFFSET: usize = 16;

/// Smallest row the extended-mode layout supports, in bytes
pub const MIN_ROW_SIZE: u32 = 128;
/// Largest row the engine will accept, in bytes
pub const MAX_ROW_SIZE: u32 = 2048;

/// Row-level checksum: CRC-8 of every byte after the checksum field,
/// zero-extended into the 32-bit checksum slot
pub fn row_checksum(row: &[u8]) -> u32 {
    u32::from(crc8(&row[SEQ_OFFSET..]))
}

/// Read-only view of one row image
#[derive(Clone, Copy)]
pub struct Row<'a> {
    bytes: &'a [u8],
}

impl<'a> Row<'a> {
    /// View `bytes` as a row; `bytes` must be exactly one row long
    pub fn new(bytes: &'a [u8]) -> Self {
        debug_assert!(bytes.len() >= HEADER_DATA_OFFSET);
        debug_assert!(bytes.len() % 2 == 0);
        Self { bytes }
    }

    fn field(&self, offset: usize) -> u32 {
        let word: [u8; 4] = self.bytes[offset..offset + 4].try_into().unwrap();
        u32::from_le_bytes(word)
    }

    /// Stored checksum word
    pub fn checksum(&self) -> u32 {
        self.field(CHECKSUM_OFFSET)
    }

    /// Stored sequence number
    pub fn seq(&self) -> u32 {
        self.field(SEQ_OFFSET)
    }

    /// Logical start address of the header-data payload
    pub fn addr(&self) -> u32 {
        self.field(ADDR_OFFSET)
    }

    /// Byte count of the header-data payload
    pub fn len(&self) -> u32 {
        self.field(LEN_OFFSET)
    }

    /// Whether the payload length is zero
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The header-data payload area (first half, past the header)
    pub fn header_data(&self) -> &'a [u8] {
        &self.bytes[HEADER_DATA_OFFSET..self.bytes.len() / 2]
    }

    /// The historic snapshot (second half)
    pub fn historic(&self) -> &'a [u8] {
        &self.bytes[self.bytes.len() / 2..]
    }

    /// Whether the stored checksum matches the row contents
    pub fn checksum_ok(&self) -> bool {
        self.checksum() == row_checksum(self.bytes)
    }

    /// Whether this row has never been written
    ///
    /// A row whose sequence number and checksum both read zero is
    /// fresh, not corrupt.
    pub fn is_never_written(&self) -> bool {
        self.seq() == 0 && self.checksum() == 0
    }
}

/// Mutable view used while building a row image
pub struct RowMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> RowMut<'a> {
    /// View `bytes` as a row under construction
    pub fn new(bytes: &'a mut [u8]) -> Self {
        debug_assert!(bytes.len() >= HEADER_DATA_OFFSET);
        debug_assert!(bytes.len() % 2 == 0);
        Self { bytes }
    }

    fn set_field(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Set the sequence number
    pub fn set_seq(&mut self, seq: u32) {
        self.set_field(SEQ_OFFSET, seq);
    }

    /// Set the logical start address of the payload
    pub fn set_addr(&mut self, addr: u32) {
        self.set_field(ADDR_OFFSET, addr);
    }

    /// Set the payload length
    pub fn set_len(&mut self, len: u32) {
        self.set_field(LEN_OFFSET, len);
    }

    /// Mutable header-data payload area
    pub fn header_data_mut(&mut self) -> &mut [u8] {
        let half = self.bytes.len() / 2;
        &mut self.bytes[HEADER_DATA_OFFSET..half]
    }

    /// Mutable historic snapshot area
    pub fn historic_mut(&mut self) -> &mut [u8] {
        let half = self.bytes.len() / 2;
        &mut self.bytes[half..]
    }

    /// Compute the checksum over the finished image and store it
    pub fn seal(&mut self) {
        let checksum = row_checksum(self.bytes);
        self.set_field(CHECKSUM_OFFSET, checksum);
    }
}
