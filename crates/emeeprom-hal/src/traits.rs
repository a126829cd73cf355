//! Block storage abstraction for the emulated EEPROM engine
//!
//! The engine is polymorphic over one capability trait that describes
//! everything it needs from the underlying non-volatile memory: byte
//! reads, row-granular program/erase, geometry queries, and two
//! technology flags (whether an explicit erase must precede a program,
//! and whether the erased state is distinguishable from written zeros).
//!
//! Drivers that can start a program or erase and return before it
//! completes expose that through the feature-gated non-blocking
//! members; everything else gets the safe defaults.

use crate::error::StorageError;

/// Capability interface of a page-oriented non-volatile memory device
///
/// Addresses are absolute device addresses, not offsets into any
/// particular region. Implementations are free to reject unaligned or
/// out-of-range accesses with [`StorageError::OutOfRange`].
pub trait BlockStorage: Send + Sync {
    /// Read `buf.len()` bytes starting at `addr`
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Program `data` starting at `addr`, blocking until completion
    ///
    /// `data.len()` is always a multiple of the program size reported
    /// for `addr`.
    fn program(&mut self, addr: u32, data: &[u8]) -> Result<(), StorageError>;

    /// Erase `len` bytes starting at `addr`, blocking until completion
    ///
    /// Only called on drivers whose [`is_erase_required`] reports true.
    ///
    /// [`is_erase_required`]: BlockStorage::is_erase_required
    fn erase(&mut self, addr: u32, len: u32) -> Result<(), StorageError>;

    /// Smallest programmable unit at `addr`, in bytes
    fn program_size(&self, addr: u32) -> u32;

    /// Whether `[addr, addr + len)` lies entirely within the device
    fn is_in_range(&self, addr: u32, len: u32) -> bool;

    /// Whether the memory technology requires an erase before a row
    /// can be reprogrammed
    fn is_erase_required(&self) -> bool;

    /// Report whether `[addr, addr + len)` is in the erased state
    ///
    /// Memories whose erased state is not all-zero must answer here so
    /// callers never interpret erased cells as data. Drivers on
    /// technologies where erased reads back as zero return `None`.
    fn blank_check(&mut self, addr: u32, len: u32) -> Option<bool> {
        let _ = (addr, len);
        None
    }

    /// Whether the driver implements the non-blocking entry points
    #[cfg(feature = "non-blocking")]
    fn supports_non_blocking(&self) -> bool {
        false
    }

    /// Start programming `data` at `addr` and return immediately
    ///
    /// The operation must complete before the caller issues the next
    /// storage operation; the engine never polls.
    #[cfg(feature = "non-blocking")]
    fn program_nb(&mut self, addr: u32, data: &[u8]) -> Result<(), StorageError> {
        let _ = (addr, data);
        Err(StorageError::Unsupported("program_nb"))
    }

    /// Start erasing `len` bytes at `addr` and return immediately
    #[cfg(feature = "non-blocking")]
    fn erase_nb(&mut self, addr: u32, len: u32) -> Result<(), StorageError> {
        let _ = (addr, len);
        Err(StorageError::Unsupported("erase_nb"))
    }
}
