//! Mock block storage for testing without hardware
//!
//! [`MockFlash`] emulates a page-oriented NVM device in RAM with
//! configurable geometry and memory technology, tracks per-row wear,
//! and offers fault-injection hooks for integrity testing.

use std::collections::HashMap;

use crate::error::StorageError;
use crate::traits::BlockStorage;

/// Behavior knobs for [`MockFlash`]
#[derive(Debug, Clone)]
pub struct MockFlashConfig {
    /// First valid device address
    pub base_addr: u32,
    /// Device capacity in bytes
    pub capacity: u32,
    /// Smallest programmable unit in bytes
    pub program_size: u32,
    /// Whether rows must be erased before reprogramming
    pub erase_required: bool,
    /// Byte value of the erased state
    pub erased_value: u8,
    /// Whether the driver answers blank checks
    ///
    /// Set this on devices whose `erased_value` is non-zero, so the
    /// engine can tell erased cells from written data.
    pub reports_blank: bool,
    /// Whether the driver claims non-blocking support
    pub non_blocking: bool,
}

impl Default for MockFlashConfig {
    fn default() -> Self {
        Self {
            base_addr: 0x1000_0000,
            capacity: 64 * 1024,
            program_size: 512,
            erase_required: false,
            erased_value: 0x00,
            reports_blank: false,
            non_blocking: false,
        }
    }
}

/// RAM-backed mock block storage device
pub struct MockFlash {
    config: MockFlashConfig,
    mem: Vec<u8>,
    /// Program + erase operations seen per start address
    wear_counts: HashMap<u32, u32>,
    /// Remaining successful programs before injected failures begin
    programs_until_fail: Option<u32>,
}

impl MockFlash {
    /// Create a device in the fully erased state
    pub fn new(config: MockFlashConfig) -> Self {
        let mem = vec![config.erased_value; config.capacity as usize];
        Self {
            config,
            mem,
            wear_counts: HashMap::new(),
            programs_until_fail: None,
        }
    }

    /// Device configuration
    pub fn config(&self) -> &MockFlashConfig {
        &self.config
    }

    /// Number of program/erase operations issued at `addr`
    pub fn wear_count(&self, addr: u32) -> u32 {
        *self.wear_counts.get(&addr).unwrap_or(&0)
    }

    /// All per-address wear counters
    pub fn wear_counts(&self) -> &HashMap<u32, u32> {
        &self.wear_counts
    }

    /// Let the next `n` programs succeed, then fail every one after
    pub fn fail_after_programs(&mut self, n: u32) {
        self.programs_until_fail = Some(n);
    }

    /// Clear any injected program failure
    pub fn clear_failures(&mut self) {
        self.programs_until_fail = None;
    }

    /// Flip every bit of the byte at `addr`, simulating bit rot
    ///
    /// # Panics
    ///
    /// Panics if `addr` is outside the device; corruption targets are
    /// test-chosen constants.
    pub fn corrupt_byte(&mut self, addr: u32) {
        let offset = (addr - self.config.base_addr) as usize;
        self.mem[offset] ^= 0xFF;
        log::debug!("mock flash: corrupted byte at {addr:#010x}");
    }

    /// Raw view of `len` bytes at `addr`, bypassing the driver API
    pub fn peek(&self, addr: u32, len: u32) -> &[u8] {
        let offset = (addr - self.config.base_addr) as usize;
        &self.mem[offset..offset + len as usize]
    }

    fn offset(&self, addr: u32, len: u32) -> Result<usize, StorageError> {
        if !self.is_in_range(addr, len) {
            return Err(StorageError::out_of_range(addr, len));
        }
        Ok((addr - self.config.base_addr) as usize)
    }

    fn record_wear(&mut self, addr: u32) {
        *self.wear_counts.entry(addr).or_insert(0) += 1;
    }

    fn do_program(&mut self, addr: u32, data: &[u8]) -> Result<(), StorageError> {
        let offset = self.offset(addr, data.len() as u32)?;
        if let Some(remaining) = self.programs_until_fail {
            if remaining == 0 {
                log::debug!("mock flash: injected program failure at {addr:#010x}");
                return Err(StorageError::program(addr, data.len() as u32));
            }
            self.programs_until_fail = Some(remaining - 1);
        }
        self.mem[offset..offset + data.len()].copy_from_slice(data);
        self.record_wear(addr);
        Ok(())
    }

    fn do_erase(&mut self, addr: u32, len: u32) -> Result<(), StorageError> {
        let offset = self.offset(addr, len)?;
        let erased = self.config.erased_value;
        self.mem[offset..offset + len as usize].fill(erased);
        self.record_wear(addr);
        Ok(())
    }
}

impl BlockStorage for MockFlash {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        let offset = self.offset(addr, buf.len() as u32)?;
        buf.copy_from_slice(&self.mem[offset..offset + buf.len()]);
        Ok(())
    }

    fn program(&mut self, addr: u32, data: &[u8]) -> Result<(), StorageError> {
        self.do_program(addr, data)
    }

    fn erase(&mut self, addr: u32, len: u32) -> Result<(), StorageError> {
        self.do_erase(addr, len)
    }

    fn program_size(&self, _addr: u32) -> u32 {
        self.config.program_size
    }

    fn is_in_range(&self, addr: u32, len: u32) -> bool {
        let base = u64::from(self.config.base_addr);
        let end = base + u64::from(self.config.capacity);
        let start = u64::from(addr);
        start >= base && start + u64::from(len) <= end
    }

    fn is_erase_required(&self) -> bool {
        self.config.erase_required
    }

    fn blank_check(&mut self, addr: u32, len: u32) -> Option<bool> {
        if !self.config.reports_blank {
            return None;
        }
        let offset = self.offset(addr, len).ok()?;
        let erased = self.config.erased_value;
        Some(self.mem[offset..offset + len as usize].iter().all(|&b| b == erased))
    }

    #[cfg(feature = "non-blocking")]
    fn supports_non_blocking(&self) -> bool {
        self.config.non_blocking
    }

    // The mock completes instantly, so the non-blocking entry points
    // reuse the blocking implementations.
    #[cfg(feature = "non-blocking")]
    fn program_nb(&mut self, addr: u32, data: &[u8]) -> Result<(), StorageError> {
        if !self.config.non_blocking {
            return Err(StorageError::Unsupported("program_nb"));
        }
        self.do_program(addr, data)
    }

    #[cfg(feature = "non-blocking")]
    fn erase_nb(&mut self, addr: u32, len: u32) -> Result<(), StorageError> {
        if !self.config.non_blocking {
            return Err(StorageError::Unsupported("erase_nb"));
        }
        self.do_erase(addr, len)
    }
}
