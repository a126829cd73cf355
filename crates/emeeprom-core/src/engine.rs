//! Logical byte I/O over the row log
//!
//! [`EmEeprom`] owns a block storage driver and serves byte-addressed
//! reads and writes on top of it. In extended mode every write
//! produces one or more fresh rows at the head of a circular log, each
//! carrying the new payload in its header half and a checksummed
//! snapshot of one logical slice in its historic half; reads
//! reconstruct any byte from the row owning its slice plus the header
//! payloads of the most recent writes. Simple mode is a flat
//! pass-through with none of the reliability machinery.

use emeeprom_hal::BlockStorage;

use crate::config::EepromConfig;
use crate::error::{EepromError, Status};
use crate::layout::Layout;
use crate::row::{Row, RowMut, HEADER_DATA_OFFSET, MAX_ROW_SIZE, MIN_ROW_SIZE};

/// Which copy of a row produced a valid image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowSource {
    /// The primary row verified
    Primary,
    /// The primary failed its checksum; the mirror verified
    Mirror,
    /// Neither copy verified; the buffer holds the last copy tried
    Neither,
}

/// Emulated EEPROM over a page-oriented block storage device
///
/// Single-threaded and non-reentrant: the caller owns the engine and
/// the region, and must not interleave calls (including from ISRs
/// while a non-blocking operation is outstanding).
pub struct EmEeprom<B: BlockStorage> {
    pub(crate) device: B,
    pub(crate) layout: Layout,
    /// Ring index of the row with the greatest valid sequence number
    pub(crate) head: u32,
    pub(crate) eeprom_size: u32,
    pub(crate) row_size: u32,
    /// Logical bytes owned by one row (`R/2` extended, `R` simple)
    pub(crate) slice_len: u32,
    /// Header payload capacity per row (`R/2 - 16`)
    pub(crate) header_data_len: u32,
    pub(crate) simple_mode: bool,
    pub(crate) wear_factor: u32,
    pub(crate) redundant: bool,
    pub(crate) blocking_write: bool,
}

impl<B: BlockStorage> EmEeprom<B> {
    /// Validate the configuration, size the region, and locate the
    /// head row
    ///
    /// The driver is owned by the engine from here on; [`storage`],
    /// [`storage_mut`] and [`into_storage`] give it back for
    /// diagnostics.
    ///
    /// [`storage`]: EmEeprom::storage
    /// [`storage_mut`]: EmEeprom::storage_mut
    /// [`into_storage`]: EmEeprom::into_storage
    pub fn new(config: &EepromConfig, device: B) -> Result<Self, EepromError> {
        config.validate()?;

        let row_size = Self::compute_row_size(&device, config)?;
        let slice_len = if config.simple_mode {
            row_size
        } else {
            row_size / 2
        };
        let header_data_len = slice_len.saturating_sub(HEADER_DATA_OFFSET as u32);
        let rows = (config.eeprom_size - 1) / slice_len + 1;
        let wear_factor = config.effective_wear_factor();
        let redundant = config.effective_redundancy();

        let layout = Layout::new(
            config.start_addr,
            row_size,
            slice_len,
            rows,
            wear_factor,
            redundant,
        );

        let physical = layout
            .physical_size()
            .and_then(|size| config.start_addr.checked_add(size).map(|_| size))
            .ok_or_else(|| {
                EepromError::bad_data(format!(
                    "region at {:#010x} overflows the 32-bit address space",
                    config.start_addr
                ))
            })?;
        if !device.is_in_range(config.start_addr, physical) {
            return Err(EepromError::bad_data(format!(
                "region {:#010x}..+{physical} does not fit the device",
                config.start_addr
            )));
        }

        Self::check_write_mode(&device, config)?;

        let mut engine = Self {
            device,
            layout,
            head: 0,
            eeprom_size: config.eeprom_size,
            row_size,
            slice_len,
            header_data_len,
            simple_mode: config.simple_mode,
            wear_factor,
            redundant,
            blocking_write: config.blocking_write,
        };

        if !engine.simple_mode {
            engine.locate_head()?;
        }
        log::debug!(
            "emulated eeprom ready: {} logical bytes over {} rows of {} (wear factor {}, redundancy {})",
            engine.eeprom_size,
            engine.layout.ring_rows(),
            engine.row_size,
            engine.wear_factor,
            engine.redundant,
        );
        Ok(engine)
    }

    /// Read `buf.len()` bytes starting at logical address `addr`
    ///
    /// Returns the most severe per-row outcome observed; spans served
    /// by an unrecoverable row come back zero-filled under
    /// [`Status::BadChecksum`].
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<Status, EepromError> {
        self.check_access(addr, buf.len())?;
        if self.simple_mode {
            self.read_simple(addr, buf)
        } else {
            self.read_extended(addr, buf)
        }
    }

    /// Write `data` starting at logical address `addr`
    ///
    /// Stops at the first programming failure; rows committed before
    /// the failure stay on the device.
    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<Status, EepromError> {
        self.check_access(addr, data.len())?;
        if self.simple_mode {
            self.write_simple(addr, data)
        } else {
            self.write_extended(addr, data)
        }
    }

    /// Reset the logical contents to all-zero
    ///
    /// In extended mode one final marker row carries the bumped
    /// sequence number so [`num_writes`] stays continuous across the
    /// erase; everything else is programmed to zero.
    ///
    /// [`num_writes`]: EmEeprom::num_writes
    pub fn erase(&mut self) -> Result<Status, EepromError> {
        if self.simple_mode {
            self.erase_simple()
        } else {
            self.erase_extended()
        }
    }

    /// Total successful writes recorded in the region: the head row's
    /// sequence number, 0 in simple mode or when no valid row exists
    pub fn num_writes(&mut self) -> Result<u32, EepromError> {
        let (_, seq) = self.check_head_integrity()?;
        Ok(seq)
    }

    /// Logical capacity in bytes
    pub fn eeprom_size(&self) -> u32 {
        self.eeprom_size
    }

    /// Physical row size in bytes
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Device bytes the region occupies, wear blocks and mirror
    /// included
    pub fn physical_size(&self) -> u32 {
        // The geometry was overflow-checked at construction
        self.layout.physical_size().unwrap_or(u32::MAX)
    }

    /// The owned block storage driver
    pub fn storage(&self) -> &B {
        &self.device
    }

    /// Mutable access to the owned driver, for diagnostics such as
    /// wear counters
    pub fn storage_mut(&mut self) -> &mut B {
        &mut self.device
    }

    /// Tear the engine down and hand the driver back
    pub fn into_storage(self) -> B {
        self.device
    }

    // ---- initialization helpers ----

    fn compute_row_size(device: &B, config: &EepromConfig) -> Result<u32, EepromError> {
        let program_size = device.program_size(config.start_addr);
        if program_size == 0 {
            return Err(EepromError::bad_param("driver reports a zero program size"));
        }
        if program_size % 4 != 0 {
            return Err(EepromError::bad_param(format!(
                "program size {program_size} is not 32-bit aligned"
            )));
        }
        // Extended mode needs room for the row header, so small-paged
        // devices get rows of several program units
        let row_size = if !config.simple_mode && program_size < MIN_ROW_SIZE {
            ((MIN_ROW_SIZE - 1) / program_size + 1) * program_size
        } else {
            program_size
        };
        if row_size > MAX_ROW_SIZE {
            return Err(EepromError::bad_param(format!(
                "row size {row_size} exceeds the {MAX_ROW_SIZE}-byte limit"
            )));
        }
        Ok(row_size)
    }

    #[cfg(feature = "non-blocking")]
    fn check_write_mode(device: &B, config: &EepromConfig) -> Result<(), EepromError> {
        if !config.blocking_write && !device.supports_non_blocking() {
            return Err(EepromError::bad_param(
                "driver has no non-blocking support",
            ));
        }
        Ok(())
    }

    #[cfg(not(feature = "non-blocking"))]
    fn check_write_mode(_device: &B, config: &EepromConfig) -> Result<(), EepromError> {
        if !config.blocking_write {
            return Err(EepromError::bad_param(
                "non-blocking writes require the non-blocking feature",
            ));
        }
        Ok(())
    }

    fn check_access(&self, addr: u32, len: usize) -> Result<(), EepromError> {
        if len == 0 {
            return Err(EepromError::bad_param("zero-length access"));
        }
        let end = u64::from(addr) + len as u64;
        if end > u64::from(self.eeprom_size) {
            return Err(EepromError::bad_param(format!(
                "access {addr}..+{len} exceeds the {}-byte capacity",
                self.eeprom_size
            )));
        }
        Ok(())
    }

    // ---- row materialization ----

    pub(crate) fn row_len(&self) -> usize {
        self.row_size as usize
    }

    /// Materialize the row at `nvm_addr`, reading blank rows as
    /// all-zero
    pub(crate) fn read_row(&mut self, nvm_addr: u32, buf: &mut [u8]) -> Result<(), EepromError> {
        let row = &mut buf[..self.row_size as usize];
        if self.device.blank_check(nvm_addr, self.row_size) == Some(true) {
            row.fill(0);
            return Ok(());
        }
        self.device
            .read(nvm_addr, row)
            .map_err(|e| EepromError::bad_data(e.to_string()))
    }

    /// Materialize row `idx`, falling back to its mirror when the
    /// primary fails verification
    pub(crate) fn load_row(&mut self, idx: u32, buf: &mut [u8]) -> Result<RowSource, EepromError> {
        self.read_row(self.layout.addr(idx), buf)?;
        if Row::new(&buf[..self.row_len()]).checksum_ok() {
            return Ok(RowSource::Primary);
        }
        if self.redundant {
            self.read_row(self.layout.mirror_addr(idx), buf)?;
            if Row::new(&buf[..self.row_len()]).checksum_ok() {
                log::debug!("row {idx}: primary failed checksum, mirror used");
                return Ok(RowSource::Mirror);
            }
        }
        Ok(RowSource::Neither)
    }

    // ---- simple mode ----

    fn read_simple(&mut self, addr: u32, buf: &mut [u8]) -> Result<Status, EepromError> {
        let nvm_addr = self.layout.addr(0) + addr;
        if self.device.blank_check(nvm_addr, buf.len() as u32) == Some(true) {
            buf.fill(0);
            return Ok(Status::Success);
        }
        self.device
            .read(nvm_addr, buf)
            .map_err(|e| EepromError::bad_data(e.to_string()))?;
        Ok(Status::Success)
    }

    fn write_simple(&mut self, addr: u32, data: &[u8]) -> Result<Status, EepromError> {
        let mut buf = [0u8; MAX_ROW_SIZE as usize];
        let row_len = self.row_len();

        let mut start = addr % self.row_size;
        let mut row_addr = self.layout.addr(0) + (addr - start);
        let mut remaining = data.len() as u32;
        let mut offset = 0usize;

        while remaining > 0 {
            // Partial-row writes keep the untouched bytes of the row
            self.read_row(row_addr, &mut buf)?;
            let count = (self.row_size - start).min(remaining);
            buf[start as usize..(start + count) as usize]
                .copy_from_slice(&data[offset..offset + count as usize]);
            self.program_row(row_addr, &buf[..row_len])?;
            self.head = (row_addr - self.layout.addr(0)) / self.row_size;

            start = 0;
            remaining -= count;
            offset += count as usize;
            row_addr += self.row_size;
        }

        Ok(Status::Success)
    }

    fn erase_simple(&mut self) -> Result<Status, EepromError> {
        let zeros = [0u8; MAX_ROW_SIZE as usize];
        let row_len = self.row_len();
        let mut first_error = None;

        for idx in 0..self.layout.ring_rows() {
            if let Err(e) = self.program_row(self.layout.addr(idx), &zeros[..row_len]) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            None => Ok(Status::Success),
            Some(e) => Err(e),
        }
    }

    // ---- extended mode: read ----

    fn read_extended(&mut self, addr: u32, out: &mut [u8]) -> Result<Status, EepromError> {
        let size = out.len() as u32;
        out.fill(0);

        // A stale cached head silently repairs here; the scan outcome
        // is not folded into the read's status
        let _ = self.check_head_integrity()?;

        let mut status = Status::Success;
        let mut buf = [0u8; MAX_ROW_SIZE as usize];
        let row_len = self.row_len();
        let slice = self.slice_len;

        // Historic pass: one chunk per logical slice the window touches
        let chunks = (addr + size - 1) / slice - addr / slice + 1;
        let mut idx = self.layout.row_for_addr(addr);
        let mut current = addr;
        let mut remaining = size;
        let mut out_pos = 0usize;

        for chunk in 0..chunks {
            if self.wear_factor > 1 {
                // The latest snapshot of the slice owning `current`
                // sits in the wear block before the head
                let mut p = self.layout.companion(self.head);
                for _ in 0..self.layout.logical_rows() {
                    p = self.layout.next(p);
                    let start = self.layout.slice_start(p);
                    if current >= start && current < start + slice {
                        break;
                    }
                }
                idx = p;
            }

            let in_row = current % slice;
            let to_copy = if chunk == chunks - 1 {
                remaining
            } else {
                slice - in_row
            };

            let source = self.load_row(idx, &mut buf)?;
            let chunk_status = match source {
                RowSource::Primary => Status::Success,
                RowSource::Mirror => Status::RedundantCopyUsed,
                RowSource::Neither => {
                    // The span stays zeroed either way; a row that was
                    // never written is not a fault
                    if Row::new(&buf[..row_len]).is_never_written() {
                        Status::Success
                    } else {
                        Status::BadChecksum
                    }
                }
            };
            if source != RowSource::Neither {
                let historic = Row::new(&buf[..row_len]).historic();
                let start = in_row as usize;
                out[out_pos..out_pos + to_copy as usize]
                    .copy_from_slice(&historic[start..start + to_copy as usize]);
            }
            status = status.merge(chunk_status);

            if self.wear_factor <= 1 {
                idx = self.layout.next(idx);
            }
            current += to_copy;
            remaining -= to_copy;
            out_pos += to_copy as usize;
        }

        // Header pass: overlay newer header payloads over the
        // historic data, oldest row first so the newest write wins
        let mut p = self.layout.companion(self.head);
        for _ in 0..self.layout.logical_rows() {
            p = self.layout.next(p);
            let source = self.load_row(p, &mut buf)?;
            if source == RowSource::Neither {
                // An unrecoverable row may hold a header this window
                // needs; its range fields cannot be trusted to tell
                if !Row::new(&buf[..row_len]).is_never_written() {
                    status = status.merge(Status::BadChecksum);
                }
                continue;
            }
            if source == RowSource::Mirror {
                status = status.merge(Status::RedundantCopyUsed);
            }
            let row = Row::new(&buf[..row_len]);
            if row.len() > self.header_data_len {
                // A length beyond the payload area only survives a
                // checksum collision
                continue;
            }
            let head_start = row.addr();
            let head_end = head_start.saturating_add(row.len());
            if head_start < addr + size && head_end > addr {
                let dst = head_start.saturating_sub(addr) as usize;
                let src = addr.saturating_sub(head_start) as usize;
                let count = (head_end.min(addr + size) - head_start.max(addr)) as usize;
                out[dst..dst + count].copy_from_slice(&row.header_data()[src..src + count]);
            }
        }

        Ok(status)
    }

    // ---- extended mode: write ----

    fn write_extended(&mut self, addr: u32, data: &[u8]) -> Result<Status, EepromError> {
        let (_, mut seq) = self.check_head_integrity()?;
        let mut idx = self.head;
        let capacity = self.header_data_len;
        let writes = (data.len() as u32 - 1) / capacity + 1;
        let row_len = self.row_len();

        let mut image = [0u8; MAX_ROW_SIZE as usize];
        let mut scratch = [0u8; MAX_ROW_SIZE as usize];

        let mut chunk_addr = addr;
        let mut remaining = data.len() as u32;
        let mut offset = 0usize;

        for write in 0..writes {
            idx = self.layout.next(idx);
            seq += 1;

            image[..row_len].fill(0);
            let len = if write == writes - 1 {
                remaining
            } else {
                capacity
            };
            {
                let mut row = RowMut::new(&mut image[..row_len]);
                row.set_seq(seq);
                row.set_addr(chunk_addr);
                row.set_len(len);
                row.header_data_mut()[..len as usize]
                    .copy_from_slice(&data[offset..offset + len as usize]);
            }

            self.fill_historic(idx, &mut image, &mut scratch)?;
            self.overlay_recent_headers(idx, seq, &mut image, &mut scratch)?;
            RowMut::new(&mut image[..row_len]).seal();

            self.program_row(self.layout.addr(idx), &image[..row_len])?;
            if self.redundant {
                self.program_row(self.layout.mirror_addr(idx), &image[..row_len])?;
            }
            self.head = idx;

            chunk_addr += capacity;
            remaining = remaining.saturating_sub(capacity);
            offset += capacity as usize;
        }

        Ok(Status::Success)
    }

    /// Fill the historic half of `image` from the previous snapshot of
    /// the slice owned by row `idx`
    fn fill_historic(
        &mut self,
        idx: u32,
        image: &mut [u8],
        scratch: &mut [u8],
    ) -> Result<(), EepromError> {
        let companion = self.layout.companion(idx);
        let source = self.load_row(companion, scratch)?;
        if source != RowSource::Neither {
            let row_len = self.row_len();
            let half = self.slice_len as usize;
            image[half..row_len].copy_from_slice(&scratch[half..row_len]);
        }
        // A companion that was never written, or is unrecoverable,
        // contributes the already-zeroed fresh slice
        Ok(())
    }

    /// Replay header payloads from the most recent writes into the
    /// image's historic half, oldest first, ending with the in-flight
    /// image itself
    fn overlay_recent_headers(
        &mut self,
        idx: u32,
        seq: u32,
        image: &mut [u8],
        scratch: &mut [u8],
    ) -> Result<(), EepromError> {
        let row_len = self.row_len();
        let half = self.slice_len;
        let hist_start = self.layout.slice_start(idx);
        let hist_end = hist_start + half;
        let reads = self.layout.logical_rows().min(seq);

        for i in 0..reads {
            let from_image = i == reads - 1;
            let (head_start, head_len) = if from_image {
                let row = Row::new(&image[..row_len]);
                (row.addr(), row.len())
            } else {
                let p = self.layout.back(idx, reads - 1 - i);
                if self.load_row(p, scratch)? == RowSource::Neither {
                    continue;
                }
                let row = Row::new(&scratch[..row_len]);
                if row.len() > self.header_data_len {
                    continue;
                }
                (row.addr(), row.len())
            };

            let head_end = head_start.saturating_add(head_len);
            if head_start >= hist_end || head_end <= hist_start {
                continue;
            }
            let (dst_off, src_off, count) = if head_start >= hist_start {
                let count = if head_end > hist_end {
                    hist_end - head_start
                } else {
                    head_len
                };
                (head_start - hist_start, 0, count)
            } else {
                (0, hist_start - head_start, head_end - hist_start)
            };

            let src = HEADER_DATA_OFFSET + src_off as usize;
            let dst = dst_off as usize;
            let count = count as usize;
            if from_image {
                let (header_half, historic_half) = image.split_at_mut(half as usize);
                historic_half[dst..dst + count]
                    .copy_from_slice(&header_half[src..src + count]);
            } else {
                let dst = half as usize + dst;
                image[dst..dst + count].copy_from_slice(&scratch[src..src + count]);
            }
        }
        Ok(())
    }

    // ---- extended mode: erase ----

    fn erase_extended(&mut self) -> Result<Status, EepromError> {
        let (_, seq) = self.check_head_integrity()?;
        let idx = self.layout.next(self.head);
        let row_len = self.row_len();

        // Erase marker: a zero-payload row carrying the bumped
        // sequence number, so write counting survives the erase
        let mut image = [0u8; MAX_ROW_SIZE as usize];
        {
            let mut row = RowMut::new(&mut image[..row_len]);
            row.set_seq(seq + 1);
            row.seal();
        }
        self.program_row(self.layout.addr(idx), &image[..row_len])?;
        if self.redundant {
            self.program_row(self.layout.mirror_addr(idx), &image[..row_len])?;
        }
        self.head = idx;

        image[..row_len].fill(0);
        let mut first_error = None;
        let mut p = idx;
        for _ in 1..self.layout.ring_rows() {
            p = self.layout.next(p);
            if let Err(e) = self.program_row(self.layout.addr(p), &image[..row_len]) {
                first_error.get_or_insert(e);
            }
            if self.redundant {
                if let Err(e) = self.program_row(self.layout.mirror_addr(p), &image[..row_len]) {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            None => Ok(Status::Success),
            Some(e) => Err(e),
        }
    }

    // ---- programming protocol ----

    /// Program one row image, erasing first when the technology
    /// requires it
    fn program_row(&mut self, nvm_addr: u32, image: &[u8]) -> Result<(), EepromError> {
        if self.blocking_write {
            if self.device.is_erase_required() {
                self.device
                    .erase(nvm_addr, self.row_size)
                    .map_err(|e| EepromError::write_fail(e.to_string()))?;
            }
            self.device
                .program(nvm_addr, image)
                .map_err(|e| EepromError::write_fail(e.to_string()))?;
            return Ok(());
        }
        self.program_row_nb(nvm_addr, image)
    }

    #[cfg(feature = "non-blocking")]
    fn program_row_nb(&mut self, nvm_addr: u32, image: &[u8]) -> Result<(), EepromError> {
        if self.device.is_erase_required() {
            self.device
                .erase_nb(nvm_addr, self.row_size)
                .map_err(|e| EepromError::write_fail(e.to_string()))?;
        }
        self.device
            .program_nb(nvm_addr, image)
            .map_err(|e| EepromError::write_fail(e.to_string()))
    }

    #[cfg(not(feature = "non-blocking"))]
    fn program_row_nb(&mut self, _nvm_addr: u32, _image: &[u8]) -> Result<(), EepromError> {
        Err(EepromError::bad_param(
            "non-blocking writes require the non-blocking feature",
        ))
    }
}
