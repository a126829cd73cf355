//! Head recovery
//!
//! The cached head index is only a hint: after power loss, an
//! interrupted write, or bit rot it can point at a row that no longer
//! verifies. The full scan rebuilds it from scratch by sweeping the
//! region for the greatest valid sequence number; the cheap path
//! validates the cached head first and only escalates when both the
//! primary and its mirror fail.

use emeeprom_hal::BlockStorage;

use crate::engine::EmEeprom;
use crate::error::{EepromError, Status};
use crate::row::{Row, MAX_ROW_SIZE};

impl<B: BlockStorage> EmEeprom<B> {
    /// Full scan: find the row with the greatest valid sequence number
    ///
    /// With redundancy enabled the mirror is swept too; a mirror row
    /// with a strictly greater valid sequence number wins and the scan
    /// reports [`Status::RedundantCopyUsed`]. When nothing verifies
    /// the head defaults to row 0 and the next write uses sequence
    /// number 1.
    pub(crate) fn locate_head(&mut self) -> Result<Status, EepromError> {
        let mut status = Status::Success;
        self.head = 0;
        if self.simple_mode {
            return Ok(status);
        }

        let mut buf = [0u8; MAX_ROW_SIZE as usize];
        let row_len = self.row_len();
        let mut max_seq = 0u32;
        let mut max_idx = 0u32;

        for idx in 0..self.layout.ring_rows() {
            self.read_row(self.layout.addr(idx), &mut buf)?;
            let row = Row::new(&buf[..row_len]);
            if row.seq() > max_seq && row.checksum_ok() {
                max_seq = row.seq();
                max_idx = idx;
            }
        }

        if self.redundant {
            for idx in 0..self.layout.ring_rows() {
                self.read_row(self.layout.mirror_addr(idx), &mut buf)?;
                let row = Row::new(&buf[..row_len]);
                if row.seq() > max_seq && row.checksum_ok() {
                    max_seq = row.seq();
                    max_idx = idx;
                    status = Status::RedundantCopyUsed;
                }
            }
        }

        self.head = max_idx;
        if status == Status::RedundantCopyUsed {
            log::warn!("head row {max_idx} (seq {max_seq}) recovered from the mirror");
        } else {
            log::debug!("head located at row {max_idx} (seq {max_seq})");
        }
        Ok(status)
    }

    /// Cheap head validation: checksum the cached head, fall back to
    /// its mirror, and rescan the whole region on double failure
    ///
    /// Returns the scan outcome and the head's sequence number. After
    /// a double failure the outcome is [`Status::BadChecksum`] even
    /// when the rescan recovered a usable head, so callers still see
    /// the partial-failure signal.
    pub(crate) fn check_head_integrity(&mut self) -> Result<(Status, u32), EepromError> {
        if self.simple_mode {
            return Ok((Status::Success, 0));
        }
        let row_len = self.row_len();
        let mut buf = [0u8; MAX_ROW_SIZE as usize];

        self.read_row(self.layout.addr(self.head), &mut buf)?;
        {
            let row = Row::new(&buf[..row_len]);
            if row.checksum_ok() {
                return Ok((Status::Success, row.seq()));
            }
        }

        if self.redundant {
            self.read_row(self.layout.mirror_addr(self.head), &mut buf)?;
            let row = Row::new(&buf[..row_len]);
            if row.checksum_ok() {
                log::warn!("head row {} failed checksum, mirror used", self.head);
                return Ok((Status::RedundantCopyUsed, row.seq()));
            }
        }

        log::warn!("head row {} unrecoverable, rescanning the region", self.head);
        self.locate_head()?;

        self.read_row(self.layout.addr(self.head), &mut buf)?;
        let mut seq = 0;
        let row = Row::new(&buf[..row_len]);
        if row.checksum_ok() {
            seq = row.seq();
        } else if self.redundant {
            self.read_row(self.layout.mirror_addr(self.head), &mut buf)?;
            let row = Row::new(&buf[..row_len]);
            if row.checksum_ok() {
                seq = row.seq();
            }
        }
        Ok((Status::BadChecksum, seq))
    }
}
