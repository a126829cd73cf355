//! Engine status and error types
//!
//! Every outcome is a value. Degraded-but-served reads come back as a
//! [`Status`] inside `Ok`; faults that prevented the operation come
//! back as an [`EepromError`]. The two types together form the
//! severity ladder `Success < RedundantCopyUsed < BadChecksum <
//! BadData < WriteFail`, with `BadParam` short-circuiting before any
//! NVM access.

use thiserror::Error;

/// Non-fatal outcome of a read or recovery scan, ordered by severity
///
/// The derived `Ord` follows the severity ladder, so accumulating the
/// worst observation across a multi-row operation is a `max` fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Status {
    /// No fault observed
    #[default]
    Success,
    /// Data was served from the mirror; the primary row failed its
    /// checksum
    RedundantCopyUsed,
    /// A needed row was unrecoverable; its span in the output is
    /// zero-filled
    BadChecksum,
}

impl Status {
    /// Fold another observation in, keeping the most severe
    #[must_use]
    pub fn merge(self, other: Status) -> Status {
        self.max(other)
    }
}

/// Fatal engine errors
#[derive(Error, Debug)]
pub enum EepromError {
    /// API precondition violated; no NVM access was attempted
    #[error("bad parameter: {0}")]
    BadParam(String),

    /// The block driver failed a read, or the configured region does
    /// not fit inside the device
    #[error("bad data: {0}")]
    BadData(String),

    /// The block driver failed a program or erase; rows committed
    /// before the failure remain on the device
    #[error("write failed: {0}")]
    WriteFail(String),
}

impl EepromError {
    /// Create a bad parameter error
    pub fn bad_param(msg: impl Into<String>) -> Self {
        EepromError::BadParam(msg.into())
    }

    /// Create a bad data error
    pub fn bad_data(msg: impl Into<String>) -> Self {
        EepromError::BadData(msg.into())
    }

    /// Create a write failure error
    pub fn write_fail(msg: impl Into<String>) -> Self {
        EepromError::WriteFail(msg.into())
    }
}
