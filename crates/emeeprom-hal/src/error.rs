//! Block storage error types

use thiserror::Error;

/// Errors reported by block storage drivers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Device-level read failure
    #[error("read of {len} bytes at {addr:#010x} failed")]
    Read { addr: u32, len: u32 },

    /// Device-level program failure
    #[error("program of {len} bytes at {addr:#010x} failed")]
    Program { addr: u32, len: u32 },

    /// Device-level erase failure
    #[error("erase of {len} bytes at {addr:#010x} failed")]
    Erase { addr: u32, len: u32 },

    /// Address range outside the device
    #[error("range {addr:#010x}..+{len} is outside the device")]
    OutOfRange { addr: u32, len: u32 },

    /// Driver does not implement the requested operation
    #[error("operation not supported by this driver: {0}")]
    Unsupported(&'static str),
}

impl StorageError {
    /// Create a read failure for the given range
    pub fn read(addr: u32, len: u32) -> Self {
        StorageError::Read { addr, len }
    }

    /// Create a program failure for the given range
    pub fn program(addr: u32, len: u32) -> Self {
        StorageError::Program { addr, len }
    }

    /// Create an erase failure for the given range
    pub fn erase(addr: u32, len: u32) -> Self {
        StorageError::Erase { addr, len }
    }

    /// Create an out-of-range error for the given range
    pub fn out_of_range(addr: u32, len: u32) -> Self {
        StorageError::OutOfRange { addr, len }
    }
}
