//! Block Storage Layer for EmEEPROM
//!
//! Provides the capability trait the emulated EEPROM engine consumes
//! from a page-oriented NVM driver, plus a RAM-backed mock device for
//! desktop testing:
//! - `mock`: RAM-backed [`MockFlash`] for testing (default)
//! - `non-blocking`: non-blocking program/erase trait members for
//!   drivers that complete operations asynchronously

pub mod error;
pub mod traits;

#[cfg(feature = "mock")]
pub mod mock;

pub use error::StorageError;
pub use traits::BlockStorage;

#[cfg(feature = "mock")]
pub use mock::{MockFlash, MockFlashConfig};
