//! EmEEPROM Engine
//!
//! Driver-independent emulated EEPROM: byte-addressable, persistent,
//! logical storage on top of a page-oriented NVM device whose native
//! unit is a fixed-size row. The engine layers three coupled
//! guarantees over raw byte I/O:
//!
//! - **Wear leveling** — writes rotate through a circular row log
//!   spanning a configurable multiple of the logical capacity
//! - **Integrity** — every row carries a CRC-8 checksum, verified on
//!   every read
//! - **Redundancy** — an optional mirror of the whole region recovers
//!   rows the primary copy has lost
//!
//! The engine is generic over the [`BlockStorage`] capability trait
//! from `emeeprom-hal` and holds no global state; each
//! [`EmEeprom`] instance owns its driver and its region.
//!
//! ```no_run
//! use emeeprom_core::{EepromConfig, EmEeprom};
//! use emeeprom_hal::{MockFlash, MockFlashConfig};
//!
//! # fn main() -> Result<(), emeeprom_core::EepromError> {
//! let flash = MockFlash::new(MockFlashConfig::default());
//! let config = EepromConfig {
//!     eeprom_size: 512,
//!     wear_leveling_factor: 2,
//!     ..EepromConfig::default()
//! };
//!
//! let mut eeprom = EmEeprom::new(&config, flash)?;
//! eeprom.write(0, b"hello")?;
//!
//! let mut out = [0u8; 5];
//! eeprom.read(0, &mut out)?;
//! assert_eq!(&out, b"hello");
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod config;
pub mod engine;
pub mod error;
pub mod layout;
pub mod recovery;
pub mod row;

pub use config::{EepromConfig, MAX_WEAR_LEVELING_FACTOR, MAX_WRITE_DURATION_MS};
pub use engine::EmEeprom;
pub use error::{EepromError, Status};
pub use layout::Layout;
pub use row::{MAX_ROW_SIZE, MIN_ROW_SIZE};

pub use emeeprom_hal::{BlockStorage, StorageError};
