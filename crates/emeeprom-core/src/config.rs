//! Engine configuration
//!
//! 🔗 T4-CORE-010: Configuration Implementation
//! Derived From: T3-STORAGE-002 (Region Sizing) + T2-HAL-001 (Driver Contract)
//! AI Traceability: Parameter validation, mode overrides, config persistence

use serde::{Deserialize, Serialize};

use crate::error::EepromError;

/// Largest admissible wear-leveling factor
pub const MAX_WEAR_LEVELING_FACTOR: u8 = 10;

/// Caller-observable upper bound on a single row program, in
/// milliseconds
///
/// A documentation constant describing the slowest admissible driver,
/// not a timer the engine runs.
pub const MAX_WRITE_DURATION_MS: u32 = 50;

/// Emulated EEPROM configuration
///
/// Fixed for the lifetime of an engine instance. `simple_mode` trades
/// every reliability feature for a flat one-row-per-slice layout;
/// the wear-leveling and redundancy fields are forced to their
/// inert values in that mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EepromConfig {
    /// Logical capacity in bytes
    pub eeprom_size: u32,

    /// Raw row-per-slice storage without wear leveling, redundancy,
    /// or checksums
    pub simple_mode: bool,

    /// How many copies of the logical layout share the write load
    /// (1..=10; ignored in simple mode)
    pub wear_leveling_factor: u8,

    /// Keep a mirror of the whole region for recovery (ignored in
    /// simple mode)
    pub redundant_copy: bool,

    /// Use the driver's blocking program/erase entry points; `false`
    /// is rejected unless the driver reports non-blocking support
    pub blocking_write: bool,

    /// First device address of the storage region
    pub start_addr: u32,
}

impl Default for EepromConfig {
    fn default() -> Self {
        Self {
            eeprom_size: 1024,
            simple_mode: false,
            wear_leveling_factor: 1,
            redundant_copy: false,
            blocking_write: true,
            start_addr: 0x1000_0000,
        }
    }
}

impl EepromConfig {
    /// Validate the configuration fields
    pub fn validate(&self) -> Result<(), EepromError> {
        if self.eeprom_size == 0 {
            return Err(EepromError::bad_param("eeprom_size must be non-zero"));
        }
        if self.start_addr == 0 {
            return Err(EepromError::bad_param("start_addr must be non-zero"));
        }
        if self.wear_leveling_factor == 0 || self.wear_leveling_factor > MAX_WEAR_LEVELING_FACTOR {
            return Err(EepromError::bad_param(format!(
                "wear_leveling_factor must be 1-{MAX_WEAR_LEVELING_FACTOR}, got {}",
                self.wear_leveling_factor
            )));
        }
        Ok(())
    }

    /// Wear-leveling factor after the simple-mode override
    pub fn effective_wear_factor(&self) -> u32 {
        if self.simple_mode {
            1
        } else {
            u32::from(self.wear_leveling_factor)
        }
    }

    /// Redundancy setting after the simple-mode override
    pub fn effective_redundancy(&self) -> bool {
        !self.simple_mode && self.redundant_copy
    }

    /// Serialize to JSON for persistence
    pub fn to_json(&self) -> Result<String, EepromError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EepromError::bad_param(format!("config serialization failed: {e}")))
    }

    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, EepromError> {
        let config: EepromConfig = serde_json::from_str(json)
            .map_err(|e| EepromError::bad_param(format!("config parsing failed: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}
