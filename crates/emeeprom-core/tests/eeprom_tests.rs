//! Emulated EEPROM integration tests
//!
//! Drives the engine end to end over the mock block storage device:
//! round trips in both modes, wear-leveling spread, redundant-copy
//! recovery, checksum detection, erase semantics, and the write-count
//! bookkeeping.

use emeeprom_core::{EepromConfig, EepromError, EmEeprom, Status};
use emeeprom_hal::{MockFlash, MockFlashConfig};

const BASE: u32 = 0x1000_0000;
const ROW: u32 = 512;

fn flash() -> MockFlash {
    MockFlash::new(MockFlashConfig::default())
}

fn extended(eeprom_size: u32, wear: u8, redundant: bool) -> EepromConfig {
    EepromConfig {
        eeprom_size,
        simple_mode: false,
        wear_leveling_factor: wear,
        redundant_copy: redundant,
        blocking_write: true,
        start_addr: BASE,
    }
}

fn simple(eeprom_size: u32) -> EepromConfig {
    EepromConfig {
        eeprom_size,
        simple_mode: true,
        ..extended(eeprom_size, 1, false)
    }
}

/// Sequence number stored in the primary row at ring index `idx`
fn stored_seq(eeprom: &EmEeprom<MockFlash>, idx: u32) -> u32 {
    let bytes = eeprom.storage().peek(BASE + idx * ROW + 4, 4);
    u32::from_le_bytes(bytes.try_into().unwrap())
}

// ---- scenarios ----

#[test]
fn test_simple_mode_round_trip() {
    let mut eeprom = EmEeprom::new(&simple(512), flash()).unwrap();

    let status = eeprom.write(0, b"hello").unwrap();
    assert_eq!(status, Status::Success);

    let mut out = [0u8; 5];
    let status = eeprom.read(0, &mut out).unwrap();
    assert_eq!(status, Status::Success);
    assert_eq!(&out, b"hello");
}

#[test]
fn test_extended_mode_basic_write_read() {
    let mut eeprom = EmEeprom::new(&extended(512, 1, false), flash()).unwrap();

    let data = [0xA5u8; 50];
    assert_eq!(eeprom.write(100, &data).unwrap(), Status::Success);

    let mut out = [0u8; 50];
    assert_eq!(eeprom.read(100, &mut out).unwrap(), Status::Success);
    assert_eq!(out, data);
    assert_eq!(eeprom.num_writes().unwrap(), 1);
}

#[test]
fn test_redundant_copy_recovers_corrupt_primary() {
    let mut eeprom = EmEeprom::new(&extended(512, 1, true), flash()).unwrap();

    let data = [0xA5u8; 50];
    eeprom.write(100, &data).unwrap();

    // The write landed in ring row 1; smash its first primary byte
    eeprom.storage_mut().corrupt_byte(BASE + ROW);

    let mut out = [0u8; 50];
    let status = eeprom.read(100, &mut out).unwrap();
    assert_eq!(status, Status::RedundantCopyUsed);
    assert_eq!(out, data);
}

#[test]
fn test_unrecoverable_row_reads_zero() {
    let mut eeprom = EmEeprom::new(&extended(512, 1, false), flash()).unwrap();

    eeprom.write(100, &[0xA5u8; 50]).unwrap();
    eeprom.storage_mut().corrupt_byte(BASE + ROW);

    let mut out = [0xEEu8; 50];
    let status = eeprom.read(100, &mut out).unwrap();
    assert_eq!(status, Status::BadChecksum);
    assert!(out.iter().all(|&b| b == 0));
}

#[test]
fn test_wear_leveling_rotates_rows() {
    // One logical row replicated across four wear blocks
    let mut eeprom = EmEeprom::new(&extended(256, 4, false), flash()).unwrap();

    for _ in 0..10 {
        eeprom.write(0, &[0x01]).unwrap();
    }

    // Ten writes wrapped the four-row ring; the survivors are the
    // last four sequence numbers, one per row
    let mut seqs: Vec<u32> = (0..4).map(|idx| stored_seq(&eeprom, idx)).collect();
    seqs.sort_unstable();
    assert_eq!(seqs, vec![7, 8, 9, 10]);

    let mut out = [0u8; 1];
    assert_eq!(eeprom.read(0, &mut out).unwrap(), Status::Success);
    assert_eq!(out[0], 0x01);
    assert_eq!(eeprom.num_writes().unwrap(), 10);
}

#[test]
fn test_erase_preserves_write_count() {
    let mut eeprom = EmEeprom::new(&extended(256, 4, false), flash()).unwrap();
    for _ in 0..10 {
        eeprom.write(0, &[0x01]).unwrap();
    }

    assert_eq!(eeprom.erase().unwrap(), Status::Success);
    assert_eq!(eeprom.num_writes().unwrap(), 11);

    let mut out = [0xEEu8; 256];
    assert_eq!(eeprom.read(0, &mut out).unwrap(), Status::Success);
    assert!(out.iter().all(|&b| b == 0));
}

// ---- invariants ----

#[test]
fn test_round_trip_across_configurations() {
    let configs = [
        simple(512),
        extended(512, 1, false),
        extended(512, 1, true),
        extended(1024, 3, false),
        extended(1024, 3, true),
    ];

    for config in configs {
        let mut eeprom = EmEeprom::new(&config, flash()).unwrap();
        eeprom.erase().unwrap();

        let data: Vec<u8> = (0..100u32).map(|i| i as u8).collect();
        let status = eeprom.write(3, &data).unwrap();
        assert_eq!(status, Status::Success, "write under {config:?}");

        let mut out = vec![0u8; 100];
        let status = eeprom.read(3, &mut out).unwrap();
        assert_eq!(status, Status::Success, "read under {config:?}");
        assert_eq!(out, data, "data under {config:?}");
    }
}

#[test]
fn test_everything_reads_zero_after_erase() {
    let mut eeprom = EmEeprom::new(&extended(1024, 2, true), flash()).unwrap();

    eeprom.write(0, &[0x55u8; 300]).unwrap();
    eeprom.write(700, &[0xAAu8; 100]).unwrap();
    eeprom.erase().unwrap();

    let mut out = vec![0xEEu8; 1024];
    assert_eq!(eeprom.read(0, &mut out).unwrap(), Status::Success);
    assert!(out.iter().all(|&b| b == 0));
}

#[test]
fn test_num_writes_is_monotonic() {
    let mut eeprom = EmEeprom::new(&extended(512, 2, false), flash()).unwrap();
    let mut last = eeprom.num_writes().unwrap();
    assert_eq!(last, 0);

    for i in 0..5 {
        eeprom.write(0, &[i]).unwrap();
        let count = eeprom.num_writes().unwrap();
        assert!(count > last);
        last = count;
    }

    eeprom.erase().unwrap();
    assert_eq!(eeprom.num_writes().unwrap(), last + 1);
}

#[test]
fn test_any_corrupted_byte_is_detected() {
    // Flip bytes across the whole written row: header fields, header
    // data, and both ends of the historic half
    let offsets = [0u32, 1, 2, 3, 4, 8, 12, 16, 100, 255, 256, 400, 511];

    for &offset in &offsets {
        let mut eeprom = EmEeprom::new(&extended(512, 1, false), flash()).unwrap();
        eeprom.write(100, &[0xA5u8; 50]).unwrap();
        eeprom.storage_mut().corrupt_byte(BASE + ROW + offset);

        let mut out = [0u8; 50];
        let status = eeprom.read(100, &mut out).unwrap();
        assert_eq!(
            status,
            Status::BadChecksum,
            "flip at row byte {offset} undetected"
        );
    }
}

#[test]
fn test_corruption_with_mirror_keeps_data_correct() {
    let offsets = [0u32, 5, 17, 256, 511];

    for &offset in &offsets {
        let mut eeprom = EmEeprom::new(&extended(512, 1, true), flash()).unwrap();
        eeprom.write(100, &[0xA5u8; 50]).unwrap();
        eeprom.storage_mut().corrupt_byte(BASE + ROW + offset);

        let mut out = [0u8; 50];
        let status = eeprom.read(100, &mut out).unwrap();
        assert_eq!(status, Status::RedundantCopyUsed, "flip at row byte {offset}");
        assert_eq!(out, [0xA5u8; 50], "flip at row byte {offset}");
    }
}

#[test]
fn test_wear_spread_uses_every_row_once() {
    // N = 2, W = 3: six ring rows
    let mut eeprom = EmEeprom::new(&extended(512, 3, false), flash()).unwrap();

    for i in 0..4u8 {
        eeprom.write(0, &[i]).unwrap();
    }

    let seqs: Vec<u32> = (0..6).map(|idx| stored_seq(&eeprom, idx)).collect();
    let written: Vec<u32> = seqs.iter().copied().filter(|&s| s != 0).collect();
    assert_eq!(written.len(), 4);
    for expected in 1..=4 {
        assert!(written.contains(&expected), "seq {expected} missing in {seqs:?}");
    }
}

#[test]
fn test_wrap_around_keeps_latest_value() {
    // N = 1, W = 4: four ring rows, five writes wrap the ring
    let mut eeprom = EmEeprom::new(&extended(256, 4, false), flash()).unwrap();

    for i in 0..5u8 {
        eeprom.write(10, &[0x10 + i, 0x20 + i]).unwrap();
    }

    let mut out = [0u8; 2];
    assert_eq!(eeprom.read(10, &mut out).unwrap(), Status::Success);
    assert_eq!(out, [0x14, 0x24]);

    // And again over a multi-slice ring
    let mut eeprom = EmEeprom::new(&extended(512, 2, false), flash()).unwrap();
    for i in 0..5u8 {
        eeprom.write(300, &[i]).unwrap();
    }
    let mut out = [0u8; 1];
    assert_eq!(eeprom.read(300, &mut out).unwrap(), Status::Success);
    assert_eq!(out[0], 4);
}

#[test]
fn test_physical_size_identity() {
    let cases = [
        (simple(512), 512),
        (simple(1000), 1024),
        (extended(512, 1, false), 2 * ROW),
        (extended(512, 1, true), 2 * 2 * ROW),
        (extended(512, 3, false), 2 * 3 * ROW),
        (extended(1024, 10, true), 4 * 10 * 2 * ROW),
        (extended(256, 4, false), 4 * ROW),
    ];

    for (config, expected) in cases {
        let eeprom = EmEeprom::new(&config, flash()).unwrap();
        assert_eq!(eeprom.physical_size(), expected, "under {config:?}");
    }
}

// ---- parameter and region validation ----

#[test]
fn test_region_must_fit_the_device() {
    let small = MockFlash::new(MockFlashConfig {
        capacity: 2048,
        ..MockFlashConfig::default()
    });
    // N = 2, W = 3, mirror: needs 12 rows of 512
    let result = EmEeprom::new(&extended(512, 3, true), small);
    assert!(matches!(result, Err(EepromError::BadData(_))));
}

#[test]
fn test_oversized_region_rejected_without_panic() {
    // Validation accepts the fields, but the physical footprint
    // (~62.5M rows x 10 wear blocks x 2 copies) cannot be addressed
    // in 32 bits; init must refuse rather than wrap
    let config = extended(4_000_000_000, 10, true);
    assert!(matches!(
        EmEeprom::new(&config, flash()),
        Err(EepromError::BadData(_))
    ));

    // A region that would run past the top of the address space is
    // just as unrepresentable
    let high_flash = MockFlash::new(MockFlashConfig {
        base_addr: 0xFFFF_FC00,
        capacity: 1024,
        ..MockFlashConfig::default()
    });
    let config = EepromConfig {
        start_addr: 0xFFFF_FC00,
        ..extended(512, 1, false)
    };
    assert!(matches!(
        EmEeprom::new(&config, high_flash),
        Err(EepromError::BadData(_))
    ));
}

#[test]
fn test_invalid_config_rejected_before_nvm_access() {
    let config = EepromConfig {
        wear_leveling_factor: 11,
        ..extended(512, 1, false)
    };
    assert!(matches!(
        EmEeprom::new(&config, flash()),
        Err(EepromError::BadParam(_))
    ));

    let config = EepromConfig {
        eeprom_size: 0,
        ..extended(512, 1, false)
    };
    assert!(matches!(
        EmEeprom::new(&config, flash()),
        Err(EepromError::BadParam(_))
    ));
}

#[test]
fn test_non_blocking_config_needs_driver_support() {
    let config = EepromConfig {
        blocking_write: false,
        ..extended(512, 1, false)
    };
    assert!(matches!(
        EmEeprom::new(&config, flash()),
        Err(EepromError::BadParam(_))
    ));
}

#[test]
fn test_out_of_range_access_rejected() {
    let mut eeprom = EmEeprom::new(&extended(512, 1, false), flash()).unwrap();
    let mut buf = [0u8; 16];

    assert!(matches!(
        eeprom.read(0, &mut []),
        Err(EepromError::BadParam(_))
    ));
    assert!(matches!(
        eeprom.read(500, &mut buf),
        Err(EepromError::BadParam(_))
    ));
    assert!(matches!(
        eeprom.write(510, &[0u8; 3]),
        Err(EepromError::BadParam(_))
    ));
    assert!(matches!(eeprom.write(0, &[]), Err(EepromError::BadParam(_))));

    // Nothing was written by the rejected calls
    assert_eq!(eeprom.num_writes().unwrap(), 0);
}

// ---- multi-row and partial-row behavior ----

#[test]
fn test_write_spanning_multiple_rows() {
    let mut eeprom = EmEeprom::new(&extended(1024, 1, false), flash()).unwrap();

    let data: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
    eeprom.write(10, &data).unwrap();

    // 300 bytes at 240 per row header is two rows
    assert_eq!(eeprom.num_writes().unwrap(), 2);

    let mut out = vec![0u8; 300];
    assert_eq!(eeprom.read(10, &mut out).unwrap(), Status::Success);
    assert_eq!(out, data);
}

#[test]
fn test_simple_mode_partial_row_overwrite() {
    let mut eeprom = EmEeprom::new(&simple(512), flash()).unwrap();

    eeprom.write(0, b"hello").unwrap();
    eeprom.write(1, b"XY").unwrap();

    let mut out = [0u8; 5];
    eeprom.read(0, &mut out).unwrap();
    assert_eq!(&out, b"hXYlo");
}

#[test]
fn test_header_data_migrates_into_historic_snapshots() {
    // N = 2, W = 1: a header payload spanning both logical slices
    // must survive its row being recycled
    let mut eeprom = EmEeprom::new(&extended(512, 1, false), flash()).unwrap();

    let spanning: Vec<u8> = (1..=100u8).collect();
    eeprom.write(200, &spanning).unwrap();
    eeprom.write(0, b"zz").unwrap();
    // Third write recycles the row that carried the spanning payload
    eeprom.write(400, &[0xCC]).unwrap();

    let mut out = vec![0u8; 100];
    assert_eq!(eeprom.read(200, &mut out).unwrap(), Status::Success);
    assert_eq!(out, spanning);

    let mut out = [0u8; 2];
    eeprom.read(0, &mut out).unwrap();
    assert_eq!(&out, b"zz");
    let mut out = [0u8; 1];
    eeprom.read(400, &mut out).unwrap();
    assert_eq!(out[0], 0xCC);
}

#[test]
fn test_write_failure_keeps_committed_rows() {
    let mut eeprom = EmEeprom::new(&extended(1024, 1, false), flash()).unwrap();

    let data = [0x77u8; 300];
    eeprom.storage_mut().fail_after_programs(1);
    let result = eeprom.write(10, &data);
    assert!(matches!(result, Err(EepromError::WriteFail(_))));

    // The first of the two rows committed before the failure
    eeprom.storage_mut().clear_failures();
    assert_eq!(eeprom.num_writes().unwrap(), 1);

    let mut out = [0u8; 240];
    assert_eq!(eeprom.read(10, &mut out).unwrap(), Status::Success);
    assert_eq!(out, [0x77u8; 240]);
}

// ---- redundancy details ----

#[test]
fn test_mirror_row_matches_primary() {
    let mut eeprom = EmEeprom::new(&extended(512, 1, true), flash()).unwrap();
    eeprom.write(100, &[0xA5u8; 50]).unwrap();

    // Ring of two rows; the mirror ring starts right after it
    let primary = eeprom.storage().peek(BASE + ROW, ROW).to_vec();
    let mirror = eeprom.storage().peek(BASE + 3 * ROW, ROW).to_vec();
    assert_eq!(primary, mirror);
}

#[test]
fn test_num_writes_survives_primary_head_corruption() {
    let mut eeprom = EmEeprom::new(&extended(512, 1, true), flash()).unwrap();
    eeprom.write(0, &[1, 2, 3]).unwrap();

    eeprom.storage_mut().corrupt_byte(BASE + ROW + 7);
    assert_eq!(eeprom.num_writes().unwrap(), 1);
}

#[test]
fn test_num_writes_zero_when_nothing_valid() {
    let mut eeprom = EmEeprom::new(&extended(512, 1, false), flash()).unwrap();
    eeprom.write(0, &[1, 2, 3]).unwrap();

    eeprom.storage_mut().corrupt_byte(BASE + ROW + 7);
    assert_eq!(eeprom.num_writes().unwrap(), 0);
}

// ---- persistence across instances ----

#[test]
fn test_head_recovered_after_power_cycle() {
    let config = extended(512, 2, false);
    let mut eeprom = EmEeprom::new(&config, flash()).unwrap();
    eeprom.write(20, b"first").unwrap();
    eeprom.write(20, b"again").unwrap();

    // Tear down and bring the engine back over the same device
    let flash = eeprom.into_storage();
    let mut eeprom = EmEeprom::new(&config, flash).unwrap();

    assert_eq!(eeprom.num_writes().unwrap(), 2);
    let mut out = [0u8; 5];
    assert_eq!(eeprom.read(20, &mut out).unwrap(), Status::Success);
    assert_eq!(&out, b"again");
}

// ---- non-blocking programming path ----

#[cfg(feature = "non-blocking")]
mod non_blocking {
    use super::*;

    fn nb_flash() -> MockFlash {
        MockFlash::new(MockFlashConfig {
            non_blocking: true,
            erase_required: true,
            erased_value: 0xFF,
            reports_blank: true,
            ..MockFlashConfig::default()
        })
    }

    #[test]
    fn test_non_blocking_write_round_trip() {
        let config = EepromConfig {
            blocking_write: false,
            ..extended(512, 2, true)
        };
        let mut eeprom = EmEeprom::new(&config, nb_flash()).unwrap();

        let data = [0xA5u8; 50];
        assert_eq!(eeprom.write(100, &data).unwrap(), Status::Success);
        assert_eq!(eeprom.num_writes().unwrap(), 1);

        let mut out = [0u8; 50];
        assert_eq!(eeprom.read(100, &mut out).unwrap(), Status::Success);
        assert_eq!(out, data);
    }

    #[test]
    fn test_non_blocking_erase() {
        let config = EepromConfig {
            blocking_write: false,
            ..extended(512, 2, false)
        };
        let mut eeprom = EmEeprom::new(&config, nb_flash()).unwrap();

        eeprom.write(0, &[0x55u8; 200]).unwrap();
        assert_eq!(eeprom.erase().unwrap(), Status::Success);
        assert_eq!(eeprom.num_writes().unwrap(), 2);

        let mut out = [0xEEu8; 512];
        assert_eq!(eeprom.read(0, &mut out).unwrap(), Status::Success);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_non_blocking_simple_mode() {
        let config = EepromConfig {
            blocking_write: false,
            ..simple(512)
        };
        let mut eeprom = EmEeprom::new(&config, nb_flash()).unwrap();

        eeprom.write(0, b"hello").unwrap();
        let mut out = [0u8; 5];
        assert_eq!(eeprom.read(0, &mut out).unwrap(), Status::Success);
        assert_eq!(&out, b"hello");
    }
}

// ---- erased-state handling ----

#[test]
fn test_memory_where_erased_is_not_zero() {
    let nor_like = || {
        MockFlash::new(MockFlashConfig {
            erased_value: 0xFF,
            reports_blank: true,
            erase_required: true,
            ..MockFlashConfig::default()
        })
    };

    // Extended mode: the erased region scans as never written
    let mut eeprom = EmEeprom::new(&extended(512, 2, true), nor_like()).unwrap();
    assert_eq!(eeprom.num_writes().unwrap(), 0);

    let mut out = [0xEEu8; 64];
    assert_eq!(eeprom.read(0, &mut out).unwrap(), Status::Success);
    assert!(out.iter().all(|&b| b == 0));

    eeprom.write(10, b"retain").unwrap();
    let mut out = [0u8; 6];
    assert_eq!(eeprom.read(10, &mut out).unwrap(), Status::Success);
    assert_eq!(&out, b"retain");

    // Simple mode: unwritten rows still read as zero
    let mut eeprom = EmEeprom::new(&simple(512), nor_like()).unwrap();
    let mut out = [0xEEu8; 32];
    assert_eq!(eeprom.read(64, &mut out).unwrap(), Status::Success);
    assert!(out.iter().all(|&b| b == 0));

    eeprom.write(64, b"ab").unwrap();
    let mut out = [0u8; 2];
    eeprom.read(64, &mut out).unwrap();
    assert_eq!(&out, b"ab");
}
