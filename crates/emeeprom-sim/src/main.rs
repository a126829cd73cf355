//! EmEEPROM Desktop Harness
//!
//! Soaks the emulated EEPROM engine with a deterministic write
//! workload over the mock block storage device, verifies every write
//! by reading it back, and reports write counting and per-row wear at
//! the end. Useful for eyeballing wear-leveling behavior and sizing
//! configurations without hardware.

use anyhow::{bail, Result};
use clap::{Arg, ArgAction, Command};
use console::style;
use serde::Serialize;

use emeeprom_core::{EepromConfig, EmEeprom, Status};
use emeeprom_hal::{MockFlash, MockFlashConfig};

/// End-of-run summary, printable or JSON-serializable
#[derive(Debug, Serialize)]
struct SimReport {
    config: EepromConfig,
    row_size: u32,
    physical_size: u32,
    num_writes: u32,
    writes_issued: u32,
    verify_failures: u32,
    degraded_reads: u32,
    wear: WearStats,
}

/// Per-row program/erase operation counts across the primary ring
#[derive(Debug, Serialize)]
struct WearStats {
    rows: u32,
    min_ops: u32,
    max_ops: u32,
    total_ops: u64,
}

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("EmEEPROM Harness")
        .version("1.0")
        .author("EmEEPROM Team")
        .about("Desktop wear and soak harness for the emulated EEPROM engine")
        .arg(
            Arg::new("size")
                .short('s')
                .long("size")
                .value_name("BYTES")
                .help("Logical EEPROM capacity in bytes")
                .value_parser(clap::value_parser!(u32))
                .default_value("1024"),
        )
        .arg(
            Arg::new("wear")
                .short('w')
                .long("wear")
                .value_name("FACTOR")
                .help("Wear-leveling factor (1-10)")
                .value_parser(clap::value_parser!(u8))
                .default_value("2"),
        )
        .arg(
            Arg::new("redundant")
                .short('r')
                .long("redundant")
                .help("Keep a mirror copy of the region")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("simple")
                .long("simple")
                .help("Run in simple mode (no wear leveling, checksums, or mirror)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("writes")
                .short('n')
                .long("writes")
                .value_name("COUNT")
                .help("Number of writes to issue")
                .value_parser(clap::value_parser!(u32))
                .default_value("1000"),
        )
        .arg(
            Arg::new("payload")
                .short('p')
                .long("payload")
                .value_name("BYTES")
                .help("Bytes per write")
                .value_parser(clap::value_parser!(u32))
                .default_value("16"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit the final report as JSON")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let size = *matches.get_one::<u32>("size").unwrap();
    let wear = *matches.get_one::<u8>("wear").unwrap();
    let redundant = matches.get_flag("redundant");
    let simple = matches.get_flag("simple");
    let writes = *matches.get_one::<u32>("writes").unwrap();
    let payload = *matches.get_one::<u32>("payload").unwrap();
    let json = matches.get_flag("json");

    if payload == 0 || payload > size {
        bail!("payload must be between 1 and the EEPROM size");
    }

    let config = EepromConfig {
        eeprom_size: size,
        simple_mode: simple,
        wear_leveling_factor: wear,
        redundant_copy: redundant,
        blocking_write: true,
        ..EepromConfig::default()
    };

    let flash = MockFlash::new(MockFlashConfig {
        capacity: 1024 * 1024,
        ..MockFlashConfig::default()
    });

    log::info!(
        "starting soak: {size} logical bytes, wear factor {wear}, redundancy {redundant}, {writes} writes of {payload} bytes"
    );

    let mut eeprom = EmEeprom::new(&config, flash)?;
    let report = run_soak(&mut eeprom, &config, writes, payload)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.verify_failures > 0 {
        bail!("{} read-back verifications failed", report.verify_failures);
    }
    Ok(())
}

/// Issue the workload and gather the summary
fn run_soak(
    eeprom: &mut EmEeprom<MockFlash>,
    config: &EepromConfig,
    writes: u32,
    payload: u32,
) -> Result<SimReport> {
    let mut verify_failures = 0u32;
    let mut degraded_reads = 0u32;
    let mut rng: u32 = 0x2545_F491;

    let mut buf = vec![0u8; payload as usize];
    let mut out = vec![0u8; payload as usize];

    for i in 0..writes {
        // xorshift keeps the workload deterministic but scattered
        rng ^= rng << 13;
        rng ^= rng >> 17;
        rng ^= rng << 5;
        let addr = rng % (config.eeprom_size - payload + 1);

        for (j, byte) in buf.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_add(j as u8);
        }
        eeprom.write(addr, &buf)?;

        let status = eeprom.read(addr, &mut out)?;
        if status != Status::Success {
            degraded_reads += 1;
            log::warn!("write {i}: read-back status {status:?}");
        }
        if out != buf {
            verify_failures += 1;
            log::error!("write {i}: read-back mismatch at address {addr}");
        }

        if (i + 1) % 250 == 0 {
            log::info!("progress: {}/{writes} writes", i + 1);
        }
    }

    let num_writes = eeprom.num_writes()?;
    let wear = wear_stats(eeprom, config);

    Ok(SimReport {
        config: config.clone(),
        row_size: eeprom.row_size(),
        physical_size: eeprom.physical_size(),
        num_writes,
        writes_issued: writes,
        verify_failures,
        degraded_reads,
        wear,
    })
}

/// Collect per-row operation counts across the primary ring
fn wear_stats(eeprom: &EmEeprom<MockFlash>, config: &EepromConfig) -> WearStats {
    let row_size = eeprom.row_size();
    let copies = if config.effective_redundancy() { 2 } else { 1 };
    let rows = eeprom.physical_size() / row_size / copies;

    let mut min_ops = u32::MAX;
    let mut max_ops = 0u32;
    let mut total_ops = 0u64;
    for idx in 0..rows {
        let ops = eeprom.storage().wear_count(config.start_addr + idx * row_size);
        min_ops = min_ops.min(ops);
        max_ops = max_ops.max(ops);
        total_ops += u64::from(ops);
    }

    WearStats {
        rows,
        min_ops,
        max_ops,
        total_ops,
    }
}

fn print_report(report: &SimReport) {
    println!();
    println!("{}", style("=== SOAK REPORT ===").bold());
    println!("Row size:           {} bytes", report.row_size);
    println!("Physical footprint: {} bytes", report.physical_size);
    println!("Writes issued:      {}", report.writes_issued);
    println!("num_writes():       {}", report.num_writes);
    println!("Degraded reads:     {}", report.degraded_reads);
    if report.verify_failures == 0 {
        println!("Verification:       {}", style("all reads matched").green());
    } else {
        println!(
            "Verification:       {}",
            style(format!("{} mismatches", report.verify_failures)).red()
        );
    }
    println!();
    println!("{}", style("Wear across the primary ring").bold());
    println!("Rows:               {}", report.wear.rows);
    println!("Ops per row:        {} min / {} max", report.wear.min_ops, report.wear.max_ops);
    println!("Total ops:          {}", report.wear.total_ops);
}
