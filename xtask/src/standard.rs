//! Single QEMU run, judged by exit status and optionally by UART output.

use std::fs;
use std::path::Path;

use anyhow::Result;

use crate::build::project_root;
use crate::defmt;
use crate::qemu::run_qemu;
use crate::runner::{RunOptions, Validation};

/// Run an example once and judge it.
pub fn run_standard(
    example: &str,
    elf_path: &Path,
    validation: Validation,
    opts: &RunOptions,
) -> Result<bool> {
    println!("Running in QEMU...");
    let output = run_qemu(elf_path)?;
    let decoded = defmt::decode_output(elf_path, &output.semihosting)?;
    let log = decoded.text;
    let uart = String::from_utf8_lossy(&output.uart0);

    if opts.verbose {
        print!("{log}");
        println!("--- QEMU run end ---");
        if !uart.is_empty() {
            println!("--- uart ---");
            print!("{uart}");
        }
    }

    if !output.success {
        println!("  FAIL: firmware exited with failure");
        if !opts.verbose {
            println!("--- log ---");
            print!("{log}");
        }
        if !output.stderr.is_empty() {
            println!("--- qemu ---");
            print!("{}", output.stderr);
        }
        return Ok(false);
    }

    // Examples provoke failures on purpose; the counts are informational.
    if decoded.warnings + decoded.errors > 0 {
        println!(
            "  log: {} warning(s), {} error(s)",
            decoded.warnings, decoded.errors
        );
    }

    if validation == Validation::Exit || opts.verbose {
        if !opts.verbose {
            println!("  PASS");
        }
        return Ok(true);
    }

    let expected_path = project_root()
        .join("testsuite")
        .join("expected")
        .join(format!("{example}.expected"));
    let filename = format!("{example}.expected");

    if opts.bless {
        let status = if expected_path.exists() {
            let existing = fs::read_to_string(&expected_path)?;
            if existing == uart {
                "No change"
            } else {
                fs::write(&expected_path, uart.as_bytes())?;
                "Updated"
            }
        } else {
            if let Some(dir) = expected_path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(&expected_path, uart.as_bytes())?;
            "Created"
        };
        println!("  {filename}: {status}");
        Ok(true)
    } else if expected_path.exists() {
        let expected = fs::read_to_string(&expected_path)?;
        if uart == expected {
            println!("  PASS");
            Ok(true)
        } else {
            println!("  FAIL: UART output differs from expected");
            println!("--- expected ---");
            print!("{expected}");
            println!("--- uart ---");
            print!("{uart}");
            println!("--- log ---");
            print!("{log}");
            Ok(false)
        }
    } else {
        println!("  No expected output file, run with --bless to create");
        println!("--- uart ---");
        print!("{uart}");
        Ok(false)
    }
}
