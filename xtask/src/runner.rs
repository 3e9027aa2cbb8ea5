//! Test runner dispatch and common types.

use std::fs;
use std::path::Path;

use anyhow::Result;

use crate::build::{build_example, example_source};
use crate::standard::run_standard;

/// How a run is judged, from the example's file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// The firmware checks itself; a successful semihosting exit passes.
    Exit,
    /// Additionally, the UART0 capture must match `expected/<example>.expected`.
    Expected,
}

/// Options for running an example.
pub struct RunOptions {
    /// Print the decoded log (for `qemu` command).
    pub verbose: bool,
    /// Update expected files instead of comparing (for `test --bless`).
    pub bless: bool,
    /// Build in release mode.
    pub release: bool,
}

/// Detect validation mode from file header.
///
/// Looks for `@test-validate: <mode>` in the first few lines.
fn detect_validation(example_path: &Path) -> Validation {
    if let Ok(content) = fs::read_to_string(example_path) {
        for line in content.lines().take(10) {
            if let Some(mode) = line.strip_prefix("//! @test-validate:") {
                if mode.trim() == "expected" {
                    return Validation::Expected;
                }
            }
        }
    }
    Validation::Exit
}

/// Run an example with the given options.
///
/// Returns `Ok(true)` if the test passed, `Ok(false)` if it failed.
pub fn run_example(example: &str, opts: &RunOptions) -> Result<bool> {
    let validation = detect_validation(&example_source(example));

    println!("Building '{example}'...");
    let elf_path = build_example(example, opts.release)?;

    run_standard(example, &elf_path, validation, opts)
}
