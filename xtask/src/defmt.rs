//! Decoding the defmt stream a testsuite example writes to semihosting.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use defmt_decoder::{DecodeError, Frame, Locations, Table};

/// A decoded run log.
pub struct Log {
    /// One line per frame: `origin file:line: [LEVEL] message`.
    pub text: String,
    /// Frames logged at `warn`.
    pub warnings: usize,
    /// Frames logged at `error`.
    pub errors: usize,
}

/// Which side of the workspace logged a frame.
///
/// Frames from the testsuite are the example's own narration, everything else
/// comes from the driver.
fn origin(file: &Path) -> &'static str {
    if file.components().any(|c| c.as_os_str() == "testsuite") {
        "example"
    } else {
        "max3109"
    }
}

/// Decodes a stream of defmt frames using the table embedded in `elf_path`.
pub fn decode_output(elf_path: &Path, raw_output: &[u8]) -> Result<Log> {
    let elf_data = fs::read(elf_path).context("Failed to read ELF file")?;
    let table = Table::parse(&elf_data)
        .context("Failed to parse defmt table from ELF")?
        .ok_or_else(|| anyhow!("No defmt data found in ELF"))?;
    let locs = table.get_locations(&elf_data).ok();

    let mut decoder = table.new_stream_decoder();
    decoder.received(raw_output);

    let mut log = Log {
        text: String::new(),
        warnings: 0,
        errors: 0,
    };
    loop {
        match decoder.decode() {
            Ok(frame) => {
                match frame.level().map(|l| l.as_str()) {
                    Some("warn") => log.warnings += 1,
                    Some("error") => log.errors += 1,
                    _ => {}
                }
                log.text.push_str(&format_frame(&frame, locs.as_ref()));
                log.text.push('\n');
            }
            Err(DecodeError::UnexpectedEof) => break,
            Err(DecodeError::Malformed) => bail!("Malformed defmt frame"),
        }
    }

    Ok(log)
}

fn format_frame(frame: &Frame, locs: Option<&Locations>) -> String {
    let level = frame
        .level()
        .map(|l| l.as_str())
        .unwrap_or("print")
        .to_uppercase();
    let message = frame.display_message();

    match locs.and_then(|locs| locs.get(&frame.index())) {
        Some(loc) => {
            let filename = loc
                .file
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| loc.file.display().to_string());
            format!(
                "{:<7} {filename}:{}: [{level:<5}] {message}",
                origin(&loc.file),
                loc.line
            )
        }
        None => format!("{:<7} [{level:<5}] {message}", "?"),
    }
}
