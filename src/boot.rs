use std::path::Path;

use crate::error::TemperError;
use crate::warnings::strip_ansi;

/// Header the job runner writes ahead of the boot invocation. Earlier
/// steps append to the same log, so verification starts past this line.
pub const BOOT_CMD: &str = "# cmd: vng -r";

/// Result of the defconfig boot check.
#[derive(Debug, Clone)]
pub struct BootResult {
    pub succeeded: bool,
    /// The kernel identification line, when one was seen.
    pub uname: Option<String>,
}

impl BootResult {
    pub fn failed() -> Self {
        Self {
            succeeded: false,
            uname: None,
        }
    }
}

/// Scan captured boot output for the kernel identification line printed
/// by `uname -a`. The scan runs backwards so the last boot attempt wins.
/// A clean VM exit without the line is still a failure.
pub fn verify(output: &str) -> BootResult {
    for line in output.lines().rev() {
        let clean = strip_ansi(line);
        let trimmed = clean.trim();
        if is_uname_line(trimmed) {
            return BootResult {
                succeeded: true,
                uname: Some(trimmed.to_string()),
            };
        }
    }
    BootResult::failed()
}

/// Verify against the job's log on disk. Only the boot command's own
/// capture counts; a log that never reached the boot command fails.
/// Invalid UTF-8 is replaced.
pub fn verify_file(path: &Path) -> Result<BootResult, TemperError> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(match boot_region(&text) {
        Some(region) => verify(region),
        None => BootResult::failed(),
    })
}

/// Text after the last boot invocation header, if the log has one.
fn boot_region(log: &str) -> Option<&str> {
    let mut start = None;
    let mut at = 0;
    for line in log.split_inclusive('\n') {
        at += line.len();
        if line.starts_with(BOOT_CMD) {
            start = Some(at);
        }
    }
    start.map(|at| &log[at..])
}

/// Shape check: `Linux <host> <release> #<n> ... GNU/Linux`, with at
/// least one field between the build number and the suffix.
fn is_uname_line(line: &str) -> bool {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 {
        return false;
    }
    fields[0] == "Linux"
        && build_number(fields[3])
        && fields[fields.len() - 1] == "GNU/Linux"
}

fn build_number(field: &str) -> bool {
    match field.strip_prefix('#') {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}
