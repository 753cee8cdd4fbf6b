//! Hex frame acquisition from files or stdin.
//!
//! Accepts one frame per line, as produced by `rtl_adsb`, `dump1090 --raw`
//! or any tool printing Mode S frames as hex:
//! - plain hex, 14 or 28 digits
//! - `*<hex>;` (dump1090 raw format)
//! - blank lines and `#` comments are skipped

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use modes_core::pipeline::unix_now;
use modes_core::{hex_decode, FrameSource, ModesError, ReceivedFrame};
use tracing::debug;

// ---------------------------------------------------------------------------
// Hex Frame Reader
// ---------------------------------------------------------------------------

/// Line-oriented hex frame source. Each frame is stamped with the time its
/// line was read.
pub struct HexFrameReader<R> {
    input: R,
    line: String,
    line_no: u64,
    skipped: u64,
}

impl HexFrameReader<BufReader<File>> {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(HexFrameReader::new(BufReader::new(File::open(path)?)))
    }
}

impl HexFrameReader<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        HexFrameReader::new(io::stdin().lock())
    }
}

impl<R: BufRead> HexFrameReader<R> {
    pub fn new(input: R) -> Self {
        HexFrameReader {
            input,
            line: String::new(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Non-empty, non-comment lines that did not hold a frame.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<R: BufRead> FrameSource for HexFrameReader<R> {
    fn next_frame(&mut self) -> Option<Result<ReceivedFrame, ModesError>> {
        loop {
            self.line.clear();
            match self.input.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line_no += 1;

            let trimmed = self.line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some(bytes) = clean_hex_line(trimmed).and_then(|hex| hex_decode(&hex)) else {
                self.skipped += 1;
                debug!(line = self.line_no, "not a Mode S frame");
                continue;
            };
            return Some(ReceivedFrame::new(&bytes, unix_now()));
        }
    }
}

/// Extract a valid Mode S hex string from a line.
///
/// Handles plain hex, dump1090 format (`*hex;`), and whitespace.
pub fn clean_hex_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let hex = line
        .strip_prefix('*')
        .and_then(|s| s.strip_suffix(';'))
        .unwrap_or(line);

    is_valid_hex(hex).then(|| hex.to_ascii_uppercase())
}

fn is_valid_hex(s: &str) -> bool {
    (s.len() == 14 || s.len() == 28) && s.chars().all(|c| c.is_ascii_hexdigit())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
