//! Text image parsing.
//!
//! Three line-oriented formats share one skipping rule: blank lines and lines
//! starting with `//` carry no data and do not advance any index.
//! 1. **Data images:** one signed decimal integer per line.
//! 2. **Reference images:** identical to data images.
//! 3. **Program images:** `@HEXADDR HEXDATA` per line.
//!
//! Malformed lines are reported with `tracing::warn!` and skipped.

use std::fs;
use std::path::Path;

use crate::common::constants::{COMMENT_PREFIX, PROGRAM_ADDR_PREFIX};
use crate::common::error::HarnessError;

/// Returns the data-bearing content of a line, or `None` for blanks and comments.
pub fn data_line(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIX) {
        None
    } else {
        Some(trimmed)
    }
}

/// Signed integers read from a data or reference image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataImage {
    /// Parsed values in file order.
    pub values: Vec<i32>,
    /// Data lines that failed to parse.
    pub malformed: usize,
}

impl DataImage {
    /// Parses `text`, skipping the first `start_line` data lines and keeping at most `limit` values.
    pub fn parse(text: &str, start_line: usize, limit: Option<usize>) -> Self {
        let mut image = Self::default();
        let cap = limit.unwrap_or(usize::MAX);

        for (line_no, content) in text
            .lines()
            .enumerate()
            .filter_map(|(n, l)| data_line(l).map(|c| (n + 1, c)))
            .skip(start_line)
        {
            if image.values.len() >= cap {
                break;
            }
            match content.parse::<i32>() {
                Ok(v) => image.values.push(v),
                Err(e) => {
                    image.malformed += 1;
                    tracing::warn!(line = line_no, content, error = %e, "skipping malformed data line");
                }
            }
        }
        image
    }

    /// Reads and parses a data image from disk.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the file cannot be read.
    pub fn read(path: &Path, start_line: usize, limit: Option<usize>) -> Result<Self, HarnessError> {
        let text = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        Ok(Self::parse(&text, start_line, limit))
    }

    /// Number of parsed values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no value was parsed.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One instruction-memory write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionRecord {
    /// Instruction address, already masked to the device width.
    pub addr: u32,
    /// Instruction word.
    pub word: u32,
}

/// Instruction records in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    /// Records to apply, in order; later records may overwrite earlier ones.
    pub records: Vec<InstructionRecord>,
    /// Lines that were skipped as malformed.
    pub malformed: usize,
}

impl ProgramImage {
    /// Parses a program image, masking every address with `addr_mask`.
    pub fn parse(text: &str, addr_mask: u32) -> Self {
        let mut image = Self::default();
        for (n, line) in text.lines().enumerate() {
            let Some(content) = data_line(line) else {
                continue;
            };
            match parse_record(content) {
                Some((addr, word)) => image.records.push(InstructionRecord {
                    addr: addr & addr_mask,
                    word,
                }),
                None => {
                    image.malformed += 1;
                    tracing::warn!(line = n + 1, content, "skipping malformed program line");
                }
            }
        }
        image
    }

    /// Reads and parses a program image from disk.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the file cannot be read.
    pub fn read(path: &Path, addr_mask: u32) -> Result<Self, HarnessError> {
        let text = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        Ok(Self::parse(&text, addr_mask))
    }
}

fn parse_record(content: &str) -> Option<(u32, u32)> {
    let rest = content.strip_prefix(PROGRAM_ADDR_PREFIX)?;
    let mut fields = rest.split_whitespace();
    let addr = parse_hex(fields.next()?)?;
    let word = parse_hex(fields.next()?)?;
    Some((addr, word))
}

fn parse_hex(field: &str) -> Option<u32> {
    let digits = field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
        .unwrap_or(field);
    u32::from_str_radix(digits, 16).ok()
}
