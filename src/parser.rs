// 🏗️ Record Decoder - SKS register (SHAK) fixed-width lines
//
// Each line describes one hospital (sgh) or department (afd) with its
// number, validity period, name and operation code. Example:
//
//   afd1301011             200401012004102925000101Anæstesi-/operationsklinik, ABD ... 084         SKS     1
//
// Values always sit at the same columns, padded with whitespace. The
// file is ISO-8859-15, so a column is one byte in the file and one char
// after decoding.
//
// Operation codes (column 187) exist only on entries newer than 1995.
// Older entries are not wanted and are skipped.

use crate::entities::{InstitutionRecord, InstitutionType, OperationCode};
use crate::error::{ImportError, Result};
use crate::temporal::{parse_register_date, ValidityWindow};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::trace;

// ============================================================================
// COLUMN LAYOUT (0-indexed, end-exclusive)
// ============================================================================

pub const RECORD_TYPE_START: usize = 0;
pub const RECORD_TYPE_END: usize = 3;

pub const IDENTIFIER_START: usize = 3;
pub const IDENTIFIER_END: usize = 23;

pub const VALID_FROM_START: usize = 23;
pub const VALID_FROM_END: usize = 31;

pub const VALID_TO_START: usize = 39;
pub const VALID_TO_END: usize = 47;

pub const NAME_START: usize = 47;
/// The name field is 120 characters wide, but only the first 60 are used.
pub const NAME_END: usize = 107;

pub const OPERATION_CODE_INDEX: usize = 187;

/// Shortest line that carries an operation code
pub const MIN_OPERATION_LINE_LEN: usize = OPERATION_CODE_INDEX + 1;

const OPERATION_CODE_NONE: char = ' ';

// ============================================================================
// DECODER OUTPUT
// ============================================================================

/// Why an otherwise well-formed line was not turned into a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Pre-1995 layout without an operation code column
    LegacyLayout,

    /// Blank operation code
    NoOperation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Record(InstitutionRecord),
    Skip(SkipReason),
}

impl Decoded {
    pub fn into_record(self) -> Option<InstitutionRecord> {
        match self {
            Decoded::Record(record) => Some(record),
            Decoded::Skip(_) => None,
        }
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Characters [start, end) of the line, clamped to its length
fn column(chars: &[char], start: usize, end: usize) -> String {
    let end = end.min(chars.len());
    let start = start.min(end);
    chars[start..end].iter().collect()
}

/// Decode one register line
///
/// The record type is checked first: an unknown tag fails the whole
/// batch even on short legacy lines. Create ('1') and update ('3') are
/// decoded the same way. Every other non-blank code, including the
/// documented delete code '2', is rejected.
pub fn decode_line(line: &str, line_number: usize) -> Result<Decoded> {
    let chars: Vec<char> = line.chars().collect();

    let tag = column(&chars, RECORD_TYPE_START, RECORD_TYPE_END);
    let kind = InstitutionType::from_tag(&tag)
        .ok_or_else(|| ImportError::malformed(line_number, format!("unknown record type '{}'", tag), line))?;

    if chars.len() < MIN_OPERATION_LINE_LEN {
        trace!(line_number, "skipping legacy line without operation code");
        return Ok(Decoded::Skip(SkipReason::LegacyLayout));
    }

    let code = chars[OPERATION_CODE_INDEX];
    if code == OPERATION_CODE_NONE {
        trace!(line_number, "skipping line with blank operation code");
        return Ok(Decoded::Skip(SkipReason::NoOperation));
    }

    let operation = OperationCode::from_char(code).ok_or_else(|| {
        ImportError::malformed(line_number, format!("unknown operation code '{}'", code), line)
    })?;

    let identifier = column(&chars, IDENTIFIER_START, IDENTIFIER_END).trim().to_string();

    let valid_from = parse_register_date(&column(&chars, VALID_FROM_START, VALID_FROM_END))
        .map_err(|reason| ImportError::malformed(line_number, reason, line))?;
    let valid_to = parse_register_date(&column(&chars, VALID_TO_START, VALID_TO_END))
        .map_err(|reason| ImportError::malformed(line_number, reason, line))?;
    let validity = ValidityWindow::from_inclusive_dates(valid_from, valid_to)
        .map_err(|reason| ImportError::malformed(line_number, reason, line))?;

    let name = column(&chars, NAME_START, NAME_END).trim().to_string();

    Ok(Decoded::Record(InstitutionRecord::new(
        identifier,
        kind,
        name,
        validity,
        operation,
        line_number,
    )))
}

// ============================================================================
// FILE READING (ISO-8859-15)
// ============================================================================

/// Decode ISO-8859-15 bytes
///
/// Latin-9 equals Latin-1 except for eight code points.
pub fn decode_latin9(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0xA4 => '\u{20AC}', // €
            0xA6 => '\u{0160}', // Š
            0xA8 => '\u{0161}', // š
            0xB4 => '\u{017D}', // Ž
            0xB8 => '\u{017E}', // ž
            0xBC => '\u{0152}', // Œ
            0xBD => '\u{0153}', // œ
            0xBE => '\u{0178}', // Ÿ
            other => other as char,
        })
        .collect()
}

/// Lines of one register file plus its content digest
#[derive(Debug, Clone)]
pub struct RegisterFile {
    pub lines: Vec<String>,
    /// Hex SHA-256 of the raw bytes, recorded in the run audit
    pub sha256: String,
}

/// Read a register file and split it into lines (LF or CRLF)
pub fn read_register_file(path: &Path) -> Result<RegisterFile> {
    let bytes = std::fs::read(path).map_err(|e| ImportError::io(path, e))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);

    Ok(RegisterFile {
        lines: decode_latin9(&bytes).lines().map(str::to_string).collect(),
        sha256: format!("{:x}", hasher.finalize()),
    })
}

// ============================================================================
// TESTS
// ============================================================================
