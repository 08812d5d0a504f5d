//! Line parser for delimited station files.
//!
//! Expected columns, comma separated:
//! `point, code, noaa_id, converter, sensor, basin[, basin_override]`.

use std::fmt;

use crate::stations::Station;

pub const DELIMITER: char = ',';

/// point, code, noaa_id, converter, sensor, basin
pub const MIN_COLUMNS: usize = 6;

/// First-column values that mark line 1 as a header.
const HEADER_TOKENS: [&str; 2] = ["ponto", "point"];

/// Why a line could not become a candidate station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRejection {
    /// Fewer than [`MIN_COLUMNS`] fields. Policy skip.
    InsufficientColumns(usize),
    /// The converter field is not an integer. Field error.
    InvalidConverter(String),
}

impl LineRejection {
    /// Field-level failures are reported as errors, everything else as
    /// ignored.
    pub fn is_error(&self) -> bool {
        matches!(self, LineRejection::InvalidConverter(_))
    }
}

impl fmt::Display for LineRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineRejection::InsufficientColumns(found) => {
                write!(f, "insufficient columns: {} (< {})", found, MIN_COLUMNS)
            }
            LineRejection::InvalidConverter(raw) => {
                write!(f, "invalid converter value (not an integer): {}", raw)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// Blank line or header row; not reported.
    Skipped,
    Candidate(Station),
    Rejected(LineRejection),
}

/// ASCII transliteration with diacritics stripped ("Açu" -> "Acu").
pub fn transliterate(value: &str) -> String {
    deunicode::deunicode(value)
}

/// Parse one already-trimmed line. `number` is 1-based.
pub fn parse_line(number: usize, line: &str) -> ParsedLine {
    if line.is_empty() {
        return ParsedLine::Skipped;
    }

    let fields: Vec<&str> = line.split(DELIMITER).map(str::trim).collect();

    if number == 1 && is_header(fields[0]) {
        return ParsedLine::Skipped;
    }

    if fields.len() < MIN_COLUMNS {
        return ParsedLine::Rejected(LineRejection::InsufficientColumns(fields.len()));
    }

    let converter = match fields[3].parse::<i64>() {
        Ok(value) => value,
        Err(_) => return ParsedLine::Rejected(LineRejection::InvalidConverter(fields[3].to_string())),
    };

    let basin = match fields.get(6) {
        Some(&override_basin) if !override_basin.is_empty() => override_basin,
        _ => fields[5],
    };

    ParsedLine::Candidate(Station::new(
        transliterate(fields[0]),
        fields[1],
        fields[2],
        converter,
        transliterate(fields[4]),
        transliterate(basin),
    ))
}

fn is_header(first_field: &str) -> bool {
    HEADER_TOKENS
        .iter()
        .any(|token| first_field.eq_ignore_ascii_case(token))
}
