//! Bulk station import from delimited text.
//!
//! One run decodes the payload, parses it line by line, applies the
//! duplicate policy and writes every surviving station in a single batch
//! upsert. A bad line never aborts the run; it is recorded in the report
//! with its 1-based line number.

pub mod encoding;
pub mod parser;

use std::collections::HashSet;

use crate::logging::{self, Source};
use crate::model::{IgnoredLine, ImportReport, LineError, StoreError};
use crate::stations::Station;

pub use encoding::TextEncoding;
pub use parser::{parse_line, LineRejection, ParsedLine, MIN_COLUMNS};

pub const REASON_DUPLICATE_IN_FILE: &str = "duplicate within file";
pub const REASON_DUPLICATE_IN_STORE: &str = "duplicate in store";

/// Where an import reads existing codes from and writes its batch to.
pub trait ImportTarget {
    fn existing_codes(&mut self) -> Result<HashSet<String>, StoreError>;

    /// Upsert the batch; returns how many records were written.
    fn write_batch(&mut self, stations: Vec<Station>) -> Result<usize, StoreError>;
}

/// Outcome of parsing and policy, before anything is written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportPlan {
    pub batch: Vec<Station>,
    pub ignored: Vec<IgnoredLine>,
    pub errors: Vec<LineError>,
    pub total_lines: usize,
}

/// Characters that end a line: `\n`, `\r`, vertical tab, form feed, the
/// file/group/record separators, NEL and the Unicode line/paragraph
/// separators. `\r\n` counts as one terminator.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}'
            | '\u{2029}'
    )
}

/// Split `text` into lines. A trailing terminator does not produce an extra
/// empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        match rest.char_indices().find(|&(_, c)| is_line_break(c)) {
            Some((idx, c)) => {
                lines.push(&rest[..idx]);
                let terminator = if rest[idx..].starts_with("\r\n") {
                    2
                } else {
                    c.len_utf8()
                };
                rest = &rest[idx + terminator..];
            }
            None => {
                lines.push(rest);
                break;
            }
        }
    }
    lines
}

/// Parse `text` and decide, line by line, what goes into the batch.
///
/// Within the file the first occurrence of a code wins. A code already in
/// `existing` is ignored unless `upsert_existing` is set.
pub fn plan_import(text: &str, existing: &HashSet<String>, upsert_existing: bool) -> ImportPlan {
    let lines = split_lines(text);
    let mut plan = ImportPlan {
        total_lines: lines.len(),
        ..Default::default()
    };
    let mut seen_in_file: HashSet<String> = HashSet::new();

    for (idx, raw_line) in lines.iter().enumerate() {
        let number = idx + 1;
        let line = raw_line.trim();

        let station = match parse_line(number, line) {
            ParsedLine::Skipped => continue,
            ParsedLine::Candidate(station) => station,
            ParsedLine::Rejected(rejection) if rejection.is_error() => {
                plan.errors.push(LineError {
                    line: number,
                    error: rejection.to_string(),
                    content: line.to_string(),
                });
                continue;
            }
            ParsedLine::Rejected(rejection) => {
                plan.ignored.push(IgnoredLine {
                    line: number,
                    reason: rejection.to_string(),
                    content: line.to_string(),
                });
                continue;
            }
        };

        if !seen_in_file.insert(station.code.clone()) {
            plan.ignored.push(IgnoredLine {
                line: number,
                reason: REASON_DUPLICATE_IN_FILE.to_string(),
                content: line.to_string(),
            });
            continue;
        }

        if !upsert_existing && existing.contains(&station.code) {
            plan.ignored.push(IgnoredLine {
                line: number,
                reason: REASON_DUPLICATE_IN_STORE.to_string(),
                content: line.to_string(),
            });
            continue;
        }

        plan.batch.push(station);
    }

    plan
}

/// Run a full import against `target`.
///
/// If the existing codes cannot be listed the run continues as if the store
/// were empty and a line-0 error records the failure. A failing batch write
/// is returned as an error.
pub fn run_import<T: ImportTarget + ?Sized>(
    target: &mut T,
    payload: &[u8],
    encoding: TextEncoding,
    upsert_existing: bool,
) -> Result<ImportReport, StoreError> {
    let text = encoding.decode(payload);

    let mut preload_errors = Vec::new();
    let existing = match target.existing_codes() {
        Ok(codes) => codes,
        Err(err) => {
            logging::warn(
                Source::Import,
                None,
                &format!("could not list existing stations, store dedup disabled: {}", err),
            );
            preload_errors.push(LineError {
                line: 0,
                error: format!("failed to list existing stations: {}", err),
                content: String::new(),
            });
            HashSet::new()
        }
    };

    let plan = plan_import(&text, &existing, upsert_existing);
    logging::info(
        Source::Import,
        None,
        &format!(
            "parsed {} lines: {} to write, {} ignored, {} errors",
            plan.total_lines,
            plan.batch.len(),
            plan.ignored.len(),
            plan.errors.len()
        ),
    );

    let imported = if plan.batch.is_empty() {
        0
    } else {
        target.write_batch(plan.batch)?
    };

    let mut errors = preload_errors;
    errors.extend(plan.errors);

    logging::log_import_summary(imported, plan.ignored.len(), errors.len());
    Ok(ImportReport::new(imported, plan.ignored, errors, plan.total_lines))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
