//! Parsing of `SECRET_NAME,SECRET_KEY,SECRET_VALUE` files.
//!
//! The format is deliberately simple: one record per line, fields split on
//! every comma, optional surrounding quotes per field. Rows that do not yield
//! exactly three non-empty fields are reported by line number and left out.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::ValidationError;
use crate::model::SecretRecord;

pub const EXPECTED_HEADER: &str = "SECRET_NAME,SECRET_KEY,SECRET_VALUE";

/// Outcome of parsing a CSV document. Parsing never fails as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCsv {
    pub records: Vec<SecretRecord>,
    pub errors: Vec<ValidationError>,
}

impl ParsedCsv {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

fn clean_field(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix(['"', '\''])
        .unwrap_or(trimmed);
    let unquoted = unquoted
        .strip_suffix(['"', '\''])
        .unwrap_or(unquoted);
    unquoted.replace(['\r', '\n'], "")
}

/// Parse CSV text into records plus line-numbered row errors.
///
/// The first line is always treated as the header. Line numbers in errors are
/// 1-based and count the header.
pub fn parse_secrets_csv(text: &str) -> ParsedCsv {
    let mut parsed = ParsedCsv::default();

    for (idx, raw) in text.trim().split('\n').enumerate().skip(1) {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<String> = line.split(',').map(clean_field).collect();
        if fields.len() > 3 {
            parsed.errors.push(ValidationError::TooManyFields {
                line: line_no,
                found: fields.len(),
            });
            continue;
        }

        match fields.as_slice() {
            [name, key, value] if !name.is_empty() && !key.is_empty() && !value.is_empty() => {
                parsed.records.push(SecretRecord {
                    name: name.clone(),
                    key: key.clone(),
                    value: value.clone(),
                });
            }
            _ => parsed
                .errors
                .push(ValidationError::MissingFields { line: line_no }),
        }
    }

    debug!(
        "Parsed {} records with {} row errors",
        parsed.records.len(),
        parsed.errors.len()
    );
    parsed
}

/// Read and parse a `.csv` file from disk.
pub fn load_secrets_file(path: &Path) -> Result<ParsedCsv, Box<dyn std::error::Error + Send + Sync>> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(Box::new(ValidationError::NotCsvFile));
    }
    let text = fs::read_to_string(path)?;
    Ok(parse_secrets_csv(&text))
}
