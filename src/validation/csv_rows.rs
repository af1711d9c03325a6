//! CSV text to work items.
//!
//! Turns pasted or uploaded CSV text into one JSON object per data row, keyed
//! by the trimmed header names. The parse catches the problems that would
//! otherwise surface as a run of per-item failures:
//! - missing or duplicate header / missing email column
//! - inconsistent column counts
//! - invalid or duplicate email addresses

use std::collections::HashSet;
use std::io::Cursor;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::jobs::WorkItem;
use crate::validation::email_list::{is_valid_email, normalize_email};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Column holding the contact address when the caller does not name one.
pub const DEFAULT_EMAIL_COLUMN: &str = "email";

/// UTF-8 BOM as it appears at the start of decoded text.
const UTF8_BOM: char = '\u{feff}';

/// Row problems reported before the rest are elided.
const MAX_REPORTED_ERRORS: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// Result of parsing CSV text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvRowsResult {
    /// True if no row errors were found.
    pub ok: bool,
    /// One object per accepted row.
    pub items: Vec<WorkItem>,
    pub errors: Vec<CsvRowError>,
    pub warnings: Vec<CsvRowWarning>,
    pub stats: CsvRowsStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvRowsStats {
    pub headers: Vec<String>,
    /// Data rows read, blank rows excluded.
    pub rows_read: u64,
    pub rows_accepted: u64,
    /// Rows skipped because their address already appeared.
    pub duplicates: u64,
    pub line_endings: LineEndings,
}

/// Detected line ending style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEndings {
    LF,
    CRLF,
    Mixed,
    /// Single line or empty.
    Unknown,
}

/// Row-level problems. `row` is 1-based and counts the header as row 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CsvRowError {
    InconsistentColumns { expected: usize, found: usize, row: u64 },
    InvalidEmail { value: String, row: u64 },
    MissingEmail { row: u64 },
    CsvParseError { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CsvRowWarning {
    HasBom,
    MixedLineEndings,
    /// Rows whose address already appeared; the later rows were skipped.
    DuplicateEmails { count: u64 },
    /// More errors were found than reported.
    ErrorsTruncated { total: u64 },
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Parses CSV text into work items.
///
/// # Errors
///
/// Returns `AppError::CsvInvalid` when the text has no usable header: empty
/// input, blank or duplicate header names, or no `email_column`. Row-level
/// problems are reported in `CsvRowsResult.errors` instead.
pub fn parse_csv_rows(text: &str, email_column: &str) -> Result<CsvRowsResult, AppError> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let data = match text.strip_prefix(UTF8_BOM) {
        Some(rest) => {
            warnings.push(CsvRowWarning::HasBom);
            rest
        }
        None => text,
    };

    if data.trim().is_empty() {
        return Err(AppError::CsvInvalid("no data".into()));
    }

    let line_endings = detect_line_endings(data.as_bytes());
    if line_endings == LineEndings::Mixed {
        warnings.push(CsvRowWarning::MixedLineEndings);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // column counts are checked per row below
        .trim(csv::Trim::All)
        .from_reader(Cursor::new(data.as_bytes()));

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::CsvInvalid(format!("unreadable header: {}", e)))?
        .iter()
        .map(String::from)
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::CsvInvalid("missing header row".into()));
    }
    if let Some(blank) = headers.iter().position(|h| h.is_empty()) {
        return Err(AppError::CsvInvalid(format!("column {} has no header", blank + 1)));
    }
    let mut seen_headers = HashSet::new();
    for header in &headers {
        if !seen_headers.insert(header.to_ascii_lowercase()) {
            return Err(AppError::CsvInvalid(format!("duplicate header \"{}\"", header)));
        }
    }

    let email_idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(email_column))
        .ok_or_else(|| AppError::CsvInvalid(format!("no \"{}\" column", email_column)))?;

    let mut items = Vec::new();
    let mut seen_emails = HashSet::new();
    let mut duplicates: u64 = 0;
    let mut error_count: u64 = 0;
    let mut rows_read: u64 = 0;

    let mut push_error = |errors: &mut Vec<CsvRowError>, err: CsvRowError| {
        error_count += 1;
        if errors.len() < MAX_REPORTED_ERRORS {
            errors.push(err);
        }
    };

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                push_error(&mut errors, CsvRowError::CsvParseError { message: e.to_string() });
                break;
            }
        };

        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        rows_read += 1;
        let row = record
            .position()
            .map(|p| p.line())
            .unwrap_or(rows_read + 1);

        if record.len() != headers.len() {
            push_error(
                &mut errors,
                CsvRowError::InconsistentColumns {
                    expected: headers.len(),
                    found: record.len(),
                    row,
                },
            );
            continue;
        }

        let email = &record[email_idx];
        if email.is_empty() {
            push_error(&mut errors, CsvRowError::MissingEmail { row });
            continue;
        }
        if !is_valid_email(email) {
            push_error(
                &mut errors,
                CsvRowError::InvalidEmail {
                    value: email.to_string(),
                    row,
                },
            );
            continue;
        }

        let normalized = normalize_email(email);
        if !seen_emails.insert(normalized.clone()) {
            duplicates += 1;
            continue;
        }

        let mut object = Map::with_capacity(headers.len());
        for (header, field) in headers.iter().zip(record.iter()) {
            object.insert(header.clone(), Value::String(field.to_string()));
        }
        object.insert(headers[email_idx].clone(), Value::String(normalized));
        items.push(Value::Object(object));
    }

    if duplicates > 0 {
        warnings.push(CsvRowWarning::DuplicateEmails { count: duplicates });
    }
    if error_count > errors.len() as u64 {
        warnings.push(CsvRowWarning::ErrorsTruncated { total: error_count });
    }

    let rows_accepted = items.len() as u64;
    Ok(CsvRowsResult {
        ok: errors.is_empty(),
        items,
        errors,
        warnings,
        stats: CsvRowsStats {
            headers,
            rows_read,
            rows_accepted,
            duplicates,
            line_endings,
        },
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Detects line ending style in the given bytes.
fn detect_line_endings(data: &[u8]) -> LineEndings {
    let mut has_lf = false;
    let mut has_crlf = false;

    let mut i = 0;
    while i < data.len() {
        if data[i] == b'\r' && i + 1 < data.len() && data[i + 1] == b'\n' {
            has_crlf = true;
            i += 2;
        } else if data[i] == b'\n' {
            has_lf = true;
            i += 1;
        } else {
            i += 1;
        }
    }

    match (has_lf, has_crlf) {
        (true, true) => LineEndings::Mixed,
        (true, false) => LineEndings::LF,
        (false, true) => LineEndings::CRLF,
        (false, false) => LineEndings::Unknown,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rows_become_objects_keyed_by_header() {
        let csv = "Email,First Name,Last Name\nJane@Example.com,Jane,Doe\nbob@example.com,Bob,\n";
        let result = parse_csv_rows(csv, DEFAULT_EMAIL_COLUMN).unwrap();

        assert!(result.ok);
        assert_eq!(result.stats.headers, vec!["Email", "First Name", "Last Name"]);
        assert_eq!(result.stats.line_endings, LineEndings::LF);
        assert_eq!(
            result.items,
            vec![
                json!({ "Email": "jane@example.com", "First Name": "Jane", "Last Name": "Doe" }),
                json!({ "Email": "bob@example.com", "First Name": "Bob", "Last Name": "" }),
            ]
        );
        assert_eq!(result.stats.rows_accepted, 2);
    }

    #[test]
    fn strips_bom_and_reports_it() {
        let csv = "\u{feff}email\r\na@example.com\r\n";
        let result = parse_csv_rows(csv, "email").unwrap();
        assert!(result.warnings.contains(&CsvRowWarning::HasBom));
        assert_eq!(result.stats.line_endings, LineEndings::CRLF);
        assert_eq!(result.items.len(), 1);
    }

    #[test]
    fn quoted_fields_keep_commas_and_newlines() {
        let csv = "email,note\na@example.com,\"likes, commas\"\nb@example.com,\"two\nlines\"\n";
        let result = parse_csv_rows(csv, "email").unwrap();
        assert!(result.ok);
        assert_eq!(result.items[0]["note"], "likes, commas");
        assert_eq!(result.items[1]["note"], "two\nlines");
    }

    #[test]
    fn row_problems_are_reported_not_fatal() {
        let csv = "email,name\n\
                   good@example.com,Good\n\
                   broken@example.com\n\
                   not-an-email,Bad\n\
                   ,Nobody\n\
                   GOOD@example.com,Again\n\
                   \n\
                   last@example.com,Last\n";
        let result = parse_csv_rows(csv, "email").unwrap();

        assert!(!result.ok);
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.stats.rows_read, 6);
        assert_eq!(
            result.errors,
            vec![
                CsvRowError::InconsistentColumns {
                    expected: 2,
                    found: 1,
                    row: 3
                },
                CsvRowError::InvalidEmail {
                    value: "not-an-email".into(),
                    row: 4
                },
                CsvRowError::MissingEmail { row: 5 },
            ]
        );
        assert!(result
            .warnings
            .contains(&CsvRowWarning::DuplicateEmails { count: 1 }));
    }

    #[test]
    fn email_column_match_is_case_insensitive() {
        let result = parse_csv_rows("E-Mail\nx@example.com\n", "e-mail").unwrap();
        assert_eq!(result.items, vec![json!({ "E-Mail": "x@example.com" })]);
    }

    #[test]
    fn header_problems_are_errors() {
        assert!(matches!(parse_csv_rows("", "email"), Err(AppError::CsvInvalid(_))));
        assert!(matches!(parse_csv_rows("  \n", "email"), Err(AppError::CsvInvalid(_))));
        assert!(matches!(
            parse_csv_rows("name,phone\nx,1\n", "email"),
            Err(AppError::CsvInvalid(msg)) if msg.contains("email")
        ));
        assert!(matches!(
            parse_csv_rows("email,Email\na@example.com,b@example.com\n", "email"),
            Err(AppError::CsvInvalid(msg)) if msg.contains("duplicate")
        ));
        assert!(matches!(
            parse_csv_rows("email,,name\na@example.com,x,y\n", "email"),
            Err(AppError::CsvInvalid(msg)) if msg.contains("column 2")
        ));
    }

    #[test]
    fn error_list_is_capped() {
        let mut csv = String::from("email\n");
        for i in 0..150 {
            csv.push_str(&format!("bad{}\n", i));
        }
        let result = parse_csv_rows(&csv, "email").unwrap();
        assert_eq!(result.errors.len(), MAX_REPORTED_ERRORS);
        assert!(result
            .warnings
            .contains(&CsvRowWarning::ErrorsTruncated { total: 150 }));
    }

    #[test]
    fn test_detect_line_endings() {
        assert_eq!(detect_line_endings(b"a\nb\n"), LineEndings::LF);
        assert_eq!(detect_line_endings(b"a\r\nb\r\n"), LineEndings::CRLF);
        assert_eq!(detect_line_endings(b"a\nb\r\n"), LineEndings::Mixed);
        assert_eq!(detect_line_endings(b"abc"), LineEndings::Unknown);
    }
}
