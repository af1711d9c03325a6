//! Work-list construction from operator input.
//!
//! Both parsers validate addresses up front so a bad paste is reported before
//! a job starts rather than as a run of failed items.

pub mod csv_rows;
pub mod email_list;

pub use csv_rows::{
    parse_csv_rows, CsvRowError, CsvRowWarning, CsvRowsResult, CsvRowsStats, LineEndings,
    DEFAULT_EMAIL_COLUMN,
};
pub use email_list::{is_valid_email, normalize_email, parse_email_list, EmailListParse};
