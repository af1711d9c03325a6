//! Pasted email lists.
//!
//! Operators paste addresses straight from spreadsheets and mail clients, so
//! the parser accepts any mix of newlines, commas, semicolons and whitespace,
//! unwraps `Name <addr>` forms, and drops case-insensitive duplicates.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::jobs::WorkItem;

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("valid regex"));

/// Matches `Display Name <addr>` or `"Quoted, Name" <addr>`, starting at a
/// separator. Name words never contain `@`, so a bare address ahead of the
/// name stays outside the match.
static NAMED_ADDR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(^|[\s,;])(?:"[^"]*"|(?:[^\s,;<>"@]+[ \t]+)*)[ \t]*<([^<>]+)>"#)
        .expect("valid regex")
});

/// Returns true if `candidate` looks like a deliverable address.
pub fn is_valid_email(candidate: &str) -> bool {
    EMAIL_RE.is_match(candidate)
}

/// Lower-cased, trimmed form used for duplicate detection.
pub fn normalize_email(candidate: &str) -> String {
    candidate.trim().to_ascii_lowercase()
}

/// Result of parsing a pasted list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailListParse {
    /// Valid, de-duplicated addresses in first-seen order (normalized).
    pub emails: Vec<String>,
    /// Tokens that were not valid addresses, as pasted.
    pub invalid: Vec<String>,
    /// Valid addresses dropped because they were already seen.
    pub duplicates: usize,
}

impl EmailListParse {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    /// One `{"email": ..}` work item per address.
    pub fn to_work_items(&self) -> Vec<WorkItem> {
        self.emails.iter().map(|email| json!({ "email": email })).collect()
    }
}

/// Parses free-form pasted text into a list of addresses.
pub fn parse_email_list(raw: &str) -> EmailListParse {
    let mut parse = EmailListParse::default();
    let mut seen = HashSet::new();

    // Drop display names first so their words don't count as invalid entries.
    let unwrapped = NAMED_ADDR_RE.replace_all(raw, "$1 $2 ");

    for token in unwrapped.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
        let token = token.trim_matches(|c: char| c == '"' || c == '\'' || c == '<' || c == '>');
        if token.is_empty() {
            continue;
        }

        if !is_valid_email(token) {
            parse.invalid.push(token.to_string());
            continue;
        }

        let normalized = normalize_email(token);
        if seen.insert(normalized.clone()) {
            parse.emails.push(normalized);
        } else {
            parse.duplicates += 1;
        }
    }

    parse
}
