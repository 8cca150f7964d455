//! Target-table identifier extraction from user-supplied schema text.
//!
//! The user describes the destination table with a `CREATE TABLE` DDL (ideally)
//! or free text. Extraction is best-effort: a failed match falls back to the
//! first identifier-looking token, and finally to a generated placeholder
//! qualified by the default dataset. Parsing never aborts the session; the
//! `fallback` flag is surfaced to the user as a warning instead.

use regex::Regex;
use std::sync::LazyLock;

// Matches 'CREATE [OR REPLACE] TABLE `project.dataset.table` (' or '... AS '
static CREATE_TABLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)CREATE(?:\s+OR\s+REPLACE)?\s+TABLE\s+`?([\w.-]+)`?\s*(?:\(|\s+AS\s+)")
        .unwrap()
});

static IDENTIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\w.-]+").unwrap());

/// Result of target extraction. `fallback` is true when no table identifier
/// could be confidently extracted and a best-effort value was used instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTarget {
    /// Fully-qualified destination table id (e.g. `project.dataset.table`).
    pub table_id: String,
    /// Bare table name (last dotted component).
    pub table_name: String,
    pub fallback: bool,
}

/// Extract the target table identifier from raw schema text.
///
/// `default_dataset` qualifies the placeholder identifier when nothing usable
/// is found in the input.
pub fn parse_target(raw: &str, default_dataset: &str) -> ParsedTarget {
    if let Some(cap) = CREATE_TABLE_REGEX.captures(raw) {
        let table_id = cap[1].trim().to_string();
        let table_name = last_component(&table_id);
        return ParsedTarget {
            table_id,
            table_name,
            fallback: false,
        };
    }

    tracing::warn!("no CREATE TABLE identifier found in schema text, using fallback");

    // Best effort: first identifier-looking token of the first word.
    if let Some(first_word) = raw.split_whitespace().next() {
        if let Some(m) = IDENTIFIER_REGEX.find(first_word) {
            let table_id = m.as_str().to_string();
            let table_name = last_component(&table_id);
            return ParsedTarget {
                table_id,
                table_name,
                fallback: true,
            };
        }
    }

    let table_name = "unknown_table".to_string();
    ParsedTarget {
        table_id: format!("{}.{}", default_dataset, table_name),
        table_name,
        fallback: true,
    }
}

fn last_component(table_id: &str) -> String {
    table_id
        .rsplit('.')
        .next()
        .unwrap_or(table_id)
        .to_string()
}
