//! Escaping of scalar values into PostgreSQL string literals.
//!
//! Single quotes are doubled. Backslashes are doubled too, and any literal
//! containing one gains the `E` escape-string prefix so the server reads the
//! doubled backslash as one character regardless of
//! `standard_conforming_strings`.

/// The SQL `NULL` keyword.
pub const NULL_LITERAL: &str = "NULL";

/// Encode an optional value as a SQL literal.
///
/// Absent and empty values both encode to [`NULL_LITERAL`]; an empty string
/// never becomes `''`.
///
/// # Examples
/// ```
/// use pitstore_core::literal::escape_literal;
///
/// assert_eq!(escape_literal(None), "NULL");
/// assert_eq!(escape_literal(Some("")), "NULL");
/// assert_eq!(escape_literal(Some("O'Brien")), "'O''Brien'");
/// assert_eq!(escape_literal(Some(r"C:\maps")), r"E'C:\\maps'");
/// ```
#[must_use]
pub fn escape_literal(value: Option<&str>) -> String {
    match value {
        Some(text) if !text.is_empty() => quote_literal(text),
        _ => NULL_LITERAL.to_owned(),
    }
}

/// Quote a value that must never collapse to `NULL`.
///
/// Used for columns the row mapper keeps non-null, such as the dataset and
/// entity type on the upsert path. The empty string quotes to `''`.
///
/// # Examples
/// ```
/// use pitstore_core::literal::quote_literal;
///
/// assert_eq!(quote_literal(""), "''");
/// assert_eq!(quote_literal("d1"), "'d1'");
/// ```
#[must_use]
pub fn quote_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len().saturating_add(3));
    let mut has_backslash = false;

    escaped.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => escaped.push_str("''"),
            '\\' => {
                escaped.push_str(r"\\");
                has_backslash = true;
            }
            other => escaped.push(other),
        }
    }
    escaped.push('\'');

    if has_backslash {
        escaped.insert(0, 'E');
    }
    escaped
}
