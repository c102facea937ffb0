//! Identifier grammar shared by class and attribute names.

use super::error::{Result, StoreError};
use lazy_static::lazy_static;
use regex::Regex;

/// Name of the identifier column every class table carries.
pub const ID_COLUMN: &str = "id";

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
}

/// Checks `name` against `[A-Za-z0-9_]+`.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidName(format!("{} name cannot be empty", kind)));
    }

    if !IDENTIFIER.is_match(name) {
        return Err(StoreError::InvalidName(format!(
            "{} name '{}' can only contain letters, numbers, and underscores",
            kind, name
        )));
    }

    Ok(())
}

/// Canonical display form of a class name: first character upper-cased,
/// the rest lower-cased.
pub fn normalize_class_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Validates and case-folds an attribute name.
///
/// The identifier column is reserved and rejected here.
pub fn attribute_name(name: &str) -> Result<String> {
    validate_identifier("Attribute", name)?;
    let folded = name.to_ascii_lowercase();
    if folded == ID_COLUMN {
        return Err(StoreError::InvalidName(format!(
            "Attribute name '{}' is reserved for the identifier column",
            name
        )));
    }
    Ok(folded)
}

/// Quotes a validated identifier for inclusion in statement text.
///
/// Brackets, not double quotes: SQLite reads an unknown double-quoted
/// identifier as a string literal.
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name)
}
