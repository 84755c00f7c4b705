//! Field codec - Packs an ordered list of strings into one text column and back.
//!
//! Elements are joined with [`DELIMITER`]. The delimiter is a CJK ideograph that does not
//! occur in the catalog's business text, and [`encode`] refuses any element that contains it,
//! so a stored value always splits back into exactly the list that was written.

use crate::errors::{Error, Result};

/// Separator between packed elements
pub const DELIMITER: char = '益';

/// Longest accepted element, in characters
pub const MAX_ELEMENT_CHARS: usize = 255;

/// Joins `items` into a single stored value.
///
/// `field` names the request field in validation errors.
///
/// # Errors
/// Returns `ValidationFailed` if the list is empty, or if any element is blank, longer than
/// [`MAX_ELEMENT_CHARS`], or contains [`DELIMITER`].
pub fn encode(field: &str, items: &[String]) -> Result<String> {
    if items.is_empty() {
        return Err(Error::validation(field, "must contain at least one entry"));
    }

    for (index, item) in items.iter().enumerate() {
        if item.trim().is_empty() {
            return Err(Error::validation(
                field,
                format!("entry {index} cannot be empty"),
            ));
        }
        if item.chars().count() > MAX_ELEMENT_CHARS {
            return Err(Error::validation(
                field,
                format!("entry {index} exceeds {MAX_ELEMENT_CHARS} characters"),
            ));
        }
        if item.contains(DELIMITER) {
            return Err(Error::validation(
                field,
                format!("entry {index} contains the reserved character '{DELIMITER}'"),
            ));
        }
    }

    let separator = DELIMITER.to_string();
    Ok(items.join(separator.as_str()))
}

/// Splits a stored value back into its elements.
///
/// A missing or empty value decodes to an empty list, never to `[""]`.
#[must_use]
pub fn decode(stored: Option<&str>) -> Vec<String> {
    match stored {
        None | Some("") => Vec::new(),
        Some(value) => value.split(DELIMITER).map(str::to_string).collect(),
    }
}
