//! # Name Validation
//!
//! Purpose: Shared printable-name checks used by the validator (table name,
//! key fields, columns, indexes) and by the codec (which trusts that field
//! names reaching it have already passed these checks).

/// Maximum length, in bytes, of a table name.
pub const MAX_NAME_LEN: usize = 255;

/// A string is "printable" if it is non-empty and every character is a
/// printable, non-control Unicode scalar. Control characters (including
/// `\0`, tabs, and newlines) are rejected so names round-trip cleanly
/// through the key codec's self-delimiting encoding.
pub fn is_printable(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| !c.is_control())
}

/// Checks a table name against the length and printability rules from the
/// validator (§4.1): `too_long_name` / `non_unicode_name`.
pub fn check_table_name(name: &str) -> Result<(), &'static str> {
    if !is_printable(name) {
        return Err("non_unicode_name");
    }
    if name.len() > MAX_NAME_LEN {
        return Err("too_long_name");
    }
    Ok(())
}

/// Returns the first duplicate in `items`, if any, preserving first-seen
/// order for the error payload.
pub fn first_duplicate<'a>(items: &'a [String]) -> Option<&'a str> {
    for (i, a) in items.iter().enumerate() {
        if items[..i].iter().any(|b| b == a) {
            return Some(a.as_str());
        }
    }
    None
}
