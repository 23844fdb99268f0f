//! Shared utility helpers.

use sha2::{Digest, Sha256};

/// Longest identifier SQL Server accepts.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Case-insensitive substring search without allocating an uppercase copy.
#[inline]
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    find_ci(haystack, needle).is_some()
}

/// Case-insensitive starts_with check without allocating.
#[inline]
pub fn starts_with_ci(haystack: &str, needle: &str) -> bool {
    haystack.len() >= needle.len()
        && haystack.as_bytes()[..needle.len()].eq_ignore_ascii_case(needle.as_bytes())
}

/// Case-insensitive find: returns the byte offset of first occurrence of `needle` in `haystack`.
#[inline]
pub fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let needle_bytes = needle.as_bytes();
    let haystack_bytes = haystack.as_bytes();
    if needle_bytes.len() > haystack_bytes.len() {
        return None;
    }
    haystack_bytes
        .windows(needle_bytes.len())
        .position(|window| window.eq_ignore_ascii_case(needle_bytes))
}

/// Removes every `[` and `]` from an identifier or a comma-separated column group.
///
/// DMV column groups arrive as `[CustomerId], [OrderDate]`; stripping before
/// re-quoting keeps generated DDL from double-bracketing.
pub fn strip_brackets(ident: &str) -> String {
    ident.chars().filter(|c| *c != '[' && *c != ']').collect()
}

/// Wraps an identifier in brackets, escaping any closing bracket inside it.
///
/// ```
/// use sql_index_advisor::util::quote_ident;
/// assert_eq!(quote_ident("Orders"), "[Orders]");
/// assert_eq!(quote_ident("[Orders]"), "[Orders]");
/// assert_eq!(quote_ident("odd]name"), "[odd]]name]");
/// ```
pub fn quote_ident(ident: &str) -> String {
    let trimmed = ident.trim();
    let bare = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);
    format!("[{}]", bare.replace(']', "]]"))
}

/// Shortens `name` to at most [`MAX_IDENTIFIER_LENGTH`] characters.
///
/// A long name keeps its prefix and ends in `_` plus eight hex digits of the
/// SHA-256 of the full name, so two long names sharing a prefix stay distinct.
pub fn fit_identifier(name: &str) -> String {
    if name.chars().count() <= MAX_IDENTIFIER_LENGTH {
        return name.to_string();
    }
    let digest = Sha256::digest(name.as_bytes());
    let suffix = hex::encode_upper(&digest[..4]);
    let prefix: String = name.chars().take(MAX_IDENTIFIER_LENGTH - suffix.len() - 1).collect();
    format!("{}_{}", prefix, suffix)
}

/// Splits a DMV column group (`[A], [B]`) into bare column names.
pub fn split_column_group(group: &str) -> Vec<String> {
    strip_brackets(group)
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}
