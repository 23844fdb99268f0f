//! Comment stripping for raw T-SQL text

use once_cell::sync::Lazy;
use regex::Regex;

/// Block comments, non-greedy across lines. An unterminated comment runs to the end of text.
static BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?(?:\*/|\z)").expect("Invalid block comment regex"));

/// Line comments up to (not including) the line break.
static LINE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--[^\r\n]*").expect("Invalid line comment regex"));

/// Remove `/* ... */` comments, then `-- ...` comments.
///
/// Block comments are replaced by a single space so that `FROM/*x*/Orders`
/// still separates into two words. Quoted strings are not special-cased: this
/// is a lexical pass, not a tokenizer.
pub fn strip_comments(sql: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(sql, " ");
    LINE_COMMENT.replace_all(&without_blocks, "").into_owned()
}
