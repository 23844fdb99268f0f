//! Splitting a SQL script into individually executable statements

use crate::util::starts_with_ci;

/// Split `sql` into statements on `;` and on `GO` batch separator lines.
///
/// Semicolons inside string literals, bracketed or double-quoted identifiers
/// and comments do not split. The terminating `;` is kept with its statement.
/// Blocks (`BEGIN ... END`) are not tracked, so procedure bodies should be
/// executed whole rather than passed through here.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.split_inclusive('\n') {
        if is_go_line(line) {
            push_statement(&mut statements, &mut current);
            continue;
        }
        current.push_str(line);
    }
    push_statement(&mut statements, &mut current);

    statements
        .into_iter()
        .flat_map(|batch| split_on_semicolons(&batch))
        .collect()
}

fn is_go_line(line: &str) -> bool {
    let trimmed = line.trim();
    if !starts_with_ci(trimmed, "GO") {
        return false;
    }
    let rest = trimmed[2..].trim();
    rest.is_empty() || rest.chars().all(|c| c.is_ascii_digit())
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    if !current.trim().trim_end_matches(';').trim().is_empty() {
        statements.push(current.trim().to_string());
    }
    current.clear();
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    SingleQuote,
    DoubleQuote,
    Bracket,
    LineComment,
    BlockComment,
}

fn split_on_semicolons(batch: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = State::Code;
    let mut chars = batch.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        state = match (state, c) {
            (State::Code, '\'') => State::SingleQuote,
            (State::Code, '"') => State::DoubleQuote,
            (State::Code, '[') => State::Bracket,
            (State::Code, '-') if chars.peek() == Some(&'-') => {
                current.push('-');
                chars.next();
                State::LineComment
            }
            (State::Code, '/') if chars.peek() == Some(&'*') => {
                current.push('*');
                chars.next();
                State::BlockComment
            }
            (State::Code, ';') => {
                push_statement(&mut statements, &mut current);
                State::Code
            }
            // '' inside a literal is an escaped quote: leave and re-enter
            (State::SingleQuote, '\'') => State::Code,
            (State::DoubleQuote, '"') => State::Code,
            // ]] inside brackets is an escaped bracket
            (State::Bracket, ']') if chars.peek() == Some(&']') => {
                current.push(']');
                chars.next();
                State::Bracket
            }
            (State::Bracket, ']') => State::Code,
            (State::LineComment, '\n') => State::Code,
            (State::BlockComment, '*') if chars.peek() == Some(&'/') => {
                current.push('/');
                chars.next();
                State::Code
            }
            (state, _) => state,
        };
    }
    push_statement(&mut statements, &mut current);
    statements
}
