//! Minimal GML lexer used for symbol extraction and pre-transpile validation.
//!
//! This is not a full parser: the watch pipeline only needs to see
//! identifiers and punctuation with comments and string literals stripped,
//! so the scanner tokenizes exactly that and nothing more.

pub mod symbols;

use thiserror::Error;

/// Lexing failure. Surfaced to the caller as a `ParseFailure`; the pipeline
/// degrades to empty symbol sets instead of crashing the watcher.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("unterminated string literal starting on line {line}")]
    UnterminatedString { line: usize },
    #[error("unterminated block comment starting on line {line}")]
    UnterminatedComment { line: usize },
}

/// One significant token of GML source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identifier or keyword.
    Ident(String),
    /// Preprocessor-style directive name without the leading `#` ("macro", "region").
    Directive(String),
    /// Any other single significant character.
    Punct(char),
}

/// Tokenize GML source, dropping whitespace, comments, string and numeric
/// literals. Strings may be verbatim (`@"..."`, may span lines) or plain
/// (`"..."` / `'...'` with backslash escapes, single line).
pub fn scan(source: &str) -> Result<Vec<Token>, ScanError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;

    while i < chars.len() {
        let c = chars[i];

        if c == '\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Line comment.
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        // Block comment.
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let start_line = line;
            i += 2;
            loop {
                match chars.get(i) {
                    None => return Err(ScanError::UnterminatedComment { line: start_line }),
                    Some('\n') => line += 1,
                    Some('*') if chars.get(i + 1) == Some(&'/') => {
                        i += 2;
                        break;
                    }
                    Some(_) => {}
                }
                i += 1;
            }
            continue;
        }

        // Verbatim string: @"..." with no escapes, may span lines.
        if c == '@' && matches!(chars.get(i + 1), Some('"') | Some('\'')) {
            let quote = chars[i + 1];
            let start_line = line;
            i += 2;
            loop {
                match chars.get(i) {
                    None => return Err(ScanError::UnterminatedString { line: start_line }),
                    Some('\n') => line += 1,
                    Some(&ch) if ch == quote => {
                        i += 1;
                        break;
                    }
                    Some(_) => {}
                }
                i += 1;
            }
            continue;
        }

        // Plain string, single line, backslash escapes.
        if c == '"' || c == '\'' {
            let quote = c;
            let start_line = line;
            i += 1;
            loop {
                match chars.get(i) {
                    None | Some('\n') => {
                        return Err(ScanError::UnterminatedString { line: start_line });
                    }
                    Some('\\') => i += 1, // skip escaped char
                    Some(&ch) if ch == quote => {
                        i += 1;
                        break;
                    }
                    Some(_) => {}
                }
                i += 1;
            }
            continue;
        }

        // Directive: #macro, #region, ...
        if c == '#' {
            let mut j = i + 1;
            let mut name = String::new();
            while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                name.push(chars[j]);
                j += 1;
            }
            if name.is_empty() {
                tokens.push(Token::Punct('#'));
                i += 1;
            } else {
                tokens.push(Token::Directive(name));
                i = j;
            }
            continue;
        }

        // Numeric literal (decimal, hex, GML's $-hex colors): skip entirely.
        if c.is_ascii_digit() || (c == '$' && chars.get(i + 1).is_some_and(|n| n.is_ascii_hexdigit()))
        {
            i += 1;
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_')
            {
                i += 1;
            }
            continue;
        }

        // Identifier or keyword.
        if c.is_ascii_alphabetic() || c == '_' {
            let mut j = i;
            let mut name = String::new();
            while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                name.push(chars[j]);
                j += 1;
            }
            tokens.push(Token::Ident(name));
            i = j;
            continue;
        }

        tokens.push(Token::Punct(c));
        i += 1;
    }

    Ok(tokens)
}
