//! The tokenizer.
//!
//! Whitespace is the only separator. The token classes, tried in order at
//! each position:
//!
//! - a single `(` or `)`;
//! - a double-quoted string literal (no escapes);
//! - a single-quoted literal;
//! - a run of word characters, `+` and `-` (identifiers, numbers and the
//!   word-like operators);
//! - the two-character comparisons `!=` and `>=`;
//! - any other single non-space character.

use regex::Regex;

const TOKEN_PATTERN: &str = r#"[()]|"[^"]*?"|'[^']*?'|[\w+-]+|!=|>=|\S"#;

pub fn tokenize(source: &str) -> Vec<&str> {
    let token_re = Regex::new(TOKEN_PATTERN).unwrap();
    token_re.find_iter(source).map(|m| m.as_str()).collect()
}
