use thiserror::Error;

/// Errors reported while turning source text into a program. Parse and
/// scope errors that can point at a token carry a rendered window of the
/// surrounding tokens with a caret under the offender.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum TranslateError {
    #[error("unexpected end of file")]
    UnexpectedEof,
    #[error("Unexpected token:\n{window}")]
    UnexpectedToken { window: String },
    #[error("{message}:\n{window}")]
    Scope { message: String, window: String },
    #[error("{0} is undefined")]
    Undefined(String),
    #[error("{0} isn't variable")]
    NotVariable(String),
    #[error("Unknown token: {0}")]
    UnknownAtom(String),
}

impl TranslateError {
    pub(crate) fn scope<M: Into<String>>(message: M, tokens: &[&str], index: usize) -> TranslateError {
        TranslateError::Scope {
            message: message.into(),
            window: token_window(tokens, index),
        }
    }
}

/// Renders up to five tokens before and four after the offending one, with
/// a caret underline beneath it.
pub(crate) fn token_window(tokens: &[&str], index: usize) -> String {
    if index >= tokens.len() {
        return String::from("(end of input)");
    }

    let start = index.saturating_sub(5);
    let end = (index + 4).min(tokens.len());

    let mut before = String::new();
    for token in &tokens[start..index] {
        before.push_str(token);
        before.push(' ');
    }

    let mut window = before.clone();
    window.push_str(tokens[index]);
    for token in &tokens[index + 1..end] {
        window.push(' ');
        window.push_str(token);
    }
    window.push('\n');
    window.extend(std::iter::repeat(' ').take(before.chars().count()));
    window.extend(std::iter::repeat('^').take(tokens[index].chars().count()));
    window
}
