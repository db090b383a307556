//! The S-expression reader.
//!
//! The tree keeps no distinction between special forms and calls; the code
//! generator is pattern-directed on the head of each list. Every list node
//! remembers the index of its first token so diagnostics can point back
//! into the source.

use crate::error::{token_window, TranslateError};

#[derive(Clone, Debug, PartialEq)]
pub enum Sexp<'s> {
    Atom(&'s str),
    List(Node<'s>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node<'s> {
    pub token_idx: usize,
    pub args: Vec<Sexp<'s>>,
}

/// Reads the whole token stream into one root node. A stray `)` is an
/// unexpected token; an unclosed `(` runs past the end of input.
pub fn parse<'s>(tokens: &[&'s str]) -> Result<Node<'s>, TranslateError> {
    let (root, consumed) = parse_list(tokens, 0);
    if consumed != tokens.len() {
        if consumed > tokens.len() {
            return Err(TranslateError::UnexpectedEof);
        }
        return Err(TranslateError::UnexpectedToken {
            window: token_window(tokens, consumed),
        });
    }
    Ok(root)
}

fn parse_list<'s>(tokens: &[&'s str], start: usize) -> (Node<'s>, usize) {
    let mut args = Vec::new();
    let mut position = start;
    while position < tokens.len() && tokens[position] != ")" {
        if tokens[position] == "(" {
            let (subtree, after) = parse_list(tokens, position + 1);
            args.push(Sexp::List(subtree));
            position = after;
        } else {
            args.push(Sexp::Atom(tokens[position]));
        }
        position += 1;
    }
    (
        Node {
            token_idx: start,
            args,
        },
        position,
    )
}
