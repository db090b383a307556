//! Translator for the parenthesized source language of the accumulator
//! machine.
//!
//! The main function provided by this crate is [`translate`], which accepts
//! source text and produces a linked [`Program`](acode::Program): the
//! global data prefix plus the instruction list, ready to be serialized
//! with [`acode`] and executed by the machine.
//!
//! # Source language
//!
//! Programs are sequences of parenthesized forms. Every form is an
//! expression and leaves its value on the machine stack.
//!
//! Form                    | Meaning
//! ------------------------|--------------------------------------------------
//! `(defvar name expr)`    | allocate a global cell, bind `name`, assign
//! `(setq name expr)`      | assign to a bound variable
//! `(setv name expr)`      | store through the pointer held by `name`
//! `(getv expr)`           | dereference the pointer produced by `expr`
//! `(compile-malloc n)`    | reserve `n` global cells, yield the base address
//! `(IN)`                  | read one input token
//! `(OUT expr)`            | append the low byte of the value to the output
//! `(+ a b)` `(- a b)`     | arithmetic, also `*`, `/` (floored), `%`
//! `(= a b)` `(!= a b)` `(>= a b)` | comparisons, yielding 0 or 1
//! `(if cond body…)`       | conditional; the condition value is consumed
//! `(while cond body…)`    | loop while the condition is non-zero
//! `(defun name (args…) body…)` | function definition; yields constant 1
//! `(name args…)`          | call of a defined function
//!
//! Atoms are decimal numbers, identifiers (`[A-Za-z][A-Za-z0-9]*`),
//! double-quoted strings or single-quoted characters. A string literal is
//! lowered into consecutive global cells terminated by a zero word and
//! evaluates to its base address.
//!
//! Functions pass arguments on the stack; the callee copies them into
//! fresh global cells, so recursion and reentrancy are not supported.

mod ast;
mod codegen;
mod error;
mod labels;
mod lex;

#[cfg(test)]
mod test;

use acode::Program;
use acpu::{Instr, Opcode};

pub use crate::ast::{parse, Node, Sexp};
pub use crate::error::TranslateError;
pub use crate::lex::tokenize;

pub fn translate(source: &str) -> Result<Program, TranslateError> {
    let tokens = lex::tokenize(source);
    let root = ast::parse(&tokens)?;
    let (data, mut code) = codegen::generate(&tokens, &root)?;
    code.push(Instr::plain(Opcode::HALT));
    Ok(Program::from(data, labels::link(code)))
}
