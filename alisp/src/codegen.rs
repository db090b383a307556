//! The code generator.
//!
//! Walks the S-expression tree and emits a linear instruction list with
//! symbolic jump labels, dispatching on the head atom of each list. All
//! expressions follow one stack contract: compiling an expression leaves
//! exactly one value on top of the machine stack.
//!
//! Storage for variables and string literals is allocated from an
//! append-only vector of global words that becomes the data prefix of the
//! emitted program.

use std::collections::HashMap;

use acpu::isa::crop16;
use acpu::{Addressing, Instr, Opcode, Word};

use crate::ast::{Node, Sexp};
use crate::error::TranslateError;

type Scope<'s> = HashMap<&'s str, Entry>;

#[derive(Clone, Debug, PartialEq)]
enum Entry {
    /// A global word. Entries bound as function parameters are flagged so
    /// nested function definitions do not inherit them.
    Variable { slot: usize, arg: bool },
    /// A function; the defining token index names its entry label.
    Function { token_idx: usize },
}

fn is_arg(entry: &Entry) -> bool {
    matches!(entry, Entry::Variable { arg: true, .. })
}

pub(crate) fn generate<'s>(
    tokens: &[&'s str],
    root: &Node<'s>,
) -> Result<(Vec<Word>, Vec<Instr>), TranslateError> {
    let mut gen = Codegen {
        tokens,
        global_data: Vec::new(),
        label_counter: 0,
    };
    let mut scope = Scope::new();
    let mut code = Vec::new();
    gen.compile(root, &mut scope, &mut code)?;
    Ok((gen.global_data, code))
}

struct Codegen<'s, 't> {
    tokens: &'t [&'s str],
    global_data: Vec<Word>,
    label_counter: u32,
}

impl<'s, 't> Codegen<'s, 't> {
    fn fresh_label(&mut self) -> String {
        self.label_counter += 1;
        format!("lable_{}", self.label_counter)
    }

    fn error(&self, message: &str, node: &Node) -> TranslateError {
        TranslateError::scope(message, self.tokens, node.token_idx)
    }

    fn check(&self, condition: bool, message: &str, node: &Node) -> Result<(), TranslateError> {
        if condition {
            Ok(())
        } else {
            Err(self.error(message, node))
        }
    }

    fn define_variable(&mut self, name: &'s str, arg: bool, scope: &mut Scope<'s>) -> usize {
        self.global_data.push(0);
        let slot = self.global_data.len() - 1;
        scope.insert(name, Entry::Variable { slot, arg });
        slot
    }

    fn compile(
        &mut self,
        node: &Node<'s>,
        scope: &mut Scope<'s>,
        code: &mut Vec<Instr>,
    ) -> Result<(), TranslateError> {
        self.check(!node.args.is_empty(), "Empty parentheses", node)?;

        let head = match &node.args[0] {
            Sexp::List(_) => return self.compile_sequence(node, scope, code),
            Sexp::Atom(token) => *token,
        };
        if is_string(head) {
            return self.compile_sequence(node, scope, code);
        }

        match head {
            "setq" | "defvar" | "setv" => self.compile_assign(head, node, scope, code),
            "IN" => {
                self.check(node.args.len() == 1, "IN expects 0 arguments", node)?;
                code.push(Instr::plain(Opcode::IN));
                code.push(Instr::plain(Opcode::PUSH));
                Ok(())
            }
            "compile-malloc" => self.compile_malloc(node, code),
            "getv" | "OUT" => self.compile_unary(head, node, scope, code),
            "=" | ">=" | "!=" | "+" | "-" | "*" | "/" | "%" => {
                self.compile_binary(head, node, scope, code)
            }
            "defun" => self.compile_defun(node, scope, code),
            "while" | "if" => self.compile_conditional(head, node, scope, code),
            _ => self.compile_call(head, node, scope, code),
        }
    }

    /// Either operand position of a form: a nested list compiles
    /// recursively, a bare atom loads and pushes its value.
    fn compile_arg(
        &mut self,
        arg: &Sexp<'s>,
        scope: &mut Scope<'s>,
        code: &mut Vec<Instr>,
    ) -> Result<(), TranslateError> {
        match arg {
            Sexp::List(child) => self.compile(child, scope, code),
            Sexp::Atom(token) => self.compile_atom(token, scope, code),
        }
    }

    fn compile_atom(
        &mut self,
        token: &str,
        scope: &Scope<'s>,
        code: &mut Vec<Instr>,
    ) -> Result<(), TranslateError> {
        if is_variable(token) {
            return match scope.get(token) {
                None => Err(TranslateError::Undefined(token.to_owned())),
                Some(Entry::Function { .. }) => {
                    Err(TranslateError::NotVariable(token.to_owned()))
                }
                Some(Entry::Variable { slot, .. }) => {
                    code.push(Instr::with_operand(
                        Opcode::LD,
                        Addressing::Direct(crop16(*slot as i64)),
                    ));
                    code.push(Instr::plain(Opcode::PUSH));
                    Ok(())
                }
            };
        }
        if is_string(token) {
            let base = self.global_data.len();
            self.global_data
                .extend(token[1..token.len() - 1].chars().map(|c| c as Word));
            self.global_data.push(0);
            code.push(Instr::with_operand(
                Opcode::LD,
                Addressing::Immediate(crop16(base as i64)),
            ));
            code.push(Instr::plain(Opcode::PUSH));
            return Ok(());
        }
        if is_number(token) {
            code.push(Instr::with_operand(
                Opcode::LD,
                Addressing::Immediate(crop16(number_value(token))),
            ));
            code.push(Instr::plain(Opcode::PUSH));
            return Ok(());
        }
        Err(TranslateError::UnknownAtom(token.to_owned()))
    }

    /// `((a) (b) (c))` — every list child runs for effect and its value is
    /// dropped, except the last child, whose value is the sequence's value.
    /// Bare atoms in non-final positions produce no code at all.
    fn compile_sequence(
        &mut self,
        node: &Node<'s>,
        scope: &mut Scope<'s>,
        code: &mut Vec<Instr>,
    ) -> Result<(), TranslateError> {
        let last = node.args.len() - 1;
        for arg in &node.args[..last] {
            if let Sexp::List(child) = arg {
                self.compile(child, scope, code)?;
                code.push(Instr::plain(Opcode::POP));
            }
        }
        self.compile_arg(&node.args[last], scope, code)
    }

    fn compile_assign(
        &mut self,
        head: &str,
        node: &Node<'s>,
        scope: &mut Scope<'s>,
        code: &mut Vec<Instr>,
    ) -> Result<(), TranslateError> {
        self.check(node.args.len() == 3, "setq expects 2 arguments", node)?;
        let name = match &node.args[1] {
            Sexp::Atom(token) if is_variable(token) => *token,
            _ => {
                return Err(self.error("setq expects a variable as the first argument", node));
            }
        };
        if head == "defvar" {
            self.define_variable(name, false, scope);
        }
        let slot = match scope.get(name) {
            Some(Entry::Variable { slot, .. }) => *slot,
            _ => return Err(self.error(&format!("{} is not variable", name), node)),
        };

        self.compile_arg(&node.args[2], scope, code)?;

        // the assigned value stays on the stack as the expression's value
        code.push(Instr::with_operand(Opcode::LD, Addressing::StackOffset(0)));
        let cell = crop16(slot as i64);
        code.push(Instr::with_operand(
            Opcode::ST,
            if head == "setv" {
                Addressing::Direct(cell)
            } else {
                Addressing::Immediate(cell)
            },
        ));
        Ok(())
    }

    fn compile_malloc(
        &mut self,
        node: &Node<'s>,
        code: &mut Vec<Instr>,
    ) -> Result<(), TranslateError> {
        self.check(
            node.args.len() == 2,
            "compile-malloc expects 1 argument",
            node,
        )?;
        let count = match &node.args[1] {
            Sexp::Atom(token) if is_number(token) => number_value(token),
            _ => 0,
        };
        self.check(
            count > 0,
            "compile-malloc expects a positive number as the first argument",
            node,
        )?;

        code.push(Instr::with_operand(
            Opcode::LD,
            Addressing::Immediate(crop16(self.global_data.len() as i64)),
        ));
        code.push(Instr::plain(Opcode::PUSH));
        for _ in 0..count {
            self.global_data.push(0);
        }
        Ok(())
    }

    fn compile_unary(
        &mut self,
        head: &str,
        node: &Node<'s>,
        scope: &mut Scope<'s>,
        code: &mut Vec<Instr>,
    ) -> Result<(), TranslateError> {
        self.check(
            node.args.len() == 2,
            &format!("{} expects 1 argument", head),
            node,
        )?;
        self.compile_arg(&node.args[1], scope, code)?;
        if head == "getv" {
            // dereference in place: the pointer on top becomes the value
            code.push(Instr::with_operand(
                Opcode::LD,
                Addressing::StackIndirect(0),
            ));
            code.push(Instr::with_operand(Opcode::ST, Addressing::StackOffset(0)));
        } else {
            code.push(Instr::with_operand(Opcode::LD, Addressing::StackOffset(0)));
            code.push(Instr::plain(Opcode::OUT));
        }
        Ok(())
    }

    fn compile_binary(
        &mut self,
        head: &str,
        node: &Node<'s>,
        scope: &mut Scope<'s>,
        code: &mut Vec<Instr>,
    ) -> Result<(), TranslateError> {
        self.check(
            node.args.len() == 3,
            &format!("{} expects 2 arguments", head),
            node,
        )?;
        for arg in &node.args[1..] {
            self.compile_arg(arg, scope, code)?;
        }

        match head {
            "+" | "*" => {
                // commutative: fold the popped right operand into the left slot
                code.push(Instr::plain(Opcode::POP));
                code.push(Instr::with_operand(
                    if head == "+" { Opcode::ADD } else { Opcode::MUL },
                    Addressing::StackIndirect(0),
                ));
                code.push(Instr::with_operand(Opcode::ST, Addressing::StackOffset(0)));
            }
            "-" | "/" | "%" => {
                let opcode = match head {
                    "-" => Opcode::SUB,
                    "/" => Opcode::DIV,
                    _ => Opcode::MOD,
                };
                code.push(Instr::with_operand(Opcode::LD, Addressing::StackOffset(1)));
                code.push(Instr::with_operand(opcode, Addressing::StackIndirect(0)));
                code.push(Instr::with_operand(Opcode::ST, Addressing::StackOffset(1)));
                code.push(Instr::plain(Opcode::POP));
            }
            _ => {
                // comparisons materialize 0 or 1 over the left slot
                let opcode = match head {
                    "=" => Opcode::JE,
                    "!=" => Opcode::JNE,
                    _ => Opcode::JGE,
                };
                let true_label = self.fresh_label();
                let done_label = self.fresh_label();
                code.push(Instr::with_operand(Opcode::LD, Addressing::StackOffset(1)));
                code.push(Instr::with_operand(
                    Opcode::CMP,
                    Addressing::StackIndirect(0),
                ));
                code.push(Instr::jump_to(opcode, true_label.clone()));
                code.push(Instr::with_operand(Opcode::LD, Addressing::Immediate(0)));
                code.push(Instr::jump_to(Opcode::JMP, done_label.clone()));
                code.push(
                    Instr::with_operand(Opcode::LD, Addressing::Immediate(1)).labeled(true_label),
                );
                code.push(
                    Instr::with_operand(Opcode::ST, Addressing::StackOffset(1))
                        .labeled(done_label),
                );
                code.push(Instr::plain(Opcode::POP));
            }
        }
        Ok(())
    }

    fn compile_defun(
        &mut self,
        node: &Node<'s>,
        scope: &mut Scope<'s>,
        code: &mut Vec<Instr>,
    ) -> Result<(), TranslateError> {
        // the definition is skipped when control flows over it
        let skip_label = self.fresh_label();
        code.push(Instr::jump_to(Opcode::JMP, skip_label.clone()));

        self.check(
            node.args.len() > 3,
            "defun expects a name, an argument list and a body",
            node,
        )?;
        let name = match &node.args[1] {
            Sexp::Atom(token) if is_variable(token) => *token,
            _ => return Err(self.error("defun expects a name as the first argument", node)),
        };
        let params = match &node.args[2] {
            Sexp::List(list) => {
                let mut params = Vec::with_capacity(list.args.len());
                for arg in &list.args {
                    match arg {
                        Sexp::Atom(token) if is_variable(token) => params.push(*token),
                        _ => {
                            return Err(self.error(
                                "defun expects an argument list as the second argument",
                                node,
                            ));
                        }
                    }
                }
                params
            }
            _ => {
                return Err(
                    self.error("defun expects an argument list as the second argument", node)
                );
            }
        };
        self.check(!params.is_empty(), "defun expects one or more arguments", node)?;

        // the function body sees the outer bindings minus argument
        // variables; the function itself is bound in the outer scope only
        let mut fscope: Scope<'s> = scope
            .iter()
            .filter(|&(_, entry)| !is_arg(entry))
            .map(|(name, entry)| (*name, entry.clone()))
            .collect();
        scope.insert(
            name,
            Entry::Function {
                token_idx: node.token_idx,
            },
        );

        code.push(Instr::plain(Opcode::NOP).labeled(format!("lable_f{}", node.token_idx)));

        // copy caller-provided stack slots into fresh globals
        let argc = params.len();
        for (i, param) in params.iter().enumerate() {
            let slot = self.define_variable(*param, true, &mut fscope);
            code.push(Instr::with_operand(
                Opcode::LD,
                Addressing::StackOffset(crop16((argc - i) as i64)),
            ));
            code.push(Instr::with_operand(
                Opcode::ST,
                Addressing::Immediate(crop16(slot as i64)),
            ));
        }

        let last = node.args.len() - 1;
        for arg in &node.args[3..last] {
            if let Sexp::List(child) = arg {
                self.compile(child, &mut fscope, code)?;
                code.push(Instr::plain(Opcode::POP));
            }
        }
        self.compile_arg(&node.args[last], &mut fscope, code)?;

        // the body's value replaces the slot the caller will read back
        code.push(Instr::plain(Opcode::POP));
        code.push(Instr::with_operand(
            Opcode::ST,
            Addressing::StackOffset(crop16(argc as i64)),
        ));
        code.push(Instr::plain(Opcode::RET));

        // as an expression, defun itself is worth a constant 1
        code.push(Instr::with_operand(Opcode::LD, Addressing::Immediate(1)).labeled(skip_label));
        code.push(Instr::plain(Opcode::PUSH));
        Ok(())
    }

    fn compile_conditional(
        &mut self,
        head: &str,
        node: &Node<'s>,
        scope: &mut Scope<'s>,
        code: &mut Vec<Instr>,
    ) -> Result<(), TranslateError> {
        self.check(
            node.args.len() > 2,
            &format!("{} expects a condition and a body", head),
            node,
        )?;

        if head == "while" {
            let start_label = self.fresh_label();
            let end_label = self.fresh_label();
            code.push(Instr::plain(Opcode::NOP).labeled(start_label.clone()));
            self.compile_arg(&node.args[1], scope, code)?;
            code.push(Instr::with_operand(Opcode::LD, Addressing::StackOffset(0)));
            code.push(Instr::with_operand(Opcode::CMP, Addressing::Immediate(0)));
            code.push(Instr::jump_to(Opcode::JE, end_label.clone()));
            code.push(Instr::plain(Opcode::POP));
            for arg in &node.args[2..] {
                if let Sexp::List(child) = arg {
                    self.compile(child, scope, code)?;
                    code.push(Instr::plain(Opcode::POP));
                }
            }
            code.push(Instr::jump_to(Opcode::JMP, start_label));
            code.push(Instr::plain(Opcode::NOP).labeled(end_label));
        } else {
            let end_label = self.fresh_label();
            self.compile_arg(&node.args[1], scope, code)?;
            code.push(Instr::with_operand(Opcode::LD, Addressing::StackOffset(0)));
            code.push(Instr::with_operand(Opcode::CMP, Addressing::Immediate(0)));
            code.push(Instr::jump_to(Opcode::JE, end_label.clone()));
            code.push(Instr::plain(Opcode::POP));
            for arg in &node.args[2..] {
                if let Sexp::List(child) = arg {
                    self.compile(child, scope, code)?;
                }
            }
            code.push(Instr::plain(Opcode::NOP).labeled(end_label));
        }
        Ok(())
    }

    fn compile_call(
        &mut self,
        head: &str,
        node: &Node<'s>,
        scope: &mut Scope<'s>,
        code: &mut Vec<Instr>,
    ) -> Result<(), TranslateError> {
        let token_idx = match scope.get(head) {
            None => return Err(self.error("Unknown token", node)),
            Some(Entry::Variable { .. }) => {
                return Err(self.error(&format!("{} is not function", head), node));
            }
            Some(Entry::Function { token_idx }) => *token_idx,
        };

        for arg in &node.args[1..] {
            self.compile_arg(arg, scope, code)?;
        }
        code.push(Instr::jump_to(Opcode::CALL, format!("lable_f{}", token_idx)));
        // drop all argument slots but the one the callee overwrote with
        // the return value
        for _ in 0..node.args.len().saturating_sub(2) {
            code.push(Instr::plain(Opcode::POP));
        }
        Ok(())
    }
}

/// `[A-Za-z][A-Za-z0-9]*`
fn is_variable(token: &str) -> bool {
    let bytes = token.as_bytes();
    !bytes.is_empty()
        && bytes[0].is_ascii_alphabetic()
        && bytes[1..].iter().all(|b| b.is_ascii_alphanumeric())
}

/// `0` or `-?[1-9][0-9]*`
fn is_number(token: &str) -> bool {
    if token == "0" {
        return true;
    }
    let digits = token.strip_prefix('-').unwrap_or(token);
    let bytes = digits.as_bytes();
    !bytes.is_empty() && bytes[0] != b'0' && bytes.iter().all(|b| b.is_ascii_digit())
}

/// A double-quoted string of any length, or a single-quoted literal of
/// exactly one character.
fn is_string(token: &str) -> bool {
    let bytes = token.as_bytes();
    if token.len() < 2 {
        return false;
    }
    if bytes[0] == b'"' && bytes[token.len() - 1] == b'"' {
        return !token[1..token.len() - 1].contains('"');
    }
    if bytes[0] == b'\'' && bytes[token.len() - 1] == b'\'' {
        let inner = &token[1..token.len() - 1];
        return inner.chars().count() == 1 && !inner.contains('\'');
    }
    false
}

/// Value of a token that matched the number grammar, folded with wrapping
/// arithmetic so over-long literals crop like the 16-bit operand decode.
fn number_value(token: &str) -> i64 {
    fn fold(digits: &str) -> i64 {
        digits.bytes().fold(0i64, |acc, b| {
            acc.wrapping_mul(10).wrapping_add(i64::from(b - b'0'))
        })
    }
    match token.strip_prefix('-') {
        Some(digits) => fold(digits).wrapping_neg(),
        None => fold(token),
    }
}

#[cfg(test)]
mod tests {
    use super::{is_number, is_string, is_variable, number_value};

    #[test]
    fn token_classes() {
        assert!(is_variable("x"));
        assert!(is_variable("abc123"));
        assert!(!is_variable("1abc"));
        assert!(!is_variable("a-b"));
        assert!(!is_variable(""));

        assert!(is_number("0"));
        assert!(is_number("-17"));
        assert!(!is_number("-0"));
        assert!(!is_number("007"));
        assert!(!is_number("12a"));

        assert!(is_string("\"hello\""));
        assert!(is_string("\"\""));
        assert!(is_string("'a'"));
        assert!(!is_string("'ab'"));
        assert!(!is_string("''"));
        assert!(!is_string("\"open"));
    }

    #[test]
    fn number_values_crop_like_the_machine() {
        assert_eq!(number_value("42"), 42);
        assert_eq!(number_value("-42"), -42);
        // low 16 bits survive the operand decode either way
        assert_eq!(number_value("70000") as i16, 4464);
    }
}
