use super::*;

use acpu::Addressing::{Direct, Immediate, StackIndirect, StackOffset};
use acpu::{Addressing, Instr, Opcode, Target};
use matches::assert_matches;

use crate::error::token_window;
use crate::labels;

fn ld(operand: Addressing) -> Instr {
    Instr::with_operand(Opcode::LD, operand)
}

fn st(operand: Addressing) -> Instr {
    Instr::with_operand(Opcode::ST, operand)
}

fn op(opcode: Opcode) -> Instr {
    Instr::plain(opcode)
}

fn jump(opcode: Opcode, index: usize) -> Instr {
    Instr::with_target(opcode, Target::Index(index))
}

mod lexing {
    use super::*;

    #[test]
    fn splits_delimiters_and_literals() {
        assert_eq!(tokenize("(OUT \"A\")"), vec!["(", "OUT", "\"A\"", ")"]);
        assert_eq!(tokenize("(+ 1 2)"), vec!["(", "+", "1", "2", ")"]);
        assert_eq!(tokenize("(>= a -12)"), vec!["(", ">=", "a", "-12", ")"]);
        assert_eq!(tokenize("(!= i 5)"), vec!["(", "!=", "i", "5", ")"]);
    }

    #[test]
    fn quoted_strings_keep_spaces() {
        assert_eq!(tokenize("\"two words\""), vec!["\"two words\""]);
        assert_eq!(tokenize("'x'"), vec!["'x'"]);
    }

    #[test]
    fn unknown_characters_become_single_tokens() {
        assert_eq!(tokenize("a # b"), vec!["a", "#", "b"]);
    }
}

mod parsing {
    use super::*;

    #[test]
    fn builds_nested_lists_with_token_indices() {
        let tokens = tokenize("(a (b c))");
        let root = parse(&tokens).unwrap();

        assert_eq!(root.token_idx, 0);
        assert_eq!(root.args.len(), 1);
        let outer = match &root.args[0] {
            Sexp::List(node) => node,
            other => panic!("expected a list, got {:?}", other),
        };
        assert_eq!(outer.token_idx, 1);
        assert_eq!(outer.args[0], Sexp::Atom("a"));
        let inner = match &outer.args[1] {
            Sexp::List(node) => node,
            other => panic!("expected a list, got {:?}", other),
        };
        assert_eq!(inner.token_idx, 3);
        assert_eq!(inner.args, vec![Sexp::Atom("b"), Sexp::Atom("c")]);
    }

    #[test]
    fn stray_closing_paren_is_reported_with_a_window() {
        let tokens = tokenize("x )");
        assert_eq!(
            parse(&tokens),
            Err(TranslateError::UnexpectedToken {
                window: "x )\n  ^".to_owned(),
            })
        );
    }

    #[test]
    fn unclosed_paren_is_an_unexpected_eof() {
        let tokens = tokenize("(OUT 1");
        assert_eq!(parse(&tokens), Err(TranslateError::UnexpectedEof));
    }

    #[test]
    fn window_shows_five_before_and_four_after() {
        let tokens: Vec<&str> = "a b c d e f g h i j k".split(' ').collect();
        assert_eq!(token_window(&tokens, 6), "b c d e f g h i j\n          ^");
        assert_eq!(token_window(&tokens, 0), "a b c d\n^");
    }
}

mod generation {
    use super::*;

    #[test]
    fn out_of_a_number() {
        let program = translate("(OUT 65)").unwrap();

        assert_eq!(program.data(), &[] as &[acpu::Word]);
        assert_eq!(
            program.code(),
            &[
                ld(Immediate(65)),
                op(Opcode::PUSH),
                ld(StackOffset(0)),
                op(Opcode::OUT),
                op(Opcode::HALT),
            ][..]
        );
    }

    #[test]
    fn string_literal_lowers_into_the_data_prefix() {
        let program = translate("(OUT \"hi\")").unwrap();

        assert_eq!(program.data(), &[104, 105, 0]);
        assert_eq!(
            program.code(),
            &[
                ld(Immediate(0)),
                op(Opcode::PUSH),
                ld(StackOffset(0)),
                op(Opcode::OUT),
                op(Opcode::HALT),
            ][..]
        );
    }

    #[test]
    fn assignment_keeps_the_value_on_the_stack() {
        let program = translate("(defvar x 0) (setq x (+ 1 2)) (OUT x)").unwrap();

        assert_eq!(program.data(), &[0]);
        assert_eq!(
            program.code(),
            &[
                // (defvar x 0)
                ld(Immediate(0)),
                op(Opcode::PUSH),
                ld(StackOffset(0)),
                st(Immediate(0)),
                op(Opcode::POP),
                // (setq x (+ 1 2))
                ld(Immediate(1)),
                op(Opcode::PUSH),
                ld(Immediate(2)),
                op(Opcode::PUSH),
                op(Opcode::POP),
                Instr::with_operand(Opcode::ADD, StackIndirect(0)),
                st(StackOffset(0)),
                ld(StackOffset(0)),
                st(Immediate(0)),
                op(Opcode::POP),
                // (OUT x)
                ld(Direct(0)),
                op(Opcode::PUSH),
                ld(StackOffset(0)),
                op(Opcode::OUT),
                op(Opcode::HALT),
            ][..]
        );
    }

    #[test]
    fn comparison_materializes_zero_or_one() {
        let program = translate("(= 1 2)").unwrap();

        assert_eq!(
            program.code(),
            &[
                ld(Immediate(1)),
                op(Opcode::PUSH),
                ld(Immediate(2)),
                op(Opcode::PUSH),
                ld(StackOffset(1)),
                Instr::with_operand(Opcode::CMP, StackIndirect(0)),
                jump(Opcode::JE, 9),
                ld(Immediate(0)),
                jump(Opcode::JMP, 10),
                ld(Immediate(1)),
                st(StackOffset(1)),
                op(Opcode::POP),
                op(Opcode::HALT),
            ][..]
        );
        assert!(program.code().iter().all(|instr| instr.label.is_none()));
    }

    #[test]
    fn defun_emits_prologue_epilogue_and_skip() {
        let program = translate("(defun inc (n) (+ n 1)) (OUT (inc 64))").unwrap();

        assert_eq!(program.data(), &[0]);
        assert_eq!(
            program.code(),
            &[
                jump(Opcode::JMP, 14),
                op(Opcode::NOP),
                ld(StackOffset(1)),
                st(Immediate(0)),
                ld(Direct(0)),
                op(Opcode::PUSH),
                ld(Immediate(1)),
                op(Opcode::PUSH),
                op(Opcode::POP),
                Instr::with_operand(Opcode::ADD, StackIndirect(0)),
                st(StackOffset(0)),
                op(Opcode::POP),
                st(StackOffset(1)),
                op(Opcode::RET),
                ld(Immediate(1)),
                op(Opcode::PUSH),
                op(Opcode::POP),
                ld(Immediate(64)),
                op(Opcode::PUSH),
                jump(Opcode::CALL, 1),
                ld(StackOffset(0)),
                op(Opcode::OUT),
                op(Opcode::HALT),
            ][..]
        );
    }

    #[test]
    fn call_pops_all_but_one_argument_slot() {
        let program = translate("(defun add (a b) (+ a b)) (OUT (add 1 2))").unwrap();

        let call_at = program
            .code()
            .iter()
            .position(|instr| instr.opcode == Opcode::CALL)
            .unwrap();
        assert_eq!(program.code()[call_at + 1], op(Opcode::POP));
        assert_ne!(program.code()[call_at + 2], op(Opcode::POP));
    }

    #[test]
    fn getv_dereferences_in_place() {
        let program = translate("(getv 5)").unwrap();

        assert_eq!(
            program.code(),
            &[
                ld(Immediate(5)),
                op(Opcode::PUSH),
                ld(StackIndirect(0)),
                st(StackOffset(0)),
                op(Opcode::HALT),
            ][..]
        );
    }

    #[test]
    fn compile_malloc_reserves_global_words() {
        let program = translate("(defvar p (compile-malloc 3)) (OUT 65)").unwrap();

        // slot for p, then the three reserved words
        assert_eq!(program.data(), &[0, 0, 0, 0]);
        // the base address pushed is the first reserved word
        assert_eq!(program.code()[0], ld(Immediate(1)));
    }

    #[test]
    fn all_jump_targets_resolve() {
        let sources = [
            "(defvar i 0) (while (!= i 5) (setq i (+ i 1))) (OUT i)",
            "(if (= 1 1) (OUT 65))",
            "(defun inc (n) (+ n 1)) (OUT (inc 64))",
            "(>= 2 1)",
        ];
        for source in &sources {
            let program = translate(source).unwrap();
            for instr in program.code() {
                assert!(instr.label.is_none(), "{}: {}", source, instr);
                if let Some(target) = &instr.target {
                    assert_matches!(target, Target::Index(_));
                }
            }
        }
    }
}

mod scoping {
    use super::*;

    #[test]
    fn unknown_head_is_reported_with_a_window() {
        assert_eq!(
            translate("(foo 1)"),
            Err(TranslateError::Scope {
                message: "Unknown token".to_owned(),
                window: "( foo 1 )\n  ^^^".to_owned(),
            })
        );
    }

    #[test]
    fn undefined_variable() {
        assert_eq!(
            translate("(OUT y)"),
            Err(TranslateError::Undefined("y".to_owned()))
        );
    }

    #[test]
    fn assignment_to_an_unbound_name() {
        let err = translate("(setq y 1)").unwrap_err();
        assert_matches!(err, TranslateError::Scope { ref message, .. } if message == "y is not variable");
    }

    #[test]
    fn function_used_as_variable() {
        assert_eq!(
            translate("(defun f (a) 1) (OUT f)"),
            Err(TranslateError::NotVariable("f".to_owned()))
        );
    }

    #[test]
    fn variable_used_as_function() {
        let err = translate("(defvar f 1) (f 2)").unwrap_err();
        assert_matches!(err, TranslateError::Scope { ref message, .. } if message == "f is not function");
    }

    #[test]
    fn wrong_arity() {
        let err = translate("(+ 1)").unwrap_err();
        assert_matches!(err, TranslateError::Scope { ref message, .. } if message == "+ expects 2 arguments");
    }

    #[test]
    fn empty_parentheses() {
        let err = translate("(())").unwrap_err();
        assert_matches!(err, TranslateError::Scope { ref message, .. } if message == "Empty parentheses");
    }

    #[test]
    fn empty_source() {
        let err = translate("").unwrap_err();
        assert_matches!(err, TranslateError::Scope { ref message, .. } if message == "Empty parentheses");
    }

    #[test]
    fn nested_functions_do_not_see_enclosing_arguments() {
        let err =
            translate("(defun f (a) ((defun g (b) (+ a b)) 1)) (OUT (f 1))").unwrap_err();
        assert_eq!(err, TranslateError::Undefined("a".to_owned()));
    }

    #[test]
    fn nested_functions_still_see_outer_variables_and_functions() {
        let source = "(defvar base 10)
                      (defun add (a b) (+ a b))
                      (defun bump (n) (add base n))
                      (OUT (bump 55))";
        assert!(translate(source).is_ok());
    }
}

mod linking {
    use super::*;

    #[test]
    fn resolves_and_strips_labels() {
        let code = vec![
            Instr::jump_to(Opcode::JMP, "lable_1"),
            Instr::plain(Opcode::NOP).labeled("lable_1"),
            Instr::jump_to(Opcode::JE, "lable_404"),
        ];

        let linked = labels::link(code);

        assert_eq!(linked[0].target, Some(Target::Index(1)));
        assert_eq!(linked[1].label, None);
        // unknown labels stay symbolic for the machine to reject
        assert_eq!(
            linked[2].target,
            Some(Target::Label("lable_404".to_owned()))
        );
    }
}
