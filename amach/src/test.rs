use super::*;

use acpu::constants::{DATA_MEMORY_WORDS, DEFAULT_INSTR_LIMIT};
use acpu::SimError;

fn run_source(source: &str, input: &str) -> Summary {
    let program = alisp::translate(source).unwrap();
    simulate(
        program,
        input_tokens(input),
        DATA_MEMORY_WORDS,
        DEFAULT_INSTR_LIMIT,
        None,
    )
    .unwrap()
}

#[test]
fn out_of_a_constant_honors_the_tick_contract() {
    let summary = run_source("(OUT 65)", "");

    assert_eq!(summary.output, "A");
    assert_eq!(summary.stop, StopReason::Halted);
    // LD 2, PUSH 5, LD SP+0 5, OUT 1, plus the HALT fetch
    assert_eq!(summary.instr_count, 4);
    assert_eq!(summary.ticks, 14);
}

#[test]
fn string_literal_evaluates_to_its_base_address() {
    let summary = run_source("(OUT \"A\")", "");

    // the literal lands at address 0, so OUT emits the code point 0
    assert_eq!(summary.output, "\u{0}");
    assert_eq!(summary.stop, StopReason::Halted);
}

#[test]
fn walking_a_string_through_getv_prints_it() {
    let source = "(defvar p \"AB\")
                  (defvar c (getv p))
                  (while (!= c 0) (OUT c) (setq p (+ p 1)) (setq c (getv p)))";
    let summary = run_source(source, "");

    assert_eq!(summary.output, "AB");
    assert_eq!(summary.stop, StopReason::Halted);
}

#[test]
fn arithmetic_result_reaches_the_output() {
    let summary = run_source("(defvar x 0) (setq x (+ 1 2)) (OUT x)", "");

    assert_eq!(summary.output, "\u{3}");
    assert_eq!(summary.stop, StopReason::Halted);
}

#[test]
fn while_loop_counts_to_five() {
    let summary = run_source("(defvar i 0) (while (!= i 5) (setq i (+ i 1))) (OUT i)", "");

    assert_eq!(summary.output, "\u{5}");
    assert_eq!(summary.stop, StopReason::Halted);
    assert!(summary.instr_count > 50, "ran {}", summary.instr_count);
    assert!(summary.instr_count < DEFAULT_INSTR_LIMIT);
}

#[test]
fn function_call_returns_a_value() {
    let summary = run_source("(defun inc (n) (+ n 1)) (OUT (inc 64))", "");

    assert_eq!(summary.output, "A");
    assert_eq!(summary.stop, StopReason::Halted);
}

#[test]
fn echo_terminates_on_the_zero_sentinel() {
    let summary = run_source("(defvar c (IN)) (while (!= c 0) (OUT c) (setq c (IN)))", "hi");

    assert_eq!(summary.output, "hi");
    assert_eq!(summary.stop, StopReason::Halted);
}

#[test]
fn division_by_zero_is_fatal() {
    let summary = run_source("(OUT (/ 1 0))", "");

    assert_eq!(summary.stop, StopReason::Fatal(SimError::DivisionByZero));
    assert_eq!(summary.output, "");
}

#[test]
fn reading_past_the_input_stops_gracefully() {
    let summary = run_source("(defvar a (IN)) (OUT (IN))", "");

    assert_eq!(summary.stop, StopReason::InputExhausted);
    assert_eq!(summary.output, "");
}

#[test]
fn runaway_loop_hits_the_instruction_limit() {
    let summary = run_source("(while 1 (OUT 65))", "");

    assert_eq!(summary.stop, StopReason::LimitExceeded);
    assert_eq!(summary.instr_count, DEFAULT_INSTR_LIMIT);
    assert!(summary.output.starts_with('A'));
}

#[test]
fn trace_records_post_commit_state() {
    let program = alisp::translate("(OUT 65)").unwrap();
    let mut sink = Vec::new();

    let summary = simulate(
        program,
        input_tokens(""),
        DATA_MEMORY_WORDS,
        DEFAULT_INSTR_LIMIT,
        Some(&mut sink),
    )
    .unwrap();

    let trace = String::from_utf8(sink).unwrap();
    let lines: Vec<&str> = trace.lines().collect();

    assert_eq!(lines.len() as u64, summary.instr_count + 1);
    assert_eq!(
        lines,
        vec![
            "TICK:    0 ACC:      0 SP:      0 IP:      0 INSTR: LD 65",
            "TICK:    2 ACC:     65 SP:      0 IP:      1 INSTR: PUSH",
            "TICK:    7 ACC:     65 SP:     -1 IP:      2 INSTR: LD SP+0",
            "TICK:   12 ACC:     65 SP:     -1 IP:      3 INSTR: OUT",
            "TICK:   13 ACC:     65 SP:     -1 IP:      4 INSTR: HALT",
        ]
    );
}

#[test]
fn run_code_file_round_trip_with_trace() {
    let dir = std::env::temp_dir().join("amach-test");
    fs::create_dir_all(&dir).unwrap();
    let code_path = dir.join("program.json");
    let input_path = dir.join("input.txt");
    let debug_path = dir.join("trace.dbg");

    acode::write_file(&code_path, &alisp::translate("(OUT 65)").unwrap()).unwrap();
    fs::write(&input_path, "").unwrap();

    let summary = run_code_file(&code_path, &input_path, Some(&debug_path)).unwrap();

    assert_eq!(summary.output, "A");
    assert_eq!(summary.stop, StopReason::Halted);
    let trace = fs::read_to_string(&debug_path).unwrap();
    assert_eq!(trace.lines().count(), 5);

    for path in &[&code_path, &input_path, &debug_path] {
        fs::remove_file(path).unwrap();
    }
}
