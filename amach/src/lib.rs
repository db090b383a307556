//! The simulation driver.
//!
//! Preloads the global data prefix into memory, then runs the control unit
//! until the program halts, the input runs dry, the instruction limit is
//! hit, or a fatal error surfaces. The first two stop reasons past `HALT`
//! are graceful: whatever output the program produced is still reported.
//!
//! When a trace sink is provided the driver writes one line before the
//! first instruction and one after every committed instruction, observing
//! the post-commit machine state.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

use acode::Program;
use acpu::constants::{DATA_MEMORY_WORDS, DEFAULT_INSTR_LIMIT};
use acpu::{ControlUnit, DataPath, Memory, SimError, Step, Word};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Reading \"{0}\" failed: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("Reading code failed: {0}")]
    Code(#[from] acode::Error),
    #[error("Writing trace failed: {0}")]
    Trace(std::io::Error),
}

/// Why the run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    Halted,
    InputExhausted,
    LimitExceeded,
    Fatal(SimError),
}

#[derive(Clone, Debug)]
pub struct Summary {
    pub output: String,
    pub instr_count: u64,
    pub ticks: u64,
    pub stop: StopReason,
}

/// Turns input text into the token stream the machine consumes: one code
/// point per character, closed by a zero sentinel.
pub fn input_tokens(text: &str) -> VecDeque<Word> {
    let mut tokens: VecDeque<Word> = text.chars().map(|c| c as Word).collect();
    tokens.push_back(0);
    tokens
}

pub fn simulate(
    program: Program,
    input: VecDeque<Word>,
    memory_words: usize,
    limit: u64,
    mut trace: Option<&mut dyn Write>,
) -> Result<Summary, Error> {
    let (data, code) = program.into_parts();

    let mut memory = Memory::new(memory_words);
    for (address, value) in data.iter().enumerate() {
        memory.set(address as Word, *value);
    }

    let mut data_path = DataPath::new(memory, input);
    let mut control_unit = ControlUnit::new(code);
    let mut instr_count = 0u64;

    if let Some(sink) = trace.as_mut() {
        writeln!(sink, "{}", control_unit.state_line(&data_path)).map_err(Error::Trace)?;
    }

    let stop = loop {
        if instr_count >= limit {
            warn!("Limit exceeded!");
            break StopReason::LimitExceeded;
        }
        match control_unit.step(&mut data_path) {
            Step::Continue => {
                instr_count += 1;
                if let Some(sink) = trace.as_mut() {
                    writeln!(sink, "{}", control_unit.state_line(&data_path))
                        .map_err(Error::Trace)?;
                }
            }
            Step::Halt => break StopReason::Halted,
            Step::InputEmpty => {
                warn!("Input buffer is empty!");
                break StopReason::InputExhausted;
            }
            Step::Fatal(err) => break StopReason::Fatal(err),
        }
    };

    info!("output_buffer: {:?}", data_path.output());

    Ok(Summary {
        output: data_path.output().to_owned(),
        instr_count,
        ticks: control_unit.ticks(),
        stop,
    })
}

/// Reads a program file and an input file, then simulates with the default
/// memory size and instruction limit, tracing to `debug_path` if set.
pub fn run_code_file(
    code_path: &Path,
    input_path: &Path,
    debug_path: Option<&Path>,
) -> Result<Summary, Error> {
    let program = acode::read_file(code_path)?;
    let input_text = fs::read_to_string(input_path)
        .map_err(|err| Error::Io(input_path.to_owned(), err))?;

    match debug_path {
        Some(path) => {
            let file = File::create(path).map_err(|err| Error::Io(path.to_owned(), err))?;
            let mut sink = BufWriter::new(file);
            let summary = simulate(
                program,
                input_tokens(&input_text),
                DATA_MEMORY_WORDS,
                DEFAULT_INSTR_LIMIT,
                Some(&mut sink),
            )?;
            sink.flush().map_err(Error::Trace)?;
            Ok(summary)
        }
        None => simulate(
            program,
            input_tokens(&input_text),
            DATA_MEMORY_WORDS,
            DEFAULT_INSTR_LIMIT,
            None,
        ),
    }
}

#[cfg(test)]
mod test;
