//! Model of a single-accumulator processor with a stack-discipline calling
//! convention.
//!
//! The crate is split along the hardware boundaries of the modeled machine:
//!
//! - [`memory`] holds the single-port data memory, a fixed-size ring of
//!   32-bit words;
//! - [`datapath`] holds the registers, flags, ALU and I/O buffers, exposed
//!   through latch signals;
//! - [`control`] holds the control unit that decodes instruction records
//!   and drives the datapath with microcoded signal sequences, charging a
//!   fixed tick cost per instruction and addressing form;
//! - [`isa`] defines the instruction records themselves together with the
//!   operand addressing grammar shared with the translator.

use thiserror::Error;

pub mod constants;
pub mod control;
pub mod datapath;
pub mod isa;
pub mod memory;

/// Machine word. All ALU results are cropped to this width.
pub type Word = i32;
/// Inline operand displacement. Values decoded from operand text are
/// cropped to this width.
pub type Immediate = i16;

pub use crate::control::{ControlUnit, Step};
pub use crate::datapath::{AluFunct, AluLeft, AluRight, DataPath, SpSel};
pub use crate::isa::{Addressing, Instr, InvalidOperand, Opcode, Target};
pub use crate::memory::Memory;

/// Conditions that end a simulation before a clean `HALT`.
///
/// `InputExhausted` is recoverable by the driver (the machine simply ran
/// out of input); everything else indicates a broken program or a broken
/// translator.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SimError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("input buffer is empty")]
    InputExhausted,
    #[error("instruction pointer {0} is outside the program")]
    ProgramBounds(i64),
    #[error("{opcode} does not accept operand {operand}")]
    IllegalOperand { opcode: Opcode, operand: Addressing },
    #[error("{opcode} requires an operand")]
    MissingOperand { opcode: Opcode },
    #[error("{opcode} requires a jump target")]
    MissingTarget { opcode: Opcode },
    #[error("unresolved jump target `{0}`")]
    UnresolvedTarget(String),
}
