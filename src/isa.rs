//! Instruction records and the operand addressing grammar.
//!
//! A program is a flat list of [`Instr`] records. Every record names an
//! [`Opcode`]; most also carry either an [`Addressing`] operand (memory and
//! ALU instructions) or a [`Target`] (jumps and calls). Targets start out
//! symbolic when the translator emits them and are replaced by absolute
//! instruction indices at link time.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::{Immediate, Word};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Opcode {
    //  Mnemonic | Effect
    //-----------+----------------------------------------------------------
    // Misc      |
    NOP,  // | Does nothing
    HALT, // | Stops the machine
    //-----------+----------------------------------------------------------
    // Memory    |
    LD, // | AC = operand
    ST, // | memory cell named by the operand = AC
    //-----------+----------------------------------------------------------
    // Arithmetic (result goes to the accumulator, flags are updated)
    ADD, // | AC = AC + operand
    SUB, // | AC = AC - operand
    MUL, // | AC = AC * operand
    DIV, // | AC = AC / operand (floored)
    MOD, // | AC = AC mod operand (sign of the divisor)
    CMP, // | flags from AC - operand, AC untouched
    //-----------+----------------------------------------------------------
    // Jumps     |
    JMP, // | IP = V
    JE,  // | IP = V if Z
    JNE, // | IP = V if not Z
    JGE, // | IP = V if not S
    //-----------+----------------------------------------------------------
    // Subroutines and the stack
    CALL, // | push IP, IP = V
    RET,  // | IP = pop
    PUSH, // | SP -= 1, MEM[SP] = AC
    POP,  // | AC = MEM[SP], SP += 1
    //-----------+----------------------------------------------------------
    // I/O       |
    IN,  // | AC = next input token
    OUT, // | append the low byte of AC to the output buffer
}

macro_rules! impl_enum_display {
    ($e:ty) => {
        impl std::fmt::Display for $e {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Debug::fmt(self, f)
            }
        }
    };
}

impl_enum_display!(Opcode);

/// Operand text that does not match any addressing form.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("invalid operand `{0}`")]
pub struct InvalidOperand(pub String);

/// Addressing form of an instruction operand, the `F` field of the decoded
/// `(F, V)` pair. The displacement `V` is cropped to 16 bits at parse time.
///
/// | text    | form            |
/// |---------|-----------------|
/// | `5`     | `Immediate(5)`  |
/// | `[5]`   | `Direct(5)`     |
/// | `SP+5`  | `StackOffset(5)`|
/// | `[SP+5]`| `StackIndirect(5)` |
///
/// How a form is interpreted is up to the instruction executing it; the
/// signal sequences live in [`crate::control`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Addressing {
    Immediate(Immediate),
    Direct(Immediate),
    StackOffset(Immediate),
    StackIndirect(Immediate),
}

/// Decimal digits folded with wrapping arithmetic, so that over-long
/// literals still crop to the same low bits the 16-bit decode keeps.
fn digits_value(digits: &str) -> Option<i64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(digits.bytes().fold(0i64, |acc, b| {
        acc.wrapping_mul(10).wrapping_add(i64::from(b - b'0'))
    }))
}

/// `-?[0-9]+`: an optional minus, no explicit plus.
fn plain_value(text: &str) -> Option<i64> {
    match text.strip_prefix('-') {
        Some(rest) => digits_value(rest).map(i64::wrapping_neg),
        None => digits_value(text),
    }
}

/// `[-+][0-9]+`: the sign is mandatory after `SP`.
fn signed_value(text: &str) -> Option<i64> {
    let mut bytes = text.bytes();
    match bytes.next() {
        Some(b'+') => digits_value(&text[1..]),
        Some(b'-') => digits_value(&text[1..]).map(i64::wrapping_neg),
        _ => None,
    }
}

impl FromStr for Addressing {
    type Err = InvalidOperand;

    fn from_str(s: &str) -> Result<Addressing, InvalidOperand> {
        let (indirect, inner) = if s.len() >= 2 && s.starts_with('[') && s.ends_with(']') {
            (true, &s[1..s.len() - 1])
        } else {
            (false, s)
        };

        let (stack, value) = match inner.strip_prefix("SP") {
            Some(rest) => (true, signed_value(rest)),
            None => (false, plain_value(inner)),
        };

        let value = crop16(value.ok_or_else(|| InvalidOperand(s.to_owned()))?);

        Ok(match (stack, indirect) {
            (false, false) => Addressing::Immediate(value),
            (false, true) => Addressing::Direct(value),
            (true, false) => Addressing::StackOffset(value),
            (true, true) => Addressing::StackIndirect(value),
        })
    }
}

impl fmt::Display for Addressing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Addressing::Immediate(v) => write!(f, "{}", v),
            Addressing::Direct(v) => write!(f, "[{}]", v),
            Addressing::StackOffset(v) => write!(f, "SP{:+}", v),
            Addressing::StackIndirect(v) => write!(f, "[SP{:+}]", v),
        }
    }
}

// Operands travel through the program file as the textual grammar above.
impl Serialize for Addressing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Addressing {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Addressing, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

/// Jump or call destination: symbolic before linking, an absolute
/// instruction index afterwards.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Index(usize),
    Label(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Target::Index(index) => write!(f, "{}", index),
            Target::Label(label) => f.write_str(label),
        }
    }
}

/// One instruction record, in the shape the program file stores it.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Instr {
    #[serde(rename = "instruction")]
    pub opcode: Opcode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operand: Option<Addressing>,
    #[serde(rename = "V", default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    /// Symbolic label attached at emit time; the linker records and strips
    /// it, so linked programs never carry one.
    #[serde(rename = "lable", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Instr {
    pub fn plain(opcode: Opcode) -> Instr {
        Instr {
            opcode,
            operand: None,
            target: None,
            label: None,
        }
    }

    pub fn with_operand(opcode: Opcode, operand: Addressing) -> Instr {
        Instr {
            operand: Some(operand),
            ..Instr::plain(opcode)
        }
    }

    pub fn with_target(opcode: Opcode, target: Target) -> Instr {
        Instr {
            target: Some(target),
            ..Instr::plain(opcode)
        }
    }

    pub fn jump_to<S: Into<String>>(opcode: Opcode, label: S) -> Instr {
        Instr::with_target(opcode, Target::Label(label.into()))
    }

    pub fn labeled<S: Into<String>>(mut self, label: S) -> Instr {
        self.label = Some(label.into());
        self
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        if let Some(operand) = &self.operand {
            write!(f, " {}", operand)?;
        }
        if let Some(target) = &self.target {
            write!(f, " {}", target)?;
        }
        Ok(())
    }
}

/// Keeps `V` in the 16-bit range the operand grammar can carry.
pub fn crop16(value: i64) -> Immediate {
    value as Immediate
}

/// Keeps an ALU result in the machine word range.
pub fn crop32(value: i64) -> Word {
    value as Word
}
