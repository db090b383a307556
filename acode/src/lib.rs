//! Program file format for the accumulator machine.
//!
//! A program file is a single JSON list. Its first element is the global
//! data prefix (the words preloaded into data memory starting at address
//! 0); every following element is one instruction record with the fields
//! `instruction`, optional `operand` and optional `V`:
//!
//! ```json
//! [[72,0],{"instruction":"LD","operand":"[0]"},{"instruction":"HALT"}]
//! ```
//!
//! A file whose first element is already an instruction record is accepted
//! too; the machine then starts with zeroed memory.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use acpu::{Instr, Word};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    data: Vec<Word>,
    code: Vec<Instr>,
}

impl Program {
    pub fn from(data: Vec<Word>, code: Vec<Instr>) -> Program {
        Program { data, code }
    }

    pub fn data(&self) -> &[Word] {
        &self.data[..]
    }

    pub fn code(&self) -> &[Instr] {
        &self.code[..]
    }

    pub fn into_parts(self) -> (Vec<Word>, Vec<Instr>) {
        (self.data, self.code)
    }
}

impl Serialize for Program {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.code.len() + 1))?;
        seq.serialize_element(&self.data)?;
        for instr in &self.code {
            seq.serialize_element(instr)?;
        }
        seq.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Element {
    Data(Vec<Word>),
    Code(Instr),
}

impl<'de> Deserialize<'de> for Program {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Program, D::Error> {
        struct ProgramVisitor;

        impl<'de> Visitor<'de> for ProgramVisitor {
            type Value = Program;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a list of a data prefix followed by instruction records")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Program, A::Error> {
                let mut data = Vec::new();
                let mut code = Vec::new();
                let mut first = true;
                while let Some(element) = seq.next_element::<Element>()? {
                    match element {
                        Element::Data(words) if first => data = words,
                        Element::Data(_) => {
                            return Err(serde::de::Error::custom(
                                "data prefix after the first element",
                            ));
                        }
                        Element::Code(instr) => code.push(instr),
                    }
                    first = false;
                }
                Ok(Program { data, code })
            }
        }

        deserializer.deserialize_seq(ProgramVisitor)
    }
}

pub fn read<R: Read>(reader: R) -> Result<Program, Error> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn write<W: Write>(writer: W, program: &Program) -> Result<(), Error> {
    Ok(serde_json::to_writer(writer, program)?)
}

pub trait ReadCodeExt: Read + Sized {
    fn read_code(&mut self) -> Result<Program, Error> {
        read(self)
    }
}

impl<R: Read + Sized> ReadCodeExt for R {}

pub trait WriteCodeExt: Write + Sized {
    fn write_code(&mut self, program: &Program) -> Result<(), Error> {
        write(self, program)
    }
}

impl<W: Write + Sized> WriteCodeExt for W {}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Program, Error> {
    BufReader::new(File::open(path)?).read_code()
}

pub fn write_file<P: AsRef<Path>>(path: P, program: &Program) -> Result<(), Error> {
    BufWriter::new(File::create(path)?).write_code(program)
}
