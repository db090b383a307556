//! Instruction decoder and executor.
//!
//! One call to [`ControlUnit::step`] performs a full decode-execute cycle:
//! fetch the record at `IP`, advance `IP`, charge one tick for the fetch,
//! then drive the datapath with the signal sequence of the opcode and
//! addressing form. The tick cost of every sequence is a contract the
//! golden traces depend on:
//!
//! | instr          | `V` | `[V]` | `SP+V`    | `[SP+V]` |
//! |----------------|-----|-------|-----------|----------|
//! | `LD`           | 1   | 3     | 4         | 6        |
//! | `ST`           | 2   | 4     | 3         | 5        |
//! | arith / `CMP`  | 1   | 3     | (illegal) | 4        |
//! | jumps          | 1   |       |           |          |
//! | `CALL`/`RET`   | 4   |       |           |          |
//! | `PUSH`/`POP`   | 4   |       |           |          |
//! | `IN`           | 1   |       |           |          |
//! | `OUT`          | 0   |       |           |          |
//!
//! (All on top of the one-tick fetch.)

use std::convert::TryFrom;

use crate::datapath::{AluFunct, AluLeft, AluRight, DataPath, SpSel};
use crate::isa::{Addressing, Instr, Opcode, Target};
use crate::{SimError, Word};

/// Outcome of one decode-execute cycle, consumed by the driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Continue,
    Halt,
    InputEmpty,
    Fatal(SimError),
}

pub struct ControlUnit {
    program: Vec<Instr>,
    ip: i64,
    ticks: u64,
}

impl ControlUnit {
    pub fn new(program: Vec<Instr>) -> ControlUnit {
        ControlUnit {
            program,
            ip: 0,
            ticks: 0,
        }
    }

    pub fn ip(&self) -> i64 {
        self.ip
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn tick(&mut self, count: u64) {
        self.ticks += count;
    }

    /// One line of the execution trace: tick counter, observable registers
    /// and the instruction the machine is about to execute.
    pub fn state_line(&self, data_path: &DataPath) -> String {
        let next = usize::try_from(self.ip)
            .ok()
            .and_then(|index| self.program.get(index));
        format!(
            "TICK: {:4} ACC: {:6} SP: {:6} IP: {:6} INSTR: {}",
            self.ticks,
            data_path.ac(),
            data_path.sp(),
            self.ip,
            match next {
                Some(instr) => instr.to_string(),
                None => "-".to_owned(),
            },
        )
    }

    pub fn step(&mut self, data_path: &mut DataPath) -> Step {
        match self.decode_and_execute(data_path) {
            Ok(false) => Step::Continue,
            Ok(true) => Step::Halt,
            Err(SimError::InputExhausted) => Step::InputEmpty,
            Err(err) => Step::Fatal(err),
        }
    }

    fn decode_and_execute(&mut self, data_path: &mut DataPath) -> Result<bool, SimError> {
        let index = usize::try_from(self.ip)
            .ok()
            .filter(|&i| i < self.program.len())
            .ok_or(SimError::ProgramBounds(self.ip))?;
        let instr = self.program[index].clone();
        self.ip += 1;
        self.tick(1);
        self.execute(data_path, &instr)
    }

    fn operand(&self, instr: &Instr) -> Result<Addressing, SimError> {
        instr.operand.ok_or(SimError::MissingOperand {
            opcode: instr.opcode,
        })
    }

    fn jump_target(&self, instr: &Instr) -> Result<Word, SimError> {
        match &instr.target {
            Some(Target::Index(index)) => Ok(*index as Word),
            Some(Target::Label(label)) => Err(SimError::UnresolvedTarget(label.clone())),
            None => Err(SimError::MissingTarget {
                opcode: instr.opcode,
            }),
        }
    }

    /// Stages a jump destination through the ALU `PR` input and latches it
    /// into `IP`.
    fn latch_ip(&mut self, data_path: &mut DataPath, value: Word) -> Result<(), SimError> {
        self.ip = i64::from(data_path.alu(
            AluLeft::Zero,
            AluRight::Pr(value),
            AluFunct::Add,
            false,
        )?);
        Ok(())
    }

    fn execute(&mut self, dp: &mut DataPath, instr: &Instr) -> Result<bool, SimError> {
        use AluFunct::Add;
        use AluLeft::{Ac, Ar, Zero};
        use AluRight::{Dr, Pr, Sp};

        match instr.opcode {
            Opcode::NOP => {}

            Opcode::HALT => return Ok(true),

            Opcode::LD => match self.operand(instr)? {
                Addressing::Immediate(v) => {
                    dp.latch_ac(Zero, Pr(v.into()), Add, false)?;
                    self.tick(1);
                }
                Addressing::Direct(v) => {
                    dp.latch_ar(Zero, Pr(v.into()), Add, false)?;
                    self.tick(3);
                    dp.oe();
                    dp.latch_ac(Zero, Dr, Add, false)?;
                }
                Addressing::StackOffset(v) => {
                    dp.latch_ar(Zero, Pr(v.into()), Add, false)?;
                    self.tick(4);
                    dp.latch_ar(Ar, Sp, Add, false)?;
                    dp.oe();
                    dp.latch_ac(Zero, Dr, Add, false)?;
                }
                Addressing::StackIndirect(v) => {
                    dp.latch_ar(Zero, Pr(v.into()), Add, false)?;
                    self.tick(6);
                    dp.latch_ar(Ar, Sp, Add, false)?;
                    dp.oe();
                    dp.latch_ar(Zero, Dr, Add, false)?;
                    dp.oe();
                    dp.latch_ac(Zero, Dr, Add, false)?;
                }
            },

            Opcode::ST => match self.operand(instr)? {
                Addressing::Immediate(v) => {
                    dp.latch_ar(Zero, Pr(v.into()), Add, false)?;
                    self.tick(2);
                    dp.wr(Ac, AluRight::Zero, Add, false)?;
                }
                Addressing::Direct(v) => {
                    dp.latch_ar(Zero, Pr(v.into()), Add, false)?;
                    self.tick(4);
                    dp.oe();
                    dp.latch_ar(Zero, Dr, Add, false)?;
                    dp.wr(Ac, AluRight::Zero, Add, false)?;
                }
                Addressing::StackOffset(v) => {
                    dp.latch_ar(Zero, Pr(v.into()), Add, false)?;
                    self.tick(3);
                    dp.latch_ar(Ar, Sp, Add, false)?;
                    dp.wr(Ac, AluRight::Zero, Add, false)?;
                }
                Addressing::StackIndirect(v) => {
                    dp.latch_ar(Zero, Pr(v.into()), Add, false)?;
                    self.tick(5);
                    dp.latch_ar(Ar, Sp, Add, false)?;
                    dp.oe();
                    dp.latch_ar(Zero, Dr, Add, false)?;
                    dp.wr(Ac, AluRight::Zero, Add, false)?;
                }
            },

            Opcode::ADD | Opcode::SUB | Opcode::MUL | Opcode::DIV | Opcode::MOD | Opcode::CMP => {
                let funct = alu_funct(instr.opcode);
                match self.operand(instr)? {
                    Addressing::Immediate(v) => {
                        dp.latch_ac(Ac, Pr(v.into()), funct, true)?;
                        self.tick(1);
                    }
                    Addressing::Direct(v) => {
                        dp.latch_ar(Zero, Pr(v.into()), Add, false)?;
                        self.tick(3);
                        dp.oe();
                        dp.latch_ac(Ac, Dr, funct, true)?;
                    }
                    operand @ Addressing::StackOffset(_) => {
                        return Err(SimError::IllegalOperand {
                            opcode: instr.opcode,
                            operand,
                        });
                    }
                    Addressing::StackIndirect(v) => {
                        dp.latch_ar(Zero, Pr(v.into()), Add, false)?;
                        self.tick(4);
                        dp.latch_ar(Ar, Sp, Add, false)?;
                        dp.oe();
                        dp.latch_ac(Ac, Dr, funct, true)?;
                    }
                }
            }

            Opcode::JMP => {
                let target = self.jump_target(instr)?;
                self.latch_ip(dp, target)?;
                self.tick(1);
            }

            Opcode::JE => {
                self.tick(1);
                if dp.zero() {
                    let target = self.jump_target(instr)?;
                    self.latch_ip(dp, target)?;
                }
            }

            Opcode::JNE => {
                self.tick(1);
                if !dp.zero() {
                    let target = self.jump_target(instr)?;
                    self.latch_ip(dp, target)?;
                }
            }

            Opcode::JGE => {
                self.tick(1);
                if !dp.sign() {
                    let target = self.jump_target(instr)?;
                    self.latch_ip(dp, target)?;
                }
            }

            Opcode::CALL => {
                let return_address = self.ip as Word;
                dp.latch_sp(SpSel::Dec);
                self.tick(4);
                dp.latch_ar(Zero, Sp, Add, false)?;
                dp.wr(Zero, Pr(return_address), Add, false)?;
                let target = self.jump_target(instr)?;
                self.latch_ip(dp, target)?;
            }

            Opcode::RET => {
                dp.latch_ar(Zero, Sp, Add, false)?;
                self.tick(4);
                dp.oe();
                self.ip = i64::from(dp.alu(Zero, Dr, Add, false)?);
                dp.latch_sp(SpSel::Inc);
            }

            Opcode::PUSH => {
                dp.latch_sp(SpSel::Dec);
                self.tick(4);
                dp.latch_ar(Zero, Sp, Add, false)?;
                dp.wr(Ac, AluRight::Zero, Add, false)?;
            }

            Opcode::POP => {
                dp.latch_ar(Zero, Sp, Add, false)?;
                self.tick(4);
                dp.oe();
                dp.latch_ac(Zero, Dr, Add, false)?;
                dp.latch_sp(SpSel::Inc);
            }

            Opcode::IN => {
                dp.latch_ac_input()?;
                self.tick(1);
            }

            Opcode::OUT => {
                dp.out();
            }
        }

        Ok(false)
    }
}

fn alu_funct(opcode: Opcode) -> AluFunct {
    match opcode {
        Opcode::ADD => AluFunct::Add,
        Opcode::SUB => AluFunct::Sub,
        Opcode::MUL => AluFunct::Mul,
        Opcode::DIV => AluFunct::Div,
        Opcode::MOD => AluFunct::Mod,
        Opcode::CMP => AluFunct::Cmp,
        _ => unreachable!("not an ALU opcode: {}", opcode),
    }
}
