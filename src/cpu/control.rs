//! The Baby control unit.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.
//! The control unit holds line numbers only; the store is re-read by address
//! every cycle, so a program that overwrites its own next line runs the new
//! contents.

use crate::word::Word;
use crate::cpu::{Accumulator, Store};
use crate::cpu::store::STORE_SIZE;
use crate::cpu::decode::{Instruction, Opcode};
use serde::{Serialize, Deserialize};

/// Control unit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlState {
    /// Freshly reset, nothing executed yet.
    Ready,
    /// At least one cycle has run and the stop flag is clear.
    Running,
    /// STP has executed.
    Halted,
}

/// Add a signed offset to a line number, modulo 32.
#[inline]
fn offset_line(line: u8, offset: Word) -> u8 {
    // 2^32 is a multiple of 32, so wrapping in u32 preserves the residue
    ((line as u32).wrapping_add(offset.to_bits()) % STORE_SIZE as u32) as u8
}

#[inline]
fn next_line(line: u8) -> u8 {
    ((line as usize + 1) % STORE_SIZE) as u8
}

/// Control registers: CI, PI and the stop flag.
///
/// Serialize only; state is restored through [`Snapshot`](crate::asm::Snapshot),
/// which checks CI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Control {
    /// Control instruction: the next line to fetch.
    ci: u8,
    /// Present instruction: the last one fetched.
    pi: Instruction,
    stop: bool,
    state: ControlState,
}

impl Control {
    /// Create a control unit in the `Ready` state at line 0.
    pub fn new() -> Self {
        Self {
            ci: 0,
            pi: Instruction::new(Opcode::Jmp, 0),
            stop: false,
            state: ControlState::Ready,
        }
    }

    /// Back to `Ready` at line 0 with the stop flag clear.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// The next line to be fetched.
    #[inline]
    pub fn control_instruction(&self) -> u8 {
        self.ci
    }

    /// Point CI at a line. The line wraps modulo 32.
    pub fn set_control_instruction(&mut self, line: u8) {
        self.ci = line % STORE_SIZE as u8;
    }

    /// The most recently fetched instruction.
    #[inline]
    pub fn present_instruction(&self) -> Instruction {
        self.pi
    }

    /// True once STP has executed.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stop
    }

    /// Set or clear the stop flag (snapshot restore).
    pub fn set_stopped(&mut self, stop: bool) {
        self.stop = stop;
        self.state = if stop { ControlState::Halted } else { ControlState::Ready };
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    /// Run one cycle against `store` and `accumulator`.
    ///
    /// Returns the line that was fetched and the instruction executed, or
    /// `None` without touching anything if the machine is halted.
    pub fn cycle(&mut self, store: &mut Store, accumulator: &mut Accumulator) -> Option<(u8, Instruction)> {
        if self.stop {
            return None;
        }

        // Fetch
        let line = self.ci;
        let instr = Instruction::from_word(store.read(line as usize));
        self.pi = instr;
        self.state = ControlState::Running;

        // Advance CI before executing; jumps override it
        self.ci = next_line(self.ci);

        let operand = instr.operand as usize;
        match instr.opcode {
            Opcode::Jmp => {
                self.ci = instr.operand;
            }

            Opcode::Jrp => {
                self.ci = offset_line(self.ci, store.read(operand));
            }

            Opcode::Ldn => {
                accumulator.load_negated(store.read(operand));
            }

            Opcode::Sto => {
                store.write(operand, accumulator.value());
            }

            Opcode::Sub | Opcode::SubAlt => {
                accumulator.subtract(store.read(operand));
            }

            Opcode::Cmp => {
                if accumulator.test() {
                    self.ci = next_line(self.ci);
                }
            }

            Opcode::Stp => {
                self.stop = true;
                self.state = ControlState::Halted;
            }
        }

        log::trace!(
            "line {:02}: {:<8} A={} CI={:02}",
            line,
            instr.to_string(),
            accumulator.value().to_i32(),
            self.ci
        );

        Some((line, instr))
    }
}

impl Default for Control {
    fn default() -> Self {
        Self::new()
    }
}
