//! # Baby Emulator
//!
//! An emulator of the Manchester Baby (Small-Scale Experimental Machine, 1948).
//!
//! The Baby was the first electronic stored-program computer to run a
//! program. It had 32 words of store, one accumulator and seven
//! instructions, and it wrote its words least significant bit first. This
//! crate provides the execution engine, an assembler and disassembler, a
//! snapshot file format, and a paced run controller.

pub mod word;
pub mod cpu;
pub mod asm;
pub mod runner;
pub mod config;

// Re-export commonly used types
pub use word::{Word, reverse_bits32};
pub use cpu::{Baby, CycleEvent, Control, ControlState, Accumulator, Store, Instruction, Opcode};
pub use asm::{assemble, disassemble, AsmOptions, AssemblerError, SymbolTable, Snapshot, SnapshotError};
pub use runner::{RunController, RunEvent};
pub use config::Config;
