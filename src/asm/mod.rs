//! Assembler, disassembler and snapshot files for Baby programs.
//!
//! This module provides:
//! - A two-pass assembler (mnemonic text → store words)
//! - A disassembler (store words → reassemblable text)
//! - The snapshot text format for saving and restoring machine state

pub mod assembler;
pub mod disasm;
pub mod snapshot;

pub use assembler::{assemble, assemble_program, AsmOptions, AssemblerError, Program, SymbolTable};
pub use disasm::{disassemble, disassemble_word, Disassembly};
pub use snapshot::{Snapshot, SnapshotError, load_snapshot_file, save_snapshot_file};
