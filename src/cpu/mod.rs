//! CPU emulation for the Manchester Baby.
//!
//! This module implements the complete Baby (1948) architecture:
//! - 32 thirty-two-bit store lines
//! - The accumulator (A), control instruction (CI) and present instruction (PI)
//! - The 7-instruction set with single-address, line-numbered operands

pub mod store;
pub mod accumulator;
pub mod decode;
pub mod control;
pub mod machine;

pub use store::{Store, StoreError, STORE_SIZE};
pub use accumulator::Accumulator;
pub use decode::{Instruction, Opcode, decode, encode};
pub use control::{Control, ControlState};
pub use machine::{Baby, CycleEvent};
