//! A Baby simulation session.
//!
//! Owns the store, accumulator and control unit, and is the surface that
//! loaders, exporters and the run controller talk to. Loads are
//! all-or-nothing: a failed load returns its error before any state changes.

use crate::word::Word;
use crate::cpu::{Accumulator, Control, ControlState, Instruction, Store};
use crate::asm::assembler::{assemble_program, AsmOptions, AssemblerError, SymbolTable};
use crate::asm::disasm;
use crate::asm::snapshot::{Snapshot, SnapshotError};
use serde::{Serialize, Deserialize};

/// Everything an observer learns about one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleEvent {
    /// Line the instruction was fetched from.
    pub line: u8,
    /// The instruction executed.
    pub instruction: Instruction,
    /// Cycles executed since the last reset, this one included.
    pub cycles: u64,
    /// Post-cycle machine state.
    pub snapshot: Snapshot,
}

impl CycleEvent {
    /// True if this cycle stopped the machine.
    pub fn halted(&self) -> bool {
        self.snapshot.stop
    }
}

/// The Manchester Baby.
#[derive(Clone, Serialize)]
pub struct Baby {
    /// Main store.
    pub store: Store,
    /// Accumulator register.
    pub accumulator: Accumulator,
    /// Control unit.
    pub control: Control,
    /// Cycles executed since the last reset.
    pub cycles: u64,
}

impl Baby {
    /// Create a machine with a zeroed store.
    pub fn new() -> Self {
        Self {
            store: Store::new(),
            accumulator: Accumulator::new(),
            control: Control::new(),
            cycles: 0,
        }
    }

    /// Reset the accumulator and control unit. The store keeps its program.
    pub fn reset(&mut self) {
        self.accumulator.reset();
        self.control.reset();
        self.cycles = 0;
    }

    /// Reset and zero the store as well.
    pub fn clear(&mut self) {
        self.reset();
        self.store.reset();
    }

    /// Assemble `source` with default options and load it.
    pub fn load_program(&mut self, source: &str) -> Result<(), AssemblerError> {
        self.load_program_with(source, &AsmOptions::default()).map(|_| ())
    }

    /// Assemble `source` and load it, returning the program's labels.
    ///
    /// On success the store holds the program (zero-padded) and the machine
    /// is reset to line 0.
    pub fn load_program_with(&mut self, source: &str, options: &AsmOptions) -> Result<SymbolTable, AssemblerError> {
        let program = assemble_program(source, options)?;

        // The assembler never yields more than a store's worth of words
        self.store
            .load_bulk(&program.words)
            .map_err(|_| AssemblerError::ProgramTooLarge { count: program.words.len() })?;
        self.reset();

        log::info!(
            "Loaded program: {} words, {} labels",
            program.words.len(),
            program.symbols.len()
        );
        Ok(program.symbols)
    }

    /// Load raw words into the store and reset.
    pub fn load_words(&mut self, words: &[Word]) -> Result<(), AssemblerError> {
        self.store
            .load_bulk(words)
            .map_err(|_| AssemblerError::ProgramTooLarge { count: words.len() })?;
        self.reset();
        Ok(())
    }

    /// Load store contents, accumulator and CI. The stop flag is cleared.
    pub fn load_snapshot(
        &mut self,
        words: &[Word],
        accumulator: Word,
        control_instruction: u32,
    ) -> Result<(), SnapshotError> {
        let snapshot = Snapshot::from_parts(words, accumulator, control_instruction, false)?;
        self.restore(&snapshot);
        Ok(())
    }

    /// Restore a complete snapshot, stop flag included.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.reset();
        for (addr, word) in snapshot.store.iter().enumerate() {
            self.store.write(addr, *word);
        }
        self.accumulator.set(snapshot.accumulator);
        self.control.set_control_instruction(snapshot.control_instruction);
        self.control.set_stopped(snapshot.stop);
    }

    /// Current state as a snapshot.
    pub fn export_snapshot(&self) -> Snapshot {
        Snapshot {
            store: self.store.snapshot(),
            accumulator: self.accumulator.value(),
            control_instruction: self.control.control_instruction(),
            stop: self.control.is_stopped(),
        }
    }

    /// Disassemble the store to reassemblable source text.
    pub fn export_assembly(&self, symbols: Option<&SymbolTable>) -> String {
        disasm::disassemble(self.store.lines(), symbols).to_source()
    }

    /// Execute a single instruction.
    ///
    /// Returns `None` and changes nothing if the machine is halted.
    pub fn step(&mut self) -> Option<CycleEvent> {
        let (line, instruction) = self.control.cycle(&mut self.store, &mut self.accumulator)?;
        self.cycles += 1;

        Some(CycleEvent {
            line,
            instruction,
            cycles: self.cycles,
            snapshot: self.export_snapshot(),
        })
    }

    /// Run for at most `max_cycles` instructions or until halted.
    ///
    /// Returns the number of instructions executed.
    pub fn run_limited(&mut self, max_cycles: u64) -> u64 {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while !self.is_halted() && self.cycles < limit {
            self.control.cycle(&mut self.store, &mut self.accumulator);
            self.cycles += 1;
        }

        self.cycles - start_cycles
    }

    /// Check if the machine is halted.
    pub fn is_halted(&self) -> bool {
        self.control.state() == ControlState::Halted
    }
}

impl Default for Baby {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Baby {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Baby")
            .field("state", &self.control.state())
            .field("cycles", &self.cycles)
            .field("ci", &self.control.control_instruction())
            .field("accumulator", &self.accumulator.value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assembler::assemble;

    #[test]
    fn test_end_to_end() {
        let mut baby = Baby::new();
        baby.load_program("0: LDN 3\n1: STO 4\n2: STP\n3: 7\n4: 0").unwrap();

        let executed = baby.run_limited(100);

        assert_eq!(executed, 3);
        assert!(baby.is_halted());
        assert_eq!(baby.store.read(4).to_i32(), -7);
        assert_eq!(baby.control.control_instruction(), 3);
    }

    #[test]
    fn test_step_events() {
        let mut baby = Baby::new();
        baby.load_program("LDN 3\nSTO 4\nSTP\nNUM 7").unwrap();

        let first = baby.step().unwrap();
        assert_eq!(first.line, 0);
        assert_eq!(first.cycles, 1);
        assert_eq!(first.snapshot.accumulator.to_i32(), -7);
        assert!(!first.halted());

        baby.step().unwrap();
        let last = baby.step().unwrap();
        assert!(last.halted());
        assert_eq!(last.snapshot.control_instruction, 3);

        // Halted: no further state change
        let before = baby.export_snapshot();
        assert!(baby.step().is_none());
        assert_eq!(baby.run_limited(10), 0);
        assert_eq!(baby.export_snapshot(), before);
    }

    #[test]
    fn test_self_modification() {
        // Line 2 starts as JMP 0; lines 0-1 overwrite it with STP before
        // it is reached.
        let stp = Instruction::new(crate::cpu::Opcode::Stp, 0).to_word().to_i32();
        let source = format!("LDN 4\nSTO 2\nJMP 0\nNUM 0\nNUM {}", -stp);

        let mut modified = Baby::new();
        modified.load_program(&source).unwrap();
        modified.run_limited(10);

        let mut direct = Baby::new();
        direct.load_program(&format!("LDN 4\nSTO 2\nSTP\nNUM 0\nNUM {}", -stp)).unwrap();
        direct.run_limited(10);

        assert!(modified.is_halted());
        assert_eq!(modified.cycles, 3);
        assert_eq!(modified.export_snapshot(), direct.export_snapshot());
    }

    #[test]
    fn test_failed_load_leaves_state() {
        let mut baby = Baby::new();
        baby.load_program("LDN 3\nSTP\nNUM 1\nNUM 9").unwrap();
        baby.step();
        let before = baby.export_snapshot();

        assert!(baby.load_program("LDN nowhere").is_err());
        assert!(baby.load_snapshot(&[Word::ZERO; 3], Word::ZERO, 0).is_err());
        assert!(baby.load_snapshot(&[Word::ZERO; 32], Word::ZERO, 40).is_err());

        assert_eq!(baby.export_snapshot(), before);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut baby = Baby::new();
        baby.load_program("0: LDN 3\n1: STO 4\n2: STP\n3: 7\n4: 0").unwrap();
        baby.run_limited(100);
        let saved = baby.export_snapshot();

        let mut other = Baby::new();
        other.restore(&saved);
        assert_eq!(other.export_snapshot(), saved);
        assert!(other.is_halted());

        other.load_snapshot(&saved.store, Word::from_i32(5), 1).unwrap();
        assert!(!other.is_halted());
        assert_eq!(other.accumulator.value().to_i32(), 5);
        assert_eq!(other.control.control_instruction(), 1);
    }

    #[test]
    fn test_export_assembly_reassembles() {
        let source = "NUM 0\nstart: LDN a\nSUB a\nCMP\nJMP start\nSTP\na: NUM -3";
        let mut baby = Baby::new();
        let symbols = baby.load_program_with(source, &AsmOptions::default()).unwrap();

        let exported = baby.export_assembly(Some(&symbols));
        let words = assemble(&exported).unwrap();

        assert_eq!(&words[..], &baby.store.lines()[..words.len()]);
        assert!(exported.contains("JMP start"));
    }

    #[test]
    fn test_reset_keeps_program() {
        let mut baby = Baby::new();
        baby.load_program("LDN 2\nSTP\nNUM 4").unwrap();
        baby.run_limited(10);

        baby.reset();
        assert_eq!(baby.control.state(), ControlState::Ready);
        assert_eq!(baby.accumulator.value(), Word::ZERO);
        assert_eq!(baby.store.read(2).to_i32(), 4);

        baby.clear();
        assert!(baby.store.read(0).is_zero());
    }

    #[test]
    fn test_countdown_demo() {
        let mut baby = Baby::new();
        baby.load_program(include_str!("../../demos/countdown.asm")).unwrap();
        baby.run_limited(1000);

        assert!(baby.is_halted());
        assert_eq!(baby.accumulator.value().to_i32(), -1);
        assert_eq!(baby.store.read(8).to_i32(), -1);
    }
}
