//! The public emulator API: load an assembled object file and run it,
//! either to completion or one step at a time, with an optional
//! wall-clock timeout and external cancellation.

use crate::engine::{ExitStatus, Machine, RuntimeError};
pub use crate::engine::StepOutcome;
use crate::memory::TEXT_BASE;
use crate::object::{ObjectError, ObjectFile};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum LoadError {
    Object(ObjectError),
    MainOffsetOutOfRange { offset: u32, text_len: u32 },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Object(e) => write!(f, "{e}"),
            LoadError::MainOffsetOutOfRange { offset, text_len } => {
                write!(f, "entry offset {offset} is outside the text segment (length {text_len})")
            }
        }
    }
}

impl std::error::Error for LoadError {}

impl From<ObjectError> for LoadError {
    fn from(e: ObjectError) -> Self {
        LoadError::Object(e)
    }
}

/// A loaded, runnable MIPS program.
pub struct Emulator {
    machine: Machine,
    deadline: Option<Instant>,
    cancel: Arc<AtomicBool>,
}

impl Emulator {
    /// Loads an assembled object file (as produced by `assembler::assemble`)
    /// and positions `$pc` at its entry point and `$sp` at the top of the
    /// stack segment.
    pub fn load(object_bytes: &[u8]) -> Result<Emulator, LoadError> {
        let object = ObjectFile::from_bytes(object_bytes)?;
        let text_len = object.header.text_len();
        if object.header.main_offset >= text_len && text_len > 0 {
            return Err(LoadError::MainOffsetOutOfRange { offset: object.header.main_offset, text_len });
        }
        let mut machine = Machine::new();
        machine.memory.load_text(&object.text);
        machine.memory.load_data(&object.data);
        machine.registers.pc = TEXT_BASE.wrapping_add(object.header.main_offset);
        machine.registers.set(29, crate::engine::initial_stack_pointer());
        let cancel = machine.cancellation_handle();
        Ok(Emulator { machine, deadline: None, cancel })
    }

    /// Sets a wall-clock timeout measured from the first subsequent step.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.deadline = Some(Instant::now() + timeout);
    }

    /// Requests that the program stop at the next step boundary. Safe to
    /// call from a different thread than the one driving `run`/`step`.
    pub fn exit_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn exit(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Marks the program ready for single-stepping. `load` already leaves
    /// `$pc`/`$sp` positioned at the entry point, so this is a no-op kept
    /// for symmetry with `run`/`step` at the API boundary a debugger drives.
    pub fn start(&mut self) {}

    /// Executes one instruction. Returns whether the program is still
    /// running or has reached a terminal status.
    pub fn step(&mut self) -> Result<StepOutcome, RuntimeError> {
        self.machine.step(self.deadline)
    }

    /// Disassembles the `n` instructions starting at the current `$pc`,
    /// without executing them. Used by an interactive debugger to show
    /// upcoming source lines before stepping.
    pub fn fetch_source(&mut self, n: usize) -> Result<String, RuntimeError> {
        let mut words = Vec::with_capacity(n * 4);
        let mut addr = self.pc();
        for _ in 0..n {
            let word = self.machine.memory.read_word(addr)?;
            words.extend_from_slice(&word.to_le_bytes());
            addr = addr.wrapping_add(4);
        }
        crate::disassembler::disassemble_words(&words).map_err(|e| RuntimeError::Decode(e.to_string()))
    }

    /// Runs until the program halts (normal exit, EOF, timeout or
    /// external interruption), returning the terminal status.
    pub fn run(&mut self) -> Result<ExitStatus, RuntimeError> {
        loop {
            match self.machine.step(self.deadline)? {
                StepOutcome::Running => continue,
                StepOutcome::Exited(status) => return Ok(status),
            }
        }
    }

    pub fn pc(&self) -> u32 {
        self.machine.registers.pc
    }

    pub fn register(&self, name: &str) -> Option<u32> {
        match name {
            "pc" | "PC" => Some(self.machine.registers.pc),
            "hi" | "HI" => Some(self.machine.registers.hi),
            "lo" | "LO" => Some(self.machine.registers.lo),
            other => crate::tables::register_index(other).map(|i| self.machine.registers.get(i)),
        }
    }

    pub fn read_memory_word(&mut self, addr: u32) -> Result<u32, RuntimeError> {
        Ok(self.machine.memory.read_word(addr)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;

    #[test]
    fn runs_a_program_to_normal_exit() {
        let bytes = assemble("main:\naddi $t0, $zero, 41\naddi $t0, $t0, 1\nli $v0, 10\nsyscall\n").unwrap();
        let mut emu = Emulator::load(&bytes).unwrap();
        let status = emu.run().unwrap();
        assert_eq!(status, ExitStatus::Normal);
        assert_eq!(emu.register("t0"), Some(42));
    }

    #[test]
    fn single_stepping_reaches_normal_exit() {
        // addi, lui, ori, syscall: four steps to exit.
        let bytes = assemble("main:\naddi $t0, $zero, 1\nli $v0, 10\nsyscall\n").unwrap();
        let mut emu = Emulator::load(&bytes).unwrap();
        let mut steps = 0;
        let status = loop {
            steps += 1;
            match emu.step().unwrap() {
                StepOutcome::Running => continue,
                StepOutcome::Exited(status) => break status,
            }
        };
        assert_eq!(status, ExitStatus::Normal);
        assert_eq!(steps, 4);
    }

    #[test]
    fn rejects_entry_point_outside_text_segment() {
        let object = ObjectFile::new(vec![0; 4], vec![], 8);
        assert!(Emulator::load(&object.to_bytes()).is_err());
    }

    #[test]
    fn fetch_source_disassembles_upcoming_instructions_without_stepping() {
        let bytes = assemble("main:\nadd $t0, $t1, $t2\nli $v0, 10\nsyscall\n").unwrap();
        let mut emu = Emulator::load(&bytes).unwrap();
        let pc_before = emu.pc();
        let text = emu.fetch_source(2).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("add\t$t0, $t1, $t2"));
        assert_eq!(lines.next(), Some("lui\t$v0, 0"));
        assert_eq!(emu.pc(), pc_before);
    }
}
