//! The execution engine: register file + virtual memory plus the
//! semantic function for every real instruction, wired through a single
//! fetch-decode-execute step.
//!
//! Branches, jumps and the exit syscall assign `pc` themselves and
//! suppress the automatic `pc += 4`; every other instruction just falls
//! through to it.

use crate::decoder::{self, Decoded};
use crate::memory::{MemoryError, VirtualMemory, STACK_TOP};
use crate::registers::RegisterFile;
use crate::tables;
use std::fmt;
use std::io::{self, BufRead, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Normal,
    Interrupted,
    Eof,
    Timeout,
}

#[derive(Debug, Clone)]
pub enum RuntimeError {
    Memory(MemoryError),
    Decode(String),
    /// A panic caught at the step boundary: division by zero, or any
    /// other arithmetic trap raised while executing an instruction.
    Trap(String),
    Io(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Memory(e) => write!(f, "{e}"),
            RuntimeError::Decode(e) => write!(f, "{e}"),
            RuntimeError::Trap(e) => write!(f, "trap: {e}"),
            RuntimeError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<MemoryError> for RuntimeError {
    fn from(e: MemoryError) -> Self {
        RuntimeError::Memory(e)
    }
}

/// One step's outcome: either the machine is still running, or it has
/// reached a terminal state.
pub enum StepOutcome {
    Running,
    Exited(ExitStatus),
}

/// A MIPS machine: registers, memory and the cooperative-cancellation
/// flag used by `Emulator::exit()` across threads.
pub struct Machine {
    pub registers: RegisterFile,
    pub memory: VirtualMemory,
    exit_requested: Arc<AtomicBool>,
    halted: bool,
}

impl Machine {
    pub fn new() -> Self {
        Machine { registers: RegisterFile::new(), memory: VirtualMemory::new(), exit_requested: Arc::new(AtomicBool::new(false)), halted: false }
    }

    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.exit_requested)
    }

    /// Executes exactly one instruction at `pc`, honoring an optional
    /// deadline and external cancellation request.
    pub fn step(&mut self, deadline: Option<Instant>) -> Result<StepOutcome, RuntimeError> {
        if self.halted {
            return Ok(StepOutcome::Exited(ExitStatus::Normal));
        }
        if self.exit_requested.swap(false, Ordering::SeqCst) {
            self.halted = true;
            return Ok(StepOutcome::Exited(ExitStatus::Interrupted));
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                self.halted = true;
                return Ok(StepOutcome::Exited(ExitStatus::Timeout));
            }
        }

        let pc = self.registers.pc;
        let word = match self.memory.read_word(pc) {
            Ok(w) => w,
            Err(_) => {
                self.halted = true;
                return Ok(StepOutcome::Exited(ExitStatus::Eof));
            }
        };
        let decoded = decoder::decode(word).map_err(|e| RuntimeError::Decode(e.to_string()))?;

        let result = panic::catch_unwind(AssertUnwindSafe(|| execute(self, &decoded)));
        match result {
            Ok(Ok(advance_pc)) => {
                if advance_pc {
                    self.registers.pc = self.registers.pc.wrapping_add(4);
                }
                if self.halted {
                    Ok(StepOutcome::Exited(ExitStatus::Normal))
                } else {
                    Ok(StepOutcome::Running)
                }
            }
            Ok(Err(e)) => Err(e),
            Err(payload) => {
                let message = panic_message(&payload);
                Err(RuntimeError::Trap(message))
            }
        }
    }
}

impl Default for Machine {
    fn default() -> Self {
        Machine::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown trap".to_string()
    }
}

/// Executes one decoded instruction. Returns whether `pc` should advance
/// by 4 automatically (`false` for branches, jumps and the exit syscall,
/// which set `pc` themselves).
fn execute(m: &mut Machine, d: &Decoded) -> Result<bool, RuntimeError> {
    match d.name {
        "add" | "addu" => {
            let v = m.registers.get(d.rs).wrapping_add(m.registers.get(d.rt));
            m.registers.set(d.rd, v);
        }
        "sub" | "subu" => {
            let v = m.registers.get(d.rs).wrapping_sub(m.registers.get(d.rt));
            m.registers.set(d.rd, v);
        }
        "addi" | "addiu" => {
            let v = (m.registers.get(d.rs) as i32).wrapping_add(d.immediate) as u32;
            m.registers.set(d.rt, v);
        }
        "and" => {
            let v = m.registers.get(d.rs) & m.registers.get(d.rt);
            m.registers.set(d.rd, v);
        }
        "andi" => {
            let v = m.registers.get(d.rs) & d.immediate_unsigned as u32;
            m.registers.set(d.rt, v);
        }
        "or" => {
            let v = m.registers.get(d.rs) | m.registers.get(d.rt);
            m.registers.set(d.rd, v);
        }
        "ori" => {
            let v = m.registers.get(d.rs) | d.immediate_unsigned as u32;
            m.registers.set(d.rt, v);
        }
        "xor" => {
            let v = m.registers.get(d.rs) ^ m.registers.get(d.rt);
            m.registers.set(d.rd, v);
        }
        "nor" => {
            let v = !(m.registers.get(d.rs) | m.registers.get(d.rt));
            m.registers.set(d.rd, v);
        }
        "slt" => {
            let v = ((m.registers.get(d.rs) as i32) < (m.registers.get(d.rt) as i32)) as u32;
            m.registers.set(d.rd, v);
        }
        "sltu" => {
            let v = (m.registers.get(d.rs) < m.registers.get(d.rt)) as u32;
            m.registers.set(d.rd, v);
        }
        "slti" => {
            let v = ((m.registers.get(d.rs) as i32) < d.immediate) as u32;
            m.registers.set(d.rt, v);
        }
        "sll" => {
            let v = m.registers.get(d.rt) << d.shamt;
            m.registers.set(d.rd, v);
        }
        "srl" => {
            let v = m.registers.get(d.rt) >> d.shamt;
            m.registers.set(d.rd, v);
        }
        "sra" => {
            let v = ((m.registers.get(d.rt) as i32) >> d.shamt) as u32;
            m.registers.set(d.rd, v);
        }
        "sllv" => {
            let shift = m.registers.get(d.rs) & 0x1F;
            let v = m.registers.get(d.rt) << shift;
            m.registers.set(d.rd, v);
        }
        "srlv" => {
            let shift = m.registers.get(d.rs) & 0x1F;
            let v = m.registers.get(d.rt) >> shift;
            m.registers.set(d.rd, v);
        }
        "srav" => {
            let shift = m.registers.get(d.rs) & 0x1F;
            let v = ((m.registers.get(d.rt) as i32) >> shift) as u32;
            m.registers.set(d.rd, v);
        }
        "mult" => {
            let product = (m.registers.get(d.rs) as i32 as i64) * (m.registers.get(d.rt) as i32 as i64);
            m.registers.hi = (product >> 32) as u32;
            m.registers.lo = product as u32;
        }
        "multu" => {
            let product = (m.registers.get(d.rs) as u64) * (m.registers.get(d.rt) as u64);
            m.registers.hi = (product >> 32) as u32;
            m.registers.lo = product as u32;
        }
        "div" => {
            let a = m.registers.get(d.rs) as i32;
            let b = m.registers.get(d.rt) as i32;
            m.registers.hi = (a % b) as u32;
            m.registers.lo = (a / b) as u32;
        }
        "divu" => {
            let a = m.registers.get(d.rs);
            let b = m.registers.get(d.rt);
            m.registers.hi = a % b;
            m.registers.lo = a / b;
        }
        "mfhi" => {
            let v = m.registers.hi;
            m.registers.set(d.rd, v);
        }
        "mflo" => {
            let v = m.registers.lo;
            m.registers.set(d.rd, v);
        }
        "lui" => m.registers.set(d.rt, (d.immediate_unsigned as u32) << 16),
        "lw" => {
            let addr = m.registers.get(d.rs).wrapping_add(d.immediate as u32);
            let value = m.memory.read_word(addr)?;
            m.registers.set(d.rt, value);
        }
        "lh" => {
            let addr = m.registers.get(d.rs).wrapping_add(d.immediate as u32);
            let value = m.memory.read_half(addr)? as i16 as i32 as u32;
            m.registers.set(d.rt, value);
        }
        "lhu" => {
            let addr = m.registers.get(d.rs).wrapping_add(d.immediate as u32);
            let value = m.memory.read_half(addr)? as u32;
            m.registers.set(d.rt, value);
        }
        "lb" => {
            let addr = m.registers.get(d.rs).wrapping_add(d.immediate as u32);
            let value = m.memory.read_byte(addr)? as i8 as i32 as u32;
            m.registers.set(d.rt, value);
        }
        "lbu" => {
            let addr = m.registers.get(d.rs).wrapping_add(d.immediate as u32);
            let value = m.memory.read_byte(addr)? as u32;
            m.registers.set(d.rt, value);
        }
        "sw" => {
            let addr = m.registers.get(d.rs).wrapping_add(d.immediate as u32);
            let value = m.registers.get(d.rt);
            m.memory.write_word(addr, value)?;
        }
        "sh" => {
            let addr = m.registers.get(d.rs).wrapping_add(d.immediate as u32);
            let value = m.registers.get(d.rt) as u16;
            m.memory.write_half(addr, value)?;
        }
        "sb" => {
            let addr = m.registers.get(d.rs).wrapping_add(d.immediate as u32);
            let value = m.registers.get(d.rt) as u8;
            m.memory.write_byte(addr, value)?;
        }
        "beq" => {
            let taken = m.registers.get(d.rs) == m.registers.get(d.rt);
            branch(&mut m.registers, taken, d.immediate);
            return Ok(false);
        }
        "bne" => {
            let taken = m.registers.get(d.rs) != m.registers.get(d.rt);
            branch(&mut m.registers, taken, d.immediate);
            return Ok(false);
        }
        "j" => {
            m.registers.pc = (m.registers.pc & 0xF000_0000) | ((d.address << 2) & 0x0FFF_FFFF);
            return Ok(false);
        }
        "jal" => {
            let link = m.registers.pc.wrapping_add(4);
            m.registers.set(31, link);
            m.registers.pc = (m.registers.pc & 0xF000_0000) | ((d.address << 2) & 0x0FFF_FFFF);
            return Ok(false);
        }
        "jr" => {
            m.registers.pc = m.registers.get(d.rs);
            return Ok(false);
        }
        "syscall" => {
            let should_exit = system_call(m)?;
            if should_exit {
                m.halted = true;
                return Ok(false);
            }
        }
        other => return Err(RuntimeError::Decode(format!("unsupported opcode {other:?}"))),
    }
    Ok(true)
}

fn branch(r: &mut RegisterFile, taken: bool, word_offset: i32) {
    if taken {
        r.pc = r.pc.wrapping_add(4).wrapping_add(((word_offset as i64) << 2) as u32);
    } else {
        r.pc = r.pc.wrapping_add(4);
    }
}

const SYSCALL_PRINT_INT: u32 = 1;
const SYSCALL_PRINT_STRING: u32 = 4;
const SYSCALL_READ_INT: u32 = 5;
const SYSCALL_READ_STRING: u32 = 8;
const SYSCALL_EXIT: u32 = 10;

/// Dispatches on `$v0`. Returns whether the program should halt.
fn system_call(m: &mut Machine) -> Result<bool, RuntimeError> {
    let a0 = tables::register_index("a0").unwrap();
    let a1 = tables::register_index("a1").unwrap();
    let v0 = tables::register_index("v0").unwrap();
    match m.registers.get(v0) {
        SYSCALL_PRINT_INT => {
            print!("{}", m.registers.get(a0) as i32);
            io::stdout().flush().map_err(|e| RuntimeError::Io(e.to_string()))?;
        }
        SYSCALL_PRINT_STRING => {
            let mut addr = m.registers.get(a0);
            let mut buf = Vec::new();
            loop {
                let b = m.memory.read_byte(addr)?;
                if b == 0 {
                    break;
                }
                buf.push(b);
                addr = addr.wrapping_add(1);
            }
            print!("{}", String::from_utf8_lossy(&buf));
            io::stdout().flush().map_err(|e| RuntimeError::Io(e.to_string()))?;
        }
        SYSCALL_READ_INT => {
            let mut line = String::new();
            io::stdin().read_line(&mut line).map_err(|e| RuntimeError::Io(e.to_string()))?;
            let value: i32 = line.trim().parse().map_err(|_| RuntimeError::Io("expected an integer".into()))?;
            m.registers.set(v0, value as u32);
        }
        SYSCALL_READ_STRING => {
            let mut line = String::new();
            io::stdin().read_to_string(&mut line).map_err(|e| RuntimeError::Io(e.to_string()))?;
            let word = line.split_whitespace().next().unwrap_or("").to_string();
            let addr = m.registers.get(a0);
            let max = m.registers.get(a1) as usize;
            let bytes = &word.as_bytes()[..word.len().min(max)];
            for (i, &b) in bytes.iter().enumerate() {
                m.memory.write_byte(addr.wrapping_add(i as u32), b)?;
            }
        }
        SYSCALL_EXIT => return Ok(true),
        _ => {}
    }
    Ok(false)
}

/// Default stack pointer value: the top of the stack segment.
pub fn initial_stack_pointer() -> u32 {
    STACK_TOP
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler;

    fn assembled(src: &str) -> Vec<u8> {
        assembler::assemble(src).unwrap()
    }

    fn load(src: &str) -> Machine {
        let object = crate::object::ObjectFile::from_bytes(&assembled(src)).unwrap();
        let mut m = Machine::new();
        m.memory.load_text(&object.text);
        m.memory.load_data(&object.data);
        m.registers.pc = crate::memory::TEXT_BASE + object.header.main_offset;
        m.registers.set(29, initial_stack_pointer());
        m
    }

    #[test]
    fn add_and_halt() {
        let mut m = load("main:\naddi $t0, $zero, 5\naddi $t1, $zero, 3\nadd $t2, $t0, $t1\nli $v0, 10\nsyscall\n");
        loop {
            match m.step(None).unwrap() {
                StepOutcome::Running => continue,
                StepOutcome::Exited(status) => {
                    assert_eq!(status, ExitStatus::Normal);
                    break;
                }
            }
        }
        assert_eq!(m.registers.get(10), 8);
    }

    #[test]
    fn mult_splits_full_64_bit_product() {
        let mut m = load("main:\nli $t0, 0x10000\nli $t1, 0x10000\nmult $t0, $t1\nli $v0, 10\nsyscall\n");
        loop {
            if matches!(m.step(None).unwrap(), StepOutcome::Exited(_)) {
                break;
            }
        }
        assert_eq!(m.registers.hi, 1);
        assert_eq!(m.registers.lo, 0);
    }

    #[test]
    fn division_by_zero_is_a_trap() {
        let mut m = load("main:\ndiv $zero, $zero\nli $v0, 10\nsyscall\n");
        let err = loop {
            match m.step(None) {
                Ok(StepOutcome::Running) => continue,
                Ok(StepOutcome::Exited(_)) => panic!("expected a trap"),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, RuntimeError::Trap(_)));
    }

    #[test]
    fn external_cancellation_halts_the_next_step() {
        let mut m = load("main:\naddi $t0, $zero, 1\naddi $t0, $zero, 1\nli $v0, 10\nsyscall\n");
        let handle = m.cancellation_handle();
        handle.store(true, Ordering::SeqCst);
        match m.step(None).unwrap() {
            StepOutcome::Exited(ExitStatus::Interrupted) => {}
            other => panic!("expected interruption, got a different outcome: {}", matches!(other, StepOutcome::Running)),
        }
    }
}
