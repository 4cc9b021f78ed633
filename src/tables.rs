//! Static encoding/decoding data: instructions, registers, formats.
//!
//! This table is the single source of truth consulted by the parser (to
//! know how many operands of what kind an instruction takes), the label
//! pass (to size pseudo-instructions), the encoder (to lay out bit fields)
//! and the decoder (to recover them). It is a process-wide constant built
//! once on first use and never mutated afterwards.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Bitmask over the kinds of operand a source-level argument position may
/// accept. Several bits may be set, e.g. branch targets accept either an
/// immediate or a label (`ARG_INTEGER | ARG_LABEL`).
pub type ArgMask = u8;

pub const ARG_REGISTER: ArgMask = 1 << 0;
pub const ARG_INTEGER: ArgMask = 1 << 1;
pub const ARG_LABEL: ArgMask = 1 << 2;
/// `<Integer> '(' <Register> ')'` — a base+offset memory address.
pub const ARG_BASE_OFFSET: ArgMask = 1 << 3;

/// Which 32-bit field an encoded operand is written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSlot {
    RegD,
    RegS,
    RegT,
    Shamt,
    Immediate16,
    Address26,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstKind {
    R,
    I,
    J,
    /// Expanded by the pseudo-instruction expander before encoding.
    Pseudo,
}

#[derive(Debug, Clone)]
pub struct InstructionInfo {
    pub kind: InstKind,
    /// Operand kinds in source order.
    pub syntax: &'static [ArgMask],
    /// Encoding slots in source order (real instructions only).
    pub formats: &'static [FormatSlot],
    pub opcode: u32,
    pub funct: u32,
    /// Number of real instructions a pseudo-instruction expands to (1 or 2).
    pub pseudo_size: u8,
}

impl InstructionInfo {
    const fn real(kind: InstKind, syntax: &'static [ArgMask], formats: &'static [FormatSlot], opcode: u32, funct: u32) -> Self {
        InstructionInfo { kind, syntax, formats, opcode, funct, pseudo_size: 0 }
    }

    const fn pseudo(syntax: &'static [ArgMask], size: u8) -> Self {
        InstructionInfo { kind: InstKind::Pseudo, syntax, formats: &[], opcode: 0, funct: 0, pseudo_size: size }
    }
}

const REG: ArgMask = ARG_REGISTER;
const IMM: ArgMask = ARG_INTEGER;
const LBL: ArgMask = ARG_LABEL;
const ADDR: ArgMask = ARG_BASE_OFFSET;
const IMM_OR_LBL: ArgMask = ARG_INTEGER | ARG_LABEL;

use FormatSlot::*;

static INSTRUCTIONS: OnceLock<HashMap<&'static str, InstructionInfo>> = OnceLock::new();

/// The process-wide mnemonic -> encoding/decoding info table.
pub fn instruction_table() -> &'static HashMap<&'static str, InstructionInfo> {
    INSTRUCTIONS.get_or_init(build_instruction_table)
}

fn build_instruction_table() -> HashMap<&'static str, InstructionInfo> {
    let mut t = HashMap::new();
    macro_rules! r3 {
        ($name:literal, $funct:expr) => {
            t.insert($name, InstructionInfo::real(InstKind::R, &[REG, REG, REG], &[RegD, RegS, RegT], 0, $funct));
        };
    }
    // R-type, rd, rs, rt
    r3!("add", 0x20);
    r3!("addu", 0x21);
    r3!("sub", 0x22);
    r3!("subu", 0x23);
    r3!("and", 0x24);
    r3!("or", 0x25);
    r3!("xor", 0x26);
    r3!("nor", 0x27);
    r3!("slt", 0x2A);
    t.insert("sltu", InstructionInfo::real(InstKind::R, &[REG, REG, REG], &[RegD, RegS, RegT], 0, 0x2B));

    // R-type shift-by-register, rd, rt, rs
    t.insert("sllv", InstructionInfo::real(InstKind::R, &[REG, REG, REG], &[RegD, RegT, RegS], 0, 0x04));
    t.insert("srlv", InstructionInfo::real(InstKind::R, &[REG, REG, REG], &[RegD, RegT, RegS], 0, 0x06));
    t.insert("srav", InstructionInfo::real(InstKind::R, &[REG, REG, REG], &[RegD, RegT, RegS], 0, 0x07));

    // R-type shift-by-immediate, rd, rt, shamt
    t.insert("sll", InstructionInfo::real(InstKind::R, &[REG, REG, IMM], &[RegD, RegT, Shamt], 0, 0x00));
    t.insert("srl", InstructionInfo::real(InstKind::R, &[REG, REG, IMM], &[RegD, RegT, Shamt], 0, 0x02));
    t.insert("sra", InstructionInfo::real(InstKind::R, &[REG, REG, IMM], &[RegD, RegT, Shamt], 0, 0x03));

    // R-type, rs, rt only
    t.insert("mult", InstructionInfo::real(InstKind::R, &[REG, REG], &[RegS, RegT], 0, 0x18));
    t.insert("multu", InstructionInfo::real(InstKind::R, &[REG, REG], &[RegS, RegT], 0, 0x19));
    t.insert("div", InstructionInfo::real(InstKind::R, &[REG, REG], &[RegS, RegT], 0, 0x1A));
    t.insert("divu", InstructionInfo::real(InstKind::R, &[REG, REG], &[RegS, RegT], 0, 0x1B));

    // R-type, rd only
    t.insert("mfhi", InstructionInfo::real(InstKind::R, &[REG], &[RegD], 0, 0x10));
    t.insert("mflo", InstructionInfo::real(InstKind::R, &[REG], &[RegD], 0, 0x12));

    // R-type, rs only
    t.insert("jr", InstructionInfo::real(InstKind::R, &[REG], &[RegS], 0, 0x08));

    // R-type, no operands
    t.insert("syscall", InstructionInfo::real(InstKind::R, &[], &[], 0, 0x0C));

    // I-type arithmetic/logical immediate: rt, rs, imm
    t.insert("addi", InstructionInfo::real(InstKind::I, &[REG, REG, IMM], &[RegT, RegS, Immediate16], 0x08, 0));
    t.insert("addiu", InstructionInfo::real(InstKind::I, &[REG, REG, IMM], &[RegT, RegS, Immediate16], 0x09, 0));
    t.insert("andi", InstructionInfo::real(InstKind::I, &[REG, REG, IMM], &[RegT, RegS, Immediate16], 0x0C, 0));
    t.insert("ori", InstructionInfo::real(InstKind::I, &[REG, REG, IMM], &[RegT, RegS, Immediate16], 0x0D, 0));
    t.insert("slti", InstructionInfo::real(InstKind::I, &[REG, REG, IMM], &[RegT, RegS, Immediate16], 0x0A, 0));

    // I-type branch: rs, rt, imm-or-label
    t.insert("bne", InstructionInfo::real(InstKind::I, &[REG, REG, IMM_OR_LBL], &[RegS, RegT, Immediate16], 0x04, 0));
    t.insert("beq", InstructionInfo::real(InstKind::I, &[REG, REG, IMM_OR_LBL], &[RegS, RegT, Immediate16], 0x05, 0));

    // I-type load/store: rt, addr(rs)
    macro_rules! mem {
        ($name:literal, $opcode:expr) => {
            t.insert($name, InstructionInfo::real(InstKind::I, &[REG, ADDR], &[RegT, RegS, Immediate16], $opcode, 0));
        };
    }
    mem!("lw", 0x23);
    mem!("lh", 0x21);
    mem!("lhu", 0x25);
    mem!("lb", 0x20);
    mem!("lbu", 0x24);
    mem!("sw", 0x2B);
    mem!("sh", 0x29);
    mem!("sb", 0x28);

    // I-type, rt, imm
    t.insert("lui", InstructionInfo::real(InstKind::I, &[REG, IMM], &[RegT, Immediate16], 0x0F, 0));

    // J-type: imm-or-label target
    t.insert("j", InstructionInfo::real(InstKind::J, &[IMM_OR_LBL], &[Address26], 0x02, 0));
    t.insert("jal", InstructionInfo::real(InstKind::J, &[IMM_OR_LBL], &[Address26], 0x03, 0));

    // Pseudo-instructions
    t.insert("mul", InstructionInfo::pseudo(&[REG, REG, REG], 2));
    t.insert("divq", InstructionInfo::pseudo(&[REG, REG, REG], 2));
    t.insert("rem", InstructionInfo::pseudo(&[REG, REG, REG], 2));
    t.insert("bgt", InstructionInfo::pseudo(&[REG, REG, IMM_OR_LBL], 2));
    t.insert("blt", InstructionInfo::pseudo(&[REG, REG, IMM_OR_LBL], 2));
    t.insert("bge", InstructionInfo::pseudo(&[REG, REG, IMM_OR_LBL], 2));
    t.insert("ble", InstructionInfo::pseudo(&[REG, REG, IMM_OR_LBL], 2));
    t.insert("bgtu", InstructionInfo::pseudo(&[REG, REG, IMM_OR_LBL], 2));
    t.insert("bgtz", InstructionInfo::pseudo(&[REG, IMM_OR_LBL], 2));
    t.insert("beqz", InstructionInfo::pseudo(&[REG, IMM_OR_LBL], 1));
    t.insert("move", InstructionInfo::pseudo(&[REG, REG], 1));
    t.insert("not", InstructionInfo::pseudo(&[REG, REG], 1));
    t.insert("li", InstructionInfo::pseudo(&[REG, IMM], 2));
    t.insert("la", InstructionInfo::pseudo(&[REG, LBL], 2));
    t.insert("clear", InstructionInfo::pseudo(&[REG], 1));
    t.insert("nop", InstructionInfo::pseudo(&[], 1));
    t
}

/// The 32 general-purpose MIPS register names, in register-number order.
pub const REGISTER_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7", "s0", "s1",
    "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp", "fp", "ra",
];

static REGISTERS: OnceLock<HashMap<&'static str, u8>> = OnceLock::new();

/// The process-wide register name -> index table.
pub fn register_table() -> &'static HashMap<&'static str, u8> {
    REGISTERS.get_or_init(|| REGISTER_NAMES.iter().enumerate().map(|(i, &n)| (n, i as u8)).collect())
}

pub fn register_index(name: &str) -> Option<u8> {
    register_table().get(name).copied()
}

pub fn register_name(index: u8) -> &'static str {
    REGISTER_NAMES[(index & 0x1F) as usize]
}

static R_FUNCT_TO_MNEMONIC: OnceLock<HashMap<u32, &'static str>> = OnceLock::new();
static OPCODE_TO_MNEMONIC: OnceLock<HashMap<u32, &'static str>> = OnceLock::new();

/// Reverse lookup used by the decoder: `funct` field (for R-type words) to mnemonic.
pub fn mnemonic_for_funct(funct: u32) -> Option<&'static str> {
    R_FUNCT_TO_MNEMONIC
        .get_or_init(|| {
            instruction_table()
                .iter()
                .filter(|(_, info)| info.kind == InstKind::R)
                .map(|(&name, info)| (info.funct, name))
                .collect()
        })
        .get(&funct)
        .copied()
}

/// Reverse lookup used by the decoder: `opcode` field (for non-zero opcodes) to mnemonic.
pub fn mnemonic_for_opcode(opcode: u32) -> Option<&'static str> {
    OPCODE_TO_MNEMONIC
        .get_or_init(|| {
            instruction_table()
                .iter()
                .filter(|(_, info)| info.kind == InstKind::I || info.kind == InstKind::J)
                .map(|(&name, info)| (info.opcode, name))
                .collect()
        })
        .get(&opcode)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_r_type_with_funct_0x20() {
        let info = &instruction_table()["add"];
        assert_eq!(info.kind, InstKind::R);
        assert_eq!(info.funct, 0x20);
        assert_eq!(info.opcode, 0);
    }

    #[test]
    fn register_roundtrip() {
        assert_eq!(register_index("a0"), Some(4));
        assert_eq!(register_name(4), "a0");
        assert_eq!(register_index("zero"), Some(0));
        assert_eq!(register_index("nope"), None);
    }

    #[test]
    fn reverse_tables_agree_with_forward_table() {
        assert_eq!(mnemonic_for_funct(0x20), Some("add"));
        assert_eq!(mnemonic_for_opcode(0x23), Some("lw"));
        assert_eq!(mnemonic_for_opcode(0x02), Some("j"));
    }
}
