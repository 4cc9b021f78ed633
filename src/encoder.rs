//! Bit-packs a resolved instruction into its 32-bit little-endian word.
//!
//! Walks `formats` only — the encoding slot order — since by this point
//! every operand already has its final numeric value (registers as
//! indices, immediates as final integers); the parse-time `syntax` mask
//! (which described how the operand was written in source) plays no
//! further role.

use crate::label::ResolvedInst;
use crate::tables::{self, FormatSlot, InstKind};
use std::fmt;

#[derive(Debug, Clone)]
pub struct EncodeError {
    pub message: String,
    pub line: usize,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line + 1, self.message)
    }
}

impl std::error::Error for EncodeError {}

const IMMEDIATE_MIN: i64 = -(1 << 15);
const IMMEDIATE_MAX: i64 = (1 << 15) - 1;

pub fn encode(inst: &ResolvedInst) -> Result<u32, EncodeError> {
    let info = tables::instruction_table()
        .get(inst.name.as_str())
        .unwrap_or_else(|| panic!("encode called on unknown mnemonic {:?}", inst.name));
    if info.kind == InstKind::Pseudo {
        panic!("encode called on an un-expanded pseudo-instruction {:?}", inst.name);
    }

    let mut word: u32 = info.opcode << 26;
    let mut regs = inst.registers.iter();
    for slot in info.formats {
        match slot {
            FormatSlot::RegD => word |= next_reg(&mut regs, inst)? << 11,
            FormatSlot::RegS => word |= next_reg(&mut regs, inst)? << 21,
            FormatSlot::RegT => word |= next_reg(&mut regs, inst)? << 16,
            FormatSlot::Shamt => {
                if !(0..=31).contains(&inst.imm) {
                    return Err(range_error(inst, "shift amount", 0, 31));
                }
                word |= (inst.imm as u32 & 0x1F) << 6;
            }
            FormatSlot::Immediate16 => {
                if !(IMMEDIATE_MIN..=IMMEDIATE_MAX).contains(&inst.imm) {
                    return Err(range_error(inst, "immediate", IMMEDIATE_MIN, IMMEDIATE_MAX));
                }
                word |= inst.imm as u32 & 0xFFFF;
            }
            FormatSlot::Address26 => {
                if !(0..=0x3FF_FFFF).contains(&inst.imm) {
                    return Err(range_error(inst, "jump target", 0, 0x3FF_FFFF));
                }
                word |= inst.imm as u32 & 0x3FF_FFFF;
            }
        }
    }
    if info.kind == InstKind::R {
        word |= info.funct & 0x3F;
    }
    Ok(word)
}

fn next_reg<'a>(regs: &mut impl Iterator<Item = &'a u8>, inst: &ResolvedInst) -> Result<u32, EncodeError> {
    regs.next()
        .map(|&r| (r as u32) & 0x1F)
        .ok_or_else(|| EncodeError { message: format!("{} is missing a register operand", inst.name), line: inst.line })
}

fn range_error(inst: &ResolvedInst, what: &str, min: i64, max: i64) -> EncodeError {
    EncodeError { message: format!("{} out of range for {} ({} not in {}..={})", inst.imm, what, inst.name, min, max), line: inst.line }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::resolve_labels;
    use crate::parser::parse;
    use crate::pseudo::expand_pseudos;

    fn encode_one(src: &str) -> u32 {
        let items = expand_pseudos(resolve_labels(parse(src).unwrap()).unwrap()).unwrap();
        match &items[0] {
            crate::label::ResolvedItem::Inst(inst) => encode(inst).unwrap(),
            _ => panic!("expected instruction"),
        }
    }

    #[test]
    fn encodes_add_as_r_type() {
        // add $t0, $t1, $t2 -> rd=t0(8) rs=t1(9) rt=t2(10), funct 0x20
        let word = encode_one("add $t0, $t1, $t2\n");
        assert_eq!((word >> 26) & 0x3F, 0);
        assert_eq!((word >> 11) & 0x1F, 8);
        assert_eq!((word >> 21) & 0x1F, 9);
        assert_eq!((word >> 16) & 0x1F, 10);
        assert_eq!(word & 0x3F, 0x20);
    }

    #[test]
    fn encodes_addiu_with_negative_immediate() {
        let word = encode_one("addiu $t0, $t1, -1\n");
        assert_eq!((word >> 26) & 0x3F, 0x09);
        assert_eq!(word & 0xFFFF, 0xFFFF);
    }

    #[test]
    fn rejects_immediate_out_of_strict_range() {
        let items = expand_pseudos(resolve_labels(parse("addiu $t0, $t1, 40000\n").unwrap()).unwrap()).unwrap();
        match &items[0] {
            crate::label::ResolvedItem::Inst(inst) => assert!(encode(inst).is_err()),
            _ => panic!(),
        }
    }
}
