//! Decodes a raw 32-bit instruction word into its mnemonic and operand
//! values. Only `formats` needs walking here — unlike disassembly's
//! human-readable text, the execution engine just needs the numeric
//! fields, not which source syntax produced them.

use crate::tables::{self, FormatSlot};
use std::fmt;

#[derive(Debug, Clone, Copy, Default)]
pub struct Decoded {
    pub name: &'static str,
    pub rd: u8,
    pub rs: u8,
    pub rt: u8,
    pub shamt: u32,
    /// Sign-extended 16-bit immediate, for arithmetic uses.
    pub immediate: i32,
    /// Raw 16-bit immediate, for logical/unsigned uses and display.
    pub immediate_unsigned: u16,
    /// Raw 26-bit word address, for `j`/`jal`.
    pub address: u32,
}

#[derive(Debug, Clone)]
pub struct DecodeError {
    pub message: String,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DecodeError {}

fn sign_extend16(v: u16) -> i32 {
    v as i16 as i32
}

pub fn decode(word: u32) -> Result<Decoded, DecodeError> {
    let opcode = (word >> 26) & 0x3F;
    let name = if opcode == 0 {
        let funct = word & 0x3F;
        tables::mnemonic_for_funct(funct).ok_or_else(|| DecodeError { message: format!("unsupported function code {funct:#x}") })?
    } else {
        tables::mnemonic_for_opcode(opcode).ok_or_else(|| DecodeError { message: format!("unsupported opcode {opcode:#x}") })?
    };
    let info = tables::instruction_table().get(name).expect("reverse table only names real instructions");

    let mut decoded = Decoded { name, ..Decoded::default() };
    for slot in info.formats {
        match slot {
            FormatSlot::RegD => decoded.rd = ((word >> 11) & 0x1F) as u8,
            FormatSlot::RegS => decoded.rs = ((word >> 21) & 0x1F) as u8,
            FormatSlot::RegT => decoded.rt = ((word >> 16) & 0x1F) as u8,
            FormatSlot::Shamt => decoded.shamt = (word >> 6) & 0x1F,
            FormatSlot::Immediate16 => {
                decoded.immediate_unsigned = (word & 0xFFFF) as u16;
                decoded.immediate = sign_extend16(decoded.immediate_unsigned);
            }
            FormatSlot::Address26 => decoded.address = word & 0x3FF_FFFF,
        }
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_r_type_by_funct() {
        // add $t0($8), $t1($9), $t2($10): opcode 0, rs=9 rt=10 rd=8, funct 0x20
        let word = (9u32 << 21) | (10u32 << 16) | (8u32 << 11) | 0x20;
        let d = decode(word).unwrap();
        assert_eq!(d.name, "add");
        assert_eq!((d.rd, d.rs, d.rt), (8, 9, 10));
    }

    #[test]
    fn decodes_negative_immediate_sign_extended() {
        let word = (0x09u32 << 26) | (9u32 << 21) | (8u32 << 16) | 0xFFFF;
        let d = decode(word).unwrap();
        assert_eq!(d.name, "addiu");
        assert_eq!(d.immediate, -1);
        assert_eq!(d.immediate_unsigned, 0xFFFF);
    }

    #[test]
    fn rejects_unknown_funct() {
        assert!(decode(0x3F).is_err());
    }
}
