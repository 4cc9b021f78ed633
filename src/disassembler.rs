//! Disassembly: each 32-bit word becomes one `mnemonic\targ, arg, ...`
//! line. Unlike execution decoding, producing display text needs the
//! dual walk over `syntax` (how the operand was written) and `formats`
//! (where it lives in the word) together, so a base+offset memory
//! operand can be grouped back into `imm($reg)` instead of printed as
//! two independent tokens.

use crate::object::ObjectFile;
use crate::tables::{self, FormatSlot};
use std::fmt;

#[derive(Debug, Clone)]
pub struct DisassembleError {
    pub message: String,
}

impl fmt::Display for DisassembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DisassembleError {}

/// Disassembles a raw object file's text segment, one line per
/// instruction. The data segment is never disassembled: it holds
/// arbitrary bytes, not code.
pub fn disassemble_object(raw: &[u8]) -> Result<String, DisassembleError> {
    let object = ObjectFile::from_bytes(raw).map_err(|e| DisassembleError { message: e.to_string() })?;
    disassemble_words(&object.text)
}

/// Disassembles a stateless run of 4-byte-aligned instruction words, with
/// no header or segment context (e.g. a single-step trace).
pub fn disassemble_words(raw: &[u8]) -> Result<String, DisassembleError> {
    let mut lines = Vec::new();
    let mut i = 0;
    while i + 4 <= raw.len() {
        let word = u32::from_le_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        lines.push(disassemble_word(word)?);
        i += 4;
    }
    Ok(lines.join("\n"))
}

pub fn disassemble_word(word: u32) -> Result<String, DisassembleError> {
    let opcode = (word >> 26) & 0x3F;
    let name = if opcode == 0 {
        let funct = word & 0x3F;
        tables::mnemonic_for_funct(funct).ok_or_else(|| DisassembleError { message: format!("unsupported function code {funct:#x}") })?
    } else {
        tables::mnemonic_for_opcode(opcode).ok_or_else(|| DisassembleError { message: format!("unsupported opcode {opcode:#x}") })?
    };
    let info = tables::instruction_table().get(name).expect("reverse table only names real instructions");

    let mut args = Vec::new();
    let mut j = 0;
    for &syntax in info.syntax {
        if j >= info.formats.len() {
            break;
        }
        if syntax & tables::ARG_REGISTER != 0 {
            args.push(format!("${}", register_at(word, info.formats[j])));
            j += 1;
        } else if syntax & tables::ARG_INTEGER != 0 {
            args.push(integer_at(word, info.formats[j]));
            j += 1;
        } else if syntax & tables::ARG_BASE_OFFSET != 0 {
            let reg = register_at(word, info.formats[j]);
            j += 1;
            let imm = (word & 0xFFFF) as i16;
            args.push(format!("{imm}(${reg})"));
            j += 1;
        }
    }
    Ok(format!("{}\t{}", name, args.join(", ")))
}

fn register_at(word: u32, slot: FormatSlot) -> &'static str {
    let index = match slot {
        FormatSlot::RegS => (word >> 21) & 0x1F,
        FormatSlot::RegT => (word >> 16) & 0x1F,
        FormatSlot::RegD => (word >> 11) & 0x1F,
        _ => 0,
    };
    tables::register_name(index as u8)
}

fn integer_at(word: u32, slot: FormatSlot) -> String {
    match slot {
        FormatSlot::Shamt => format!("{}", (word >> 6) & 0x1F),
        FormatSlot::Immediate16 => format!("{}", word & 0xFFFF),
        FormatSlot::Address26 => format!("{:#x}", word & 0x3FF_FFFF),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;

    #[test]
    fn disassembles_add_instruction() {
        let bytes = assemble("main:\nadd $t0, $t1, $t2\nli $v0, 10\nsyscall\n").unwrap();
        let text = disassemble_object(&bytes).unwrap();
        assert!(text.starts_with("add\t$t0, $t1, $t2"));
    }

    #[test]
    fn disassembles_memory_operand_as_imm_paren_reg() {
        let bytes = assemble("main:\nlw $t0, 4($sp)\nli $v0, 10\nsyscall\n").unwrap();
        let text = disassemble_object(&bytes).unwrap();
        assert!(text.lines().next().unwrap().contains("4($sp)"));
    }

    #[test]
    fn data_segment_is_never_disassembled() {
        let bytes = assemble("main:\nli $v0, 10\nsyscall\n.data\n.word 1\n").unwrap();
        let text = disassemble_object(&bytes).unwrap();
        // Two text instructions from li + syscall.
        assert_eq!(text.lines().count(), 3);
    }
}
