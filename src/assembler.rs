//! Top-level assembler pipeline: source text in, object file bytes out.
//!
//! Wires the five independent stages together — lex, parse, resolve
//! labels, expand pseudo-instructions, encode — and lays the resulting
//! real instructions and directive data out into text/data segment
//! buffers, prefixed with the object header.

use crate::encoder::{self, EncodeError};
use crate::label::{self, LabelError, ResolvedItem};
use crate::memory::TEXT_BASE;
use crate::object::ObjectFile;
use crate::parser::{self, DirData, ParseError};
use crate::pseudo::{self, PseudoError};
use std::fmt;

#[derive(Debug, Clone)]
pub enum AssembleError {
    Parse(ParseError),
    Label(LabelError),
    Pseudo(PseudoError),
    Encode(EncodeError),
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssembleError::Parse(e) => write!(f, "{e}"),
            AssembleError::Label(e) => write!(f, "{e}"),
            AssembleError::Pseudo(e) => write!(f, "{e}"),
            AssembleError::Encode(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AssembleError {}

impl From<ParseError> for AssembleError {
    fn from(e: ParseError) -> Self {
        AssembleError::Parse(e)
    }
}
impl From<LabelError> for AssembleError {
    fn from(e: LabelError) -> Self {
        AssembleError::Label(e)
    }
}
impl From<PseudoError> for AssembleError {
    fn from(e: PseudoError) -> Self {
        AssembleError::Pseudo(e)
    }
}
impl From<EncodeError> for AssembleError {
    fn from(e: EncodeError) -> Self {
        AssembleError::Encode(e)
    }
}

enum Section {
    Text,
    Data,
}

/// Assembles source text into a complete object file's bytes (header
/// line followed by the text and data segments).
pub fn assemble(source: &str) -> Result<Vec<u8>, AssembleError> {
    let parsed = parser::parse(source)?;
    let resolved = label::resolve_labels(parsed)?;
    let items = pseudo::expand_pseudos(resolved)?;

    let mut text = Vec::new();
    let mut data = Vec::new();
    let mut section = Section::Text;
    let mut main_offset: u32 = 0;

    for item in &items {
        match item {
            ResolvedItem::Inst(inst) => {
                let word = encoder::encode(inst)?;
                let buf = match section {
                    Section::Text => &mut text,
                    Section::Data => &mut data,
                };
                buf.extend_from_slice(&word.to_le_bytes());
            }
            ResolvedItem::Directive { name, data: dir_data, address, .. } => match name.as_str() {
                "text" => section = Section::Text,
                "data" => section = Section::Data,
                "globl" => main_offset = address.wrapping_sub(TEXT_BASE),
                other => emit_directive(other, dir_data, *address, &mut section, &mut text, &mut data),
            },
        }
    }

    Ok(ObjectFile::new(text, data, main_offset).to_bytes())
}

fn emit_directive(name: &str, data: &DirData, address: u32, section: &mut Section, text: &mut Vec<u8>, out_data: &mut Vec<u8>) {
    let buf = match section {
        Section::Text => &mut *text,
        Section::Data => &mut *out_data,
    };
    match name {
        "space" => {
            if let DirData::Single(n) = data {
                buf.extend(std::iter::repeat(0u8).take(*n as usize));
            }
        }
        "align" => {
            if let DirData::Single(width) = data {
                let modulus = 1u32 << *width as u32;
                let rem = address % modulus;
                if rem != 0 {
                    buf.extend(std::iter::repeat(0u8).take((modulus - rem) as usize));
                }
            }
        }
        "byte" => {
            if let DirData::Ints(v) = data {
                buf.extend(v.iter().map(|&n| n as u8));
            }
        }
        "half" => {
            if let DirData::Ints(v) = data {
                for &n in v {
                    buf.extend_from_slice(&(n as u16).to_le_bytes());
                }
            }
        }
        "word" => {
            if let DirData::Ints(v) = data {
                for &n in v {
                    buf.extend_from_slice(&(n as u32).to_le_bytes());
                }
            }
        }
        "ascii" => {
            if let DirData::Text(s) = data {
                buf.extend_from_slice(s.as_bytes());
            }
        }
        "asciiz" => {
            if let DirData::Text(s) = data {
                buf.extend_from_slice(s.as_bytes());
                buf.push(0);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_minimal_program_to_an_object_file() {
        let bytes = assemble("main:\n.globl main\naddi $t0, $zero, 1\nli $v0, 10\nsyscall\n").unwrap();
        let object = ObjectFile::from_bytes(&bytes).unwrap();
        assert_eq!(object.header.main_offset, 0);
        assert_eq!(object.header.text_len() as usize, object.text.len());
        // addi, lui, ori, syscall: four words
        assert_eq!(object.text.len(), 16);
    }

    #[test]
    fn data_directives_land_in_the_data_segment() {
        let bytes = assemble("main:\nli $v0, 10\nsyscall\n.data\nmsg:\n.asciiz \"hi\"\n").unwrap();
        let object = ObjectFile::from_bytes(&bytes).unwrap();
        assert_eq!(object.data, b"hi\0");
    }

    #[test]
    fn rejects_an_undefined_label() {
        assert!(assemble("j nowhere\n").is_err());
    }
}
