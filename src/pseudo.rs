//! Pseudo-instruction expansion: runs after label resolution, so every
//! `ResolvedInst` already carries its final immediate (branches got a
//! relative word offset, `j`/`jal`/`la` got an absolute address/word
//! index). Expanding here only has to pick real opcodes and registers —
//! no address arithmetic is left to do, except `$at` for two-instruction
//! comparisons and `li`/`la`'s 16-bit splitting.

use crate::label::{ResolvedInst, ResolvedItem};
use crate::tables::{self, InstKind};
use std::fmt;

#[derive(Debug, Clone)]
pub struct PseudoError {
    pub message: String,
    pub line: usize,
}

impl fmt::Display for PseudoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line + 1, self.message)
    }
}

impl std::error::Error for PseudoError {}

const ZERO: u8 = 0;
const AT: u8 = 1;

fn real(name: &str, registers: Vec<u8>, imm: i64, line: usize) -> ResolvedInst {
    ResolvedInst { name: name.to_string(), registers, imm, address: 0, line }
}

/// Expands every pseudo-instruction item into its real-instruction
/// equivalents; non-instruction items pass through unchanged.
pub fn expand_pseudos(items: Vec<ResolvedItem>) -> Result<Vec<ResolvedItem>, PseudoError> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            ResolvedItem::Inst(inst) => {
                let info = tables::instruction_table().get(inst.name.as_str()).expect("instruction already validated");
                if info.kind == InstKind::Pseudo {
                    out.extend(translate(inst)?.into_iter().map(ResolvedItem::Inst));
                } else {
                    out.push(ResolvedItem::Inst(inst));
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn translate(i: ResolvedInst) -> Result<Vec<ResolvedInst>, PseudoError> {
    let line = i.line;
    let r = &i.registers;
    let insts = match i.name.as_str() {
        "move" => vec![real("add", vec![r[0], r[1], ZERO], 0, line)],
        "not" => vec![real("nor", vec![r[0], r[1], ZERO], 0, line)],
        "clear" => vec![real("add", vec![r[0], ZERO, ZERO], 0, line)],
        "nop" => vec![real("sll", vec![ZERO, ZERO, 0], 0, line)],
        "li" => vec![
            real("lui", vec![r[0]], (i.imm >> 16) & 0xFFFF, line),
            real("ori", vec![r[0], r[0]], i.imm & 0xFFFF, line),
        ],
        "la" => vec![
            real("lui", vec![r[0]], (i.imm >> 16) & 0xFFFF, line),
            real("ori", vec![r[0], r[0]], i.imm & 0xFFFF, line),
        ],
        "bgt" => vec![real("slt", vec![AT, r[1], r[0]], 0, line), real("bne", vec![AT, ZERO], i.imm, line)],
        "blt" => vec![real("slt", vec![AT, r[0], r[1]], 0, line), real("bne", vec![AT, ZERO], i.imm, line)],
        "bge" => vec![real("slt", vec![AT, r[0], r[1]], 0, line), real("beq", vec![AT, ZERO], i.imm, line)],
        "ble" => vec![real("slt", vec![AT, r[1], r[0]], 0, line), real("beq", vec![AT, ZERO], i.imm, line)],
        "bgtu" => vec![real("sltu", vec![AT, r[1], r[0]], 0, line), real("bne", vec![AT, ZERO], i.imm, line)],
        "bgtz" => vec![real("slt", vec![AT, ZERO, r[0]], 0, line), real("bne", vec![AT, ZERO], i.imm, line)],
        "beqz" => vec![real("beq", vec![ZERO, r[0]], i.imm, line)],
        "mul" => vec![real("mult", vec![r[1], r[2]], 0, line), real("mflo", vec![r[0]], 0, line)],
        "divq" => vec![real("div", vec![r[1], r[2]], 0, line), real("mflo", vec![r[0]], 0, line)],
        "rem" => vec![real("div", vec![r[1], r[2]], 0, line), real("mfhi", vec![r[0]], 0, line)],
        other => return Err(PseudoError { message: format!("invalid pseudo instruction {other:?}"), line }),
    };
    Ok(insts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::resolve_labels;
    use crate::parser::parse;

    fn expand(src: &str) -> Vec<ResolvedItem> {
        expand_pseudos(resolve_labels(parse(src).unwrap()).unwrap()).unwrap()
    }

    #[test]
    fn li_splits_into_lui_and_ori() {
        let items = expand("li $t0, 0x12345678\n");
        assert_eq!(items.len(), 2);
        match (&items[0], &items[1]) {
            (ResolvedItem::Inst(a), ResolvedItem::Inst(b)) => {
                assert_eq!(a.name, "lui");
                assert_eq!(a.imm, 0x1234);
                assert_eq!(b.name, "ori");
                assert_eq!(b.imm, 0x5678);
            }
            _ => panic!("expected two instructions"),
        }
    }

    #[test]
    fn move_expands_to_add_with_zero() {
        let items = expand("move $t0, $t1\n");
        assert_eq!(items.len(), 1);
        match &items[0] {
            ResolvedItem::Inst(a) => {
                assert_eq!(a.name, "add");
                assert_eq!(a.registers, vec![8, 9, 0]);
            }
            _ => panic!(),
        }
    }

    #[test]
    fn la_uses_absolute_label_address() {
        let items = expand("here:\nla $t0, here\n");
        match (&items[0], &items[1]) {
            (ResolvedItem::Inst(a), ResolvedItem::Inst(b)) => {
                let addr = crate::memory::TEXT_BASE;
                assert_eq!(a.imm, (addr as i64 >> 16) & 0xFFFF);
                assert_eq!(b.imm, addr as i64 & 0xFFFF);
            }
            _ => panic!(),
        }
    }
}
