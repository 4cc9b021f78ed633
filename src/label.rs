//! Label resolution: a two-pass walk over the full, flat item list.
//!
//! Pass one assigns a virtual address to every item (labels, directives
//! and instructions advance independent text/data cursors) and records
//! where each label points. Pass two rewrites every label reference into
//! a concrete field: branches and pseudo-branches get a PC-relative word
//! offset, `j`/`jal` get an absolute word address, `la` and `.globl` get
//! the label's absolute byte address. This must run before
//! pseudo-instruction expansion — a pseudo spans 1-2 real words and its
//! relative-offset arithmetic needs to know that up front.

use crate::memory::{DATA_BASE, TEXT_BASE};
use crate::parser::{DirData, ParseItem};
use crate::tables::{self, InstKind};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone)]
pub struct LabelError {
    pub message: String,
    pub line: usize,
}

impl fmt::Display for LabelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line + 1, self.message)
    }
}

impl std::error::Error for LabelError {}

#[derive(Debug, Clone)]
pub struct ResolvedInst {
    pub name: String,
    pub registers: Vec<u8>,
    pub imm: i64,
    pub address: u32,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum ResolvedItem {
    Inst(ResolvedInst),
    Directive { name: String, data: DirData, address: u32, line: usize },
}

/// Runs both label-resolution sub-passes, returning the item list with
/// every label reference rewritten and every item's address attached.
pub fn resolve_labels(items: Vec<ParseItem>) -> Result<Vec<ResolvedItem>, LabelError> {
    let (addressed, labels) = collect_addresses(items)?;
    rewrite_labels(addressed, &labels)
}

fn directive_size(name: &str, data: &DirData) -> Result<(u32, Option<(u32, u32)>), LabelError> {
    // Returns (byte size to advance by, optional (old_addr_mod_width, pad) for align).
    match name {
        "byte" => match data {
            DirData::Ints(v) => Ok((v.len() as u32, None)),
            _ => unreachable!(),
        },
        "half" => match data {
            DirData::Ints(v) => Ok(((v.len() as u32) * 2, None)),
            _ => unreachable!(),
        },
        "word" => match data {
            DirData::Ints(v) => Ok(((v.len() as u32) * 4, None)),
            _ => unreachable!(),
        },
        "space" => match data {
            DirData::Single(n) => Ok((*n as u32, None)),
            _ => unreachable!(),
        },
        "ascii" => match data {
            DirData::Text(s) => Ok((s.len() as u32, None)),
            _ => unreachable!(),
        },
        "asciiz" => match data {
            DirData::Text(s) => Ok((s.len() as u32 + 1, None)),
            _ => unreachable!(),
        },
        _ => Ok((0, None)),
    }
}

fn collect_addresses(items: Vec<ParseItem>) -> Result<(Vec<(ParseItem, u32)>, HashMap<String, u32>), LabelError> {
    let mut text_addr = TEXT_BASE;
    let mut data_addr = DATA_BASE;
    let mut in_text = true;
    let mut labels: HashMap<String, u32> = HashMap::new();
    let mut addressed = Vec::with_capacity(items.len());

    for item in items {
        let addr = if in_text { text_addr } else { data_addr };
        match &item {
            ParseItem::Label { name, line } => {
                if let Some(_prev) = labels.get(name) {
                    return Err(LabelError { message: format!("label {name:?} defined twice"), line: *line });
                }
                labels.insert(name.clone(), addr);
            }
            ParseItem::Directive { name, data, .. } => match name.as_str() {
                "text" => in_text = true,
                "data" => in_text = false,
                "align" => {
                    let width = match data {
                        DirData::Single(w) => *w as u32,
                        _ => unreachable!(),
                    };
                    let modulus = 1u32 << width;
                    let rem = addr % modulus;
                    if rem != 0 {
                        let pad = modulus - rem;
                        if in_text {
                            text_addr += pad;
                        } else {
                            data_addr += pad;
                        }
                    }
                }
                "globl" => {}
                other => {
                    let (size, _) = directive_size(other, data)?;
                    if in_text {
                        text_addr += size;
                    } else {
                        data_addr += size;
                    }
                }
            },
            ParseItem::Inst { name, .. } => {
                let info = tables::instruction_table().get(name.as_str()).expect("instruction already validated by parser");
                let words = if info.kind == InstKind::Pseudo { info.pseudo_size as u32 } else { 1 };
                if in_text {
                    text_addr += words * 4;
                } else {
                    data_addr += words * 4;
                }
            }
        }
        addressed.push((item, addr));
    }
    Ok((addressed, labels))
}

fn rewrite_labels(addressed: Vec<(ParseItem, u32)>, labels: &HashMap<String, u32>) -> Result<Vec<ResolvedItem>, LabelError> {
    let mut result = Vec::with_capacity(addressed.len());
    for (item, addr) in addressed {
        match item {
            ParseItem::Label { .. } => continue,
            ParseItem::Inst { name, registers, imm, label, line } => {
                let info = tables::instruction_table().get(name.as_str()).expect("instruction already validated by parser");
                let resolved_imm = if let Some(label_name) = label {
                    let target = *labels
                        .get(&label_name)
                        .ok_or_else(|| LabelError { message: format!("label {label_name:?} not defined"), line })?;
                    if name == "la" {
                        target as i64
                    } else if info.kind == InstKind::J {
                        (target >> 2) as i64
                    } else {
                        let word_count = if info.kind == InstKind::Pseudo { info.pseudo_size.max(1) as i64 } else { 1 };
                        (target as i64 - (addr as i64 + 4 * word_count)) >> 2
                    }
                } else {
                    imm
                };
                result.push(ResolvedItem::Inst(ResolvedInst { name, registers, imm: resolved_imm, address: addr, line }));
            }
            ParseItem::Directive { name, data, line } => {
                if name == "globl" {
                    let label_name = match &data {
                        DirData::Label(l) => l.clone(),
                        _ => unreachable!(),
                    };
                    let target = *labels
                        .get(&label_name)
                        .ok_or_else(|| LabelError { message: format!("label {label_name:?} not defined"), line })?;
                    result.push(ResolvedItem::Directive { name, data, address: target, line });
                } else {
                    result.push(ResolvedItem::Directive { name, data, address: addr, line });
                }
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn branch_resolves_to_relative_word_offset() {
        let items = parse("loop:\nbeq $t0, $t1, loop\n").unwrap();
        let resolved = resolve_labels(items).unwrap();
        match &resolved[0] {
            ResolvedItem::Inst(inst) => assert_eq!(inst.imm, -1),
            _ => panic!("expected instruction"),
        }
    }

    #[test]
    fn jump_resolves_to_absolute_shifted_address() {
        let items = parse("target:\nj target\n").unwrap();
        let resolved = resolve_labels(items).unwrap();
        match &resolved[0] {
            ResolvedItem::Inst(inst) => assert_eq!(inst.imm, (TEXT_BASE >> 2) as i64),
            _ => panic!("expected instruction"),
        }
    }

    #[test]
    fn two_word_branch_pseudo_targets_the_second_word() {
        // bgt expands to slt ($at, rt, rs); bne ($at, $zero, label) — the
        // branch is the second real word, so its relative offset must be
        // measured from its own address, not the pseudo's first word.
        let items = parse("loop:\nbgt $t0, $t1, loop\n").unwrap();
        let resolved = resolve_labels(items).unwrap();
        match &resolved[0] {
            ResolvedItem::Inst(inst) => assert_eq!(inst.imm, -2),
            _ => panic!("expected instruction"),
        }
    }

    #[test]
    fn undefined_label_is_an_error() {
        let items = parse("j nowhere\n").unwrap();
        assert!(resolve_labels(items).is_err());
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let items = parse("a:\na:\nnop\n").unwrap();
        assert!(resolve_labels(items).is_err());
    }
}
