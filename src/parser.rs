//! Turns a token stream into a flat sequence of parse items: label
//! definitions, directives and instructions, each still carrying source
//! register/label/immediate operands exactly as written (no label
//! resolution or pseudo-instruction expansion happens here — those are
//! later, independent passes over the materialized item list).

use crate::lexer::{LexError, Lexer, Token, TokenKind};
use crate::tables::{self, ArgMask};
use std::fmt;

#[derive(Debug, Clone)]
pub enum DirData {
    Ints(Vec<i64>),
    Single(i64),
    Text(String),
    Label(String),
    None,
}

#[derive(Debug, Clone)]
pub enum ParseItem {
    Label { name: String, line: usize },
    Directive { name: String, data: DirData, line: usize },
    Inst { name: String, registers: Vec<u8>, imm: i64, label: Option<String>, line: usize },
}

impl ParseItem {
    pub fn line(&self) -> usize {
        match self {
            ParseItem::Label { line, .. } => *line,
            ParseItem::Directive { line, .. } => *line,
            ParseItem::Inst { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line + 1, self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError { message: e.message, line: e.line }
    }
}

/// Parses an entire source string into a flat item list. Consumes the
/// whole lexer eagerly: downstream passes need random access to the full
/// instruction sequence to resolve labels.
pub fn parse(source: &str) -> Result<Vec<ParseItem>, ParseError> {
    let mut lexer = Lexer::new(source).peekable();
    let mut items = Vec::new();
    loop {
        let tok = next_token(&mut lexer)?;
        match tok.kind {
            TokenKind::Eof => break,
            TokenKind::Endline => continue,
            TokenKind::Instruction => items.push(parse_inst(&mut lexer, tok)?),
            TokenKind::LabelDef => {
                items.push(ParseItem::Label { name: tok.text, line: tok.line });
            }
            TokenKind::Directive => items.push(parse_dir(&mut lexer, tok)?),
            _ => return Err(ParseError { message: format!("unexpected token {:?}", tok.text), line: tok.line }),
        }
    }
    Ok(items)
}

type TokenStream<'a> = std::iter::Peekable<Lexer<'a>>;

fn next_token(lexer: &mut TokenStream) -> Result<Token, ParseError> {
    match lexer.next() {
        Some(Ok(t)) => Ok(t),
        Some(Err(e)) => Err(e.into()),
        None => Err(ParseError { message: "unexpected end of input".into(), line: 0 }),
    }
}

fn expect_endline(lexer: &mut TokenStream) -> Result<(), ParseError> {
    let tok = next_token(lexer)?;
    match tok.kind {
        TokenKind::Endline | TokenKind::Eof => Ok(()),
        _ => Err(ParseError { message: format!("unexpected token {:?}, expected end of line", tok.text), line: tok.line }),
    }
}

fn parse_inst(lexer: &mut TokenStream, head: Token) -> Result<ParseItem, ParseError> {
    let info = tables::instruction_table().get(head.text.as_str()).expect("lexer only emits known instructions");
    let syntax: &[ArgMask] = info.syntax;
    let mut registers = Vec::new();
    let mut imm: i64 = 0;
    let mut label = None;

    for (i, &kind) in syntax.iter().enumerate() {
        if kind & tables::ARG_BASE_OFFSET != 0 {
            let t = next_token(lexer)?;
            imm = expect_integer(&t)?;
            expect_kind(lexer, TokenKind::LeftParen)?;
            let reg = next_token(lexer)?;
            registers.push(expect_register(&reg)?);
            expect_kind(lexer, TokenKind::RightParen)?;
        } else if kind & tables::ARG_REGISTER != 0 {
            let t = next_token(lexer)?;
            registers.push(expect_register(&t)?);
        } else {
            let t = next_token(lexer)?;
            match t.kind {
                TokenKind::Integer if kind & tables::ARG_INTEGER != 0 => imm = expect_integer(&t)?,
                TokenKind::Label if kind & tables::ARG_LABEL != 0 => label = Some(t.text),
                _ => {
                    return Err(ParseError {
                        message: format!("unexpected token {:?} for operand {} of {}", t.text, i, head.text),
                        line: t.line,
                    })
                }
            }
        }
        if i < syntax.len() - 1 {
            expect_kind(lexer, TokenKind::Comma)?;
        }
    }
    expect_endline(lexer)?;
    Ok(ParseItem::Inst { name: head.text, registers, imm, label, line: head.line })
}

fn expect_kind(lexer: &mut TokenStream, kind: TokenKind) -> Result<Token, ParseError> {
    let t = next_token(lexer)?;
    if t.kind == kind {
        Ok(t)
    } else {
        Err(ParseError { message: format!("unexpected token {:?}, expected {:?}", t.text, kind), line: t.line })
    }
}

fn expect_register(t: &Token) -> Result<u8, ParseError> {
    if t.kind != TokenKind::Register {
        return Err(ParseError { message: format!("unexpected token {:?}, expected a register", t.text), line: t.line });
    }
    tables::register_index(&t.text[1..]).ok_or_else(|| ParseError { message: format!("unknown register {:?}", t.text), line: t.line })
}

fn expect_integer(t: &Token) -> Result<i64, ParseError> {
    if t.kind != TokenKind::Integer {
        return Err(ParseError { message: format!("unexpected token {:?}, expected an integer", t.text), line: t.line });
    }
    parse_int_literal(&t.text).ok_or_else(|| ParseError { message: format!("failed to parse integer {:?}", t.text), line: t.line })
}

fn parse_int_literal(text: &str) -> Option<i64> {
    let (neg, rest) = match text.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let value = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        rest.parse::<i64>().ok()?
    };
    Some(if neg { -value } else { value })
}

fn parse_dir(lexer: &mut TokenStream, head: Token) -> Result<ParseItem, ParseError> {
    let name = head.text;
    let line = head.line;
    let data = match name.as_str() {
        "byte" | "half" | "word" => {
            let mut values = Vec::new();
            loop {
                let t = next_token(lexer)?;
                let v = match t.kind {
                    TokenKind::Byte => t.text.chars().next().map(|c| c as i64).unwrap_or(0),
                    TokenKind::Integer => expect_integer(&t)?,
                    _ => return Err(ParseError { message: format!("unexpected token {:?}, expected a byte or integer", t.text), line: t.line }),
                };
                values.push(v);
                let sep = next_token(lexer)?;
                match sep.kind {
                    TokenKind::Comma => continue,
                    TokenKind::Endline | TokenKind::Eof => break,
                    _ => return Err(ParseError { message: format!("unexpected token {:?}", sep.text), line: sep.line }),
                }
            }
            return Ok(ParseItem::Directive { name, data: DirData::Ints(values), line });
        }
        "align" | "space" => {
            let t = next_token(lexer)?;
            let v = expect_integer(&t)?;
            DirData::Single(v)
        }
        "ascii" | "asciiz" => {
            let t = expect_kind(lexer, TokenKind::String)?;
            DirData::Text(t.text)
        }
        "globl" => {
            let t = expect_kind(lexer, TokenKind::Label)?;
            DirData::Label(t.text)
        }
        "text" | "data" => DirData::None,
        other => return Err(ParseError { message: format!("invalid directive {other:?}"), line }),
    };
    expect_endline(lexer)?;
    Ok(ParseItem::Directive { name, data, line })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_instruction_with_registers() {
        let items = parse("add $t0, $t1, $t2\n").unwrap();
        assert_eq!(items.len(), 1);
        match &items[0] {
            ParseItem::Inst { name, registers, .. } => {
                assert_eq!(name, "add");
                assert_eq!(registers, &vec![8, 9, 10]);
            }
            _ => panic!("expected instruction"),
        }
    }

    #[test]
    fn parses_word_directive_list() {
        let items = parse(".word 1, 2, -3\n").unwrap();
        match &items[0] {
            ParseItem::Directive { data: DirData::Ints(v), .. } => assert_eq!(v, &vec![1, 2, -3]),
            _ => panic!("expected word directive"),
        }
    }

    #[test]
    fn parses_label_def_and_branch_with_label() {
        let items = parse("loop:\nbeq $t0, $t1, loop\n").unwrap();
        assert!(matches!(items[0], ParseItem::Label { .. }));
        match &items[1] {
            ParseItem::Inst { label, .. } => assert_eq!(label.as_deref(), Some("loop")),
            _ => panic!("expected instruction"),
        }
    }

    #[test]
    fn rejects_missing_operand() {
        assert!(parse("add $t0, $t1\n").is_err());
    }
}
