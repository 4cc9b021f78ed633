//! Streaming lexer: turns source text into a flat token sequence.
//!
//! Structured as a function-pointer state machine, one state per
//! lexical context (inline code, comment, identifier, number, register,
//! string, byte literal, directive, end of line) — the same shape as a
//! hand-rolled recursive-descent scanner, just represented as data so a
//! state can return "go to this state next" instead of calling itself.
//! The original implementation ran this as a goroutine feeding a channel;
//! here it is a pull-based `Iterator`, which is the natural translation
//! for a language without lightweight coroutines.

use crate::tables::instruction_table;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Instruction,
    Integer,
    Register,
    Comma,
    Colon,
    Byte,
    String,
    Directive,
    LeftParen,
    RightParen,
    Label,
    LabelDef,
    Endline,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub line: usize,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line + 1, self.message)
    }
}

impl std::error::Error for LexError {}

type StateFn = fn(&mut Lexer) -> Option<StateResult>;

enum StateResult {
    Next(StateFn),
    Done,
}

/// Pull-based lexer over a source string. Implements `Iterator<Item =
/// Result<Token, LexError>>`; the first `Err` (or the terminating `Ok`
/// with `TokenKind::Eof`) ends the stream.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    buf: String,
    line: usize,
    done: bool,
    pending: Vec<Result<Token, LexError>>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer { chars: source.chars().peekable(), buf: String::new(), line: 0, done: false, pending: Vec::new() }
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.next();
        if let Some(c) = c {
            self.buf.push(c);
        }
        c
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn ignore(&mut self) {
        self.buf.clear();
    }

    fn emit(&mut self, kind: TokenKind) {
        let text = std::mem::take(&mut self.buf);
        self.pending.push(Ok(Token { kind, text, line: self.line }));
    }

    fn errorf(&mut self, message: impl Into<String>) -> Option<StateResult> {
        self.pending.push(Err(LexError { message: message.into(), line: self.line }));
        None
    }

    fn accept(&mut self, valid: &str) -> bool {
        if let Some(c) = self.peek_char() {
            if valid.contains(c) {
                self.next_char();
                return true;
            }
        }
        false
    }

    fn accept_run(&mut self, valid: &str) {
        while self.accept(valid) {}
    }
}

fn is_letter(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_letter_digit(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_print_byte(c: char) -> bool {
    (c as u32) >= 0x20 && (c as u32) <= 0x7e
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop() {
                return Some(item);
            }
            if self.done {
                return None;
            }
            let mut state: StateFn = lex_inline;
            loop {
                match state(self) {
                    Some(StateResult::Next(next)) => state = next,
                    Some(StateResult::Done) | None => break,
                }
                if !self.pending.is_empty() {
                    break;
                }
            }
            if self.pending.is_empty() {
                self.done = true;
            }
        }
    }
}

fn lex_inline(l: &mut Lexer) -> Option<StateResult> {
    loop {
        match l.peek_char() {
            None => return Some(StateResult::Next(lex_endline)),
            Some('\n') => return Some(StateResult::Next(lex_endline)),
            Some('#') => return Some(StateResult::Next(lex_comment)),
            Some('-') | Some('+') => return Some(StateResult::Next(lex_number)),
            Some('$') => return Some(StateResult::Next(lex_register)),
            Some('.') => return Some(StateResult::Next(lex_directive)),
            Some('\'') => return Some(StateResult::Next(lex_byte)),
            Some('"') => return Some(StateResult::Next(lex_string)),
            Some(',') => {
                l.next_char();
                l.emit(TokenKind::Comma);
                return Some(StateResult::Next(lex_inline));
            }
            Some(':') => {
                l.next_char();
                l.emit(TokenKind::Colon);
                return Some(StateResult::Next(lex_inline));
            }
            Some('(') => {
                l.next_char();
                l.emit(TokenKind::LeftParen);
                return Some(StateResult::Next(lex_inline));
            }
            Some(')') => {
                l.next_char();
                l.emit(TokenKind::RightParen);
                return Some(StateResult::Next(lex_inline));
            }
            Some(c) if is_letter(c) => return Some(StateResult::Next(lex_identifier)),
            Some(c) if c.is_whitespace() => {
                l.next_char();
                l.ignore();
            }
            Some(c) if c.is_ascii_digit() => return Some(StateResult::Next(lex_number)),
            Some(_) => {
                let cur = l.buf.clone();
                return l.errorf(format!("bad syntax: {cur:?}"));
            }
        }
    }
}

fn lex_comment(l: &mut Lexer) -> Option<StateResult> {
    loop {
        match l.next_char() {
            Some('\n') | None => break,
            _ => {}
        }
    }
    l.ignore();
    Some(StateResult::Next(lex_endline))
}

fn lex_endline(l: &mut Lexer) -> Option<StateResult> {
    match l.next_char() {
        None => {
            l.emit(TokenKind::Eof);
            None
        }
        Some('\n') => {
            l.emit(TokenKind::Endline);
            l.line += 1;
            Some(StateResult::Next(lex_inline))
        }
        Some(_) => {
            let cur = l.buf.clone();
            l.errorf(format!("state error at {cur:?}"))
        }
    }
}

fn lex_identifier(l: &mut Lexer) -> Option<StateResult> {
    let mut c;
    loop {
        c = l.peek_char();
        match c {
            Some(ch) if is_letter_digit(ch) => {
                l.next_char();
            }
            _ => break,
        }
    }
    match c {
        Some(ch) if ch.is_whitespace() || ch == '#' => {
            if instruction_table().contains_key(l.buf.as_str()) {
                l.emit(TokenKind::Instruction);
            } else {
                l.emit(TokenKind::Label);
            }
        }
        None => {
            if instruction_table().contains_key(l.buf.as_str()) {
                l.emit(TokenKind::Instruction);
            } else {
                l.emit(TokenKind::Label);
            }
        }
        Some(':') => {
            l.emit(TokenKind::LabelDef);
            l.next_char();
            l.ignore();
        }
        Some(_) => {
            l.next_char();
            let cur = l.buf.clone();
            return l.errorf(format!("invalid identifier {cur:?}"));
        }
    }
    Some(StateResult::Next(lex_inline))
}

fn lex_number(l: &mut Lexer) -> Option<StateResult> {
    l.accept("+-");
    let mut digits = "0123456789";
    if l.accept("0") && l.accept("xX") {
        digits = "0123456789abcdefABCDEF";
    }
    l.accept_run(digits);
    l.emit(TokenKind::Integer);
    Some(StateResult::Next(lex_inline))
}

fn lex_register(l: &mut Lexer) -> Option<StateResult> {
    l.next_char(); // '$'
    loop {
        match l.peek_char() {
            Some(c) if is_letter_digit(c) => {
                l.next_char();
            }
            _ => break,
        }
    }
    if crate::tables::register_index(&l.buf[1..]).is_some() {
        l.emit(TokenKind::Register);
        Some(StateResult::Next(lex_inline))
    } else {
        let cur = l.buf.clone();
        l.errorf(format!("invalid register name: {cur:?}"))
    }
}

fn lex_string(l: &mut Lexer) -> Option<StateResult> {
    l.next_char(); // opening '"'
    l.ignore();
    let mut c;
    loop {
        c = l.next_char();
        match c {
            Some('"') => break,
            Some(ch) if is_print_byte(ch) => {}
            _ => {
                let cur = l.buf.clone();
                return l.errorf(format!("bad string syntax: {cur:?}, expect \""));
            }
        }
    }
    // drop trailing quote from the emitted text
    l.buf.pop();
    l.emit(TokenKind::String);
    Some(StateResult::Next(lex_inline))
}

fn lex_byte(l: &mut Lexer) -> Option<StateResult> {
    l.next_char(); // opening '\''
    l.ignore();
    let c = l.next_char();
    match c {
        Some(ch) if ch != '\'' && is_print_byte(ch) => {}
        _ => {
            let cur = l.buf.clone();
            return l.errorf(format!("invalid byte: {cur:?}"));
        }
    }
    match l.next_char() {
        Some('\'') => {
            l.buf.pop();
            l.emit(TokenKind::Byte);
            Some(StateResult::Next(lex_inline))
        }
        _ => {
            let cur = l.buf.clone();
            l.errorf(format!("bad byte syntax: {cur:?}, expect '"))
        }
    }
}

fn lex_directive(l: &mut Lexer) -> Option<StateResult> {
    l.next_char(); // leading '.'
    l.ignore();
    match l.peek_char() {
        Some(c) if is_letter(c) => {}
        _ => {
            let cur = l.buf.clone();
            return l.errorf(format!("invalid directive {cur:?}, must start with a letter"));
        }
    }
    let mut c;
    loop {
        c = l.peek_char();
        match c {
            Some(ch) if is_letter_digit(ch) => {
                l.next_char();
            }
            _ => break,
        }
    }
    match c {
        Some(ch) if ch.is_whitespace() || ch == '#' => l.emit(TokenKind::Directive),
        None => l.emit(TokenKind::Directive),
        Some(_) => {
            l.next_char();
            let cur = l.buf.clone();
            return l.errorf(format!("invalid directive syntax: {cur:?}"));
        }
    }
    Some(StateResult::Next(lex_inline))
}
