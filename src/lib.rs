//! A toolchain for 32-bit little-endian MIPS, featuring:
//! - an assembler (lexer, parser, label resolution, pseudo-instruction
//!   expansion, encoder, object file writer)
//! - a disassembler
//! - an emulator

pub mod tables;
pub mod lexer;
pub mod parser;
pub mod label;
pub mod pseudo;
pub mod encoder;
pub mod object;
pub mod decoder;
pub mod memory;
pub mod registers;
pub mod engine;
pub mod assembler;
pub mod disassembler;
pub mod emulator;
pub mod logging;
