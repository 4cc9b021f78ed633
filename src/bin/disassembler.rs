use mipsvm::disassembler;
use mipsvm::logging::error;
use std::{env, fs};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <input.obj> <output.asm>", args[0]);
        std::process::exit(1);
    }

    let input_path = &args[1];
    let output_path = &args[2];

    let object_bytes = fs::read(input_path).unwrap_or_else(|e| {
        error(format!("failed to read input file: {e}"));
        std::process::exit(2);
    });

    let asm = disassembler::disassemble_object(&object_bytes).unwrap_or_else(|e| {
        error(e.to_string());
        std::process::exit(3);
    });

    fs::write(output_path, asm).unwrap_or_else(|e| {
        error(format!("failed to write to output file: {e}"));
        std::process::exit(4);
    });
}
