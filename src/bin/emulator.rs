use mipsvm::emulator::{Emulator, StepOutcome};
use mipsvm::logging::error;
use mipsvm::{assembler, disassembler};
use std::{env, fs};

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} run <object.obj>");
    eprintln!("       {program} assemble-and-run <input.asm>");
    eprintln!("       {program} step <object.obj> <count>");
    std::process::exit(1);
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
    }

    match args[1].as_str() {
        "run" if args.len() == 3 => run(&args[2]),
        "assemble-and-run" if args.len() == 3 => assemble_and_run(&args[2]),
        "step" if args.len() == 4 => step(&args[2], &args[3]),
        _ => usage(&args[0]),
    }
}

fn load_object(path: &str) -> Vec<u8> {
    fs::read(path).unwrap_or_else(|e| {
        error(format!("failed to read object file: {e}"));
        std::process::exit(2);
    })
}

fn run(object_path: &str) {
    let bytes = load_object(object_path);
    let mut emu = Emulator::load(&bytes).unwrap_or_else(|e| {
        error(e.to_string());
        std::process::exit(3);
    });
    emu.run().unwrap_or_else(|e| {
        error(e.to_string());
        std::process::exit(4);
    });
}

fn assemble_and_run(source_path: &str) {
    let source = fs::read_to_string(source_path).unwrap_or_else(|e| {
        error(format!("failed to read input file: {e}"));
        std::process::exit(2);
    });
    let bytes = assembler::assemble(&source).unwrap_or_else(|e| {
        error(e.to_string());
        std::process::exit(3);
    });
    let mut emu = Emulator::load(&bytes).unwrap_or_else(|e| {
        error(e.to_string());
        std::process::exit(4);
    });
    emu.run().unwrap_or_else(|e| {
        error(e.to_string());
        std::process::exit(5);
    });
}

/// Runs a fixed number of steps, printing a disassembled trace line and
/// the resulting `$pc` after each one. A full interactive debugger with
/// history and breakpoints is out of scope; this is a batch substitute.
fn step(object_path: &str, count: &str) {
    let bytes = load_object(object_path);
    let mut emu = Emulator::load(&bytes).unwrap_or_else(|e| {
        error(e.to_string());
        std::process::exit(3);
    });
    let count: u32 = count.parse().unwrap_or_else(|_| {
        error(format!("invalid step count: {count}"));
        std::process::exit(4);
    });

    for _ in 0..count {
        let pc = emu.pc();
        let word = emu.read_memory_word(pc).unwrap_or_else(|e| {
            error(e.to_string());
            std::process::exit(5);
        });
        let text = disassembler::disassemble_word(word).unwrap_or_else(|_| "?".to_string());
        println!("{pc:#010x}: {text}");

        match emu.step() {
            Ok(StepOutcome::Running) => continue,
            Ok(StepOutcome::Exited(status)) => {
                println!("exited: {status:?}");
                break;
            }
            Err(e) => {
                error(e.to_string());
                std::process::exit(6);
            }
        }
    }
}
