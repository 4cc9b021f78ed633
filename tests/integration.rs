//! End-to-end scenarios run through the full assemble/disassemble/execute
//! pipeline, exercising the library the way the CLI binaries do.

use mipsvm::disassembler;
use mipsvm::emulator::Emulator;
use mipsvm::engine::ExitStatus;
use mipsvm::object::ObjectFile;
use mipsvm::{assembler, decoder};

#[test]
fn single_add_instruction_matches_the_documented_encoding() {
    let bytes = assembler::assemble("add $s0, $a0, $t0\n").unwrap();
    assert_eq!(bytes, b"text:0,data:4,main:0\n\x20\x80\x88\x00");

    let object = ObjectFile::from_bytes(&bytes).unwrap();
    let word = u32::from_le_bytes(object.text[..4].try_into().unwrap());
    assert_eq!(word, 0x0088_8020);

    let text = disassembler::disassemble_object(&bytes).unwrap();
    assert_eq!(text, "add\t$s0, $a0, $t0");
}

#[test]
fn lw_with_base_offset_matches_the_documented_encoding() {
    let bytes = assembler::assemble("lw $s0, 0($t0)\n").unwrap();
    let object = ObjectFile::from_bytes(&bytes).unwrap();
    assert_eq!(object.text, vec![0x00, 0x00, 0x10, 0x8D]);

    let text = disassembler::disassemble_object(&bytes).unwrap();
    assert_eq!(text, "lw\t$s0, 0($t0)");
}

#[test]
fn globl_and_data_segment_produce_the_documented_object_file() {
    let source = "\
.globl main
add $s0, $a0, $t0
main:
lw $s0, 0($t0)
.data
.ascii \"hello, world\"
";
    let bytes = assembler::assemble(source).unwrap();
    let mut expected = b"text:0,data:8,main:4\n".to_vec();
    expected.extend_from_slice(&[0x20, 0x80, 0x88, 0x00, 0x00, 0x00, 0x10, 0x8D]);
    expected.extend_from_slice(b"hello, world");
    assert_eq!(bytes, expected);
}

#[test]
fn hello_world_prints_and_exits_normally() {
    let source = "\
.text
main:
  li $v0, 4
  la $a0, hello
  syscall
  li $v0, 10
  syscall
.data
  hello: .ascii \"Hello, world!\"
  .byte 0x0A, 0
";
    let bytes = assembler::assemble(source).unwrap();
    let mut emu = Emulator::load(&bytes).unwrap();
    let status = emu.run().unwrap();
    assert_eq!(status, ExitStatus::Normal);
}

#[test]
fn li_pseudo_expands_to_lui_then_ori() {
    let bytes = assembler::assemble("li $t0, 0x12345678\nli $v0, 10\nsyscall\n").unwrap();
    let object = ObjectFile::from_bytes(&bytes).unwrap();

    let lui = u32::from_le_bytes(object.text[0..4].try_into().unwrap());
    let ori = u32::from_le_bytes(object.text[4..8].try_into().unwrap());

    let lui_decoded = decoder::decode(lui).unwrap();
    assert_eq!(lui_decoded.name, "lui");
    assert_eq!(lui_decoded.immediate_unsigned, 0x1234);

    let ori_decoded = decoder::decode(ori).unwrap();
    assert_eq!(ori_decoded.name, "ori");
    assert_eq!(ori_decoded.immediate_unsigned, 0x5678);
}

#[test]
fn forward_branch_targets_the_word_after_itself() {
    let source = "\
beq $t0, $t1, target
add $zero, $zero, $zero
target:
add $zero, $zero, $zero
";
    let bytes = assembler::assemble(source).unwrap();
    let object = ObjectFile::from_bytes(&bytes).unwrap();
    let beq = u32::from_le_bytes(object.text[0..4].try_into().unwrap());
    let decoded = decoder::decode(beq).unwrap();
    assert_eq!(decoded.name, "beq");
    assert_eq!(decoded.immediate, 1);
}

#[test]
fn duplicate_label_definitions_are_rejected() {
    let source = "foo:\nadd $zero, $zero, $zero\nfoo:\nadd $zero, $zero, $zero\n";
    assert!(assembler::assemble(source).is_err());
}

#[test]
fn boundary_immediates_around_plus_minus_two_to_the_fifteen() {
    assert!(assembler::assemble("addi $t0, $zero, 32767\n").is_ok());
    assert!(assembler::assemble("addi $t0, $zero, -32768\n").is_ok());
    assert!(assembler::assemble("addi $t0, $zero, 32768\n").is_err());
    assert!(assembler::assemble("addi $t0, $zero, -32769\n").is_err());
}

#[test]
fn shift_amount_boundary_accepts_31_rejects_32() {
    assert!(assembler::assemble("sll $t0, $t1, 31\n").is_ok());
    assert!(assembler::assemble("sll $t0, $t1, 32\n").is_err());
}

#[test]
fn load_sets_pc_to_entry_and_sp_to_stack_top() {
    let bytes = assembler::assemble(".globl main\nli $v0, 10\nmain:\nsyscall\n").unwrap();
    let emu = Emulator::load(&bytes).unwrap();
    assert_eq!(emu.pc(), mipsvm::memory::TEXT_BASE + 8);
    assert_eq!(emu.register("sp"), Some(mipsvm::memory::STACK_TOP));
}

#[test]
fn zero_register_reads_as_zero_after_execution() {
    let bytes = assembler::assemble("addi $zero, $zero, 5\nli $v0, 10\nsyscall\n").unwrap();
    let mut emu = Emulator::load(&bytes).unwrap();
    emu.run().unwrap();
    assert_eq!(emu.register("zero"), Some(0));
}
