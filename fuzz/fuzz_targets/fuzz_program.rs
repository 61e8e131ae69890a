#![no_main]

use libfuzzer_sys::fuzz_target;
use query_vm::{Assembler, Instruction, Register, Target, Vm, VmOptions};

const MAX_INSTRUCTIONS: usize = 256;

/// Decodes one instruction from the stack-neutral subset (nothing here pops), so every run either
/// halts, fails with an error or exhausts its budget.
fn decode(asm: &mut Assembler, op: u8, arg: u8) -> Instruction {
    let label = |asm: &mut Assembler| -> Target { asm.label(&format!("l{}", arg % 8)).into() };
    match op % 8 {
        0 => Instruction::push(i64::from(arg)),
        1 => Instruction::push(format!("s{arg}")),
        2 => Instruction::Jmp { target: label(asm) },
        3 => Instruction::GoTo {
            index: usize::from(arg),
        },
        4 => Instruction::Skip {
            offset: i64::from(arg as i8),
        },
        5 => Instruction::SetRegister {
            register: Register::R0,
            value: i64::from(arg),
        },
        6 => Instruction::CheckTableRowsAmount {
            limit: u64::from(arg % 4),
            end: label(asm),
        },
        _ => Instruction::Exit,
    }
}

fuzz_target!(|data: &[u8]| {
    let mut asm = Assembler::new();
    for chunk in data.chunks_exact(2).take(MAX_INSTRUCTIONS) {
        if chunk[0] & 0x80 != 0 {
            let label = asm.label(&format!("l{}", chunk[1] % 8));
            // Marking twice is an assembly error, not a crash.
            let _ = asm.mark(label);
        }
        let instruction = decode(&mut asm, chunk[0], chunk[1]);
        asm.emit(instruction);
    }
    asm.emit(Instruction::Exit);

    let Ok(program) = asm.assemble("out") else {
        return;
    };
    let options = VmOptions::default().with_max_instructions(10_000);
    let mut vm = Vm::with_options(program, options);
    while let Ok(true) = vm.step() {}
});
