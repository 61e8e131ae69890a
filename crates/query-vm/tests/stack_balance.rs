//! Net stack effect of single instructions.
use proptest::prelude::*;
use query_vm::{
    ArithmeticOp, Assembler, CompareOp, Instruction, Register, Value, ValueKind, ValueStacks, Vm,
};

/// Runs `setup` then `instruction` and returns per-stack depth deltas, ordered as
/// [`ValueKind::ALL`].
fn delta(
    setup: Vec<Instruction>,
    instruction: Instruction,
    registers: &[(Register, i64)],
) -> [i64; 5] {
    let steps = setup.len();
    let mut asm = Assembler::new();
    asm.extend(setup);
    asm.emit(instruction);
    asm.emit(Instruction::Exit);
    let mut vm = Vm::new(asm.assemble("out").unwrap());
    for _ in 0..steps {
        vm.step().unwrap();
    }
    for (register, value) in registers {
        vm[*register] = *value;
    }

    let depths = |stacks: &ValueStacks| stacks.depths().map(|d| d as i64);
    let before = depths(vm.current().stacks());
    vm.step().unwrap();
    let after = depths(vm.current().stacks());
    std::array::from_fn(|idx| after[idx] - before[idx])
}

const BOOL: usize = 0;
const INT: usize = 1;
const TEXT: usize = 3;

proptest! {
    #[test]
    fn contains_pops_k_plus_one_and_pushes_one_bool(
        candidates in proptest::collection::vec(-5i64..5, 0..8),
        needle in -5i64..5,
        below in 0usize..3,
    ) {
        let mut setup: Vec<Instruction> = (0..below).map(|_| Instruction::push(99)).collect();
        setup.extend(candidates.iter().map(|&c| Instruction::push(c)));
        setup.push(Instruction::push(needle));

        let k = candidates.len() as i64;
        let d = delta(
            setup,
            Instruction::Contains { register: Register::R2, kind: ValueKind::Int },
            &[(Register::R2, k)],
        );
        prop_assert_eq!(d[INT], -(k + 1));
        prop_assert_eq!(d[BOOL], 1);
    }
}

#[test]
fn binary_operators_replace_two_operands_with_one_result() {
    let ints = || vec![Instruction::push(6), Instruction::push(3)];
    for op in [
        ArithmeticOp::Add,
        ArithmeticOp::Sub,
        ArithmeticOp::Mul,
        ArithmeticOp::Div,
        ArithmeticOp::Mod,
    ] {
        let d = delta(
            ints(),
            Instruction::Arithmetic {
                kind: ValueKind::Int,
                op,
            },
            &[],
        );
        assert_eq!(d, [0, -1, 0, 0, 0], "{op:?}");
    }
    for op in [CompareOp::Eq, CompareOp::Lt, CompareOp::Ge] {
        let d = delta(
            ints(),
            Instruction::Compare {
                kind: ValueKind::Int,
                op,
            },
            &[],
        );
        assert_eq!(d, [1, -2, 0, 0, 0], "{op:?}");
    }
}

#[test]
fn create_group_identifier_adds_one_identifier_per_level() {
    let d = delta(
        vec![Instruction::push("PL"), Instruction::push(7), Instruction::push(true)],
        Instruction::CreateGroupIdentifier {
            kinds: vec![ValueKind::Text, ValueKind::Int, ValueKind::Bool],
        },
        &[],
    );
    assert_eq!(d[TEXT], 3);
    assert_eq!(d[INT], 0);
    assert_eq!(d[BOOL], 0);
}

#[test]
fn grab_row_folds_typed_values_into_one_object() {
    let d = delta(
        vec![
            Instruction::push("a"),
            Instruction::push(1),
            Instruction::push(Value::Null),
        ],
        Instruction::GrabRow {
            kinds: vec![ValueKind::Text, ValueKind::Int, ValueKind::Object],
        },
        &[],
    );
    assert_eq!(d, [0, -1, 0, -1, 0]);
}

#[test]
#[should_panic(expected = "stack underflow")]
fn popping_an_empty_stack_panics() {
    delta(
        Vec::new(),
        Instruction::Pop {
            kind: ValueKind::Decimal,
        },
        &[],
    );
}
