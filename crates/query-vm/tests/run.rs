use pretty_assertions::assert_eq;
use query_vm::source::{RowIter, SourceRowRef};
use query_vm::{
    Assembler, CancellationToken, ColumnSpec, Hop, InMemorySource, Instruction, Program,
    RowSource, Value, ValueKind, Vm, VmError, VmOptions,
};
use std::sync::Arc;

/// Wraps a source and fires `token` once `after` rows have been handed out.
#[derive(Debug)]
struct CancellingSource {
    inner: InMemorySource,
    token: CancellationToken,
    after: usize,
}

impl RowSource for CancellingSource {
    fn open(&self) -> RowIter {
        let token = self.token.clone();
        let after = self.after;
        Box::new(
            self.inner
                .open()
                .enumerate()
                .map(move |(idx, row): (usize, SourceRowRef)| {
                    if idx + 1 >= after {
                        token.cancel();
                    }
                    row
                }),
        )
    }
}

fn copy_program(source: impl RowSource + 'static) -> Program {
    let mut asm = Assembler::new();
    let top = asm.label("top");
    let done = asm.label("done");
    asm.extend([
        Instruction::InitializeTable {
            name: "out".into(),
            columns: vec![ColumnSpec::new("n", ValueKind::Int)],
        },
        Instruction::load_source("numbers", source),
        Instruction::GrabFirstValueFromSource { end: done.into() },
    ]);
    asm.mark(top).unwrap();
    asm.extend([
        Instruction::access_column("n", ValueKind::Int),
        Instruction::GrabRow {
            kinds: vec![ValueKind::Int],
        },
        Instruction::AddNewRow { table: "out".into() },
        Instruction::MoveToAnotherValueFromSource,
        Instruction::JmpState {
            target: top.into(),
            expected: true,
        },
    ]);
    asm.mark(done).unwrap();
    asm.extend([Instruction::PopSource, Instruction::Exit]);
    asm.assemble("out").unwrap()
}

fn numbers(count: i64) -> InMemorySource {
    InMemorySource::new(["n"]).with_rows((0..count).map(|n| vec![Value::Int(n)]))
}

#[test]
fn cancellation_returns_the_rows_produced_so_far() {
    let token = CancellationToken::new();
    let source = CancellingSource {
        inner: numbers(100),
        token: token.clone(),
        after: 3,
    };
    let mut vm = Vm::new(copy_program(source)).with_cancellation(token);
    let table = vm.run().unwrap();

    // The third row is fetched by the instruction that fires the token; nothing after it runs.
    assert_eq!(table.row_count(), 2);
    assert!(vm.stats().cancelled);
    assert!(!vm.step().unwrap());
}

#[test]
fn programs_are_shared_between_runs() {
    let program = Arc::new(copy_program(numbers(4)));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let program = Arc::clone(&program);
            std::thread::spawn(move || Vm::new(program).run().map(|t| t.row_count()))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 4);
    }
}

#[test]
fn options_deserialize_with_defaults() {
    let options: VmOptions = serde_json::from_str(r#"{"max_instructions": 10}"#).unwrap();
    assert_eq!(
        options,
        VmOptions {
            max_instructions: Some(10),
            ..VmOptions::default()
        }
    );

    let json = serde_json::to_value(VmOptions::default()).unwrap();
    assert_eq!(json["stack_capacity"], 64);
    assert_eq!(json["like_cache_capacity"], 256);
    assert_eq!(json["trace_instructions"], false);
}

#[test]
fn instruction_budget_stops_runaway_programs() {
    let mut asm = Assembler::new();
    let spin = asm.label("spin");
    asm.mark(spin).unwrap();
    asm.emit(Instruction::Jmp {
        target: spin.into(),
    });
    let options = VmOptions::default().with_max_instructions(1_000);
    let err = Vm::with_options(asm.assemble("out").unwrap(), options)
        .run()
        .unwrap_err();
    assert!(matches!(err.source, VmError::InstructionBudgetExceeded(1_000)));
    assert_eq!(err.instruction, "JMP @0");
}

#[test]
fn column_kind_violations_name_the_column() {
    let source = InMemorySource::new(["n"]).with_rows([vec![Value::from("seven")]]);
    let err = Vm::new(copy_program(source)).run().unwrap_err();
    assert_eq!(err.instruction, "ACCESS_COLUMN n Int64");
    match err.source {
        VmError::ColumnTypeMismatch {
            column,
            expected,
            found,
        } => {
            assert_eq!(column, "n");
            assert_eq!(expected, ValueKind::Int);
            assert_eq!(found, ValueKind::Text);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn null_is_only_accepted_by_object_columns() {
    let source = InMemorySource::new(["n"]).with_rows([vec![Value::Null]]);
    let err = Vm::new(copy_program(source)).run().unwrap_err();
    assert!(matches!(
        err.source,
        VmError::ColumnTypeMismatch {
            found: ValueKind::Object,
            ..
        }
    ));
}

#[test]
fn call_chains_read_nested_records() {
    let customer = Value::record([(
        "address",
        Value::list([Value::record([("zip", Value::from("00-001"))])]),
    )]);
    let source = InMemorySource::new(["customer"]).with_rows([vec![customer]]);

    let mut asm = Assembler::new();
    asm.extend([
        Instruction::load_source("customers", source),
        Instruction::MoveToAnotherValueFromSource,
        Instruction::Pop {
            kind: ValueKind::Bool,
        },
        Instruction::AccessColumnNumeric { ordinal: 0 },
        Instruction::AccessCallChain {
            chain: vec![
                Hop::Property("address".into()),
                Hop::Index(0),
                Hop::Key(Value::from("zip")),
            ],
            kind: ValueKind::Text,
        },
        Instruction::AccessColumnNumeric { ordinal: 0 },
        Instruction::AccessCallChain {
            chain: vec![Hop::Property("address".into()), Hop::Index(3)],
            kind: ValueKind::Object,
        },
        Instruction::Exit,
    ]);
    let mut vm = Vm::new(asm.assemble("out").unwrap());
    assert!(vm.step().unwrap());
    while vm.current().registers().ip() < 6 {
        vm.step().unwrap();
    }
    assert_eq!(vm.current_mut().stacks_mut().pop_text(), "00-001");

    let err = vm.step().unwrap_err();
    assert!(matches!(
        err.source,
        VmError::PropertyAccess { ref path, .. } if path == ".address[3]"
    ));
}
