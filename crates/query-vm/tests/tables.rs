use pretty_assertions::assert_eq;
use query_vm::{
    Assembler, ColumnSpec, InMemorySource, Instruction, Program, Value, ValueKind, Vm, VmError,
};

fn customers() -> InMemorySource {
    InMemorySource::new(["Id", "Name"]).with_rows([
        vec![Value::Int(1), Value::from("Ann")],
        vec![Value::Int(2), Value::from("Bob")],
    ])
}

fn orders() -> InMemorySource {
    InMemorySource::new(["OrderId", "CustomerId"]).with_rows([
        vec![Value::Int(10), Value::Int(1)],
        vec![Value::Int(11), Value::Int(3)],
        vec![Value::Int(12), Value::Int(2)],
        vec![Value::Int(13), Value::Int(1)],
    ])
}

/// Emits a scan over the top source: `body` runs once per row.
fn scan(asm: &mut Assembler, name: &str, body: impl FnOnce(&mut Assembler)) {
    let top = asm.label(&format!("{name}_top"));
    let done = asm.label(&format!("{name}_done"));
    asm.emit(Instruction::GrabFirstValueFromSource { end: done.into() });
    asm.mark(top).unwrap();
    body(asm);
    asm.extend([
        Instruction::MoveToAnotherValueFromSource,
        Instruction::JmpState {
            target: top.into(),
            expected: true,
        },
    ]);
    asm.mark(done).unwrap();
    asm.emit(Instruction::PopSource);
}

/// `SELECT o.OrderId, o.CustomerId FROM orders o WHERE o.CustomerId IN (SELECT Id FROM customers)`
fn semi_join(keep_matches: bool) -> Program {
    let mut asm = Assembler::new();
    asm.extend([
        Instruction::LoadTable {
            name: "customers_by_id".into(),
            columns: vec![
                ColumnSpec::new("Id", ValueKind::Int),
                ColumnSpec::new("Name", ValueKind::Text),
            ],
            key: vec!["Id".into()],
        },
        Instruction::load_source("customers", customers()),
    ]);
    scan(&mut asm, "customers", |asm| {
        asm.extend([
            Instruction::access_column("Id", ValueKind::Int),
            Instruction::access_column("Name", ValueKind::Text),
            Instruction::GrabRow {
                kinds: vec![ValueKind::Int, ValueKind::Text],
            },
            Instruction::AddNewRow {
                table: "customers_by_id".into(),
            },
        ]);
    });

    asm.extend([
        Instruction::InitializeTable {
            name: "out".into(),
            columns: vec![
                ColumnSpec::new("OrderId", ValueKind::Int),
                ColumnSpec::new("CustomerId", ValueKind::Int),
            ],
        },
        Instruction::load_source("orders", orders()),
    ]);
    scan(&mut asm, "orders", |asm| {
        let keep = asm.label("keep");
        let next = asm.label("next");
        asm.extend([
            Instruction::access_column("OrderId", ValueKind::Int),
            Instruction::access_column("CustomerId", ValueKind::Int),
            Instruction::GrabRow {
                kinds: vec![ValueKind::Int, ValueKind::Int],
            },
            Instruction::CheckTableHasKey {
                table: "customers_by_id".into(),
                ordinals: vec![1],
                expected: keep_matches,
            },
            Instruction::JmpState {
                target: keep.into(),
                expected: true,
            },
            Instruction::Pop {
                kind: ValueKind::Object,
            },
            Instruction::Jmp {
                target: next.into(),
            },
        ]);
        asm.mark(keep).unwrap();
        asm.emit(Instruction::AddNewRow {
            table: "out".into(),
        });
        asm.mark(next).unwrap();
    });
    asm.emit(Instruction::Exit);
    asm.assemble("out").unwrap()
}

fn order_ids(table: &query_vm::Table) -> Vec<i64> {
    (0..table.row_count())
        .filter_map(|row| table.value(row, "OrderId").and_then(Value::as_int))
        .collect()
}

#[test]
fn semi_join_keeps_rows_with_a_matching_key() {
    let mut vm = Vm::new(semi_join(true));
    let table = vm.run().unwrap();
    assert_eq!(order_ids(&table), vec![10, 12, 13]);
    assert!(vm.current().stacks().is_empty());
    assert_eq!(vm.current().table("customers_by_id").unwrap().row_count(), 2);
}

#[test]
fn anti_join_keeps_rows_without_a_match() {
    let table = Vm::new(semi_join(false)).run().unwrap();
    assert_eq!(order_ids(&table), vec![11]);
}

#[test]
fn intermediate_tables_can_be_rescanned_and_renamed() {
    let mut asm = Assembler::new();
    let columns = vec![
        ColumnSpec::new("Id", ValueKind::Int),
        ColumnSpec::new("Name", ValueKind::Text),
    ];
    asm.extend([
        Instruction::InitializeTable {
            name: "staging".into(),
            columns: columns.clone(),
        },
        Instruction::load_source("customers", customers()),
    ]);
    scan(&mut asm, "load", |asm| {
        asm.extend([
            Instruction::access_column("Id", ValueKind::Int),
            Instruction::access_column("Name", ValueKind::Text),
            Instruction::GrabRow {
                kinds: vec![ValueKind::Int, ValueKind::Text],
            },
            Instruction::AddNewRow {
                table: "staging".into(),
            },
        ]);
    });

    // Re-read the staging table under qualified names and copy names only.
    asm.extend([
        Instruction::InitializeTable {
            name: "names".into(),
            columns: vec![ColumnSpec::new("Name", ValueKind::Text)],
        },
        Instruction::UseTableAsSourceRemapped {
            table: "staging".into(),
            columns: vec![("c.Name".into(), 1)],
        },
    ]);
    scan(&mut asm, "copy", |asm| {
        asm.extend([
            Instruction::access_column("c.Name", ValueKind::Text),
            Instruction::GrabRow {
                kinds: vec![ValueKind::Text],
            },
            Instruction::AddNewRow {
                table: "names".into(),
            },
        ]);
    });
    asm.extend([
        Instruction::RenameTable {
            from: "names".into(),
            to: "result".into(),
        },
        Instruction::Exit,
    ]);

    let mut vm = Vm::new(asm.assemble("result").unwrap());
    let table = vm.run().unwrap();
    assert_eq!(table.name(), "result");
    assert_eq!(
        table.row_values(1),
        Some(&[Value::from("Bob")][..])
    );
    assert!(vm.current().table("names").is_none());
    assert_eq!(vm.current().table("staging").unwrap().row_count(), 2);
}

#[test]
fn appending_to_a_missing_table_fails() {
    let mut asm = Assembler::new();
    asm.extend([
        Instruction::push(1),
        Instruction::GrabRow {
            kinds: vec![ValueKind::Int],
        },
        Instruction::AddNewRow {
            table: "nowhere".into(),
        },
        Instruction::Exit,
    ]);
    let err = Vm::new(asm.assemble("nowhere").unwrap()).run().unwrap_err();
    assert_eq!(err.ip, 2);
    assert!(matches!(err.source, VmError::UnknownTable(ref name) if name == "nowhere"));
}
