use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use query_vm::{
    Assembler, ColumnSpec, CompareOp, GroupField, InMemorySource, Instruction, Program, Value,
    ValueKind, Vm,
};
use std::sync::Arc;

fn source(rows: usize) -> InMemorySource {
    let cities = ["WARSAW", "KRAKOW", "LONDON", "LEEDS", "PARIS"];
    InMemorySource::new(["Country", "City", "Amount"]).with_rows((0..rows).map(|idx| {
        let city = cities[idx % cities.len()];
        let country = match city {
            "WARSAW" | "KRAKOW" => "PL",
            "LONDON" | "LEEDS" => "UK",
            _ => "FR",
        };
        vec![
            Value::from(country),
            Value::from(city),
            Value::Int((idx % 100) as i64),
        ]
    }))
}

fn scan_program(source: InMemorySource, body: impl FnOnce(&mut Assembler)) -> Program {
    let mut asm = Assembler::new();
    let top = asm.label("top");
    let done = asm.label("done");
    asm.extend([
        Instruction::InitializeTable {
            name: "out".into(),
            columns: vec![
                ColumnSpec::new("Country", ValueKind::Text),
                ColumnSpec::new("City", ValueKind::Text),
            ],
        },
        Instruction::load_source("sales", source),
        Instruction::GrabFirstValueFromSource { end: done.into() },
    ]);
    asm.mark(top).unwrap();
    body(&mut asm);
    asm.extend([
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

fn group_by(rows: usize) -> Program {
    scan_program(source(rows), |asm| {
        asm.extend([
            Instruction::access_column("Country", ValueKind::Text),
            Instruction::access_column("City", ValueKind::Text),
            Instruction::CreateGroupIdentifier {
                kinds: vec![ValueKind::Text, ValueKind::Text],
            },
            Instruction::AccessGroup {
                fields: vec![
                    GroupField::new("Country", ValueKind::Text),
                    GroupField::new("City", ValueKind::Text),
                ],
            },
            Instruction::AddNewGroup {
                table: "out".into(),
                columns: Arc::from(vec![(0, "Country".to_string()), (1, "City".to_string())]),
            },
        ]);
    })
}

fn like_filter(rows: usize) -> Program {
    scan_program(source(rows), |asm| {
        let skip = asm.label("skip");
        asm.extend([
            Instruction::access_column("City", ValueKind::Text),
            Instruction::push("L%S"),
            Instruction::Like,
            Instruction::access_column("Amount", ValueKind::Int),
            Instruction::push(50),
            Instruction::Compare {
                kind: ValueKind::Int,
                op: CompareOp::Lt,
            },
            Instruction::And,
            Instruction::JmpState {
                target: skip.into(),
                expected: false,
            },
            Instruction::access_column("Country", ValueKind::Text),
            Instruction::access_column("City", ValueKind::Text),
            Instruction::GrabRow {
                kinds: vec![ValueKind::Text, ValueKind::Text],
            },
            Instruction::AddNewRow { table: "out".into() },
        ]);
        asm.mark(skip).unwrap();
    })
}

fn bench_vm(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm");
    for rows in [1_000usize, 10_000] {
        group.throughput(Throughput::Elements(rows as u64));

        let program = Arc::new(group_by(rows));
        group.bench_with_input(BenchmarkId::new("group_by", rows), &program, |b, program| {
            b.iter(|| {
                let table = Vm::new(Arc::clone(program)).run().unwrap();
                black_box(table.row_count())
            })
        });

        let program = Arc::new(like_filter(rows));
        group.bench_with_input(BenchmarkId::new("like_filter", rows), &program, |b, program| {
            b.iter(|| {
                let table = Vm::new(Arc::clone(program)).run().unwrap();
                black_box(table.row_count())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_vm);
criterion_main!(benches);
