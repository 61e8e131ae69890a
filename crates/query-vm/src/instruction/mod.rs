//! The instruction set.
//!
//! An [`Instruction`] is a tagged union; operands that select a typed stack carry their
//! [`ValueKind`] so routing is decided when the program is built. Every instruction advances
//! `Ip` itself unless it jumps or halts.
use crate::assembler::{MethodId, Program, Target};
use crate::context::ExecutionContext;
use crate::error::VmResult;
use crate::register::Register;
use crate::source::RowSource;
use crate::table::ColumnSpec;
use crate::value::{Value, ValueKind};
use std::fmt;
use std::sync::Arc;

mod calls;
mod control;
mod data;
mod grouping;
mod pattern;
mod scalar;
mod table_ops;

pub use data::resolve_chain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "EQ",
            CompareOp::Ne => "NE",
            CompareOp::Lt => "LT",
            CompareOp::Le => "LE",
            CompareOp::Gt => "GT",
            CompareOp::Ge => "GE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithmeticOp {
    pub fn as_str(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "ADD",
            ArithmeticOp::Sub => "SUB",
            ArithmeticOp::Mul => "MUL",
            ArithmeticOp::Div => "DIV",
            ArithmeticOp::Mod => "MOD",
        }
    }
}

/// One step of a property/indexer chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Hop {
    /// Named property of a record or source row. Missing properties are errors.
    Property(String),
    /// Positional element of a list (or character of a text).
    Index(i64),
    /// Single-argument indexer; absent keys yield `null`.
    Key(Value),
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hop::Property(name) => write!(f, ".{name}"),
            Hop::Index(idx) => write!(f, "[{idx}]"),
            Hop::Key(Value::Text(key)) => write!(f, "[{key:?}]"),
            Hop::Key(key) => write!(f, "[{key}]"),
        }
    }
}

/// A GROUP BY field as seen by `AccessGroup`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupField {
    pub name: String,
    pub kind: ValueKind,
}

impl GroupField {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Instruction {
    Push {
        kind: ValueKind,
        value: Value,
    },
    Pop {
        kind: ValueKind,
    },
    SetRegister {
        register: Register,
        value: i64,
    },

    And,
    Or,
    Not,
    Compare {
        kind: ValueKind,
        op: CompareOp,
    },
    Arithmetic {
        kind: ValueKind,
        op: ArithmeticOp,
    },

    AccessColumn {
        name: String,
        kind: ValueKind,
    },
    AccessColumnNumeric {
        ordinal: usize,
    },
    AccessProperty {
        property: String,
        kind: ValueKind,
    },
    AccessCallChain {
        chain: Vec<Hop>,
        kind: ValueKind,
    },

    AccessGroup {
        fields: Vec<GroupField>,
    },
    CreateGroupIdentifier {
        kinds: Vec<ValueKind>,
    },
    /// Appends a row backed by the current group; `columns` maps column ordinals to group
    /// field or aggregate names.
    AddNewGroup {
        table: String,
        columns: Arc<[(usize, String)]>,
    },

    LoadSource {
        name: String,
        source: Arc<dyn RowSource>,
    },
    UseTableAsSource {
        table: String,
    },
    UseTableAsSourceRemapped {
        table: String,
        columns: Vec<(String, usize)>,
    },
    PopSource,
    GrabFirstValueFromSource {
        end: Target,
    },
    MoveToAnotherValueFromSource,
    LoadTable {
        name: String,
        columns: Vec<ColumnSpec>,
        key: Vec<String>,
    },
    InitializeTable {
        name: String,
        columns: Vec<ColumnSpec>,
    },
    CheckTableHasKey {
        table: String,
        ordinals: Vec<usize>,
        expected: bool,
    },
    GrabRow {
        kinds: Vec<ValueKind>,
    },
    AddNewRow {
        table: String,
    },
    RenameTable {
        from: String,
        to: String,
    },

    PrepareMethodCall {
        method: MethodId,
    },
    Call {
        method: MethodId,
        arg_count: usize,
    },

    Contains {
        register: Register,
        kind: ValueKind,
    },
    Like,

    Jmp {
        target: Target,
    },
    JmpState {
        target: Target,
        expected: bool,
    },
    GoTo {
        index: usize,
    },
    Skip {
        offset: i64,
    },
    SkipState {
        offset: i64,
        expected: bool,
    },
    CheckTableRowsAmount {
        limit: u64,
        end: Target,
    },
    SkipRows {
        count: u64,
        end: Target,
    },
    Exit,
}

impl Instruction {
    /// `Push` with the kind taken from `value`.
    pub fn push(value: impl Into<Value>) -> Self {
        let value = value.into();
        Instruction::Push {
            kind: value.kind(),
            value,
        }
    }

    pub fn access_column(name: impl Into<String>, kind: ValueKind) -> Self {
        Instruction::AccessColumn {
            name: name.into(),
            kind,
        }
    }

    pub fn load_source(name: impl Into<String>, source: impl RowSource + 'static) -> Self {
        Instruction::LoadSource {
            name: name.into(),
            source: Arc::new(source),
        }
    }

    /// The label-resolved operand, if this instruction has one.
    pub(crate) fn target_mut(&mut self) -> Option<&mut Target> {
        match self {
            Instruction::Jmp { target }
            | Instruction::JmpState { target, .. }
            | Instruction::GrabFirstValueFromSource { end: target }
            | Instruction::CheckTableRowsAmount { end: target, .. }
            | Instruction::SkipRows { end: target, .. } => Some(target),
            _ => None,
        }
    }

    /// Mnemonic and operands, as shown in traces and disassembly.
    pub fn debug_info(&self) -> String {
        self.to_string()
    }

    pub(crate) fn execute(&self, ctx: &mut ExecutionContext, program: &Program) -> VmResult<()> {
        match self {
            Instruction::Push { kind, value } => scalar::push(ctx, *kind, value),
            Instruction::Pop { kind } => scalar::pop(ctx, *kind),
            Instruction::SetRegister { register, value } => {
                scalar::set_register(ctx, *register, *value)
            }
            Instruction::And => scalar::and(ctx),
            Instruction::Or => scalar::or(ctx),
            Instruction::Not => scalar::not(ctx),
            Instruction::Compare { kind, op } => scalar::compare(ctx, *kind, *op),
            Instruction::Arithmetic { kind, op } => scalar::arithmetic(ctx, *kind, *op),

            Instruction::AccessColumn { name, kind } => data::access_column(ctx, name, *kind),
            Instruction::AccessColumnNumeric { ordinal } => {
                data::access_column_numeric(ctx, *ordinal)
            }
            Instruction::AccessProperty { property, kind } => {
                data::access_property(ctx, property, *kind)
            }
            Instruction::AccessCallChain { chain, kind } => {
                data::access_call_chain(ctx, chain, *kind)
            }

            Instruction::AccessGroup { fields } => grouping::access_group(ctx, fields),
            Instruction::CreateGroupIdentifier { kinds } => {
                grouping::create_group_identifier(ctx, kinds)
            }
            Instruction::AddNewGroup { table, columns } => {
                grouping::add_new_group(ctx, table, columns)
            }

            Instruction::LoadSource { source, .. } => table_ops::load_source(ctx, source.as_ref()),
            Instruction::UseTableAsSource { table } => {
                table_ops::use_table_as_source(ctx, table, None)
            }
            Instruction::UseTableAsSourceRemapped { table, columns } => {
                table_ops::use_table_as_source(ctx, table, Some(columns.as_slice()))
            }
            Instruction::PopSource => table_ops::pop_source(ctx),
            Instruction::GrabFirstValueFromSource { end } => {
                table_ops::grab_first_value(ctx, *end)
            }
            Instruction::MoveToAnotherValueFromSource => table_ops::move_to_another_value(ctx),
            Instruction::LoadTable { name, columns, key } => {
                table_ops::load_table(ctx, name, columns, key)
            }
            Instruction::InitializeTable { name, columns } => {
                table_ops::initialize_table(ctx, name, columns)
            }
            Instruction::CheckTableHasKey {
                table,
                ordinals,
                expected,
            } => table_ops::check_table_has_key(ctx, table, ordinals, *expected),
            Instruction::GrabRow { kinds } => table_ops::grab_row(ctx, kinds),
            Instruction::AddNewRow { table } => table_ops::add_new_row(ctx, table),
            Instruction::RenameTable { from, to } => table_ops::rename_table(ctx, from, to),

            Instruction::PrepareMethodCall { method } => {
                calls::prepare_method_call(ctx, *method, program.method(*method))
            }
            Instruction::Call { method, arg_count } => {
                calls::call(ctx, *method, program.method(*method), *arg_count)
            }

            Instruction::Contains { register, kind } => pattern::contains(ctx, *register, *kind),
            Instruction::Like => pattern::like(ctx),

            Instruction::Jmp { target } => control::jmp(ctx, *target),
            Instruction::JmpState { target, expected } => {
                control::jmp_state(ctx, *target, *expected)
            }
            Instruction::GoTo { index } => control::go_to(ctx, *index),
            Instruction::Skip { offset } => control::skip(ctx, *offset),
            Instruction::SkipState { offset, expected } => {
                control::skip_state(ctx, *offset, *expected)
            }
            Instruction::CheckTableRowsAmount { limit, end } => {
                control::check_table_rows_amount(ctx, *limit, *end)
            }
            Instruction::SkipRows { count, end } => control::skip_rows(ctx, *count, *end),
            Instruction::Exit => control::exit(ctx),
        }
    }
}

fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn columns(f: &mut fmt::Formatter<'_>, columns: &[ColumnSpec]) -> fmt::Result {
    f.write_str("(")?;
    for (idx, column) in columns.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}: {}", column.name, column.kind)?;
    }
    f.write_str(")")
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Push {
                kind,
                value: Value::Text(text),
            } => write!(f, "PUSH {kind} {text:?}"),
            Instruction::Push { kind, value } => write!(f, "PUSH {kind} {value}"),
            Instruction::Pop { kind } => write!(f, "POP {kind}"),
            Instruction::SetRegister { register, value } => write!(f, "SETREG {register} {value}"),
            Instruction::And => f.write_str("AND"),
            Instruction::Or => f.write_str("OR"),
            Instruction::Not => f.write_str("NOT"),
            Instruction::Compare { kind, op } => write!(f, "CMP {kind} {}", op.as_str()),
            Instruction::Arithmetic { kind, op } => write!(f, "ARITH {kind} {}", op.as_str()),
            Instruction::AccessColumn { name, kind } => write!(f, "ACCESS_COLUMN {name} {kind}"),
            Instruction::AccessColumnNumeric { ordinal } => {
                write!(f, "ACCESS_COLUMN_NUMERIC {ordinal}")
            }
            Instruction::AccessProperty { property, kind } => {
                write!(f, "ACCESS_PROPERTY .{property} {kind}")
            }
            Instruction::AccessCallChain { chain, kind } => {
                f.write_str("ACCESS_CALL_CHAIN ")?;
                for hop in chain {
                    write!(f, "{hop}")?;
                }
                write!(f, " {kind}")
            }
            Instruction::AccessGroup { fields } => {
                f.write_str("ACCESS_GROUP ")?;
                for (idx, field) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.kind)?;
                }
                Ok(())
            }
            Instruction::CreateGroupIdentifier { kinds } => {
                f.write_str("CREATE_GROUP_IDENTIFIER ")?;
                join(f, kinds)
            }
            Instruction::AddNewGroup { table, columns } => {
                write!(f, "ADD_NEW_GROUP {table} {{")?;
                for (idx, (ordinal, field)) in columns.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{ordinal}: {field}")?;
                }
                f.write_str("}")
            }
            Instruction::LoadSource { name, .. } => write!(f, "LOAD_SOURCE {name}"),
            Instruction::UseTableAsSource { table } => write!(f, "USE_TABLE_AS_SOURCE {table}"),
            Instruction::UseTableAsSourceRemapped { table, columns } => {
                write!(f, "USE_TABLE_AS_SOURCE_REMAPPED {table} {{")?;
                for (idx, (name, ordinal)) in columns.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {ordinal}")?;
                }
                f.write_str("}")
            }
            Instruction::PopSource => f.write_str("POP_SOURCE"),
            Instruction::GrabFirstValueFromSource { end } => {
                write!(f, "GRAB_FIRST_VALUE_FROM_SOURCE {end}")
            }
            Instruction::MoveToAnotherValueFromSource => {
                f.write_str("MOVE_TO_ANOTHER_VALUE_FROM_SOURCE")
            }
            Instruction::LoadTable {
                name,
                columns: cols,
                key,
            } => {
                write!(f, "LOAD_TABLE {name} ")?;
                columns(f, cols)?;
                write!(f, " KEY ({})", key.join(", "))
            }
            Instruction::InitializeTable {
                name,
                columns: cols,
            } => {
                write!(f, "INITIALIZE_TABLE {name} ")?;
                columns(f, cols)
            }
            Instruction::CheckTableHasKey {
                table,
                ordinals,
                expected,
            } => {
                write!(f, "CHECK_TABLE_HAS_KEY {table} [")?;
                join(f, ordinals)?;
                write!(f, "] {expected}")
            }
            Instruction::GrabRow { kinds } => {
                f.write_str("GRAB_ROW ")?;
                join(f, kinds)
            }
            Instruction::AddNewRow { table } => write!(f, "ADD_NEW_ROW {table}"),
            Instruction::RenameTable { from, to } => write!(f, "RENAME_TABLE {from} {to}"),
            Instruction::PrepareMethodCall { method } => {
                write!(f, "PREPARE_METHOD_CALL {method}")
            }
            Instruction::Call { method, arg_count } => write!(f, "CALL {method} {arg_count}"),
            Instruction::Contains { register, kind } => write!(f, "CONTAINS {register} {kind}"),
            Instruction::Like => f.write_str("LIKE"),
            Instruction::Jmp { target } => write!(f, "JMP {target}"),
            Instruction::JmpState { target, expected } => {
                write!(f, "JMP_STATE {target} {expected}")
            }
            Instruction::GoTo { index } => write!(f, "GOTO {index}"),
            Instruction::Skip { offset } => write!(f, "SKIP {offset:+}"),
            Instruction::SkipState { offset, expected } => {
                write!(f, "SKIP_STATE {offset:+} {expected}")
            }
            Instruction::CheckTableRowsAmount { limit, end } => {
                write!(f, "CHECK_TABLE_ROWS_AMOUNT {limit} {end}")
            }
            Instruction::SkipRows { count, end } => write!(f, "SKIP_ROWS {count} {end}"),
            Instruction::Exit => f.write_str("EXIT"),
        }
    }
}
