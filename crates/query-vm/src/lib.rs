#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! A register-based virtual machine that executes linearized SQL query programs.
//!
//! A query planner lowers a SQL statement into a flat sequence of [`Instruction`]s. The
//! [`Assembler`] resolves labels and binds library methods once, producing an immutable
//! [`Program`]; a [`Vm`] then drives it against its own [`ExecutionContext`] until `Exit` and
//! hands back the result [`Table`].
//!
//! ## Stacks
//!
//! Values travel on five typed stacks (bool, int, decimal, text, object). Every instruction
//! carries the [`ValueKind`] of what it produces or consumes, so routing is fixed at assembly
//! time. Popping an empty stack means the instruction stream is unbalanced and panics.
//!
//! ## Grouping
//!
//! `CreateGroupIdentifier` and `AccessGroup` maintain a [`GroupForest`]: one node per distinct
//! key prefix, counting hits and holding per-group aggregates written by library methods such
//! as `SetCount`/`Count`. `AddNewGroup` appends rows that resolve their values from the group
//! when the result table is materialized.
//!
//! ```
//! use query_vm::{Assembler, ColumnSpec, Instruction, Value, ValueKind, Vm};
//!
//! let mut asm = Assembler::new();
//! asm.extend([
//!     Instruction::InitializeTable {
//!         name: "out".into(),
//!         columns: vec![ColumnSpec::new("answer", ValueKind::Int)],
//!     },
//!     Instruction::push(42),
//!     Instruction::GrabRow { kinds: vec![ValueKind::Int] },
//!     Instruction::AddNewRow { table: "out".into() },
//!     Instruction::Exit,
//! ]);
//! let program = asm.assemble("out").unwrap();
//! let table = Vm::new(program).run().unwrap();
//! assert_eq!(table.value(0, "answer"), Some(&Value::Int(42)));
//! ```

pub mod assembler;
pub mod context;
pub mod error;
pub mod group;
pub mod instruction;
pub mod like;
pub mod methods;
pub mod options;
pub mod register;
pub mod source;
pub mod stack;
pub mod table;
pub mod value;
pub mod vm;

pub use assembler::{Assembler, Label, MethodId, Program, Target};
pub use context::{ExecutionContext, Stats};
pub use error::{AssembleError, MethodError, RunError, VmError, VmResult};
pub use group::{Group, GroupForest, GroupId};
pub use instruction::{ArithmeticOp, CompareOp, GroupField, Hop, Instruction};
pub use like::like;
pub use methods::{lookup_method, Invocation, MethodRegistry, MethodSpec, Param};
pub use options::VmOptions;
pub use register::Register;
pub use source::{CurrentRow, InMemorySource, MemoryRow, RowSource, SourceRow};
pub use stack::{Object, ValueStacks};
pub use table::{Column, ColumnSpec, Table};
pub use value::{Value, ValueKind};
pub use vm::{CancellationToken, Vm};
