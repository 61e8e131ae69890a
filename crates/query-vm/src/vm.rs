//! The fetch/execute loop.
use crate::assembler::Program;
use crate::context::{ExecutionContext, Stats};
use crate::error::{RunError, VmError, VmResult};
use crate::options::VmOptions;
use crate::register::Register;
use crate::table::Table;
use std::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop signal, polled between instructions.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One query execution: an immutable program plus the context it mutates.
///
/// Programs are shared; run independent queries concurrently by giving each its own `Vm`.
pub struct Vm {
    program: Arc<Program>,
    context: ExecutionContext,
    options: VmOptions,
    cancellation: Option<CancellationToken>,
}

impl Vm {
    pub fn new(program: impl Into<Arc<Program>>) -> Self {
        Self::with_options(program, VmOptions::default())
    }

    pub fn with_options(program: impl Into<Arc<Program>>, options: VmOptions) -> Self {
        Self {
            program: program.into(),
            context: ExecutionContext::new(&options),
            options,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    /// The execution context of the current run.
    pub fn current(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn current_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    pub fn stats(&self) -> &Stats {
        self.context.stats()
    }

    fn cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn fail(&self, source: VmError) -> RunError {
        let ip = self.context.registers()[Register::Ip];
        let instruction = usize::try_from(ip)
            .ok()
            .and_then(|idx| self.program.get(idx))
            .map(|instr| instr.debug_info())
            .unwrap_or_else(|| "<none>".to_string());
        RunError {
            ip,
            instruction,
            source,
        }
    }

    fn tick(&mut self) -> VmResult<()> {
        let executed = self.context.stats.instructions_executed;
        if let Some(max) = self.options.max_instructions {
            if executed >= max {
                return Err(VmError::InstructionBudgetExceeded(max));
            }
        }
        self.context.stats.instructions_executed = executed.saturating_add(1);
        Ok(())
    }

    /// Executes one instruction. Returns `false` once the machine has halted, either through
    /// `Exit` or cancellation.
    pub fn step(&mut self) -> Result<bool, RunError> {
        if self.context.registers().is_halted() {
            return Ok(false);
        }
        if self.cancelled() {
            log::debug!(
                "run cancelled at ip {} after {} instructions",
                self.context.registers().ip(),
                self.context.stats.instructions_executed
            );
            self.context.stats.cancelled = true;
            self.context.registers.halt();
            return Ok(false);
        }

        let ip = self.context.registers().ip();
        let program = Arc::clone(&self.program);
        let instruction = usize::try_from(ip)
            .ok()
            .and_then(|idx| program.get(idx))
            .ok_or_else(|| self.fail(VmError::InstructionPointerOutOfRange(ip)))?;
        self.tick().map_err(|err| self.fail(err))?;

        if self.options.trace_instructions {
            log::trace!("{ip:04} {instruction}");
        }
        instruction
            .execute(&mut self.context, &program)
            .map_err(|err| self.fail(err))?;
        Ok(!self.context.registers().is_halted())
    }

    /// Runs until `Exit` (or cancellation) and returns the result table.
    pub fn run(&mut self) -> Result<Table, RunError> {
        log::debug!(
            "running {} instructions into {}",
            self.program.len(),
            self.program.result_table()
        );
        loop {
            match self.step() {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    log::warn!("query run failed: {err}");
                    return Err(err);
                }
            }
        }

        let name = self.program.result_table().to_string();
        let table = match self.context.take_table(&name) {
            Some(mut table) => {
                table.materialize(self.context.groups());
                table
            }
            None if self.context.stats.cancelled => Table::new(name, &[]),
            None => {
                let err = self.fail(VmError::UnknownTable(name));
                log::warn!("query run failed: {err}");
                return Err(err);
            }
        };
        log::debug!(
            "run finished: {} instructions, {} rows added, {} rows returned",
            self.context.stats.instructions_executed,
            self.context.stats.rows_added,
            table.row_count()
        );
        Ok(table)
    }

    /// Clears the context so the program can run again.
    pub fn reset(&mut self) {
        self.context.reset();
    }
}

impl Index<Register> for Vm {
    type Output = i64;

    fn index(&self, register: Register) -> &i64 {
        &self.context.registers()[register]
    }
}

impl IndexMut<Register> for Vm {
    fn index_mut(&mut self, register: Register) -> &mut i64 {
        &mut self.context.registers_mut()[register]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::Assembler;
    use crate::instruction::Instruction;
    use crate::table::ColumnSpec;
    use crate::value::{Value, ValueKind};
    use pretty_assertions::assert_eq;

    fn one_row_program() -> Program {
        let mut asm = Assembler::new();
        asm.extend([
            Instruction::InitializeTable {
                name: "out".into(),
                columns: vec![ColumnSpec::new("n", ValueKind::Int)],
            },
            Instruction::push(7),
            Instruction::GrabRow {
                kinds: vec![ValueKind::Int],
            },
            Instruction::AddNewRow { table: "out".into() },
            Instruction::Exit,
        ]);
        asm.assemble("out").unwrap()
    }

    #[test]
    fn run_returns_the_result_table() {
        let mut vm = Vm::new(one_row_program());
        let table = vm.run().unwrap();
        assert_eq!(table.row_values(0), Some(&[Value::Int(7)][..]));
        assert_eq!(vm.stats().instructions_executed, 5);
        assert_eq!(vm.stats().rows_added, 1);
        assert_eq!(vm[Register::Ip], 4);
        assert!(vm.current().stacks().is_empty());
    }

    #[test]
    fn step_reports_halt() {
        let mut vm = Vm::new(one_row_program());
        let mut steps = 0;
        while vm.step().unwrap() {
            steps += 1;
        }
        assert_eq!(steps, 4);
        assert!(!vm.step().unwrap());
    }

    #[test]
    fn budget_exhaustion_is_an_error() {
        let options = VmOptions::default().with_max_instructions(2);
        let mut vm = Vm::with_options(one_row_program(), options);
        let err = vm.run().unwrap_err();
        assert!(matches!(err.source, VmError::InstructionBudgetExceeded(2)));
        assert_eq!(err.ip, 2);
        assert_eq!(err.instruction, "GRAB_ROW Int64");
    }

    #[test]
    fn falling_off_the_end_is_an_error() {
        let mut asm = Assembler::new();
        asm.emit(Instruction::push(1));
        let mut vm = Vm::new(asm.assemble("out").unwrap());
        let err = vm.run().unwrap_err();
        assert!(matches!(err.source, VmError::InstructionPointerOutOfRange(1)));
    }

    #[test]
    fn cancellation_before_the_table_exists_yields_an_empty_table() {
        let token = CancellationToken::new();
        token.cancel();
        let mut vm = Vm::new(one_row_program()).with_cancellation(token);
        let table = vm.run().unwrap();
        assert_eq!(table.name(), "out");
        assert!(table.is_empty());
        assert!(vm.stats().cancelled);
        assert_eq!(vm.stats().instructions_executed, 0);
    }

    #[test]
    fn reset_allows_a_second_run() {
        let mut vm = Vm::new(one_row_program());
        vm.run().unwrap();
        vm.reset();
        let table = vm.run().unwrap();
        assert_eq!(table.row_count(), 1);
    }
}
