//! Mutable state of one query run.
use crate::error::{VmError, VmResult};
use crate::group::{GroupForest, GroupId};
use crate::like::LikeCache;
use crate::options::VmOptions;
use crate::register::Registers;
use crate::source::{CurrentRow, SourceCursor};
use crate::stack::ValueStacks;
use crate::table::Table;
use crate::value::Value;
use ahash::AHashMap;

/// Counters collected while a program runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Rows appended by `AddNewRow` and `AddNewGroup`.
    pub rows_added: u64,
    pub instructions_executed: u64,
    /// Set when the run stopped because its cancellation token fired.
    pub cancelled: bool,
}

impl Stats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Stacks, registers, sources, tables and groups owned by a single run.
#[derive(Debug)]
pub struct ExecutionContext {
    pub(crate) stacks: ValueStacks,
    pub(crate) registers: Registers,
    sources: Vec<SourceCursor>,
    tables: AHashMap<String, Table>,
    pub(crate) groups: GroupForest,
    pub(crate) current_group: Option<GroupId>,
    pub(crate) stats: Stats,
    /// `CheckTableRowsAmount` visit counters, keyed by instruction index.
    pub(crate) visits: AHashMap<usize, u64>,
    pub(crate) like_cache: LikeCache,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(&VmOptions::default())
    }
}

impl ExecutionContext {
    pub fn new(options: &VmOptions) -> Self {
        Self {
            stacks: ValueStacks::with_capacity(options.stack_capacity),
            registers: Registers::new(),
            sources: Vec::new(),
            tables: AHashMap::new(),
            groups: GroupForest::new(),
            current_group: None,
            stats: Stats::default(),
            visits: AHashMap::new(),
            like_cache: LikeCache::new(options.like_cache_capacity),
        }
    }

    pub fn stacks(&self) -> &ValueStacks {
        &self.stacks
    }

    pub fn stacks_mut(&mut self) -> &mut ValueStacks {
        &mut self.stacks
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn groups(&self) -> &GroupForest {
        &self.groups
    }

    /// The group most recently touched by `AccessGroup` or by advancing onto a group row.
    pub fn current_group(&self) -> Option<GroupId> {
        self.current_group
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub(crate) fn table_mut(&mut self, name: &str) -> VmResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| VmError::UnknownTable(name.to_string()))
    }

    pub(crate) fn require_table(&self, name: &str) -> VmResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| VmError::UnknownTable(name.to_string()))
    }

    pub fn insert_table(&mut self, table: Table) -> VmResult<()> {
        if self.tables.contains_key(table.name()) {
            return Err(VmError::DuplicateTable(table.name().to_string()));
        }
        self.tables.insert(table.name().to_string(), table);
        Ok(())
    }

    pub fn take_table(&mut self, name: &str) -> Option<Table> {
        self.tables.remove(name)
    }

    /// Moves the table registered as `from` to `to`. The target name must be free.
    pub fn rename_table(&mut self, from: &str, to: &str) -> VmResult<()> {
        if from == to {
            return self.require_table(from).map(|_| ());
        }
        if self.tables.contains_key(to) {
            return Err(VmError::DuplicateTable(to.to_string()));
        }
        let mut table = self
            .tables
            .remove(from)
            .ok_or_else(|| VmError::UnknownTable(from.to_string()))?;
        table.set_name(to);
        self.tables.insert(to.to_string(), table);
        Ok(())
    }

    pub fn source_depth(&self) -> usize {
        self.sources.len()
    }

    pub(crate) fn push_source(&mut self, cursor: SourceCursor) {
        self.sources.push(cursor);
    }

    pub(crate) fn pop_source(&mut self) -> VmResult<SourceCursor> {
        self.sources.pop().ok_or(VmError::NoSource)
    }

    /// Advances the top cursor; moving onto a group row makes its group current.
    pub(crate) fn advance_source(&mut self) -> VmResult<bool> {
        let cursor = self.sources.last_mut().ok_or(VmError::NoSource)?;
        if !cursor.advance() {
            return Ok(false);
        }
        if let Some(group) = cursor.current().and_then(CurrentRow::group) {
            self.current_group = Some(group);
        }
        Ok(true)
    }

    pub fn current_row(&self) -> VmResult<&CurrentRow> {
        self.sources
            .last()
            .ok_or(VmError::NoSource)?
            .current()
            .ok_or(VmError::NoCurrentRow)
    }

    pub(crate) fn read_column(&self, name: &str) -> VmResult<Value> {
        self.current_row()?
            .get(name, &self.groups)
            .ok_or_else(|| VmError::UnknownColumn(name.to_string()))
    }

    pub(crate) fn read_ordinal(&self, ordinal: usize) -> VmResult<Value> {
        let row = self.current_row()?;
        row.context(ordinal, &self.groups)
            .ok_or(VmError::OrdinalOutOfRange {
                ordinal,
                width: row.width().unwrap_or(0),
            })
    }

    /// Returns the context to its freshly created state, keeping allocations.
    pub fn reset(&mut self) {
        self.stacks.clear();
        self.registers = Registers::new();
        self.sources.clear();
        self.tables.clear();
        self.groups = GroupForest::new();
        self.current_group = None;
        self.stats.reset();
        self.visits.clear();
    }
}
