use crate::error::{VmError, VmResult};
use crate::group::{GroupForest, GroupId};
use crate::value::{Value, ValueKind};
use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ValueKind,
    pub ordinal: usize,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ValueKind, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            ordinal,
        }
    }
}

/// Name/kind pair used to declare a table's columns; ordinals follow declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ValueKind,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A result row that reads its values from a group.
///
/// Each entry maps a column ordinal to the group field (or aggregate) that supplies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRow {
    pub group: GroupId,
    pub columns: Arc<[(usize, String)]>,
}

impl GroupRow {
    pub fn value(&self, ordinal: usize, groups: &GroupForest) -> Option<Value> {
        let (_, field) = self.columns.iter().find(|(idx, _)| *idx == ordinal)?;
        groups.get(self.group).field(field).cloned()
    }

    pub fn values(&self, width: usize, groups: &GroupForest) -> Vec<Value> {
        (0..width)
            .map(|ordinal| self.value(ordinal, groups).unwrap_or_default())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Values(Vec<Value>),
    Group(GroupRow),
}

impl Row {
    /// Positional values of a plain row; `None` for group rows.
    pub fn values(&self) -> Option<&[Value]> {
        match self {
            Row::Values(values) => Some(values),
            Row::Group(_) => None,
        }
    }

    pub fn value(&self, ordinal: usize, groups: &GroupForest) -> Option<Value> {
        match self {
            Row::Values(values) => values.get(ordinal).cloned(),
            Row::Group(row) => row.value(ordinal, groups),
        }
    }

    pub fn group(&self) -> Option<GroupId> {
        match self {
            Row::Values(_) => None,
            Row::Group(row) => Some(row.group),
        }
    }
}

/// Tuple of column values used for existence checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(SmallVec<[Value; 4]>);

impl Key {
    pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
        Self(values.into_iter().collect())
    }

    /// Selects `ordinals` out of `values`.
    pub fn from_ordinals(values: &[Value], ordinals: &[usize]) -> VmResult<Self> {
        ordinals
            .iter()
            .map(|&ordinal| {
                values
                    .get(ordinal)
                    .cloned()
                    .ok_or(VmError::OrdinalOutOfRange {
                        ordinal,
                        width: values.len(),
                    })
            })
            .collect::<VmResult<SmallVec<_>>>()
            .map(Self)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

#[derive(Debug, Clone)]
struct KeyIndex {
    ordinals: Vec<usize>,
    keys: AHashSet<Key>,
}

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    column_index: AHashMap<String, usize>,
    rows: Vec<Row>,
    key_index: Option<KeyIndex>,
    grouped: AHashSet<GroupId>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: &[ColumnSpec]) -> Self {
        let columns: Vec<Column> = columns
            .iter()
            .enumerate()
            .map(|(ordinal, spec)| Column::new(spec.name.clone(), spec.kind, ordinal))
            .collect();
        let column_index = columns
            .iter()
            .map(|c| (c.name.clone(), c.ordinal))
            .collect();

        Self {
            name: name.into(),
            columns,
            column_index,
            rows: Vec::new(),
            key_index: None,
            grouped: AHashSet::new(),
        }
    }

    /// Creates a table that maintains an index over `key_columns` for [`Table::contains_key`].
    pub fn with_key(
        name: impl Into<String>,
        columns: &[ColumnSpec],
        key_columns: &[String],
    ) -> VmResult<Self> {
        let mut table = Self::new(name, columns);
        let ordinals = key_columns
            .iter()
            .map(|c| {
                table
                    .column_ordinal(c)
                    .ok_or_else(|| VmError::UnknownColumn(format!("{}.{c}", table.name)))
            })
            .collect::<VmResult<Vec<_>>>()?;
        table.key_index = Some(KeyIndex {
            ordinals,
            keys: AHashSet::new(),
        });
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_ordinal(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied()
    }

    pub(crate) fn column_map(&self) -> AHashMap<String, usize> {
        self.column_index.clone()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Plain values of row `row`, or `None` for an out-of-range index or a group row.
    pub fn row_values(&self, row: usize) -> Option<&[Value]> {
        self.rows.get(row)?.values()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let ordinal = self.column_ordinal(column)?;
        self.row_values(row)?.get(ordinal)
    }

    /// Appends a plain row, enforcing width and the declared column kinds.
    pub fn push_row(&mut self, values: Vec<Value>) -> VmResult<()> {
        if values.len() != self.columns.len() {
            return Err(VmError::SchemaMismatch {
                table: self.name.clone(),
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        for (column, value) in self.columns.iter().zip(&values) {
            if !column.kind.accepts(value) {
                return Err(VmError::ColumnTypeMismatch {
                    column: format!("{}.{}", self.name, column.name),
                    expected: column.kind,
                    found: value.kind(),
                });
            }
        }

        if let Some(index) = &mut self.key_index {
            index.keys.insert(Key::from_ordinals(&values, &index.ordinals)?);
        }
        self.rows.push(Row::Values(values));
        Ok(())
    }

    /// Appends a group row unless the group already has one. Returns whether a row was added.
    pub fn push_group_row(&mut self, row: GroupRow) -> bool {
        if !self.grouped.insert(row.group) {
            return false;
        }
        self.rows.push(Row::Group(row));
        true
    }

    /// Whether a row whose key columns equal `key` exists.
    ///
    /// Tables created with [`Table::with_key`] answer from their index; other tables compare
    /// `key` positionally against the leading values of each plain row.
    pub fn contains_key(&self, key: &Key) -> bool {
        if let Some(index) = &self.key_index {
            return index.keys.contains(key);
        }

        self.rows.iter().filter_map(Row::values).any(|values| {
            values.len() >= key.values().len() && &values[..key.values().len()] == key.values()
        })
    }

    /// Replaces group rows by the values they currently resolve to.
    pub fn materialize(&mut self, groups: &GroupForest) {
        let width = self.columns.len();
        for row in &mut self.rows {
            if let Row::Group(group_row) = row {
                *row = Row::Values(group_row.values(width, groups));
            }
        }
        self.grouped.clear();
    }
}
