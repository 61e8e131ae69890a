//! Row sources and the cursors that iterate them.
use crate::group::{GroupForest, GroupId};
use crate::table::Row;
use crate::value::Value;
use ahash::AHashMap;
use std::fmt;
use std::sync::Arc;

/// A row produced by an external source.
pub trait SourceRow: fmt::Debug + Send + Sync {
    /// Named field lookup.
    fn get(&self, name: &str) -> Option<Value>;

    /// Raw positional values backing the row.
    fn contexts(&self) -> &[Value];
}

pub type SourceRowRef = Arc<dyn SourceRow>;

pub type RowIter = Box<dyn Iterator<Item = SourceRowRef> + Send>;

/// Provider of rows for `LoadSource`.
///
/// `open` is called once per `LoadSource` execution, so a program that re-enters a scan gets a
/// fresh iterator each time.
pub trait RowSource: fmt::Debug + Send + Sync {
    fn open(&self) -> RowIter;
}

#[derive(Debug, Clone)]
pub struct MemoryRow {
    columns: Arc<AHashMap<String, usize>>,
    values: Vec<Value>,
}

impl SourceRow for MemoryRow {
    fn get(&self, name: &str) -> Option<Value> {
        let idx = *self.columns.get(name)?;
        self.values.get(idx).cloned()
    }

    fn contexts(&self) -> &[Value] {
        &self.values
    }
}

/// Row source over rows held in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    columns: Arc<AHashMap<String, usize>>,
    rows: Arc<Vec<SourceRowRef>>,
}

impl InMemorySource {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(idx, c)| (c.into(), idx))
            .collect();
        Self {
            columns: Arc::new(columns),
            rows: Arc::new(Vec::new()),
        }
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = Vec<Value>>) -> Self {
        for row in rows {
            self.push_row(row);
        }
        self
    }

    pub fn push_row(&mut self, values: Vec<Value>) {
        let row: SourceRowRef = Arc::new(MemoryRow {
            columns: Arc::clone(&self.columns),
            values,
        });
        Arc::make_mut(&mut self.rows).push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RowSource for InMemorySource {
    fn open(&self) -> RowIter {
        let rows = Arc::clone(&self.rows);
        Box::new((0..rows.len()).map(move |idx| Arc::clone(&rows[idx])))
    }
}

/// The row a cursor currently points at.
#[derive(Debug, Clone)]
pub enum CurrentRow {
    External(SourceRowRef),
    Table {
        row: Row,
        columns: Arc<AHashMap<String, usize>>,
    },
}

impl CurrentRow {
    pub fn get(&self, name: &str, groups: &GroupForest) -> Option<Value> {
        match self {
            CurrentRow::External(row) => row.get(name),
            CurrentRow::Table { row, columns } => {
                let ordinal = *columns.get(name)?;
                row.value(ordinal, groups)
            }
        }
    }

    pub fn context(&self, ordinal: usize, groups: &GroupForest) -> Option<Value> {
        match self {
            CurrentRow::External(row) => row.contexts().get(ordinal).cloned(),
            CurrentRow::Table { row, .. } => row.value(ordinal, groups),
        }
    }

    /// Number of positional values, when known without consulting groups.
    pub fn width(&self) -> Option<usize> {
        match self {
            CurrentRow::External(row) => Some(row.contexts().len()),
            CurrentRow::Table { row, .. } => row.values().map(<[Value]>::len),
        }
    }

    pub fn group(&self) -> Option<GroupId> {
        match self {
            CurrentRow::External(_) => None,
            CurrentRow::Table { row, .. } => row.group(),
        }
    }
}

enum CursorRows {
    External(RowIter),
    Table {
        rows: std::vec::IntoIter<Row>,
        columns: Arc<AHashMap<String, usize>>,
    },
}

/// Cursor on the source stack.
pub struct SourceCursor {
    rows: CursorRows,
    current: Option<CurrentRow>,
}

impl fmt::Debug for SourceCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.rows {
            CursorRows::External(_) => "external",
            CursorRows::Table { .. } => "table",
        };
        f.debug_struct("SourceCursor")
            .field("kind", &kind)
            .field("current", &self.current)
            .finish()
    }
}

impl SourceCursor {
    pub fn external(rows: RowIter) -> Self {
        Self {
            rows: CursorRows::External(rows),
            current: None,
        }
    }

    /// Cursor over a snapshot of materialized rows; `columns` maps names to ordinals.
    pub fn table(rows: Vec<Row>, columns: AHashMap<String, usize>) -> Self {
        Self {
            rows: CursorRows::Table {
                rows: rows.into_iter(),
                columns: Arc::new(columns),
            },
            current: None,
        }
    }

    /// Moves to the next row. Returns `false` once the source is exhausted.
    pub fn advance(&mut self) -> bool {
        self.current = match &mut self.rows {
            CursorRows::External(rows) => rows.next().map(CurrentRow::External),
            CursorRows::Table { rows, columns } => rows.next().map(|row| CurrentRow::Table {
                row,
                columns: Arc::clone(columns),
            }),
        };
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&CurrentRow> {
        self.current.as_ref()
    }
}
