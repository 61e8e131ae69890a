use crate::assembler::Target;
use crate::context::ExecutionContext;
use crate::error::VmResult;
use crate::source::{RowSource, SourceCursor};
use crate::stack::{unexpected, Object};
use crate::table::{ColumnSpec, Key, Table};
use crate::value::{Value, ValueKind};
use ahash::AHashMap;

pub(super) fn load_source(ctx: &mut ExecutionContext, source: &dyn RowSource) -> VmResult<()> {
    ctx.push_source(SourceCursor::external(source.open()));
    ctx.registers.advance();
    Ok(())
}

/// Iterates a snapshot of `table`. `remap` replaces the table's own name→ordinal mapping.
pub(super) fn use_table_as_source(
    ctx: &mut ExecutionContext,
    table: &str,
    remap: Option<&[(String, usize)]>,
) -> VmResult<()> {
    let table = ctx.require_table(table)?;
    let columns: AHashMap<String, usize> = match remap {
        Some(columns) => columns.iter().cloned().collect(),
        None => table.column_map(),
    };
    let cursor = SourceCursor::table(table.rows().to_vec(), columns);
    ctx.push_source(cursor);
    ctx.registers.advance();
    Ok(())
}

pub(super) fn pop_source(ctx: &mut ExecutionContext) -> VmResult<()> {
    ctx.pop_source()?;
    ctx.registers.advance();
    Ok(())
}

pub(super) fn grab_first_value(ctx: &mut ExecutionContext, end: Target) -> VmResult<()> {
    if ctx.advance_source()? {
        ctx.registers.advance();
    } else {
        ctx.registers.jump(end.index());
    }
    Ok(())
}

pub(super) fn move_to_another_value(ctx: &mut ExecutionContext) -> VmResult<()> {
    let moved = ctx.advance_source()?;
    ctx.stacks.push_bool(moved);
    ctx.registers.advance();
    Ok(())
}

pub(super) fn load_table(
    ctx: &mut ExecutionContext,
    name: &str,
    columns: &[ColumnSpec],
    key: &[String],
) -> VmResult<()> {
    let table = Table::with_key(name, columns, key)?;
    ctx.insert_table(table)?;
    ctx.registers.advance();
    Ok(())
}

pub(super) fn initialize_table(
    ctx: &mut ExecutionContext,
    name: &str,
    columns: &[ColumnSpec],
) -> VmResult<()> {
    ctx.insert_table(Table::new(name, columns))?;
    ctx.registers.advance();
    Ok(())
}

fn row_values(object: &Object) -> VmResult<&[Value]> {
    match object {
        Object::Values(values) => Ok(values.as_slice()),
        Object::Value(Value::List(values)) => Ok(&values[..]),
        other => Err(unexpected("row values", other)),
    }
}

/// Peeks the row on top of the object stack and tests its key against `table`.
pub(super) fn check_table_has_key(
    ctx: &mut ExecutionContext,
    table: &str,
    ordinals: &[usize],
    expected: bool,
) -> VmResult<()> {
    let key = Key::from_ordinals(row_values(ctx.stacks.peek_object())?, ordinals)?;
    let found = ctx.require_table(table)?.contains_key(&key);
    ctx.stacks.push_bool(found == expected);
    ctx.registers.advance();
    Ok(())
}

pub(super) fn grab_row(ctx: &mut ExecutionContext, kinds: &[ValueKind]) -> VmResult<()> {
    let mut values = Vec::with_capacity(kinds.len());
    for kind in kinds.iter().rev() {
        values.push(ctx.stacks.pop(*kind)?);
    }
    values.reverse();
    ctx.stacks.push_object(Object::Values(values));
    ctx.registers.advance();
    Ok(())
}

pub(super) fn add_new_row(ctx: &mut ExecutionContext, table: &str) -> VmResult<()> {
    let values = match ctx.stacks.pop_object() {
        Object::Values(values) => values,
        Object::Value(Value::List(values)) => values.to_vec(),
        other => return Err(unexpected("row values", &other)),
    };
    ctx.table_mut(table)?.push_row(values)?;
    ctx.stats.rows_added += 1;
    ctx.registers.advance();
    Ok(())
}

pub(super) fn rename_table(ctx: &mut ExecutionContext, from: &str, to: &str) -> VmResult<()> {
    ctx.rename_table(from, to)?;
    ctx.registers.advance();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use pretty_assertions::assert_eq;

    fn people() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("Name", ValueKind::Text),
            ColumnSpec::new("Age", ValueKind::Int),
        ]
    }

    #[test]
    fn grab_row_then_add_new_row_appends_in_declaration_order() {
        let mut ctx = ExecutionContext::default();
        initialize_table(&mut ctx, "out", &people()).unwrap();
        ctx.stacks.push_text("Ann".into());
        ctx.stacks.push_int(31);
        grab_row(&mut ctx, &[ValueKind::Text, ValueKind::Int]).unwrap();
        add_new_row(&mut ctx, "out").unwrap();

        let table = ctx.table("out").unwrap();
        assert_eq!(
            table.row_values(0),
            Some(&[Value::from("Ann"), Value::Int(31)][..])
        );
        assert_eq!(ctx.stats().rows_added, 1);
        assert!(ctx.stacks.is_empty());
    }

    #[test]
    fn check_table_has_key_peeks_the_row() {
        let mut ctx = ExecutionContext::default();
        load_table(&mut ctx, "seen", &people(), &["Name".to_string()]).unwrap();
        ctx.table_mut("seen")
            .unwrap()
            .push_row(vec![Value::from("Ann"), Value::Int(31)])
            .unwrap();

        ctx.stacks
            .push_object(Object::Values(vec![Value::from("Ann"), Value::Int(5)]));
        check_table_has_key(&mut ctx, "seen", &[0], true).unwrap();
        assert!(ctx.stacks.pop_bool());
        check_table_has_key(&mut ctx, "seen", &[0], false).unwrap();
        assert!(!ctx.stacks.pop_bool());
        assert_eq!(ctx.stacks.depth(ValueKind::Object), 1);
    }

    #[test]
    fn exhausted_source_jumps_to_end() {
        let mut ctx = ExecutionContext::default();
        load_source(&mut ctx, &InMemorySource::new(["a"])).unwrap();
        ctx.registers.jump(5);
        let end = Target::resolved(9);
        grab_first_value(&mut ctx, end).unwrap();
        assert_eq!(ctx.registers.ip(), end.index() as i64);
    }

    #[test]
    fn remapped_table_source_uses_the_alias_map() {
        let mut ctx = ExecutionContext::default();
        initialize_table(&mut ctx, "people", &people()).unwrap();
        ctx.table_mut("people")
            .unwrap()
            .push_row(vec![Value::from("Ann"), Value::Int(31)])
            .unwrap();

        let aliases = [("p.Age".to_string(), 1)];
        use_table_as_source(&mut ctx, "people", Some(&aliases[..])).unwrap();
        move_to_another_value(&mut ctx).unwrap();
        assert!(ctx.stacks.pop_bool());
        assert_eq!(ctx.read_column("p.Age").unwrap(), Value::Int(31));
        assert!(ctx.read_column("Age").is_err());

        move_to_another_value(&mut ctx).unwrap();
        assert!(!ctx.stacks.pop_bool());
        pop_source(&mut ctx).unwrap();
        assert_eq!(ctx.source_depth(), 0);
    }
}
