use super::Hop;
use crate::context::ExecutionContext;
use crate::error::{VmError, VmResult};
use crate::group::GroupForest;
use crate::stack::{unexpected, Object};
use crate::value::{Value, ValueKind};

pub(super) fn access_column(
    ctx: &mut ExecutionContext,
    name: &str,
    kind: ValueKind,
) -> VmResult<()> {
    let value = ctx.read_column(name)?;
    ctx.stacks
        .push(kind, value)
        .map_err(|found| VmError::ColumnTypeMismatch {
            column: name.to_string(),
            expected: kind,
            found,
        })?;
    ctx.registers.advance();
    Ok(())
}

pub(super) fn access_column_numeric(ctx: &mut ExecutionContext, ordinal: usize) -> VmResult<()> {
    let value = ctx.read_ordinal(ordinal)?;
    ctx.stacks.push_object(Object::Value(value));
    ctx.registers.advance();
    Ok(())
}

pub(super) fn access_property(
    ctx: &mut ExecutionContext,
    property: &str,
    kind: ValueKind,
) -> VmResult<()> {
    let hop = [Hop::Property(property.to_string())];
    access_call_chain(ctx, &hop, kind)
}

pub(super) fn access_call_chain(
    ctx: &mut ExecutionContext,
    chain: &[Hop],
    kind: ValueKind,
) -> VmResult<()> {
    let root = ctx.stacks.pop_object();
    let value = resolve_chain(root, chain, &ctx.groups)?;
    ctx.stacks
        .push(kind, value)
        .map_err(|found| VmError::TypeMismatch {
            what: format!("property chain {}", render_path(chain)),
            expected: kind,
            found,
        })?;
    ctx.registers.advance();
    Ok(())
}

fn render_path(chain: &[Hop]) -> String {
    chain.iter().map(ToString::to_string).collect()
}

fn failure(chain: &[Hop], hop: usize, reason: impl Into<String>) -> VmError {
    VmError::PropertyAccess {
        path: render_path(&chain[..=hop]),
        reason: reason.into(),
    }
}

/// Walks `chain` starting at `root`.
///
/// The first hop may read from a source row; later hops operate on values. `null` propagates
/// through every remaining hop.
pub fn resolve_chain(root: Object, chain: &[Hop], groups: &GroupForest) -> VmResult<Value> {
    let (mut current, rest_start) = match root {
        Object::Value(value) => (value, 0),
        Object::Values(values) => (Value::list(values), 0),
        Object::Row(row) => match chain.first() {
            Some(Hop::Property(name)) => {
                let value = row
                    .get(name, groups)
                    .ok_or_else(|| failure(chain, 0, "the source row has no such field"))?;
                (value, 1)
            }
            Some(Hop::Index(idx)) => {
                let value = usize::try_from(*idx)
                    .ok()
                    .and_then(|ordinal| row.context(ordinal, groups))
                    .ok_or_else(|| failure(chain, 0, "index is out of bounds"))?;
                (value, 1)
            }
            Some(Hop::Key(Value::Text(name))) => (row.get(name, groups).unwrap_or_default(), 1),
            Some(Hop::Key(key)) => {
                return Err(failure(chain, 0, format!("a source row cannot be indexed by {key}")))
            }
            None => return Err(unexpected("value", &Object::Row(row))),
        },
        other => return Err(unexpected("value or source row", &other)),
    };

    for (idx, hop) in chain.iter().enumerate().skip(rest_start) {
        current = step(current, hop).map_err(|reason| failure(chain, idx, reason))?;
    }
    Ok(current)
}

fn step(current: Value, hop: &Hop) -> Result<Value, String> {
    match (current, hop) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Record(fields), Hop::Property(name)) => fields
            .get(name)
            .cloned()
            .ok_or_else(|| "no such property".to_string()),
        (Value::Record(fields), Hop::Key(Value::Text(key))) => {
            Ok(fields.get(key).cloned().unwrap_or_default())
        }
        (Value::List(items), Hop::Index(idx) | Hop::Key(Value::Int(idx))) => usize::try_from(*idx)
            .ok()
            .and_then(|idx| items.get(idx))
            .cloned()
            .ok_or_else(|| format!("index {idx} is out of bounds for {} items", items.len())),
        (Value::Text(text), Hop::Index(idx)) => usize::try_from(*idx)
            .ok()
            .and_then(|idx| text.chars().nth(idx))
            .map(|ch| Value::Text(ch.to_string()))
            .ok_or_else(|| format!("index {idx} is out of bounds")),
        (value, hop) => Err(format!("{} does not support {hop}", value.kind())),
    }
}
